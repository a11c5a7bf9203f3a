// agent/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures that terminate a run. Everything transient (unreachable RCON,
/// empty journal, unknown port option) is absorbed before it gets here.
#[derive(Debug, Error)]
pub enum AgentError {
    /// First-run touches systemd units and the firewall.
    #[error("first-run configuration must be run as root (try sudo)")]
    NotRoot,

    /// Without a persisted secret the bootstrap cannot continue.
    #[error("unable to persist admin credential at {path}: {source}")]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("service control failed: {0}")]
    Service(String),

    #[error("option store: {0}")]
    Option(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
