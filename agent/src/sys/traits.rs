// agent/src/sys/traits.rs

use async_trait::async_trait;

use crate::admin::AdminQueryResult;
use crate::error::AgentResult;
use crate::ports::PortBinding;
use crate::sys::secrets::AdminSecret;
use crate::watcher::BootstrapOutcome;

// ==============================================================================
// 1. Firewall Abstraction (Type-Safe)
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol { Tcp, Udp }

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[async_trait]
pub trait FirewallManager: Send + Sync {
    /// Opens `port/protocol` for inbound traffic. Single attempt, never retried.
    async fn allow(&self, port: u16, protocol: Protocol, description: &str) -> Result<(), String>;

    /// Drops a previous allowance for `port/protocol`.
    async fn remove(&self, port: u16, protocol: Protocol) -> Result<(), String>;
}

// ==============================================================================
// 2. Process Plumbing (systemd unit, journal, stdin socket)
// ==============================================================================

#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn start(&self, service_name: &str) -> Result<(), String>;
    async fn stop(&self, service_name: &str) -> Result<(), String>;
    async fn is_active(&self, service_name: &str) -> bool;
}

#[async_trait]
pub trait LogSource: Send + Sync {
    /// The `n` most recent lines, oldest first. Fewer (or none) when the
    /// process has not logged yet; this never fails.
    async fn recent_lines(&self, n: usize) -> Vec<String>;
}

#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Best-effort write into the supervised process's stdin. No acknowledgment.
    async fn send_line(&self, line: &str) -> Result<(), String>;
}

// ==============================================================================
// 3. Option Storage
// ==============================================================================

/// One applied mutation. `previous` is the value immediately before this set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionChange {
    pub name: String,
    pub previous: Option<String>,
    pub new: String,
}

#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get(&self, name: &str) -> Option<String>;

    async fn set(&self, name: &str, value: &str) -> Result<OptionChange, String>;

    /// Re-read backing storage; used after the game rewrites its own config.
    async fn reload(&self) -> Result<(), String>;

    async fn has_value(&self, name: &str) -> bool {
        self.get(name).await.is_some_and(|v| !v.trim().is_empty())
    }
}

// ==============================================================================
// 4. Remote Administration Transport
// ==============================================================================

/// Where and how to authenticate an RCON call.
pub struct RconTarget {
    pub port: u16,
    pub password: AdminSecret,
}

#[async_trait]
pub trait RconTransport: Send + Sync {
    /// One request/response exchange. May fail for any reason; callers degrade.
    async fn call(&self, target: &RconTarget, command: &str) -> Result<String, String>;
}

// ==============================================================================
// 5. Service Capabilities (composed by the concrete game service)
// ==============================================================================

#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    fn name(&self) -> &str;
    async fn start(&self) -> AgentResult<()>;
    async fn stop(&self) -> AgentResult<()>;
    async fn is_running(&self) -> bool;

    /// Runs once the unit has been started: drives first-run prompts.
    async fn post_start(&self) -> AgentResult<BootstrapOutcome>;
}

#[async_trait]
pub trait PortOwner: Send + Sync {
    fn port_definitions(&self) -> &[PortBinding];

    /// Sets an option and reconciles the firewall when it is a port.
    async fn set_option(&self, name: &str, value: &str) -> AgentResult<OptionChange>;
}

#[async_trait]
pub trait AdminQueryable: Send + Sync {
    async fn get_player_count(&self) -> AdminQueryResult<u32>;
    async fn broadcast(&self, message: &str) -> AdminQueryResult<()>;
    async fn save_world(&self) -> AdminQueryResult<()>;

    async fn get_configured_port(&self) -> Option<u16>;
    async fn get_max_players(&self) -> Option<u32>;
    async fn get_public_name(&self) -> Option<String>;
}
