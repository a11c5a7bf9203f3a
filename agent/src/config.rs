// agent/src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AgentError, AgentResult};

/// Which firewall frontend owns the INPUT chain on this host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FirewallBackend {
    Ufw,
    Iptables,
}

/// Bounded sleep-poll budget: at most `max_polls` checks, `interval` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchBudget {
    pub max_polls: u32,
    pub interval: Duration,
}

impl WatchBudget {
    /// Credential-prompt handling after a start.
    pub const CREDENTIAL: WatchBudget = WatchBudget { max_polls: 60, interval: Duration::from_secs(1) };
    /// "Process considers itself running" during first-run.
    pub const RUNNING: WatchBudget = WatchBudget { max_polls: 300, interval: Duration::from_secs(1) };
}

/// Static description of the game application being managed.
#[derive(Clone, Debug, Serialize)]
pub struct AppManifest {
    pub name: &'static str,
    pub desc: &'static str,
    pub steam_id: &'static str,
    pub services: Vec<String>,
    pub steam_branch: String,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    // 📂 Installation layout
    pub install_root: PathBuf,
    pub server_ini: PathBuf,
    pub credential_file: PathBuf,

    // 🛡️ Process plumbing
    pub service_name: String,
    pub socket_path: PathBuf,
    pub firewall: FirewallBackend,

    // RCON client
    pub rcon_bin: String,
    pub rcon_host: String,

    pub credential_budget: WatchBudget,
    pub running_budget: WatchBudget,
    /// Pause after `systemctl start/stop` during first-run.
    pub settle_delay: Duration,

    pub steam_branch: String,
}

impl AgentConfig {
    pub fn load() -> AgentResult<Self> {
        let install_root = PathBuf::from(
            env::var("ZOMBOID_ROOT").unwrap_or_else(|_| "/home/steam/Zomboid".to_string()),
        );

        let server_ini = env::var("ZOMBOID_SERVER_INI")
            .map(PathBuf::from)
            .unwrap_or_else(|_| install_root.join("Server").join("servertest.ini"));

        let credential_file = env::var("ZOMBOID_CREDENTIAL_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| install_root.join("admin.passwd"));

        // 🛡️ Strict parse: an unknown backend would silently leave ports closed.
        let firewall = match env::var("ZOMBOID_FIREWALL").as_deref() {
            Err(_) | Ok("ufw") => FirewallBackend::Ufw,
            Ok("iptables") => FirewallBackend::Iptables,
            Ok(other) => {
                return Err(AgentError::Config(format!(
                    "ZOMBOID_FIREWALL must be 'ufw' or 'iptables', got '{}'",
                    other
                )));
            }
        };

        let service_name = env::var("ZOMBOID_SERVICE").unwrap_or_else(|_| "zomboid".to_string());
        if service_name.is_empty() || !service_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@') {
            return Err(AgentError::Config(format!("invalid systemd unit name '{}'", service_name)));
        }

        Ok(Self {
            server_ini,
            credential_file,
            service_name,
            socket_path: env::var("ZOMBOID_SOCKET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/run/zomboid.socket")),
            firewall,
            rcon_bin: env::var("ZOMBOID_RCON_BIN").unwrap_or_else(|_| "rcon".to_string()),
            rcon_host: env::var("ZOMBOID_RCON_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            credential_budget: WatchBudget::CREDENTIAL,
            running_budget: WatchBudget::RUNNING,
            settle_delay: Duration::from_secs(10),
            steam_branch: env::var("ZOMBOID_STEAM_BRANCH").unwrap_or_else(|_| "public".to_string()),
            install_root,
        })
    }

    pub fn manifest(&self) -> AppManifest {
        AppManifest {
            name: "Zomboid",
            desc: "Project Zomboid",
            steam_id: "380870",
            services: vec![self.service_name.clone()],
            steam_branch: self.steam_branch.clone(),
        }
    }

    /// World data lives here; backups start from this directory.
    pub fn save_directory(&self) -> PathBuf {
        self.install_root.join("AppFiles")
    }

    /// Files and directories under the save directory worth backing up.
    pub fn save_files(&self) -> Vec<String> {
        let mut files: Vec<String> = ["banned-ips.json", "banned-players.json", "ops.json", "whitelist.json"]
            .iter()
            .map(|f| f.to_string())
            .collect();
        files.extend(self.manifest().services);
        files
    }

    #[cfg(test)]
    pub fn rooted_at(root: &std::path::Path) -> Self {
        Self {
            install_root: root.to_path_buf(),
            server_ini: root.join("Server").join("servertest.ini"),
            credential_file: root.join("admin.passwd"),
            service_name: "zomboid".to_string(),
            socket_path: root.join("zomboid.socket"),
            firewall: FirewallBackend::Ufw,
            rcon_bin: "rcon".to_string(),
            rcon_host: "127.0.0.1".to_string(),
            credential_budget: WatchBudget::CREDENTIAL,
            running_budget: WatchBudget::RUNNING,
            settle_delay: Duration::from_secs(10),
            steam_branch: "public".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn save_files_include_service_directory() {
        let cfg = AgentConfig::rooted_at(Path::new("/srv/pz"));
        let files = cfg.save_files();
        assert_eq!(files.len(), 5);
        assert!(files.contains(&"whitelist.json".to_string()));
        assert_eq!(files.last().map(String::as_str), Some("zomboid"));
        assert_eq!(cfg.save_directory(), PathBuf::from("/srv/pz/AppFiles"));
    }

    #[test]
    fn budgets_match_poll_contract() {
        assert_eq!(WatchBudget::CREDENTIAL.max_polls, 60);
        assert_eq!(WatchBudget::RUNNING.max_polls, 300);
        assert_eq!(WatchBudget::CREDENTIAL.interval, Duration::from_secs(1));
    }

    #[test]
    fn manifest_identifies_steam_app() {
        let cfg = AgentConfig::rooted_at(Path::new("/srv/pz"));
        let m = cfg.manifest();
        assert_eq!(m.steam_id, "380870");
        assert_eq!(m.services, vec!["zomboid".to_string()]);
    }
}
