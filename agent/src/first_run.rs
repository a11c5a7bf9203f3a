// agent/src/first_run.rs
//
// One-time setup of a fresh install: let the server generate its defaults,
// then open the game ports and hand RCON the generated admin credential.

use nix::unistd::Uid;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::service::ZomboidService;
use crate::sys::traits::{OptionStore, PortOwner, ServiceLifecycle};
use crate::watcher::wait_until;

/// Ports opened on first run. RCON stays closed to the outside.
const PUBLIC_PORT_OPTIONS: [&str; 2] = ["Default Port", "UDP Port"];

#[derive(Debug, PartialEq, Eq)]
pub struct FirstRunReport {
    /// Poll on which the server reported itself running, if it did.
    pub running_after: Option<u32>,
    pub rcon_password_set: bool,
}

/// 🛡️ Entry gate: systemd and the firewall both need root.
pub fn require_root() -> AgentResult<()> {
    ensure_root(Uid::effective())
}

fn ensure_root(euid: Uid) -> AgentResult<()> {
    if euid.is_root() { Ok(()) } else { Err(AgentError::NotRoot) }
}

pub async fn run(config: &AgentConfig, service: &ZomboidService) -> AgentResult<FirstRunReport> {
    info!(service = service.name(), "Starting the server for initial setup...");
    service.start().await?;
    tokio::time::sleep(config.settle_delay).await;

    let running_after = wait_until(config.running_budget, || service.is_running()).await;
    match running_after {
        Some(polls) => info!(polls, "first start finished"),
        None => warn!(max_polls = config.running_budget.max_polls, "server never reported running, continuing setup"),
    }

    info!("First start finished, stopping game server...");
    service.stop().await?;
    tokio::time::sleep(config.settle_delay).await;
    service.reload().await?;

    let secret = service.vault().get_or_create_credential().await?;

    for option in PUBLIC_PORT_OPTIONS {
        match service.options().get(option).await {
            Some(value) => service.reconciler().allow_current(option, &value).await,
            None => warn!(option, "port option missing after first start, firewall left unchanged"),
        }
    }

    let mut rcon_password_set = false;
    if !service.options().has_value("RCON Password").await {
        let value = Zeroizing::new(secret.use_secret(|s| s.to_string()));
        service.set_option("RCON Password", &value).await?;
        rcon_password_set = true;
        info!("🔑 RCON password initialised from admin credential");
    }

    Ok(FirstRunReport { running_after, rcon_password_set })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::harness;
    use crate::sys::traits::Protocol;
    use crate::testing::{FirewallCall, MemoryOptionStore, ScriptedLogSource};
    use std::time::Duration;

    fn fast_config(root: &std::path::Path) -> AgentConfig {
        let mut config = AgentConfig::rooted_at(root);
        config.settle_delay = Duration::ZERO;
        config.running_budget.interval = Duration::ZERO;
        config
    }

    #[test]
    fn non_root_is_refused() {
        assert!(matches!(ensure_root(Uid::from_raw(1000)), Err(AgentError::NotRoot)));
        assert!(ensure_root(Uid::from_raw(0)).is_ok());
    }

    #[tokio::test]
    async fn opens_game_ports_and_seeds_rcon_password() {
        let dir = tempfile::tempdir().unwrap();
        let options = MemoryOptionStore::with(&[
            ("Default Port", "16261"),
            ("UDP Port", "16262"),
            ("RCON Port", "27015"),
        ]);
        let h = harness(dir.path(), options, ScriptedLogSource::new(vec![vec!["##########"]]), "");

        let report = run(&fast_config(dir.path()), &h.service).await.unwrap();

        assert_eq!(report, FirstRunReport { running_after: Some(1), rcon_password_set: true });
        assert_eq!(h.systemd.actions(), vec!["start zomboid", "stop zomboid"]);
        assert_eq!(
            h.firewall.calls(),
            vec![
                FirewallCall::Allow(16261, Protocol::Udp, "Project Zomboid data port".to_string()),
                FirewallCall::Allow(16262, Protocol::Udp, "Project Zomboid game port".to_string()),
            ]
        );

        let persisted = std::fs::read_to_string(dir.path().join("admin.passwd")).unwrap();
        assert_eq!(h.options.get("RCON Password").await.as_deref(), Some(persisted.trim()));
    }

    #[tokio::test]
    async fn existing_rcon_password_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let options = MemoryOptionStore::with(&[
            ("Default Port", "16261"),
            ("UDP Port", "16262"),
            ("RCON Password", "chosen-by-admin"),
        ]);
        let h = harness(dir.path(), options, ScriptedLogSource::new(vec![vec!["##########"]]), "");

        let report = run(&fast_config(dir.path()), &h.service).await.unwrap();

        assert!(!report.rcon_password_set);
        assert_eq!(h.options.get("RCON Password").await.as_deref(), Some("chosen-by-admin"));
        assert!(dir.path().join("admin.passwd").exists());
    }

    #[tokio::test]
    async fn active_unit_is_not_running_until_banner_appears() {
        let dir = tempfile::tempdir().unwrap();
        let options = MemoryOptionStore::with(&[("Default Port", "16261"), ("UDP Port", "16262")]);
        let logs = ScriptedLogSource::new(vec![
            vec!["LOG  : General > versionNumber=41.78"],
            vec!["LOG  : General > loading world"],
            vec!["LOG  : General > loading world", "LOG  : General > loading mods"],
            vec!["LOG  : General > loading mods", "##########"],
        ]);
        let h = harness(dir.path(), options, logs, "");

        let report = run(&fast_config(dir.path()), &h.service).await.unwrap();

        assert_eq!(report.running_after, Some(4));
        assert_eq!(h.systemd.actions(), vec!["start zomboid", "stop zomboid"]);
    }

    #[tokio::test]
    async fn setup_continues_when_server_never_reports_running() {
        let dir = tempfile::tempdir().unwrap();
        let options = MemoryOptionStore::with(&[("Default Port", "16261"), ("UDP Port", "16262")]);
        let h = harness(dir.path(), options, ScriptedLogSource::new(vec![vec!["LOG  : General > loading world"]]), "");
        let mut config = fast_config(dir.path());
        config.running_budget.max_polls = 5;

        let report = run(&config, &h.service).await.unwrap();

        assert_eq!(report, FirstRunReport { running_after: None, rcon_password_set: true });
        assert_eq!(h.systemd.actions(), vec!["start zomboid", "stop zomboid"]);
        assert_eq!(h.firewall.calls().len(), 2);
        let persisted = std::fs::read_to_string(dir.path().join("admin.passwd")).unwrap();
        assert_eq!(h.options.get("RCON Password").await.as_deref(), Some(persisted.trim()));
    }
}
