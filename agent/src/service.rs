// agent/src/service.rs
//
// The Zomboid dedicated server, assembled from the generic capabilities.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::admin::{AdminChannel, AdminQueryResult};
use crate::config::{AgentConfig, AppManifest, WatchBudget};
use crate::error::{AgentError, AgentResult};
use crate::ports::{PortBinding, PortReconciler, port_definitions};
use crate::sys::control::SocketControlChannel;
use crate::sys::firewall::LinuxFirewallManager;
use crate::sys::logs::JournalLogSource;
use crate::sys::options::PropertiesOptionStore;
use crate::sys::rcon::CommandRconTransport;
use crate::sys::systemd::LinuxSystemdManager;
use crate::sys::traits::{
    AdminQueryable, ControlChannel, FirewallManager, LogSource, OptionChange, OptionStore, PortOwner,
    RconTransport, ServiceLifecycle, ServiceManager,
};
use crate::vault::CredentialVault;
use crate::watcher::{BootstrapOutcome, StartupWatcher, TAIL_WINDOW, shows_startup_banner};

/// Everything the service talks to outside the process.
pub struct ServiceDeps {
    pub options: Arc<dyn OptionStore>,
    pub systemd: Arc<dyn ServiceManager>,
    pub logs: Arc<dyn LogSource>,
    pub control: Arc<dyn ControlChannel>,
    pub firewall: Arc<dyn FirewallManager>,
    pub transport: Arc<dyn RconTransport>,
}

impl ServiceDeps {
    /// Production wiring for a Linux host.
    pub async fn linux(config: &AgentConfig) -> AgentResult<Self> {
        let options = PropertiesOptionStore::open(config.server_ini.clone())
            .await
            .map_err(AgentError::Option)?;

        Ok(Self {
            options: Arc::new(options),
            systemd: Arc::new(LinuxSystemdManager),
            logs: Arc::new(JournalLogSource::new(config.service_name.clone())),
            control: Arc::new(SocketControlChannel::new(config.socket_path.clone())),
            firewall: Arc::new(LinuxFirewallManager::new(config.firewall)),
            transport: Arc::new(CommandRconTransport::new(config.rcon_bin.clone(), config.rcon_host.clone())),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PortStatus {
    pub option: &'static str,
    pub protocol: &'static str,
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub app: AppManifest,
    pub service: String,
    pub active: bool,
    pub port: Option<u16>,
    pub max_players: Option<u32>,
    pub public_name: Option<String>,
    pub players: Option<u32>,
    pub rcon_enabled: bool,
    pub ports: Vec<PortStatus>,
    pub save_directory: String,
    pub save_files: Vec<String>,
}

pub struct ZomboidService {
    name: String,
    options: Arc<dyn OptionStore>,
    systemd: Arc<dyn ServiceManager>,
    logs: Arc<dyn LogSource>,
    control: Arc<dyn ControlChannel>,
    reconciler: PortReconciler,
    admin: AdminChannel,
    vault: CredentialVault,
    credential_budget: WatchBudget,
}

impl ZomboidService {
    pub fn new(config: &AgentConfig, deps: ServiceDeps) -> Self {
        let manifest = config.manifest();
        Self {
            name: config.service_name.clone(),
            reconciler: PortReconciler::new(port_definitions(manifest.desc), deps.firewall),
            admin: AdminChannel::new(deps.options.clone(), deps.transport),
            options: deps.options,
            systemd: deps.systemd,
            logs: deps.logs,
            control: deps.control,
            vault: CredentialVault::new(config.credential_file.clone()),
            credential_budget: config.credential_budget,
        }
    }

    pub fn options(&self) -> &dyn OptionStore {
        self.options.as_ref()
    }

    pub fn reconciler(&self) -> &PortReconciler {
        &self.reconciler
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Re-read the option file after the game has rewritten it.
    pub async fn reload(&self) -> AgentResult<()> {
        self.options.reload().await.map_err(AgentError::Option)
    }

    pub async fn status(&self, config: &AgentConfig) -> StatusReport {
        let mut ports = Vec::new();
        for binding in self.port_definitions() {
            ports.push(PortStatus {
                option: binding.option_name,
                protocol: binding.protocol.as_str(),
                value: self.options.get(binding.option_name).await,
            });
        }

        StatusReport {
            app: config.manifest(),
            service: self.name.clone(),
            active: self.systemd.is_active(&self.name).await,
            port: self.admin.get_configured_port().await,
            max_players: self.admin.get_max_players().await,
            public_name: self.admin.get_public_name().await,
            players: self.admin.get_player_count().await.available(),
            rcon_enabled: self.admin.is_enabled().await,
            ports,
            save_directory: config.save_directory().display().to_string(),
            save_files: config.save_files(),
        }
    }
}

#[async_trait]
impl ServiceLifecycle for ZomboidService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> AgentResult<()> {
        info!(service = %self.name, "⚙️ starting game server");
        self.systemd.start(&self.name).await.map_err(AgentError::Service)
    }

    async fn stop(&self) -> AgentResult<()> {
        info!(service = %self.name, "⚙️ stopping game server");
        self.systemd.stop(&self.name).await.map_err(AgentError::Service)
    }

    /// Active unit, plus proof the game itself is up: an RCON answer when RCON
    /// is configured, otherwise the startup banner in the journal tail.
    async fn is_running(&self) -> bool {
        if !self.systemd.is_active(&self.name).await {
            return false;
        }
        if !self.admin.is_enabled().await {
            return shows_startup_banner(&self.logs.recent_lines(TAIL_WINDOW).await);
        }
        self.admin.get_player_count().await.is_available()
    }

    async fn post_start(&self) -> AgentResult<BootstrapOutcome> {
        let secret = self.vault.get_or_create_credential().await?;
        let watcher = StartupWatcher::new(self.logs.as_ref(), self.control.as_ref(), self.credential_budget);
        Ok(watcher.run(&secret).await)
    }
}

#[async_trait]
impl PortOwner for ZomboidService {
    fn port_definitions(&self) -> &[PortBinding] {
        self.reconciler.bindings()
    }

    async fn set_option(&self, name: &str, value: &str) -> AgentResult<OptionChange> {
        let change = self.options.set(name, value).await.map_err(AgentError::Option)?;
        self.reconciler
            .on_option_changed(&change.name, change.previous.as_deref(), &change.new)
            .await;
        Ok(change)
    }
}

#[async_trait]
impl AdminQueryable for ZomboidService {
    async fn get_player_count(&self) -> AdminQueryResult<u32> {
        self.admin.get_player_count().await
    }

    async fn broadcast(&self, message: &str) -> AdminQueryResult<()> {
        self.admin.broadcast(message).await
    }

    async fn save_world(&self) -> AdminQueryResult<()> {
        self.admin.save_world().await
    }

    async fn get_configured_port(&self) -> Option<u16> {
        self.admin.get_configured_port().await
    }

    async fn get_max_players(&self) -> Option<u32> {
        self.admin.get_max_players().await
    }

    async fn get_public_name(&self) -> Option<String> {
        self.admin.get_public_name().await
    }
}
