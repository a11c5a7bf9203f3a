// agent/src/admin.rs
//
// Narrow RCON surface: player count, server-wide messages, world save.

use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::sys::secrets::AdminSecret;
use crate::sys::traits::{OptionStore, RconTarget, RconTransport};

static PLAYERS_CONNECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Players connected \((\d+)\)").expect("static regex"));

/// Outcome of a remote-administration call. `Unavailable` is never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminQueryResult<T> {
    Available(T),
    Unavailable,
}

impl<T> AdminQueryResult<T> {
    pub fn available(self) -> Option<T> {
        match self {
            AdminQueryResult::Available(v) => Some(v),
            AdminQueryResult::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AdminQueryResult::Available(_))
    }
}

/// `Players connected (N): ...` -> N.
pub fn parse_player_count(reply: &str) -> Option<u32> {
    PLAYERS_CONNECTED.captures(reply)?.get(1)?.as_str().parse().ok()
}

fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

pub struct AdminChannel {
    options: Arc<dyn OptionStore>,
    transport: Arc<dyn RconTransport>,
}

impl AdminChannel {
    pub fn new(options: Arc<dyn OptionStore>, transport: Arc<dyn RconTransport>) -> Self {
        Self { options, transport }
    }

    /// Both an RCON port and an RCON password are configured.
    pub async fn is_enabled(&self) -> bool {
        self.target().await.is_some()
    }

    async fn target(&self) -> Option<RconTarget> {
        let port = self.options.get("RCON Port").await.as_deref().and_then(parse_port)?;
        let password = self.options.get("RCON Password").await.filter(|p| !p.is_empty())?;
        Some(RconTarget { port, password: AdminSecret::new(password) })
    }

    /// Every operation funnels through here; nothing past this point raises.
    pub async fn send_administrative_command(&self, command: &str) -> AdminQueryResult<String> {
        let Some(target) = self.target().await else {
            debug!(command, "RCON not configured, skipping call");
            return AdminQueryResult::Unavailable;
        };

        match self.transport.call(&target, command).await {
            Ok(reply) => AdminQueryResult::Available(reply),
            Err(e) => {
                debug!(command, port = target.port, error = %e, "RCON call failed");
                AdminQueryResult::Unavailable
            }
        }
    }

    pub async fn get_player_count(&self) -> AdminQueryResult<u32> {
        match self.send_administrative_command("players").await {
            AdminQueryResult::Available(reply) => match parse_player_count(&reply) {
                Some(count) => AdminQueryResult::Available(count),
                None => {
                    debug!(reply = %reply.trim(), "unrecognised players reply");
                    AdminQueryResult::Unavailable
                }
            },
            AdminQueryResult::Unavailable => AdminQueryResult::Unavailable,
        }
    }

    pub async fn broadcast(&self, message: &str) -> AdminQueryResult<()> {
        let command = format!("/servermsg {}", message);
        self.send_administrative_command(&command).await.map_unit()
    }

    pub async fn save_world(&self) -> AdminQueryResult<()> {
        self.send_administrative_command("save").await.map_unit()
    }

    pub async fn get_configured_port(&self) -> Option<u16> {
        self.options.get("Default Port").await.as_deref().and_then(parse_port)
    }

    pub async fn get_max_players(&self) -> Option<u32> {
        self.options.get("Max Players").await?.trim().parse().ok()
    }

    pub async fn get_public_name(&self) -> Option<String> {
        self.options.get("Public Name").await
    }
}

impl AdminQueryResult<String> {
    fn map_unit(self) -> AdminQueryResult<()> {
        match self {
            AdminQueryResult::Available(_) => AdminQueryResult::Available(()),
            AdminQueryResult::Unavailable => AdminQueryResult::Unavailable,
        }
    }
}
