// agent/src/sys/firewall.rs
//
// 🛡️ SOLID: Single-Responsibility — inbound port allowances only.
// 🛡️ Zero-Trust: All inputs validated before kernel interaction.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::FirewallBackend;
use crate::sys::traits::{FirewallManager, Protocol};

/// LinuxFirewallManager drives `ufw` (Debian/Ubuntu hosts) or raw `iptables`.
pub struct LinuxFirewallManager {
    backend: FirewallBackend,
}

impl LinuxFirewallManager {
    pub fn new(backend: FirewallBackend) -> Self {
        Self { backend }
    }

    fn allow_command(&self, port: u16, protocol: Protocol, description: &str) -> (&'static str, Vec<String>) {
        match self.backend {
            FirewallBackend::Ufw => (
                "ufw",
                vec![
                    "allow".to_string(),
                    format!("{}/{}", port, protocol.as_str()),
                    "comment".to_string(),
                    description.to_string(),
                ],
            ),
            FirewallBackend::Iptables => ("iptables", iptables_rule("-A", port, protocol)),
        }
    }

    fn remove_command(&self, port: u16, protocol: Protocol) -> (&'static str, Vec<String>) {
        match self.backend {
            FirewallBackend::Ufw => (
                "ufw",
                vec!["delete".to_string(), "allow".to_string(), format!("{}/{}", port, protocol.as_str())],
            ),
            FirewallBackend::Iptables => ("iptables", iptables_rule("-D", port, protocol)),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<(), String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| format!("[SLA ERROR] {} spawn failed: {}", program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("[SLA ERROR] {} {} failed: {}", program, args.join(" "), stderr.trim()));
        }
        Ok(())
    }
}

/// Add and delete share the exact same rule spec so `-D` always matches `-A`.
fn iptables_rule(op: &str, port: u16, protocol: Protocol) -> Vec<String> {
    vec![
        op.to_string(), "INPUT".to_string(),
        "-p".to_string(), protocol.as_str().to_string(),
        "--dport".to_string(), port.to_string(),
        "-j".to_string(), "ACCEPT".to_string(),
    ]
}

/// 🛡️ Zero-Trust: the description reaches argv, keep it printable and short.
fn validate_description(description: &str) -> Result<(), String> {
    if description.len() > 128 {
        return Err("Zero-Trust: firewall comment exceeds 128 bytes".into());
    }
    if description.chars().any(|c| c.is_control() || c == '\'' || c == '"') {
        return Err(format!("Zero-Trust: illegal characters in firewall comment '{}'", description));
    }
    Ok(())
}

#[async_trait]
impl FirewallManager for LinuxFirewallManager {
    async fn allow(&self, port: u16, protocol: Protocol, description: &str) -> Result<(), String> {
        // 🛡️ Port range is enforced by u16; 0 is reserved.
        if port == 0 {
            return Err("Zero-Trust: Port 0 is reserved and cannot be used".into());
        }
        validate_description(description)?;

        let (program, args) = self.allow_command(port, protocol, description);
        self.run(program, &args).await?;

        info!(port, protocol = protocol.as_str(), description, "🛡️ Firewall: allowed");
        Ok(())
    }

    async fn remove(&self, port: u16, protocol: Protocol) -> Result<(), String> {
        if port == 0 {
            return Err("Zero-Trust: Port 0 is reserved and cannot be used".into());
        }

        let (program, args) = self.remove_command(port, protocol);
        self.run(program, &args).await?;

        info!(port, protocol = protocol.as_str(), "🛡️ Firewall: removed");
        Ok(())
    }
}

// ==============================================================================
// 🛡️ Unit Tests — Firewall Command Construction
// ==============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ufw_allow_includes_comment() {
        let fw = LinuxFirewallManager::new(FirewallBackend::Ufw);
        let (program, args) = fw.allow_command(16261, Protocol::Udp, "Project Zomboid data port");
        assert_eq!(program, "ufw");
        assert_eq!(args, vec!["allow", "16261/udp", "comment", "Project Zomboid data port"]);
    }

    #[test]
    fn ufw_remove_targets_port_and_protocol() {
        let fw = LinuxFirewallManager::new(FirewallBackend::Ufw);
        let (_, args) = fw.remove_command(27015, Protocol::Tcp);
        assert_eq!(args, vec!["delete", "allow", "27015/tcp"]);
    }

    #[test]
    fn iptables_delete_mirrors_append() {
        let fw = LinuxFirewallManager::new(FirewallBackend::Iptables);
        let (_, add) = fw.allow_command(16262, Protocol::Udp, "ignored");
        let (_, del) = fw.remove_command(16262, Protocol::Udp);
        assert_eq!(add[0], "-A");
        assert_eq!(del[0], "-D");
        assert_eq!(add[1..], del[1..]);
        assert_eq!(add, vec!["-A", "INPUT", "-p", "udp", "--dport", "16262", "-j", "ACCEPT"]);
    }

    #[test]
    fn description_rejects_injection() {
        assert!(validate_description("Project Zomboid game port").is_ok());
        assert!(validate_description("bad'quote").is_err());
        assert!(validate_description("line\nbreak").is_err());
        assert!(validate_description(&"x".repeat(129)).is_err());
    }

    #[tokio::test]
    async fn port_zero_is_rejected_before_spawning() {
        let fw = LinuxFirewallManager::new(FirewallBackend::Iptables);
        assert!(fw.allow(0, Protocol::Tcp, "zero").await.is_err());
        assert!(fw.remove(0, Protocol::Udp).await.is_err());
    }
}
