// agent/src/sys/rcon.rs

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::sys::traits::{RconTarget, RconTransport};

/// Delegates the wire protocol to an external RCON client
/// (`rcon -a host:port -p password command`).
pub struct CommandRconTransport {
    bin: String,
    host: String,
    timeout: Duration,
}

impl CommandRconTransport {
    pub fn new(bin: String, host: String) -> Self {
        Self { bin, host, timeout: Duration::from_secs(10) }
    }

    fn args(&self, target: &RconTarget, command: &str) -> Vec<String> {
        let mut args = vec!["-a".to_string(), format!("{}:{}", self.host, target.port), "-p".to_string()];
        target.password.use_secret(|p| args.push(p.to_string()));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RconTransport for CommandRconTransport {
    async fn call(&self, target: &RconTarget, command: &str) -> Result<String, String> {
        // 🛡️ Argument injection: the command is a single argv slot, but a leading
        // dash would still be parsed as a flag by the client.
        if command.starts_with('-') {
            return Err("SECURITY VIOLATION: RCON command may not start with '-'".into());
        }

        let run = Command::new(&self.bin)
            .args(self.args(target, command))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| format!("RCON call timed out after {:?}", self.timeout))?
            .map_err(|e| format!("RCON client spawn failed: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("RCON client exited with {}: {}", output.status.code().unwrap_or(-1), stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
