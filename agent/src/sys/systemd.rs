// agent/src/sys/systemd.rs

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::sys::traits::ServiceManager;

pub struct LinuxSystemdManager;

impl LinuxSystemdManager {
    async fn systemctl(&self, action: &str, service_name: &str) -> Result<(), String> {
        let output = Command::new("systemctl")
            .args([action, service_name])
            .output()
            .await
            .map_err(|e| format!("systemctl spawn failed: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("systemctl {} {} failed: {}", action, service_name, stderr.trim()));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceManager for LinuxSystemdManager {
    async fn start(&self, service_name: &str) -> Result<(), String> {
        self.systemctl("start", service_name).await
    }

    async fn stop(&self, service_name: &str) -> Result<(), String> {
        self.systemctl("stop", service_name).await
    }

    async fn is_active(&self, service_name: &str) -> bool {
        // `is-active --quiet` reports purely through the exit code.
        match Command::new("systemctl")
            .args(["is-active", "--quiet", service_name])
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(error = %e, "systemctl is-active could not be spawned");
                false
            }
        }
    }
}
