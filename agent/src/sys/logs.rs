// agent/src/sys/logs.rs

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::sys::traits::LogSource;

/// Reads the unit's stdout/stderr back out of the systemd journal.
pub struct JournalLogSource {
    service_name: String,
}

impl JournalLogSource {
    pub fn new(service_name: String) -> Self {
        Self { service_name }
    }
}

/// Last `n` non-empty lines of `text`, oldest first.
fn tail_lines(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].iter().map(|l| l.to_string()).collect()
}

#[async_trait]
impl LogSource for JournalLogSource {
    async fn recent_lines(&self, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }

        let output = Command::new("journalctl")
            .args(["-u", &self.service_name, "-n", &n.to_string(), "-o", "cat", "--no-pager"])
            .output()
            .await;

        // No journal yet (or no journalctl at all) reads as "no markers present".
        match output {
            Ok(out) if out.status.success() => tail_lines(&String::from_utf8_lossy(&out.stdout), n),
            Ok(out) => {
                debug!(code = out.status.code().unwrap_or(-1), "journalctl returned non-zero");
                Vec::new()
            }
            Err(e) => {
                debug!(error = %e, "journalctl could not be spawned");
                Vec::new()
            }
        }
    }
}
