// agent/src/sys/control.rs

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::sys::traits::ControlChannel;

/// Writes into the FIFO that systemd wires to the server's stdin
/// (`ListenFIFO=` in the companion socket unit).
pub struct SocketControlChannel {
    path: PathBuf,
}

impl SocketControlChannel {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ControlChannel for SocketControlChannel {
    async fn send_line(&self, line: &str) -> Result<(), String> {
        // Never create: a missing socket means the unit is not wired up yet.
        let mut sink = OpenOptions::new()
            .write(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| format!("Failed to open control socket {}: {}", self.path.display(), e))?;

        sink.write_all(line.as_bytes())
            .await
            .map_err(|e| format!("Failed to write control socket: {}", e))?;
        if !line.ends_with('\n') {
            sink.write_all(b"\n").await.map_err(|e| format!("Failed to write control socket: {}", e))?;
        }
        sink.flush().await.map_err(|e| format!("Failed to flush control socket: {}", e))?;
        Ok(())
    }
}
