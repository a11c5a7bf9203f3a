// agent/src/testing.rs
//
// In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::sys::traits::{
    ControlChannel, FirewallManager, LogSource, OptionChange, OptionStore, Protocol, RconTarget,
    RconTransport, ServiceManager,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallCall {
    Allow(u16, Protocol, String),
    Remove(u16, Protocol),
}

#[derive(Default)]
pub struct RecordingFirewall {
    calls: Mutex<Vec<FirewallCall>>,
    fail_removes: bool,
}

impl RecordingFirewall {
    pub fn failing_removes() -> Self {
        Self { calls: Mutex::new(Vec::new()), fail_removes: true }
    }

    pub fn calls(&self) -> Vec<FirewallCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FirewallManager for RecordingFirewall {
    async fn allow(&self, port: u16, protocol: Protocol, description: &str) -> Result<(), String> {
        self.calls.lock().unwrap().push(FirewallCall::Allow(port, protocol, description.to_string()));
        Ok(())
    }

    async fn remove(&self, port: u16, protocol: Protocol) -> Result<(), String> {
        self.calls.lock().unwrap().push(FirewallCall::Remove(port, protocol));
        if self.fail_removes {
            return Err("rule not found".into());
        }
        Ok(())
    }
}

/// Serves one scripted journal snapshot per read; the last snapshot repeats.
pub struct ScriptedLogSource {
    frames: Vec<Vec<String>>,
    reads: AtomicUsize,
}

impl ScriptedLogSource {
    pub fn new(frames: Vec<Vec<&str>>) -> Self {
        Self {
            frames: frames
                .into_iter()
                .map(|f| f.into_iter().map(String::from).collect())
                .collect(),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSource for ScriptedLogSource {
    async fn recent_lines(&self, n: usize) -> Vec<String> {
        let idx = self.reads.fetch_add(1, Ordering::SeqCst);
        let Some(frame) = self.frames.get(idx).or_else(|| self.frames.last()) else {
            return Vec::new();
        };
        let skip = frame.len().saturating_sub(n);
        frame[skip..].to_vec()
    }
}

#[derive(Default)]
pub struct RecordingControl {
    lines: Mutex<Vec<String>>,
}

impl RecordingControl {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlChannel for RecordingControl {
    async fn send_line(&self, line: &str) -> Result<(), String> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Counts transport calls and answers every one with the same canned reply.
pub struct CountingTransport {
    reply: Result<String, String>,
    commands: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl CountingTransport {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Ok(reply.to_string()), commands: Mutex::new(Vec::new()), calls: AtomicUsize::new(0) }
    }

    pub fn failing(reason: &str) -> Self {
        Self { reply: Err(reason.to_string()), commands: Mutex::new(Vec::new()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RconTransport for CountingTransport {
    async fn call(&self, _target: &RconTarget, command: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.to_string());
        self.reply.clone()
    }
}

#[derive(Default)]
pub struct MemoryOptionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryOptionStore {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: Mutex::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
        }
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, name: &str) -> Option<String> {
        self.values.lock().unwrap().get(name).cloned()
    }

    async fn set(&self, name: &str, value: &str) -> Result<OptionChange, String> {
        let previous = self.values.lock().unwrap().insert(name.to_string(), value.to_string());
        Ok(OptionChange { name: name.to_string(), previous, new: value.to_string() })
    }

    async fn reload(&self) -> Result<(), String> {
        Ok(())
    }
}

/// systemd stand-in: becomes active on start, inactive on stop.
#[derive(Default)]
pub struct FakeServiceManager {
    active: AtomicBool,
    actions: Mutex<Vec<String>>,
}

impl FakeServiceManager {
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceManager for FakeServiceManager {
    async fn start(&self, service_name: &str) -> Result<(), String> {
        self.actions.lock().unwrap().push(format!("start {}", service_name));
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, service_name: &str) -> Result<(), String> {
        self.actions.lock().unwrap().push(format!("stop {}", service_name));
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_active(&self, _service_name: &str) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
