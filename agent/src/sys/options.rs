// agent/src/sys/options.rs

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use crate::sys::traits::{OptionChange, OptionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind { Str, Int, Port, Bool }

impl OptionKind {
    fn validate(&self, value: &str) -> Result<(), String> {
        // One value is one ini line.
        if value.chars().any(char::is_control) {
            return Err("value must not contain control characters".to_string());
        }
        match self {
            OptionKind::Str => Ok(()),
            OptionKind::Port => match value.trim().parse::<u16>() {
                Ok(port) if port != 0 => Ok(()),
                _ => Err(format!("'{}' is not a port in 1-65535", value)),
            },
            OptionKind::Int => value
                .trim()
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("'{}' is not an integer", value)),
            OptionKind::Bool => match value.trim() {
                "true" | "false" => Ok(()),
                _ => Err(format!("'{}' is not true/false", value)),
            },
        }
    }
}

/// Maps a human-facing option name onto its `servertest.ini` key.
#[derive(Debug)]
pub struct OptionDef {
    pub name: &'static str,
    pub key: &'static str,
    pub kind: OptionKind,
}

pub const OPTION_CATALOGUE: &[OptionDef] = &[
    OptionDef { name: "Default Port", key: "DefaultPort", kind: OptionKind::Port },
    OptionDef { name: "UDP Port", key: "UDPPort", kind: OptionKind::Port },
    OptionDef { name: "RCON Port", key: "RCONPort", kind: OptionKind::Port },
    OptionDef { name: "RCON Password", key: "RCONPassword", kind: OptionKind::Str },
    OptionDef { name: "Max Players", key: "MaxPlayers", kind: OptionKind::Int },
    OptionDef { name: "Public Name", key: "PublicName", kind: OptionKind::Str },
    OptionDef { name: "Public", key: "Public", kind: OptionKind::Bool },
    OptionDef { name: "Password", key: "Password", kind: OptionKind::Str },
];

pub fn lookup(name: &str) -> Option<&'static OptionDef> {
    OPTION_CATALOGUE.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Entry { key: String, value: String },
    Raw(String),
}

fn parse(text: &str) -> Vec<Line> {
    text.lines()
        .map(|raw| {
            let trimmed = raw.trim_start();
            match trimmed.split_once('=') {
                Some((key, value)) if !trimmed.starts_with('#') && !trimmed.starts_with(';') => Line::Entry {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                },
                _ => Line::Raw(raw.to_string()),
            }
        })
        .collect()
}

fn render(lines: &[Line]) -> String {
    let mut out = String::new();
    for line in lines {
        match line {
            Line::Entry { key, value } => {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
            }
            Line::Raw(raw) => out.push_str(raw),
        }
        out.push('\n');
    }
    out
}

/// `key=value` store backed by the server's own ini file. Comments and keys we
/// don't manage are carried through untouched.
pub struct PropertiesOptionStore {
    path: PathBuf,
    lines: Mutex<Vec<Line>>,
}

impl PropertiesOptionStore {
    pub async fn open(path: PathBuf) -> Result<Self, String> {
        let lines = Self::read(&path).await?;
        Ok(Self { path, lines: Mutex::new(lines) })
    }

    /// A file the server has not generated yet reads as empty.
    async fn read(path: &Path) -> Result<Vec<Line>, String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
        }
    }

    /// Atomic replace: write a sibling temp file, then rename over the target.
    async fn persist(&self, lines: &[Line]) -> Result<(), String> {
        let path = self.path.clone();
        let content = render(lines);

        tokio::task::spawn_blocking(move || {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;

            let mut tmp = tempfile::NamedTempFile::new_in(dir)
                .map_err(|e| format!("Failed to create temp file: {}", e))?;
            tmp.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write temp file: {}", e))?;
            tmp.persist(&path)
                .map_err(|e| format!("Failed to perform atomic rename: {}", e.error))?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| format!("option writer task failed: {}", e))?
    }
}

#[async_trait]
impl OptionStore for PropertiesOptionStore {
    async fn get(&self, name: &str) -> Option<String> {
        let def = lookup(name)?;
        let lines = self.lines.lock().await;
        // Last assignment wins, matching how the game reads duplicates.
        lines.iter().rev().find_map(|line| match line {
            Line::Entry { key, value } if key.as_str() == def.key => Some(value.clone()),
            _ => None,
        })
    }

    async fn set(&self, name: &str, value: &str) -> Result<OptionChange, String> {
        let def = lookup(name).ok_or_else(|| format!("unknown option '{}'", name))?;
        def.kind.validate(value).map_err(|e| format!("{}: {}", def.name, e))?;
        let value = value.trim().to_string();

        let mut lines = self.lines.lock().await;
        let mut updated = lines.clone();

        let existing = updated.iter_mut().rev().find_map(|line| match line {
            Line::Entry { key, value } if key.as_str() == def.key => Some(value),
            _ => None,
        });
        let previous = match existing {
            Some(slot) => Some(std::mem::replace(slot, value.clone())),
            None => {
                updated.push(Line::Entry { key: def.key.to_string(), value: value.clone() });
                None
            }
        };

        self.persist(&updated).await?;
        *lines = updated;

        // The RCON password is the only secret in the catalogue.
        if def.key == "RCONPassword" {
            info!(option = def.name, "option updated");
        } else {
            info!(option = def.name, previous = previous.as_deref().unwrap_or(""), new = %value, "option updated");
        }

        Ok(OptionChange { name: def.name.to_string(), previous, new: value })
    }

    async fn reload(&self) -> Result<(), String> {
        let fresh = Self::read(&self.path).await?;
        *self.lines.lock().await = fresh;
        Ok(())
    }
}
