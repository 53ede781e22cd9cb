use crate::config::LoggingConfig;
use crate::errors::DashError;
use serde::Serialize;
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn from_config(cfg: &LoggingConfig) -> Self {
        Self {
            path: cfg.path.clone(),
            max_payload_bytes: cfg.max_payload_bytes,
            max_file_bytes: cfg.max_file_bytes,
        }
    }

    pub fn rotated_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("dashboard.jsonl"));
        name.push(".1");
        self.path.with_file_name(name)
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), DashError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DashError::Io(e.to_string()))?;
        }
        self.rotate_if_full()?;

        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let mut line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| DashError::Io(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| DashError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| DashError::Io(e.to_string()))
    }

    pub fn info(&self, event_type: &str, payload: Value) -> Result<(), DashError> {
        self.append(&LogEvent {
            level: "info",
            event_type,
            payload,
        })
    }

    pub fn warn(&self, event_type: &str, payload: Value) -> Result<(), DashError> {
        self.append(&LogEvent {
            level: "warn",
            event_type,
            payload,
        })
    }

    fn rotate_if_full(&self) -> Result<(), DashError> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(DashError::Io(e.to_string())),
        };
        if size <= self.max_file_bytes {
            return Ok(());
        }
        // Another worker may have rotated first.
        match fs::rename(&self.path, self.rotated_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DashError::Io(e.to_string())),
        }
    }
}

pub fn structured_fallback_line(panel: &str, state: &str, message: &str) -> String {
    format!(
        "panel={panel} state={state} message={} ",
        message.replace('\n', "\\n")
    )
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}
