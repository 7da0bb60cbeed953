//! JSONL file writer for protocol exchanges.
//!
//! Each [`ProtocolRecord`] is serialized as a single JSON line carrying
//! `direction`, `kind` and `timestamp` next to the message fields, appended
//! through a buffered writer.

use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use voxlink_application::ports::protocol_logger::{ProtocolLogger, ProtocolRecord};

/// JSONL protocol logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlProtocolLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlProtocolLogger {
    /// Create a new logger writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create protocol log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create protocol log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProtocolLogger for JsonlProtocolLogger {
    fn log(&self, record: ProtocolRecord) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let direction = Value::String(record.direction.as_str().to_string());

        let line = match record.payload {
            Value::Object(mut map) => {
                map.insert("direction".to_string(), direction);
                map.insert("kind".to_string(), Value::String(record.kind));
                map.insert("timestamp".to_string(), Value::String(timestamp));
                Value::Object(map)
            }
            other => serde_json::json!({
                "direction": direction,
                "kind": record.kind,
                "timestamp": timestamp,
                "data": other,
            }),
        };

        let Ok(line) = serde_json::to_string(&line) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Protocol log write to {} failed: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlProtocolLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
