//! JSON-lines export of flushed batches.

use super::{IngestionSink, SinkError};
use crate::core::BatchEnvelope;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends each batch as one JSON line to a per-run file.
#[derive(Debug)]
pub struct ExportSink {
    path: PathBuf,
    // serializes appends from the timer and recorder threads
    lock: Mutex<()>,
}

impl ExportSink {
    /// Export into `dir/batches_<timestamp>.jsonl`.
    pub fn new(dir: &Path) -> Self {
        let path = dir.join(format!(
            "batches_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        Self::with_path(path)
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IngestionSink for ExportSink {
    fn accept(&self, batch: BatchEnvelope) -> Result<(), SinkError> {
        let line =
            serde_json::to_string(&batch).map_err(|e| SinkError::Serialization(e.to_string()))?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::IoError(e.to_string()))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SinkError::IoError(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| SinkError::IoError(e.to_string()))?;

        tracing::debug!(path = ?self.path, batch_id = %batch.batch_id, "Exported batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchMetadata;
    use crate::identity::SessionContext;

    #[test]
    fn test_export_appends_lines() {
        let dir = std::env::temp_dir().join(format!("vakaru-export-{}", uuid::Uuid::new_v4()));
        let sink = ExportSink::new(&dir);
        let session = SessionContext {
            session_id: "sess".to_string(),
            user_id: "user".to_string(),
        };
        let metadata = BatchMetadata {
            source: "test".to_string(),
            version: "1.0.0".to_string(),
            domain: String::new(),
        };

        sink.accept(BatchEnvelope::new(&session, 1, vec![], metadata.clone()))
            .unwrap();
        sink.accept(BatchEnvelope::new(&session, 2, vec![], metadata))
            .unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: BatchEnvelope = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.timestamp, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
