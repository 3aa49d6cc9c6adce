use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::PilotResult;
use crate::resolver::state::ResolutionSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: i64,
    pub session_id: String,
    pub instruction: String,
    pub source: Option<ResolutionSource>,
    pub elapsed_ms: u64,
    pub script: Option<String>,
    pub error: Option<String>,
}

/// Append-only JSONL log of resolutions for one process run.
pub struct Journal {
    pub session_id: String,
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl Journal {
    pub fn new(dir: &Path) -> PilotResult<Self> {
        std::fs::create_dir_all(dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Ok(Self {
            session_id,
            file_path,
            write_lock: Mutex::new(()),
        })
    }

    /// `<data_local_dir>/rootpilot/sessions`.
    pub fn in_data_dir() -> PilotResult<Self> {
        Self::new(&crate::config::data_dir().join("sessions"))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn record(
        &self,
        instruction: &str,
        source: Option<ResolutionSource>,
        elapsed_ms: u64,
        script: Option<String>,
        error: Option<String>,
    ) -> PilotResult<()> {
        let entry = JournalEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            session_id: self.session_id.clone(),
            instruction: instruction.to_string(),
            source,
            elapsed_ms,
            script,
            error,
        };
        let line = serde_json::to_string(&entry)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.file_path.display(), "journal entry flushed");
        Ok(())
    }
}
