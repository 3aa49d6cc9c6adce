use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::cache::CacheEntry;
use crate::errors::{PilotError, PilotResult};

/// Whole-map persistence substrate for the command cache.
pub trait CacheStorage: Send + Sync {
    fn load(&self) -> PilotResult<Vec<CacheEntry>>;
    fn save(&self, entries: &[CacheEntry]) -> PilotResult<()>;
}

/// Pretty-printed JSON array in a single file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStorage for JsonFileStorage {
    fn load(&self) -> PilotResult<Vec<CacheEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            PilotError::CacheUnavailable(format!("read {}: {e}", self.path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            PilotError::CacheUnavailable(format!("parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, entries: &[CacheEntry]) -> PilotResult<()> {
        let unavailable =
            |e: std::io::Error| PilotError::CacheUnavailable(format!("write {}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(unavailable)?;
        std::fs::rename(&tmp, &self.path).map_err(unavailable)?;
        Ok(())
    }
}

/// Volatile storage; also what the cache degrades to when the file is unusable.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<Vec<CacheEntry>>,
}

impl CacheStorage for MemoryStorage {
    fn load(&self) -> PilotResult<Vec<CacheEntry>> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.clone())
    }

    fn save(&self, entries: &[CacheEntry]) -> PilotResult<()> {
        let mut stored = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        *stored = entries.to_vec();
        Ok(())
    }
}
