//! Persistent instruction → script memory with conservative fuzzy lookup.
pub mod normalize;
pub mod storage;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::{CacheConfig, KeyScope};
use crate::perception::types::AppContext;
use crate::script::ActionScript;

pub use normalize::{fuzzy_equivalent, normalize};
pub use storage::{CacheStorage, JsonFileStorage, MemoryStorage};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// `package/screen` for context-scoped keys.
    pub scope: Option<String>,
    /// Always normalized.
    pub instruction: String,
}

impl CacheKey {
    pub fn global(instruction: &str) -> Self {
        Self {
            scope: None,
            instruction: normalize(instruction),
        }
    }

    pub fn scoped(instruction: &str, ctx: &AppContext) -> Self {
        Self {
            scope: Some(format!("{}/{}", ctx.package, ctx.screen)),
            instruction: normalize(instruction),
        }
    }

    /// Applies the configured scoping mode; an unknown context always yields a global key.
    pub fn for_context(instruction: &str, ctx: Option<&AppContext>, mode: KeyScope) -> Self {
        match (mode, ctx) {
            (KeyScope::Contextual, Some(ctx)) => Self::scoped(instruction, ctx),
            _ => Self::global(instruction),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "[{scope}] {}", self.instruction),
            None => f.write_str(&self.instruction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub script: ActionScript,
    pub created_at: DateTime<Utc>,
    pub use_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub total_uses: u64,
}

const DEFAULT_COMMANDS: [(&str, &str); 20] = [
    ("go back", "input keyevent 4"),
    ("go home", "input keyevent 3"),
    ("press enter", "input keyevent 66"),
    ("volume up", "input keyevent 24"),
    ("volume down", "input keyevent 25"),
    ("take screenshot", "input keyevent 120"),
    ("open whatsapp", "am start -n com.whatsapp/.HomeActivity"),
    ("open whatsapp business", "am start -n com.whatsapp.w4b/.HomeActivity"),
    ("open youtube", "am start -n com.google.android.youtube/.HomeActivity"),
    ("open instagram", "am start -n com.instagram.android/.activity.MainTabActivity"),
    ("open facebook", "am start -n com.facebook.katana/.activity.FbMainTabActivity"),
    ("open twitter", "am start -n com.twitter.android/.StartActivity"),
    ("open telegram", "am start -n org.telegram.messenger/.DefaultIcon"),
    ("open gmail", "am start -n com.google.android.gm/.ConversationListActivityGmail"),
    ("open chrome", "am start -n com.android.chrome/com.google.android.apps.chrome.Main"),
    ("open maps", "am start -n com.google.android.apps.maps/com.google.android.maps.MapsActivity"),
    ("open photos", "am start -n com.google.android.apps.photos/.home.HomeActivity"),
    ("open settings", "am start -n com.android.settings/.Settings"),
    ("open camera", "am start -n com.android.camera/.Camera"),
    ("open gallery", "am start -a android.intent.action.VIEW -t 'image/*'"),
];

/// In-memory map guarded by one lock, written through to storage on every mutation.
pub struct CommandCache {
    entries: Mutex<BTreeMap<CacheKey, CacheEntry>>,
    storage: Box<dyn CacheStorage>,
}

impl CommandCache {
    /// Loads existing entries; an unreadable store leaves the cache empty for this session.
    pub fn new(storage: Box<dyn CacheStorage>) -> Self {
        let entries = match storage.load() {
            Ok(list) => list.into_iter().map(|e| (e.key.clone(), e)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "command cache unavailable, starting empty");
                BTreeMap::new()
            }
        };
        let cache = Self {
            entries: Mutex::new(entries),
            storage,
        };
        tracing::info!(entries = cache.len(), "command cache loaded");
        cache
    }

    pub fn open(cfg: &CacheConfig) -> Self {
        let cache = Self::new(Box::new(JsonFileStorage::new(cfg.resolved_path())));
        if cfg.seed_defaults {
            cache.seed_defaults();
        }
        cache
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::default()))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Runs under the map lock. On a multi-threaded runtime the worker hands its
    /// other tasks off before the blocking write.
    fn persist(&self, map: &BTreeMap<CacheKey, CacheEntry>) {
        let snapshot: Vec<CacheEntry> = map.values().cloned().collect();
        let write = || self.storage.save(&snapshot);
        let result = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(write)
            }
            _ => write(),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "command cache write failed; keeping in-memory state");
        }
    }

    fn matching_key(map: &BTreeMap<CacheKey, CacheEntry>, key: &CacheKey) -> Option<CacheKey> {
        if map.contains_key(key) {
            return Some(key.clone());
        }
        map.keys()
            .find(|k| k.scope == key.scope && fuzzy_equivalent(&k.instruction, &key.instruction))
            .cloned()
    }

    /// Whether `lookup` would hit, without counting a use.
    pub fn contains(&self, key: &CacheKey) -> bool {
        !key.instruction.is_empty() && Self::matching_key(&self.lock(), key).is_some()
    }

    /// Exact match first, then the first fuzzy-equivalent key in the same scope.
    ///
    /// Returns the entry as it stood when matched; its use count is then
    /// incremented and persisted.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        if key.instruction.is_empty() {
            return None;
        }
        let mut map = self.lock();
        let matched = Self::matching_key(&map, key)?;

        let entry = map.get_mut(&matched)?;
        let snapshot = entry.clone();
        entry.use_count = entry.use_count.saturating_add(1);
        tracing::debug!(key = %key, matched = %matched, uses = entry.use_count, "cache hit");
        self.persist(&map);
        Some(snapshot)
    }

    /// Inserts with a use count of one, or bumps the count of an existing key.
    pub fn store(&self, key: CacheKey, script: ActionScript) {
        if key.instruction.is_empty() {
            return;
        }
        let mut map = self.lock();
        match map.get_mut(&key) {
            Some(entry) => entry.use_count = entry.use_count.saturating_add(1),
            None => {
                tracing::debug!(key = %key, steps = script.len(), "cache insert");
                map.insert(
                    key.clone(),
                    CacheEntry {
                        key,
                        script,
                        created_at: Utc::now(),
                        use_count: 1,
                    },
                );
            }
        }
        self.persist(&map);
    }

    /// Drops rarely used entries older than `max_age`. Returns how many were removed.
    pub fn evict_stale(&self, max_age: Duration, min_uses: u32) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, e| e.use_count >= min_uses || e.created_at >= cutoff);
        let removed = before - map.len();
        if removed > 0 {
            self.persist(&map);
        }
        tracing::info!(removed, remaining = map.len(), "stale cache entries evicted");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let map = self.lock();
        CacheStats {
            count: map.len(),
            total_uses: map.values().map(|e| u64::from(e.use_count)).sum(),
        }
    }

    /// Pre-populates common global commands when the cache is empty.
    pub fn seed_defaults(&self) -> usize {
        let mut map = self.lock();
        if !map.is_empty() {
            return 0;
        }
        let now = Utc::now();
        for (instruction, line) in DEFAULT_COMMANDS {
            let script = match line.parse::<ActionScript>() {
                Ok(script) => script,
                Err(e) => {
                    tracing::warn!(%instruction, error = %e, "skipping default command");
                    continue;
                }
            };
            let key = CacheKey::global(instruction);
            map.insert(
                key.clone(),
                CacheEntry {
                    key,
                    script,
                    created_at: now,
                    use_count: 1,
                },
            );
        }
        self.persist(&map);
        tracing::info!(seeded = map.len(), "default commands seeded");
        map.len()
    }

    pub fn clear(&self) {
        let mut map = self.lock();
        map.clear();
        self.persist(&map);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
