use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::perception::types::AppContext;
use crate::script::ActionScript;

/// Which stage produced a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    Pattern,
    Generative,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolutionSource::Cache => "cache",
            ResolutionSource::Pattern => "pattern",
            ResolutionSource::Generative => "generative",
        })
    }
}

/// Lifecycle of one resolution cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionState {
    Start,
    ContextDetected { context: Option<AppContext> },
    Cached,
    PatternMatched { rule: String },
    Generated,
    Failed { error: String },
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::Cached
                | ResolutionState::PatternMatched { .. }
                | ResolutionState::Generated
                | ResolutionState::Failed { .. }
        )
    }
}

/// Successful outcome of a resolution cycle.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub script: ActionScript,
    pub source: ResolutionSource,
    pub elapsed: Duration,
    /// Pattern rule name, for pattern resolutions.
    pub rule: Option<String>,
    pub context: Option<AppContext>,
    pub key: CacheKey,
    /// States visited, in order, ending with a terminal one.
    pub states: Vec<ResolutionState>,
}

impl Resolution {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}
