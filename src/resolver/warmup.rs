//! Background pre-resolution so frequent instructions are served from the cache.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::CacheConfig;
use crate::perception::types::AppContext;
use crate::resolver::engine::Orchestrator;
use crate::resolver::state::ResolutionSource;

/// Resolved at startup when missing from the cache.
pub const COMMON_INSTRUCTIONS: &[&str] = &[
    "open whatsapp",
    "open youtube",
    "open instagram",
    "open chrome",
    "go back",
    "go home",
    "take screenshot",
    "open settings",
    "open camera",
    "search google for weather",
];

const CHAT_FOLLOW_UPS: &[&str] = &["send message to mom", "send message to dad", "open status", "go back"];
const VIDEO_FOLLOW_UPS: &[&str] = &["search music", "search funny videos", "open subscriptions", "go back"];
const TYPING_FOLLOW_UPS: &[&str] = &["delete text", "press enter", "go back"];
const DEFAULT_FOLLOW_UPS: &[&str] = &["go back", "go home", "open settings"];

/// Likely next instructions for the app in the foreground.
pub fn predict_next(context: &AppContext) -> &'static [&'static str] {
    let package = context.package.to_lowercase();
    let screen = format!("{} {}", context.screen, context.screen_description).to_lowercase();
    if package.contains("whatsapp") {
        CHAT_FOLLOW_UPS
    } else if package.contains("youtube") {
        VIDEO_FOLLOW_UPS
    } else if ["type", "compose", "edit", "input"].iter().any(|w| screen.contains(w)) {
        TYPING_FOLLOW_UPS
    } else {
        DEFAULT_FOLLOW_UPS
    }
}

/// Runs one warming pass at a time, pausing after every model call.
pub struct Warmer {
    orchestrator: Arc<Orchestrator>,
    throttle: Duration,
    running: Mutex<()>,
}

impl Warmer {
    pub fn new(orchestrator: Arc<Orchestrator>, throttle: Duration) -> Self {
        Self {
            orchestrator,
            throttle,
            running: Mutex::new(()),
        }
    }

    pub fn from_config(orchestrator: Arc<Orchestrator>, cfg: &CacheConfig) -> Self {
        Self::new(orchestrator, Duration::from_millis(cfg.warmup_throttle_ms))
    }

    /// Resolves every common instruction not yet cached. Returns how many were added.
    pub async fn warm_up(&self) -> usize {
        let _pass = self.running.lock().await;
        tracing::info!(candidates = COMMON_INSTRUCTIONS.len(), "warming command cache");
        let added = self.prefetch_all(COMMON_INSTRUCTIONS, None).await;
        tracing::info!(added, "cache warmup complete");
        added
    }

    /// Pre-resolves predicted follow-ups for `context`; skipped while another pass runs.
    pub async fn preload_for(&self, context: &AppContext) -> usize {
        let Ok(_pass) = self.running.try_lock() else {
            tracing::debug!("warming pass already running, skipping preload");
            return 0;
        };
        let added = self.prefetch_all(predict_next(context), Some(context)).await;
        tracing::debug!(app = %context.app_name, added, "predicted instructions preloaded");
        added
    }

    pub async fn preload_current(&self) -> usize {
        match self.orchestrator.detect_context().await {
            Some(context) => self.preload_for(&context).await,
            None => 0,
        }
    }

    async fn prefetch_all(&self, instructions: &[&str], context: Option<&AppContext>) -> usize {
        let mut added = 0;
        for instruction in instructions {
            match self.orchestrator.prefetch(instruction, context).await {
                Ok(ResolutionSource::Cache) => {}
                Ok(ResolutionSource::Pattern) => added += 1,
                Ok(ResolutionSource::Generative) => {
                    added += 1;
                    self.pause().await;
                }
                Err(e) => {
                    tracing::warn!(%instruction, error = %e, "could not pre-resolve instruction");
                    self.pause().await;
                }
            }
        }
        added
    }

    async fn pause(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }
}
