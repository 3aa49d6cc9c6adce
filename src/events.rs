use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::resolver::state::ResolutionSource;

/// Notifications emitted by the pipeline to whoever drives it (CLI, overlay, tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PilotEvent {
    SkillSelected {
        skill: String,
    },
    Resolved {
        source: ResolutionSource,
        elapsed_ms: u64,
        rule: Option<String>,
    },
    Progress {
        message: String,
    },
    Warning {
        message: String,
    },
    Retry {
        attempt: u32,
        ceiling: u32,
    },
    Completed {
        output: String,
    },
    Failed {
        error: String,
    },
    Log {
        message: String,
    },
}

impl PilotEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PilotEvent::Completed { .. } | PilotEvent::Failed { .. })
    }
}

/// Progress/log sink injected into every component that reports to the user.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PilotEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PilotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that only traces.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: PilotEvent) {
        match &event {
            PilotEvent::Warning { message } => tracing::warn!(%message, "pipeline warning"),
            PilotEvent::Failed { error } => tracing::error!(%error, "pipeline failure"),
            other => tracing::debug!(event = ?other, "pipeline event"),
        }
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("event receiver dropped");
            }
        }
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.emit(PilotEvent::Progress { message: message.into() });
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(PilotEvent::Warning { message: message.into() });
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(PilotEvent::Log { message: message.into() });
    }
}
