use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::contacts::ContactDirectory;
use crate::errors::PilotResult;
use crate::events::EventSink;
use crate::executor::ExecutionEngine;
use crate::resolver::Orchestrator;
use crate::shell::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    OpenApp,
    ToggleWifi,
    ListApps,
    WhatsApp,
    Assistant,
}

impl SkillKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillKind::OpenApp => "open_app",
            SkillKind::ToggleWifi => "toggle_wifi",
            SkillKind::ListApps => "list_apps",
            SkillKind::WhatsApp => "whatsapp",
            SkillKind::Assistant => "assistant",
        }
    }
}

impl fmt::Display for SkillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a skill is allowed to touch while handling one instruction.
#[derive(Clone)]
pub struct SkillContext {
    pub shell: Arc<dyn Shell>,
    pub orchestrator: Arc<Orchestrator>,
    /// Must report on the same sink as `events`.
    pub engine: Arc<ExecutionEngine>,
    pub contacts: Arc<ContactDirectory>,
    pub events: EventSink,
}

pub type MatchFn = fn(&str) -> bool;
pub type RunFn = for<'a> fn(&'a str, &'a SkillContext) -> BoxFuture<'a, PilotResult<String>>;

/// One entry of the dispatch table. Both functions receive the normalized instruction.
#[derive(Clone, Copy)]
pub struct SkillRecord {
    pub kind: SkillKind,
    pub matches: MatchFn,
    pub run: RunFn,
    /// The skill emits its own terminal event (through the execution engine).
    pub self_reporting: bool,
}

impl fmt::Debug for SkillRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillRecord")
            .field("kind", &self.kind)
            .field("self_reporting", &self.self_reporting)
            .finish()
    }
}

/// Who ended up handling an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Skill(SkillKind),
    RawShell,
    Unhandled,
}

#[derive(Debug)]
pub struct Dispatch {
    pub handler: Handler,
    pub result: PilotResult<String>,
}

impl Dispatch {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
