use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::cache::normalize::normalize;
use crate::config::SkillsConfig;
use crate::errors::{PilotError, PilotResult};
use crate::events::PilotEvent;
use crate::skills::types::{Dispatch, Handler, SkillContext, SkillKind, SkillRecord};
use crate::skills::{assistant, messaging, system};

/// Built-in skills in dispatch priority order.
pub fn builtin_skills() -> Vec<SkillRecord> {
    vec![
        SkillRecord {
            kind: SkillKind::OpenApp,
            matches: system::matches_open_app,
            run: system::run_open_app,
            self_reporting: false,
        },
        SkillRecord {
            kind: SkillKind::ToggleWifi,
            matches: system::matches_toggle_wifi,
            run: system::run_toggle_wifi,
            self_reporting: false,
        },
        SkillRecord {
            kind: SkillKind::ListApps,
            matches: system::matches_list_apps,
            run: system::run_list_apps,
            self_reporting: false,
        },
        SkillRecord {
            kind: SkillKind::WhatsApp,
            matches: messaging::matches_whatsapp,
            run: messaging::run_whatsapp,
            self_reporting: false,
        },
        SkillRecord {
            kind: SkillKind::Assistant,
            matches: assistant::matches_assistant,
            run: assistant::run_assist,
            self_reporting: true,
        },
    ]
}

/// First-match-wins dispatch. A matched skill owns the instruction even if it fails.
pub struct SkillRegistry {
    records: Vec<SkillRecord>,
    ctx: SkillContext,
    raw_shell_fallback: bool,
}

impl SkillRegistry {
    pub fn new(ctx: SkillContext, cfg: &SkillsConfig) -> Self {
        Self {
            records: builtin_skills(),
            ctx,
            raw_shell_fallback: cfg.raw_shell_fallback,
        }
    }

    pub fn with_records(mut self, records: Vec<SkillRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn kinds(&self) -> Vec<SkillKind> {
        self.records.iter().map(|r| r.kind).collect()
    }

    /// The record that would handle `instruction`. A `matches` fn that panics counts as no match.
    pub fn select(&self, instruction: &str) -> Option<&SkillRecord> {
        let normalized = normalize(instruction);
        self.find(&normalized)
    }

    fn find(&self, normalized: &str) -> Option<&SkillRecord> {
        self.records.iter().find(|record| {
            let matcher = record.matches;
            std::panic::catch_unwind(|| matcher(normalized)).unwrap_or_else(|_| {
                tracing::error!(skill = %record.kind, "skill matcher panicked; skipping");
                false
            })
        })
    }

    /// Runs the instruction through the first matching skill, or the raw shell fallback.
    /// Emits exactly one terminal event.
    pub async fn dispatch(&self, instruction: &str) -> Dispatch {
        let normalized = normalize(instruction);
        let Some(record) = self.find(&normalized) else {
            return self.fallback(instruction).await;
        };

        let kind = record.kind;
        tracing::info!(skill = %kind, instruction = %normalized, "skill selected");
        self.ctx.events.emit(PilotEvent::SkillSelected { skill: kind.to_string() });

        let outcome = AssertUnwindSafe((record.run)(&normalized, &self.ctx))
            .catch_unwind()
            .await;
        let (result, panicked) = match outcome {
            Ok(result) => (result, false),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(skill = %kind, panic = %message, "skill panicked");
                (Err(PilotError::Skill(format!("{kind} panicked: {message}"))), true)
            }
        };

        if let Err(e) = &result {
            tracing::error!(skill = %kind, error = %e, "skill failed");
        }
        if panicked || !record.self_reporting {
            self.report(&result);
        }
        Dispatch {
            handler: Handler::Skill(kind),
            result,
        }
    }

    async fn fallback(&self, instruction: &str) -> Dispatch {
        if !self.raw_shell_fallback {
            let result = Err(PilotError::Skill(format!("no skill handles \"{}\"", instruction.trim())));
            self.report(&result);
            return Dispatch {
                handler: Handler::Unhandled,
                result,
            };
        }

        // Unvalidated: goes to the privileged shell exactly as given.
        tracing::warn!(instruction = %instruction.trim(), "no skill matched; running raw shell command");
        self.ctx.events.warning("No skill matched, running as raw shell command");
        let result = match self.ctx.shell.run(instruction).await {
            Ok(out) if out.success() => Ok(out.stdout),
            Ok(out) => Err(PilotError::ExecutionStepFailed(format!(
                "raw command exited with {}: {}",
                out.exit_code,
                out.stdout.trim()
            ))),
            Err(e) => Err(e),
        };
        self.report(&result);
        Dispatch {
            handler: Handler::RawShell,
            result,
        }
    }

    fn report(&self, result: &PilotResult<String>) {
        let event = match result {
            Ok(output) => PilotEvent::Completed { output: output.clone() },
            Err(e) => PilotEvent::Failed { error: e.to_string() },
        };
        self.ctx.events.emit(event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
