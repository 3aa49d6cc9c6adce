//! Catch-all for on-screen interaction: resolve through the orchestrator, then execute.
use futures_util::future::BoxFuture;

use crate::errors::PilotResult;
use crate::events::PilotEvent;
use crate::skills::{contains_any, names_a_website};
use crate::skills::types::SkillContext;

const UI_VERBS: &[&str] = &[
    "click", "tap", "press", "type", "search", "find", "select", "scroll", "swipe", "send", "message",
];

const NAVIGATION: &[&str] = &[
    "go back", "go home", "press enter", "volume up", "volume down", "screenshot",
];

const COMPOUND: &[&str] = &[" and ", " then ", " after ", " wait ", " delay "];

/// Interaction verbs that need the screen even when they are not the first word.
const INTERACTIONS: &[&str] = &[
    "search for ", "type ", "tap ", "press ", "scroll ", "swipe ", "select ",
];

const VIDEO_ACTIONS: &[&str] = &["search", "play", "trending"];

const RECIPIENT_HINTS: &[&str] = &["contact", "number", "phone"];

/// Long launch requests usually carry a follow-up action.
const LONG_LAUNCH_LEN: usize = 30;

const MIN_PHONE_DIGITS: usize = 7;

fn has_word(words: &[&str], candidates: &[&str]) -> bool {
    words.iter().any(|w| candidates.contains(w))
}

/// Spoken numbers arrive in groups, so digits are counted across the whole instruction.
fn mentions_phone_number(instruction: &str) -> bool {
    instruction.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
}

pub fn matches_assistant(instruction: &str) -> bool {
    let words: Vec<&str> = instruction.split_whitespace().collect();
    let first = words.first().copied().unwrap_or_default();
    if UI_VERBS.contains(&first) {
        return true;
    }
    if contains_any(instruction, NAVIGATION) || contains_any(instruction, COMPOUND) {
        return true;
    }
    if contains_any(instruction, INTERACTIONS) || (instruction.contains("send ") && instruction.contains(" to ")) {
        return true;
    }
    if matches!(first, "open" | "launch" | "go") && names_a_website(instruction) {
        return true;
    }
    // Anything about a chat app that the messaging skill did not claim.
    if words.contains(&"whatsapp") && words.len() > 2 {
        return true;
    }
    if words.contains(&"youtube") && has_word(&words, VIDEO_ACTIONS) {
        return true;
    }
    if has_word(&words, RECIPIENT_HINTS) || mentions_phone_number(instruction) {
        return true;
    }
    instruction.len() > LONG_LAUNCH_LEN && has_word(&words, &["open", "launch", "start"])
}

/// Execution runs with retry inside the overall timeout and reports its own terminal event.
pub async fn assist(instruction: &str, ctx: &SkillContext) -> PilotResult<String> {
    let resolution = match ctx.orchestrator.resolve(instruction).await {
        Ok(resolution) => resolution,
        Err(e) => {
            ctx.events.emit(PilotEvent::Failed { error: e.to_string() });
            return Err(e);
        }
    };
    ctx.events.progress(format!(
        "Resolved from {} in {} ms ({} steps)",
        resolution.source,
        resolution.elapsed_ms(),
        resolution.script.len()
    ));
    ctx.engine.run_guarded(&resolution.script).await
}

pub(crate) fn run_assist<'a>(i: &'a str, ctx: &'a SkillContext) -> BoxFuture<'a, PilotResult<String>> {
    Box::pin(assist(i, ctx))
}
