//! Allow-list and deny-list validation for model-generated scripts.
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{PilotError, PilotResult};
use crate::script::{ActionScript, Step, StepKind, TEXT_SPACE_PLACEHOLDER};

/// Shell metacharacter sequences; matched as plain substrings.
const DENIED_SEQUENCES: [&str; 7] = ["&&", "||", ";", "|", "$(", "`", ">/"];

fn denied_words_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(rm|rmdir|dd|format|flash|fastboot|recovery|wipe|reboot|shutdown|chmod\s+777|su\s+-c)\b",
        )
        .expect("deny-list regex must compile")
    })
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[a-zA-Z]*\n?").expect("fence regex must compile"))
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?i)(shell\s+)?commands?:\s*").expect("label regex must compile"))
}

/// Which family of primitives a generated script may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptProfile {
    /// Context-aware on-screen automation.
    Ui,
    /// App launching; additionally admits `am start`.
    Launch,
}

impl ScriptProfile {
    fn allowed_prefixes(self) -> &'static [&'static str] {
        match self {
            ScriptProfile::Ui => &["input ", "sleep "],
            ScriptProfile::Launch => &["input ", "sleep ", "am start "],
        }
    }

    pub fn admits(self, kind: StepKind) -> bool {
        match kind {
            StepKind::Tap | StepKind::TypeText | StepKind::KeyEvent | StepKind::Wait => true,
            StepKind::StartActivity => self == ScriptProfile::Launch,
        }
    }
}

/// Strips code fences and a leading `Commands:` label.
pub fn clean_response(raw: &str) -> String {
    let unfenced = fence_re().replace_all(raw, "");
    label_re().replace(unfenced.trim(), "").trim().to_string()
}

/// First dangerous token found in `line`, if any.
pub fn denied_token(line: &str) -> Option<String> {
    let lowered = line.to_lowercase().replace(TEXT_SPACE_PLACEHOLDER, " ");
    if let Some(seq) = DENIED_SEQUENCES.iter().find(|s| lowered.contains(*s)) {
        return Some(seq.to_string());
    }
    denied_words_re()
        .find(&lowered)
        .map(|m| m.as_str().to_string())
}

/// Turns a raw completion into a validated script, or rejects it whole.
///
/// Every line of the cleaned response is checked against the deny-list, including
/// lines the allow-list would drop. Retained lines must parse into steps the profile
/// admits; an empty result is also a rejection.
pub fn validate_generated(raw: &str, profile: ScriptProfile) -> PilotResult<ActionScript> {
    let cleaned = clean_response(raw);

    for line in cleaned.lines() {
        if let Some(token) = denied_token(line) {
            tracing::warn!(%line, %token, "generated script hit deny-list");
            return Err(PilotError::GenerationRejected(format!(
                "dangerous token '{token}' in line: {}",
                line.trim()
            )));
        }
    }

    let mut steps = Vec::new();
    for line in cleaned.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !profile.allowed_prefixes().iter().any(|p| line.starts_with(p)) {
            tracing::debug!(%line, "dropping non-command line");
            continue;
        }
        let step: Step = line
            .parse()
            .map_err(|e| PilotError::GenerationRejected(format!("{e}")))?;
        if !profile.admits(step.kind()) {
            return Err(PilotError::GenerationRejected(format!(
                "{:?} not allowed here: {line}",
                step.kind()
            )));
        }
        steps.push(step);
    }

    if steps.is_empty() {
        return Err(PilotError::GenerationRejected("no executable commands in response".into()));
    }
    Ok(ActionScript::new(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::KEYCODE_ENTER;

    #[test]
    fn strips_fences_and_label() {
        let raw = "```bash\nCommands:\ninput tap 540 200\nsleep 1\n```";
        assert_eq!(clean_response(raw), "input tap 540 200\nsleep 1");
    }

    #[test]
    fn accepts_clean_ui_script() {
        let raw = "Commands:\ninput tap 540 200\nsleep 1\ninput text 'restaurants%snear%sme'\nsleep 0.5\ninput keyevent 66";
        let script = validate_generated(raw, ScriptProfile::Ui).unwrap();
        assert_eq!(script.len(), 5);
        assert_eq!(script.steps()[4], Step::key(KEYCODE_ENTER));
    }

    #[test]
    fn drops_chatter_lines() {
        let raw = "Sure! Here you go:\ninput keyevent 4";
        assert_eq!(validate_generated(raw, ScriptProfile::Ui).unwrap().len(), 1);
    }

    #[test]
    fn rejects_recursive_delete_even_after_valid_lines() {
        let raw = "input tap 10 10\nsleep 1\nrm -rf /";
        assert!(matches!(
            validate_generated(raw, ScriptProfile::Launch),
            Err(PilotError::GenerationRejected(_))
        ));
    }

    #[test]
    fn rejects_metacharacters_inside_allowed_lines() {
        for raw in [
            "input tap 1 1; reboot",
            "input text `id`",
            "input text $(whoami)",
            "input keyevent 4 && input keyevent 3",
            "sleep 1 | sh",
        ] {
            assert!(
                matches!(validate_generated(raw, ScriptProfile::Ui), Err(PilotError::GenerationRejected(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn word_boundaries_avoid_false_positives() {
        assert!(denied_token("input text 'perform%sconfirm'").is_none());
        assert!(denied_token("input text 'add%sitem'").is_none());
        assert_eq!(denied_token("input text 'please%srm%sthis'").as_deref(), Some("rm"));
    }

    #[test]
    fn ui_profile_refuses_activity_launch() {
        let raw = "am start -n com.whatsapp/.HomeActivity";
        assert!(validate_generated(raw, ScriptProfile::Ui).is_err());
        assert_eq!(validate_generated(raw, ScriptProfile::Launch).unwrap().len(), 1);
    }

    #[test]
    fn unparsable_retained_line_rejects_everything() {
        let raw = "input tap 10 10\ninput swipe 1 2 3 4";
        assert!(validate_generated(raw, ScriptProfile::Ui).is_err());
    }

    #[test]
    fn empty_response_is_rejected() {
        assert!(validate_generated("I cannot help with that.", ScriptProfile::Ui).is_err());
    }
}
