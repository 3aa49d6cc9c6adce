//! Action scripts: the line-based unit that is cached, validated and executed.
//!
//! One [`Step`] per line:
//!
//! ```text
//! input tap 540 200
//! sleep 1
//! input text 'pizza%snear%sme'
//! sleep 0.5
//! input keyevent 66
//! ```
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

/// Token the `input text` primitive interprets as a space.
pub const TEXT_SPACE_PLACEHOLDER: &str = "%s";

pub const KEYCODE_HOME: u32 = 3;
pub const KEYCODE_BACK: u32 = 4;
pub const KEYCODE_VOLUME_UP: u32 = 24;
pub const KEYCODE_VOLUME_DOWN: u32 = 25;
pub const KEYCODE_ENTER: u32 = 66;
pub const KEYCODE_SCREENSHOT: u32 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Tap { x: i32, y: i32 },
    /// Text with spaces already replaced by [`TEXT_SPACE_PLACEHOLDER`].
    TypeText { text: String },
    KeyEvent { code: u32 },
    Wait { millis: u64 },
    /// `am start <args>`; only admitted in app-launch scripts.
    StartActivity { args: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Tap,
    TypeText,
    KeyEvent,
    Wait,
    StartActivity,
}

impl Step {
    pub fn tap(x: i32, y: i32) -> Self {
        Step::Tap { x, y }
    }

    /// Builds a text step from free text, encoding spaces for the shell.
    pub fn type_text(text: &str) -> Self {
        Step::TypeText { text: encode_text(text) }
    }

    pub fn key(code: u32) -> Self {
        Step::KeyEvent { code }
    }

    pub fn wait_ms(millis: u64) -> Self {
        Step::Wait { millis }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Tap { .. } => StepKind::Tap,
            Step::TypeText { .. } => StepKind::TypeText,
            Step::KeyEvent { .. } => StepKind::KeyEvent,
            Step::Wait { .. } => StepKind::Wait,
            Step::StartActivity { .. } => StepKind::StartActivity,
        }
    }

    pub fn wait_duration(&self) -> Option<Duration> {
        match self {
            Step::Wait { millis } => Some(Duration::from_millis(*millis)),
            _ => None,
        }
    }
}

/// Replaces internal whitespace runs with the text-input placeholder.
pub fn encode_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(TEXT_SPACE_PLACEHOLDER)
}

fn format_seconds(millis: u64) -> String {
    if millis % 1000 == 0 {
        (millis / 1000).to_string()
    } else {
        let s = format!("{:.3}", millis as f64 / 1000.0);
        s.trim_end_matches('0').to_string()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Tap { x, y } => write!(f, "input tap {x} {y}"),
            Step::TypeText { text } => write!(f, "input text '{text}'"),
            Step::KeyEvent { code } => write!(f, "input keyevent {code}"),
            Step::Wait { millis } => write!(f, "sleep {}", format_seconds(*millis)),
            Step::StartActivity { args } => write!(f, "am start {args}"),
        }
    }
}

impl FromStr for Step {
    type Err = PilotError;

    fn from_str(line: &str) -> PilotResult<Self> {
        let line = line.trim();
        let invalid = || PilotError::InvalidStep(line.to_string());

        if let Some(rest) = line.strip_prefix("input tap ") {
            let mut parts = rest.split_whitespace();
            let x = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
            let y = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
            if parts.next().is_some() {
                return Err(invalid());
            }
            return Ok(Step::Tap { x, y });
        }

        if let Some(rest) = line.strip_prefix("input text ") {
            let rest = rest.trim();
            let text = rest
                .strip_prefix('\'')
                .and_then(|r| r.strip_suffix('\''))
                .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
                .unwrap_or(rest);
            if text.is_empty() || text.contains('\'') {
                return Err(invalid());
            }
            return Ok(Step::TypeText { text: encode_text(&text.replace(TEXT_SPACE_PLACEHOLDER, " ")) });
        }

        if let Some(rest) = line.strip_prefix("input keyevent ") {
            let code = rest.trim().parse().map_err(|_| invalid())?;
            return Ok(Step::KeyEvent { code });
        }

        if let Some(rest) = line.strip_prefix("sleep ") {
            let seconds: f64 = rest.trim().parse().map_err(|_| invalid())?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid());
            }
            return Ok(Step::Wait { millis: (seconds * 1000.0).round() as u64 });
        }

        if let Some(rest) = line.strip_prefix("am start ") {
            let args = rest.trim();
            if args.is_empty() {
                return Err(invalid());
            }
            return Ok(Step::StartActivity { args: args.to_string() });
        }

        Err(invalid())
    }
}

/// Ordered, immutable sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ActionScript {
    steps: Vec<Step>,
}

impl ActionScript {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.steps.iter().map(Step::to_string).collect()
    }
}

impl From<Vec<Step>> for ActionScript {
    fn from(steps: Vec<Step>) -> Self {
        Self::new(steps)
    }
}

impl fmt::Display for ActionScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

impl FromStr for ActionScript {
    type Err = PilotError;

    /// Parses one step per non-empty line; any unparsable line fails the whole script.
    fn from_str(text: &str) -> PilotResult<Self> {
        let steps = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(Step::from_str)
            .collect::<PilotResult<Vec<_>>>()?;
        Ok(Self { steps })
    }
}

impl From<ActionScript> for String {
    fn from(script: ActionScript) -> Self {
        script.to_string()
    }
}

impl TryFrom<String> for ActionScript {
    type Error = PilotError;

    fn try_from(value: String) -> PilotResult<Self> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_step_per_line() {
        let script = ActionScript::new(vec![
            Step::tap(540, 200),
            Step::wait_ms(1000),
            Step::type_text("pizza near me"),
            Step::wait_ms(500),
            Step::key(KEYCODE_ENTER),
        ]);
        assert_eq!(
            script.to_string(),
            "input tap 540 200\nsleep 1\ninput text 'pizza%snear%sme'\nsleep 0.5\ninput keyevent 66"
        );
    }

    #[test]
    fn parses_fractional_sleep_and_activity() {
        let script: ActionScript = "sleep 0.25\nam start -n com.whatsapp/.HomeActivity"
            .parse()
            .unwrap();
        assert_eq!(script.steps()[0], Step::wait_ms(250));
        assert_eq!(
            script.steps()[1],
            Step::StartActivity { args: "-n com.whatsapp/.HomeActivity".into() }
        );
    }

    #[test]
    fn rejects_unknown_primitive() {
        assert!("input swipe 1 2 3 4".parse::<Step>().is_err());
        assert!("input tap 10".parse::<Step>().is_err());
        assert!("echo hi".parse::<Step>().is_err());
    }

    #[test]
    fn unquoted_text_is_accepted() {
        assert_eq!(
            "input text hello%sworld".parse::<Step>().unwrap(),
            Step::TypeText { text: "hello%sworld".into() }
        );
    }

    #[test]
    fn serde_uses_line_format() {
        let script = ActionScript::new(vec![Step::key(KEYCODE_BACK)]);
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, "\"input keyevent 4\"");
        let back: ActionScript = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
    }
}
