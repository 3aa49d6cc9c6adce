//! Deterministic instruction grammar resolved against on-screen elements.
//!
//! Rules are tried in a fixed order and the first one that produces a script
//! wins. A rule that cannot find every element it needs does not match.
use std::sync::OnceLock;

use regex::Regex;

use crate::cache::normalize;
use crate::perception::elements::{find_by_text, find_input_field, find_search_element, find_send_button};
use crate::perception::types::{AppContext, UIElement};
use crate::script::{
    ActionScript, Step, KEYCODE_BACK, KEYCODE_ENTER, KEYCODE_HOME,
};

const SHORT_PAUSE_MS: u64 = 500;
const LOAD_PAUSE_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched { rule: &'static str, script: ActionScript },
    NoMatch,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn into_script(self) -> Option<(&'static str, ActionScript)> {
        match self {
            MatchResult::Matched { rule, script } => Some((rule, script)),
            MatchResult::NoMatch => None,
        }
    }
}

type Rule = fn(&str, &[UIElement]) -> Option<ActionScript>;

const RULES: [(&str, Rule); 7] = [
    ("type_and_send", type_and_send),
    ("send_message", send_message),
    ("click", click),
    ("search", search),
    ("navigation", navigation),
    ("open_in_app", open_in_app),
    ("type_only", type_only),
];

pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|(name, _)| *name)
}

/// Runs the rule chain over the normalized instruction.
pub fn try_match(instruction: &str, elements: &[UIElement], ctx: Option<&AppContext>) -> MatchResult {
    let normalized = normalize(instruction);
    if normalized.is_empty() {
        return MatchResult::NoMatch;
    }

    for (rule, apply) in RULES {
        if let Some(script) = apply(&normalized, elements) {
            tracing::debug!(
                rule,
                instruction = %normalized,
                app = ctx.map(|c| c.app_name.as_str()).unwrap_or("unknown"),
                steps = script.len(),
                "pattern matched"
            );
            return MatchResult::Matched { rule, script };
        }
    }
    MatchResult::NoMatch
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("pattern regex must compile"))
        }
    };
}

static_regex!(type_and_send_re, r"\btype\s+(.+?)\s+and\s+(?:click\s+)?send\b");
static_regex!(send_message_re, r"\b(?:send message|message|send)\s+(.+)");
static_regex!(click_re, r"\b(?:click|tap|press)\s+(.+)");
static_regex!(search_re, r"\bsearch\s+(?:for\s+)?(.+)");
static_regex!(back_re, r"\b(?:go back|press back|back button)\b");
static_regex!(home_re, r"\b(?:go home|home button|press home)\b");
static_regex!(enter_re, r"\b(?:press enter|hit enter)\b");
static_regex!(open_re, r"\bopen\s+(.+)");
static_regex!(type_re, r"\btype\s+(.+)");

fn capture<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn compose_and_send(text: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let input = find_input_field(elements)?;
    let send = find_send_button(elements)?;
    Some(ActionScript::new(vec![
        Step::tap(input.center_x, input.center_y),
        Step::wait_ms(SHORT_PAUSE_MS),
        Step::type_text(text),
        Step::wait_ms(SHORT_PAUSE_MS),
        Step::tap(send.center_x, send.center_y),
    ]))
}

fn type_and_send(input: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let text = capture(type_and_send_re(), input)?;
    compose_and_send(text, elements)
}

fn send_message(input: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let text = capture(send_message_re(), input)?;
    compose_and_send(text, elements)
}

fn click(input: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let name = capture(click_re(), input)?;
    let el = find_by_text(elements, name)?;
    Some(ActionScript::new(vec![Step::tap(el.center_x, el.center_y)]))
}

fn search(input: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let query = capture(search_re(), input)?;
    let el = find_search_element(elements)?;
    Some(ActionScript::new(vec![
        Step::tap(el.center_x, el.center_y),
        Step::wait_ms(LOAD_PAUSE_MS),
        Step::type_text(query),
        Step::wait_ms(SHORT_PAUSE_MS),
        Step::key(KEYCODE_ENTER),
    ]))
}

fn navigation(input: &str, _elements: &[UIElement]) -> Option<ActionScript> {
    let code = if back_re().is_match(input) {
        KEYCODE_BACK
    } else if home_re().is_match(input) {
        KEYCODE_HOME
    } else if enter_re().is_match(input) {
        KEYCODE_ENTER
    } else {
        return None;
    };
    Some(ActionScript::new(vec![Step::key(code)]))
}

fn open_in_app(input: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let target = capture(open_re(), input)?;
    let el = find_by_text(elements, target)?;
    Some(ActionScript::new(vec![Step::tap(el.center_x, el.center_y)]))
}

fn type_only(input: &str, elements: &[UIElement]) -> Option<ActionScript> {
    let text = capture(type_re(), input)?;
    let field = find_input_field(elements)?;
    Some(ActionScript::new(vec![
        Step::tap(field.center_x, field.center_y),
        Step::wait_ms(SHORT_PAUSE_MS),
        Step::type_text(text),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn el(id: &str, text: &str, desc: &str, x: i32, y: i32) -> UIElement {
        UIElement {
            resource_id: id.into(),
            class_name: "android.widget.TextView".into(),
            text: text.into(),
            content_desc: desc.into(),
            clickable: true,
            center_x: x,
            center_y: y,
        }
    }

    fn chat_screen() -> Vec<UIElement> {
        vec![
            el("com.whatsapp:id/entry", "", "", 400, 2800),
            el("com.whatsapp:id/send", "", "Send", 1350, 2800),
            el("com.whatsapp:id/back", "", "Navigate up", 60, 150),
            el("", "Video call", "", 1200, 150),
        ]
    }

    fn matched(result: MatchResult) -> (&'static str, Vec<Step>) {
        let (rule, script) = result.into_script().expect("expected a match");
        (rule, script.steps().to_vec())
    }

    #[test]
    fn search_pizza_is_five_steps() {
        let elements = vec![el("com.example:id/search_bar", "", "", 540, 200)];
        let (rule, steps) = matched(try_match("search pizza", &elements, None));
        assert_eq!(rule, "search");
        assert_eq!(
            steps,
            vec![
                Step::tap(540, 200),
                Step::wait_ms(1000),
                Step::type_text("pizza"),
                Step::wait_ms(500),
                Step::key(KEYCODE_ENTER),
            ]
        );
    }

    #[test]
    fn go_back_needs_no_elements() {
        let (rule, steps) = matched(try_match("Go back", &[], None));
        assert_eq!(rule, "navigation");
        assert_eq!(steps, vec![Step::key(KEYCODE_BACK)]);
        let (_, steps) = matched(try_match("hit enter please", &[], None));
        assert_eq!(steps, vec![Step::key(KEYCODE_ENTER)]);
    }

    #[test]
    fn type_and_send_encodes_spaces() {
        let (rule, steps) = matched(try_match("type see you soon and send", &chat_screen(), None));
        assert_eq!(rule, "type_and_send");
        assert_eq!(steps[0], Step::tap(400, 2800));
        assert_eq!(steps[2], Step::TypeText { text: "see%syou%ssoon".into() });
        assert_eq!(steps[4], Step::tap(1350, 2800));
    }

    #[test]
    fn send_message_without_send_button_falls_through() {
        let elements = vec![el("com.whatsapp:id/entry", "", "", 400, 2800)];
        assert_eq!(try_match("send message hello", &elements, None), MatchResult::NoMatch);
        let (rule, _) = matched(try_match("message hello", &chat_screen(), None));
        assert_eq!(rule, "send_message");
    }

    #[test]
    fn click_resolves_by_label_then_navigation_takes_over() {
        let (rule, steps) = matched(try_match("tap video call", &chat_screen(), None));
        assert_eq!(rule, "click");
        assert_eq!(steps, vec![Step::tap(1200, 150)]);

        let (rule, steps) = matched(try_match("press back", &[], None));
        assert_eq!(rule, "navigation");
        assert_eq!(steps, vec![Step::key(KEYCODE_BACK)]);
    }

    #[test]
    fn open_in_app_taps_visible_entry() {
        let elements = vec![el("", "Settings", "", 100, 900)];
        let (rule, steps) = matched(try_match("open settings", &elements, None));
        assert_eq!(rule, "open_in_app");
        assert_eq!(steps, vec![Step::tap(100, 900)]);
        assert!(!try_match("open settings", &[], None).is_matched());
    }

    #[test]
    fn type_only_has_no_confirm() {
        let elements = vec![UIElement {
            class_name: "android.widget.EditText".into(),
            clickable: true,
            center_x: 10,
            center_y: 20,
            ..Default::default()
        }];
        let (rule, steps) = matched(try_match("type hello world", &elements, None));
        assert_eq!(rule, "type_only");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2], Step::type_text("hello world"));
    }

    #[test]
    fn unmatched_instruction() {
        assert_eq!(try_match("what is the weather", &chat_screen(), None), MatchResult::NoMatch);
        assert_eq!(try_match("!!!", &chat_screen(), None), MatchResult::NoMatch);
    }

    fn arb_element() -> impl Strategy<Value = UIElement> {
        (
            prop::sample::select(vec!["", "id/search", "id/send", "id/entry", "id/title"]),
            "[a-z ]{0,12}",
            0i32..1440,
            0i32..3000,
        )
            .prop_map(|(id, text, x, y)| el(id, &text, "", x, y))
    }

    proptest! {
        #[test]
        fn taps_only_target_supplied_elements(
            instruction in prop::sample::select(vec![
                "search pizza", "tap home", "click send", "type hi and send",
                "message hello there", "open chats", "type abc", "go home",
            ]),
            elements in prop::collection::vec(arb_element(), 0..8),
        ) {
            if let MatchResult::Matched { script, .. } = try_match(instruction, &elements, None) {
                for step in script.steps() {
                    if let Step::Tap { x, y } = step {
                        prop_assert!(elements.iter().any(|e| e.center() == (*x, *y)));
                    }
                }
            }
        }
    }
}
