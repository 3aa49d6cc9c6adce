//! UI hierarchy extraction from `uiautomator` dumps.
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::config::DetectionConfig;
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::ElementSource;
use crate::perception::types::UIElement;
use crate::shell::Shell;

const DUMP_PATH: &str = "/sdcard/window_dump.xml";

/// Elements shown to the language model per prompt.
pub const PROMPT_ELEMENT_CAP: usize = 15;

/// Resource-id fragments that usually mark a text-entry field, in preference order.
const INPUT_ID_HINTS: [&str; 6] = ["entry", "edit", "input", "text", "message", "search"];
const INPUT_CLASSES: [&str; 3] = ["EditText", "AutoCompleteTextView", "TextInputEditText"];

fn node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<node\b([^>]*?)/?>").expect("valid node regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([\w-]+)="([^"]*)""#).expect("valid attribute regex"))
}

fn bounds_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("valid bounds regex")
    })
}

/// Parses a hierarchy dump into clickable elements.
///
/// Tolerates partial or malformed XML: missing attributes become empty strings
/// and a node whose bounds cannot be read is skipped.
pub fn parse_hierarchy(xml: &str) -> Vec<UIElement> {
    let mut elements = Vec::new();

    for node in node_re().captures_iter(xml) {
        let attrs = &node[1];
        let mut el = UIElement::default();
        let mut bounds = None;

        for cap in attr_re().captures_iter(attrs) {
            let value = &cap[2];
            match &cap[1] {
                "resource-id" => el.resource_id = value.to_string(),
                "class" => el.class_name = value.to_string(),
                "text" => el.text = value.to_string(),
                "content-desc" => el.content_desc = value.to_string(),
                "clickable" => el.clickable = value == "true",
                "bounds" => bounds = parse_center(value),
                _ => {}
            }
        }

        if !el.clickable {
            continue;
        }
        let Some((x, y)) = bounds else {
            tracing::trace!(id = %el.resource_id, "skipping node with unreadable bounds");
            continue;
        };
        el.center_x = x;
        el.center_y = y;
        elements.push(el);
    }

    elements
}

fn parse_center(bounds: &str) -> Option<(i32, i32)> {
    let cap = bounds_re().captures(bounds)?;
    let left: i64 = cap[1].parse().ok()?;
    let top: i64 = cap[2].parse().ok()?;
    let right: i64 = cap[3].parse().ok()?;
    let bottom: i64 = cap[4].parse().ok()?;
    let x = i32::try_from(left.checked_add(right)? / 2).ok()?;
    let y = i32::try_from(top.checked_add(bottom)? / 2).ok()?;
    Some((x, y))
}

/// Case-insensitive substring match on visible text, then on the accessibility label.
pub fn find_by_text<'a>(elements: &'a [UIElement], needle: &str) -> Option<&'a UIElement> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    elements
        .iter()
        .find(|e| !e.text.is_empty() && e.text.to_lowercase().contains(&needle))
        .or_else(|| {
            elements.iter().find(|e| {
                !e.content_desc.is_empty() && e.content_desc.to_lowercase().contains(&needle)
            })
        })
}

pub fn find_by_resource_id<'a>(elements: &'a [UIElement], fragment: &str) -> Option<&'a UIElement> {
    let fragment = fragment.to_lowercase();
    elements
        .iter()
        .find(|e| e.resource_id.to_lowercase().contains(&fragment))
}

pub fn find_input_field(elements: &[UIElement]) -> Option<&UIElement> {
    INPUT_ID_HINTS
        .iter()
        .find_map(|hint| find_by_resource_id(elements, hint))
        .or_else(|| {
            elements
                .iter()
                .find(|e| INPUT_CLASSES.iter().any(|c| e.class_name.contains(c)))
        })
}

pub fn find_send_button(elements: &[UIElement]) -> Option<&UIElement> {
    find_by_resource_id(elements, "send").or_else(|| find_by_text(elements, "send"))
}

pub fn find_search_element(elements: &[UIElement]) -> Option<&UIElement> {
    find_by_resource_id(elements, "search").or_else(|| find_by_text(elements, "search"))
}

/// Numbered listing of meaningful elements, at most [`PROMPT_ELEMENT_CAP`] lines.
pub fn format_for_prompt(elements: &[UIElement]) -> String {
    let lines: Vec<String> = elements
        .iter()
        .filter(|e| e.is_meaningful())
        .take(PROMPT_ELEMENT_CAP)
        .enumerate()
        .map(|(i, e)| format!("{}. {} at ({},{})", i + 1, e.identifier(), e.center_x, e.center_y))
        .collect();

    if lines.is_empty() {
        "No interactive elements detected".to_string()
    } else {
        lines.join("\n")
    }
}

/// Reads the current screen through `uiautomator` over the privileged shell.
pub struct ElementExtractor {
    shell: Arc<dyn Shell>,
    settle: Duration,
    deadline: Duration,
}

impl ElementExtractor {
    pub fn new(shell: Arc<dyn Shell>, cfg: &DetectionConfig) -> Self {
        Self {
            shell,
            settle: Duration::from_millis(cfg.dump_settle_ms),
            deadline: Duration::from_millis(cfg.extraction_deadline_ms),
        }
    }

    async fn dump(&self) -> PilotResult<String> {
        let mut session = self.shell.open().await?;
        session.send_line(&format!("uiautomator dump {DUMP_PATH}")).await?;
        tokio::time::sleep(self.settle).await;
        session.send_line(&format!("cat {DUMP_PATH}")).await?;
        session.send_line(&format!("rm {DUMP_PATH}")).await?;
        let output = session.close().await?;
        Ok(output.stdout)
    }
}

#[async_trait]
impl ElementSource for ElementExtractor {
    async fn extract_elements(&self) -> PilotResult<Vec<UIElement>> {
        let deadline_ms = self.deadline.as_millis() as u64;
        let xml = tokio::time::timeout(self.deadline, self.dump())
            .await
            .map_err(|_| PilotError::DetectionTimeout(deadline_ms))??;

        let elements = parse_hierarchy(&xml);
        tracing::info!(count = elements.len(), bytes = xml.len(), "ui elements extracted");
        Ok(elements)
    }
}
