use std::fmt;

use serde::{Deserialize, Serialize};

/// An interactable node from a UI hierarchy dump, reduced to its center point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UIElement {
    pub resource_id: String,
    pub class_name: String,
    pub text: String,
    /// Accessibility label (`content-desc`).
    pub content_desc: String,
    pub clickable: bool,
    pub center_x: i32,
    pub center_y: i32,
}

impl UIElement {
    /// Best human-readable handle: visible text, then label, then the id's last segment.
    pub fn identifier(&self) -> &str {
        if !self.text.is_empty() {
            return &self.text;
        }
        if !self.content_desc.is_empty() {
            return &self.content_desc;
        }
        if !self.resource_id.is_empty() {
            return self
                .resource_id
                .rsplit('/')
                .next()
                .unwrap_or(&self.resource_id);
        }
        "unknown"
    }

    /// Worth showing to the language model: has text, a label, or a non-layout id.
    pub fn is_meaningful(&self) -> bool {
        !self.text.is_empty()
            || !self.content_desc.is_empty()
            || (!self.resource_id.is_empty()
                && !self.resource_id.contains("layout")
                && !self.resource_id.contains("frame"))
    }

    pub fn center(&self) -> (i32, i32) {
        (self.center_x, self.center_y)
    }
}

/// Foreground application and screen for one resolution cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContext {
    pub package: String,
    /// Activity name of the focused window.
    pub screen: String,
    pub app_name: String,
    pub screen_description: String,
}

impl AppContext {
    /// Context block used in generation prompts.
    pub fn summary(&self) -> String {
        format!(
            "Current App: {}\nCurrent Screen: {}\nPackage: {}\nActivity: {}",
            self.app_name, self.screen_description, self.package, self.screen
        )
    }

    pub fn summary_or_unknown(ctx: Option<&AppContext>) -> String {
        ctx.map(AppContext::summary)
            .unwrap_or_else(|| "Context: Unknown (device home screen or locked)".to_string())
    }
}

impl fmt::Display for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.app_name, self.screen_description, self.package)
    }
}
