//! Foreground app/screen detection from `dumpsys` focus state.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DetectionConfig;
use crate::perception::traits::ContextSource;
use crate::perception::types::AppContext;
use crate::shell::Shell;

/// Probes tried in order until one yields a `package/activity` token.
const FOCUS_PROBES: [&str; 4] = [
    "dumpsys window windows | grep -E 'mCurrentFocus|mFocusedApp|mInputMethodTarget'",
    "dumpsys activity activities | grep -E 'mResumedActivity|mFocusedActivity'",
    "dumpsys activity top | grep -E 'ACTIVITY|TASK'",
    "dumpsys window | grep -E 'mCurrentFocus|mFocusedApp'",
];

const APP_NAMES: [(&str, &str); 13] = [
    ("com.whatsapp", "WhatsApp"),
    ("com.whatsapp.w4b", "WhatsApp Business"),
    ("com.google.android.youtube", "YouTube"),
    ("com.instagram.android", "Instagram"),
    ("com.facebook.katana", "Facebook"),
    ("com.twitter.android", "Twitter"),
    ("org.telegram.messenger", "Telegram"),
    ("com.google.android.apps.maps", "Google Maps"),
    ("com.android.chrome", "Chrome"),
    ("com.google.android.gm", "Gmail"),
    ("com.spotify.music", "Spotify"),
    ("com.netflix.mediaclient", "Netflix"),
    ("com.amazon.mShop.android.shopping", "Amazon"),
];

/// (package, activity fragment, description); first fragment contained in the activity wins.
const SCREENS: [(&str, &str, &str); 17] = [
    ("com.whatsapp", "HomeActivity", "Chats List"),
    ("com.whatsapp", "Conversation", "Chat Conversation"),
    ("com.whatsapp", "ContactPicker", "Contact Selection"),
    ("com.whatsapp", "Status", "Status Screen"),
    ("com.whatsapp", "Call", "Call Screen"),
    ("com.google.android.youtube", "WatchWhileActivity", "Video Player"),
    ("com.google.android.youtube", "HomeActivity", "Home Feed"),
    ("com.google.android.youtube", "SearchActivity", "Search Screen"),
    ("com.google.android.youtube", "SubscriptionFeed", "Subscriptions"),
    ("com.google.android.apps.maps", "MapsActivity", "Map View"),
    ("com.google.android.apps.maps", "SearchActivity", "Search Screen"),
    ("com.google.android.apps.maps", "NavigationActivity", "Navigation"),
    ("com.instagram.android", "MainTabActivity", "Home Feed"),
    ("com.instagram.android", "DirectInboxActivity", "Direct Messages"),
    ("com.instagram.android", "CameraActivity", "Camera/Story"),
    ("com.android.chrome", "ChromeTabbedActivity", "Browser Tab"),
    ("com.android.chrome", "Incognito", "Incognito Mode"),
];

const DEFAULT_SCREEN: &str = "Main Screen";

/// Friendly name for a package; unknown packages are returned as-is.
pub fn app_name(package: &str) -> String {
    APP_NAMES
        .iter()
        .find(|(pkg, _)| *pkg == package)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| package.to_string())
}

pub fn screen_description(package: &str, activity: &str) -> String {
    SCREENS
        .iter()
        .find(|(pkg, fragment, _)| *pkg == package && activity.contains(fragment))
        .map(|(_, _, desc)| desc.to_string())
        .unwrap_or_else(|| DEFAULT_SCREEN.to_string())
}

/// Extracts `(package, activity)` from the first `pkg/activity` token in `output`.
pub fn parse_focus(output: &str) -> Option<(String, String)> {
    output
        .split_whitespace()
        .map(|tok| tok.trim_end_matches('}'))
        .filter_map(|tok| tok.split_once('/'))
        .find(|(pkg, activity)| pkg.contains('.') && !activity.is_empty())
        .map(|(pkg, activity)| (pkg.to_string(), activity.to_string()))
}

pub fn build_context(package: String, activity: String) -> AppContext {
    AppContext {
        app_name: app_name(&package),
        screen_description: screen_description(&package, &activity),
        package,
        screen: activity,
    }
}

/// Shell-backed [`ContextSource`] bounded by a single overall deadline.
pub struct ContextDetector {
    shell: Arc<dyn Shell>,
    deadline: Duration,
}

impl ContextDetector {
    pub fn new(shell: Arc<dyn Shell>, cfg: &DetectionConfig) -> Self {
        Self {
            shell,
            deadline: Duration::from_millis(cfg.deadline_ms),
        }
    }

    async fn probe(&self) -> Option<AppContext> {
        for probe in FOCUS_PROBES {
            match self.shell.run(probe).await {
                Ok(out) => {
                    if let Some((package, activity)) = parse_focus(&out.stdout) {
                        tracing::debug!(%probe, %package, %activity, "focus detected");
                        return Some(build_context(package, activity));
                    }
                }
                Err(e) => tracing::debug!(%probe, error = %e, "focus probe failed"),
            }
        }
        None
    }
}

#[async_trait]
impl ContextSource for ContextDetector {
    async fn detect(&self) -> Option<AppContext> {
        match tokio::time::timeout(self.deadline, self.probe()).await {
            Ok(Some(ctx)) => {
                tracing::info!(app = %ctx.app_name, screen = %ctx.screen_description, "context detected");
                Some(ctx)
            }
            Ok(None) => {
                tracing::info!("no focused window found");
                None
            }
            Err(_) => {
                tracing::warn!(deadline_ms = self.deadline.as_millis() as u64, "context detection timed out");
                None
            }
        }
    }
}
