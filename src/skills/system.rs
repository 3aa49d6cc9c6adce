//! Device-level skills that talk to the shell directly: launching apps, Wi-Fi, package listing.
use futures_util::future::BoxFuture;

use crate::errors::{PilotError, PilotResult};
use crate::shell::Shell;
use crate::skills::{contains_any, names_a_website};
use crate::skills::types::SkillContext;

const OPEN_APP_MAX_WORDS: usize = 3;
const SHORT_COMMAND_LEN: usize = 25;
const LIST_APPS_LIMIT: usize = 20;
const SUGGESTION_LIMIT: usize = 10;

/// Phrases that turn "open X" into a multi-step request for the assistant.
const OPEN_COMPOUND: &[&str] = &[
    " and ", " then ", " after ", " send ", " message ", " to ", " saying ", " with ", " search ",
    " type ", " tap ", " press ",
];

const SINGLE_ACTION_GUARD: &[&str] = &[
    " and ", " then ", " after ", " wait ", " delay ", " send ", " message ", " type ", " tap ",
    " press ", " search ", " find ", " go to ", " click ", " scroll ", " swipe ", " open ",
    " close ", " switch ",
];

const LIST_APPS_PHRASES: &[&str] = &["list apps", "show apps", "what apps", "available apps"];

/// Spoken names that rarely appear verbatim in a package identifier.
const COMMON_APP_NAMES: &[&str] = &[
    "whatsapp", "telegram", "chrome", "browser", "firefox", "edge", "youtube", "instagram",
    "facebook", "twitter", "tiktok", "snapchat", "gmail", "outlook", "mail", "calendar", "clock",
    "calculator", "camera", "gallery", "photos", "music", "spotify", "netflix", "maps", "waze",
    "uber", "settings", "contacts", "phone", "messages", "sms", "dialer", "files", "notes", "keep",
];

pub fn matches_open_app(instruction: &str) -> bool {
    let mut words = instruction.split_whitespace();
    if !matches!(words.next(), Some("open" | "launch")) || words.next().is_none() {
        return false;
    }
    instruction.split_whitespace().count() <= OPEN_APP_MAX_WORDS
        && !contains_any(instruction, OPEN_COMPOUND)
        && !names_a_website(instruction)
}

pub fn matches_toggle_wifi(instruction: &str) -> bool {
    if !instruction.contains("wifi") {
        return false;
    }
    let has_verb = instruction
        .split_whitespace()
        .any(|w| matches!(w, "toggle" | "turn" | "enable" | "disable" | "on" | "off"));
    has_verb
        && instruction.len() <= SHORT_COMMAND_LEN
        && !contains_any(instruction, SINGLE_ACTION_GUARD)
}

pub fn matches_list_apps(instruction: &str) -> bool {
    contains_any(instruction, LIST_APPS_PHRASES)
        && instruction.len() <= SHORT_COMMAND_LEN
        && !contains_any(instruction, SINGLE_ACTION_GUARD)
        && !instruction.contains(" turn ")
}

/// "open the youtube app" → "the youtube".
pub fn app_name_from(instruction: &str) -> String {
    let mut words: Vec<&str> = instruction.split_whitespace().skip(1).collect();
    if words.len() > 1 && matches!(words.last(), Some(&"app" | &"application")) {
        words.pop();
    }
    words.join(" ")
}

/// Package names from `pm list packages` output.
pub fn parse_packages(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|l| l.trim().strip_prefix("package:"))
        .map(str::to_string)
        .collect()
}

/// Direct substring match first, then the well-known spoken names.
pub fn find_package<'a>(packages: &'a [String], app_name: &str) -> Option<&'a str> {
    let wanted = app_name.to_lowercase();
    if let Some(pkg) = packages.iter().find(|p| p.to_lowercase().contains(&wanted)) {
        return Some(pkg.as_str());
    }
    COMMON_APP_NAMES
        .iter()
        .filter(|common| wanted.contains(**common))
        .find_map(|common| packages.iter().find(|p| p.to_lowercase().contains(*common)))
        .map(String::as_str)
}

fn is_platform_package(pkg: &str) -> bool {
    pkg == "android" || pkg.starts_with("com.android.") || pkg.starts_with("android.")
}

async fn installed_packages(shell: &dyn Shell, third_party_only: bool) -> PilotResult<Vec<String>> {
    let command = if third_party_only {
        "pm list packages -3"
    } else {
        "pm list packages"
    };
    let out = shell.run(command).await?;
    if !out.success() {
        return Err(PilotError::Shell(format!("{command} exited with {}", out.exit_code)));
    }
    let packages = parse_packages(&out.stdout);
    tracing::debug!(count = packages.len(), "installed packages listed");
    Ok(packages)
}

pub fn launch_command(package: &str) -> String {
    format!("monkey -p {package} -c android.intent.category.LAUNCHER 1")
}

pub async fn open_app(instruction: &str, ctx: &SkillContext) -> PilotResult<String> {
    let name = app_name_from(instruction);
    if name.is_empty() {
        return Err(PilotError::Skill("could not determine which app to open".into()));
    }
    ctx.events.log(format!("Looking for app: \"{name}\""));

    let packages = installed_packages(ctx.shell.as_ref(), false).await?;
    let Some(package) = find_package(&packages, &name) else {
        ctx.events.log("Some available apps:");
        for pkg in packages
            .iter()
            .filter(|p| !is_platform_package(p))
            .take(SUGGESTION_LIMIT)
        {
            ctx.events.log(format!("  - {pkg}"));
        }
        return Err(PilotError::Skill(format!("App not found: {name}")));
    };

    let out = ctx.shell.run(&launch_command(package)).await?;
    if !out.success() {
        tracing::warn!(package, exit_code = out.exit_code, "monkey launch failed, trying am start");
        let fallback = ctx.shell.run(&format!("am start -n {package}/.MainActivity")).await?;
        if !fallback.success() {
            return Err(PilotError::ExecutionStepFailed(format!(
                "could not launch {package}: exit {}",
                fallback.exit_code
            )));
        }
    }
    tracing::info!(app = %name, package, "app launched");
    Ok(format!("Opening: {name} ({package})"))
}

pub async fn toggle_wifi(instruction: &str, ctx: &SkillContext) -> PilotResult<String> {
    let words: Vec<&str> = instruction.split_whitespace().collect();
    let enable = if words.iter().any(|w| matches!(*w, "off" | "disable")) {
        false
    } else if words.iter().any(|w| matches!(*w, "on" | "enable")) {
        true
    } else {
        // Plain "toggle": flip whatever the radio is doing now.
        let state = ctx.shell.run("settings get global wifi_on").await?;
        state.stdout.trim() != "1"
    };

    let command = format!("svc wifi {}", if enable { "enable" } else { "disable" });
    let out = ctx.shell.run(&command).await?;
    if !out.success() {
        return Err(PilotError::ExecutionStepFailed(format!("{command} exited with {}", out.exit_code)));
    }
    Ok(format!("Toggle WiFi -> {}", if enable { "enable" } else { "disable" }))
}

pub async fn list_apps(_instruction: &str, ctx: &SkillContext) -> PilotResult<String> {
    let packages: Vec<String> = installed_packages(ctx.shell.as_ref(), true)
        .await?
        .into_iter()
        .filter(|p| !is_platform_package(p))
        .collect();

    let mut lines: Vec<String> = packages
        .iter()
        .take(LIST_APPS_LIMIT)
        .enumerate()
        .map(|(i, pkg)| format!("{}. {pkg}", i + 1))
        .collect();
    if packages.len() > LIST_APPS_LIMIT {
        lines.push(format!("... and {} more apps", packages.len() - LIST_APPS_LIMIT));
    }
    for line in &lines {
        ctx.events.log(line.clone());
    }
    Ok(lines.join("\n"))
}

pub(crate) fn run_open_app<'a>(i: &'a str, ctx: &'a SkillContext) -> BoxFuture<'a, PilotResult<String>> {
    Box::pin(open_app(i, ctx))
}

pub(crate) fn run_toggle_wifi<'a>(i: &'a str, ctx: &'a SkillContext) -> BoxFuture<'a, PilotResult<String>> {
    Box::pin(toggle_wifi(i, ctx))
}

pub(crate) fn run_list_apps<'a>(i: &'a str, ctx: &'a SkillContext) -> BoxFuture<'a, PilotResult<String>> {
    Box::pin(list_apps(i, ctx))
}
