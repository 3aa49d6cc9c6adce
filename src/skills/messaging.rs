use futures_util::future::BoxFuture;

use crate::contacts::normalize_phone;
use crate::errors::{PilotError, PilotResult};
use crate::script::{ActionScript, Step};
use crate::skills::contains_any;
use crate::skills::types::SkillContext;

const MAX_LEN: usize = 50;

const GUARD: &[&str] = &[
    " and ", " then ", " after ", " wait ", " delay ", " open ", " close ", " switch ", " turn ",
    " tap ", " press ", " search ", " find ", " go to ", " click ", " scroll ", " swipe ",
];

const OTHER_APPS: &[&str] = &["youtube", "chrome", "instagram", "facebook", "twitter", "telegram", "gmail"];

/// "send whatsapp to mom message running late", short and about WhatsApp only.
pub fn matches_whatsapp(instruction: &str) -> bool {
    instruction.contains("whatsapp")
        && (instruction.contains("send") || instruction.contains("message"))
        && instruction.len() <= MAX_LEN
        && !contains_any(instruction, GUARD)
        && !contains_any(instruction, OTHER_APPS)
}

/// Splits into `(recipient, message)`; either may be empty.
pub fn parse_whatsapp(instruction: &str) -> (String, String) {
    if let Some((left, message)) = instruction.split_once("message") {
        let who = left
            .replace("send whatsapp to", "")
            .replace("send whatsapp", "")
            .trim()
            .to_string();
        return (who, message.trim().to_string());
    }
    let who = instruction
        .split_once(" to ")
        .map(|(_, rest)| rest.replace("on whatsapp", "").trim().to_string())
        .unwrap_or_default();
    (who, String::new())
}

pub fn send_script(phone: &str, message: &str) -> ActionScript {
    let text: String = message
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("%20");
    ActionScript::new(vec![Step::StartActivity {
        args: format!(
            "-a android.intent.action.VIEW -p com.whatsapp -d 'https://api.whatsapp.com/send?phone={phone}&text={text}'"
        ),
    }])
}

pub async fn send_whatsapp(instruction: &str, ctx: &SkillContext) -> PilotResult<String> {
    let (who, message) = parse_whatsapp(instruction);
    if who.is_empty() {
        return Err(PilotError::Skill("no recipient in WhatsApp request".into()));
    }
    let phone = ctx
        .contacts
        .resolve(&who)
        .or_else(|| normalize_phone(&who))
        .ok_or_else(|| PilotError::Skill(format!("No phone number for {who}")))?;

    let script = send_script(&phone, &message);
    let out = ctx.shell.run(&script.to_string()).await?;
    if !out.success() {
        return Err(PilotError::ExecutionStepFailed(format!(
            "WhatsApp intent exited with {}",
            out.exit_code
        )));
    }
    tracing::info!(recipient = %who, chars = message.len(), "WhatsApp chat opened");
    Ok(format!("WhatsApp to {who} ({phone}): {message}"))
}

pub(crate) fn run_whatsapp<'a>(i: &'a str, ctx: &'a SkillContext) -> BoxFuture<'a, PilotResult<String>> {
    Box::pin(send_whatsapp(i, ctx))
}
