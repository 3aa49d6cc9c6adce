//! Instruction handlers consulted in priority order before anything else runs.
pub mod assistant;
pub mod messaging;
pub mod registry;
pub mod system;
pub mod types;

pub use registry::{builtin_skills, SkillRegistry};
pub use types::{Dispatch, Handler, SkillContext, SkillKind, SkillRecord};

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Punctuation is gone after normalization, so `www.google.com` arrives as words.
const WEB_WORDS: &[&str] = &["http", "https", "www"];
const TOP_LEVEL_DOMAINS: &[&str] = &["com", "org", "net", "io", "in", "co"];

/// True for a normalized instruction that names a web address rather than an app.
pub(crate) fn names_a_website(instruction: &str) -> bool {
    let words: Vec<&str> = instruction.split_whitespace().collect();
    words.iter().any(|w| WEB_WORDS.contains(w))
        || (words.len() > 2 && words.last().is_some_and(|w| TOP_LEVEL_DOMAINS.contains(w)))
}
