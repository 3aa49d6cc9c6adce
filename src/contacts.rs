//! Contact directory used to turn names into WhatsApp-ready phone numbers.
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};
use crate::script::{ActionScript, Step};
use crate::shell::Shell;

const CONTACTS_QUERY: &str =
    "content query --uri content://com.android.contacts/data/phones --projection display_name:data1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub display_name: String,
    /// Digits only, no leading `+`.
    pub phone: String,
}

/// Where raw `(name, number)` pairs come from.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn fetch(&self) -> PilotResult<Vec<(String, String)>>;
}

/// Reads the phone-number table through the content provider CLI.
pub struct ShellContactSource {
    shell: Arc<dyn Shell>,
}

impl ShellContactSource {
    pub fn new(shell: Arc<dyn Shell>) -> Self {
        Self { shell }
    }
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"display_name=(.*?), data1=(.*)$").expect("contact row regex must compile")
    })
}

fn whatsapp_phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(https://api\.whatsapp\.com/send\?phone=)([^&']+)")
            .expect("whatsapp url regex must compile")
    })
}

/// Parses `Row: N display_name=…, data1=…` lines.
pub fn parse_content_rows(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| row_re().captures(line.trim()))
        .map(|cap| (cap[1].trim().to_string(), cap[2].trim().to_string()))
        .filter(|(name, phone)| !name.is_empty() && name != "NULL" && phone != "NULL")
        .collect()
}

#[async_trait]
impl ContactSource for ShellContactSource {
    async fn fetch(&self) -> PilotResult<Vec<(String, String)>> {
        let out = self.shell.run(CONTACTS_QUERY).await?;
        if !out.success() {
            return Err(PilotError::Shell(format!("contact query exited with {}", out.exit_code)));
        }
        Ok(parse_content_rows(&out.stdout))
    }
}

/// Keeps `+` and digits. An international `+` prefix is dropped; otherwise at
/// least ten digits are required.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c == '+' || c.is_ascii_digit()).collect();
    if let Some(rest) = cleaned.strip_prefix('+') {
        let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
        return (!digits.is_empty()).then_some(digits);
    }
    (cleaned.len() >= 10).then_some(cleaned)
}

/// Immutable snapshot of the device contacts, replaced only by [`ContactDirectory::refresh`].
pub struct ContactDirectory {
    source: Arc<dyn ContactSource>,
    contacts: RwLock<Vec<Contact>>,
}

impl ContactDirectory {
    /// Loads once; a failing source leaves the directory empty.
    pub async fn load(source: Arc<dyn ContactSource>) -> Self {
        let dir = Self {
            source,
            contacts: RwLock::new(Vec::new()),
        };
        dir.refresh().await;
        dir
    }

    pub fn empty(source: Arc<dyn ContactSource>) -> Self {
        Self {
            source,
            contacts: RwLock::new(Vec::new()),
        }
    }

    pub async fn refresh(&self) -> usize {
        let rows = match self.source.fetch().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "contact directory unavailable");
                return self.len();
            }
        };

        let mut contacts: Vec<Contact> = rows
            .into_iter()
            .filter_map(|(name, raw)| {
                normalize_phone(&raw).map(|phone| Contact {
                    display_name: name,
                    phone,
                })
            })
            .collect();
        contacts.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        let count = contacts.len();
        *self.contacts.write().unwrap_or_else(|p| p.into_inner()) = contacts;
        tracing::info!(count, "contacts loaded");
        count
    }

    pub fn len(&self) -> usize {
        self.contacts.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact name, then case-insensitive, then either name containing the other.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let lowered = name.to_lowercase();
        let contacts = self.contacts.read().unwrap_or_else(|p| p.into_inner());

        contacts
            .iter()
            .find(|c| c.display_name == name)
            .or_else(|| contacts.iter().find(|c| c.display_name.to_lowercase() == lowered))
            .or_else(|| {
                contacts.iter().find(|c| {
                    let candidate = c.display_name.to_lowercase();
                    candidate.contains(&lowered) || lowered.contains(&candidate)
                })
            })
            .map(|c| c.phone.clone())
    }

    /// Rewrites WhatsApp send URLs whose `phone=` holds a contact name.
    pub fn substitute_names(&self, script: &ActionScript) -> ActionScript {
        let steps = script
            .steps()
            .iter()
            .map(|step| match step {
                Step::StartActivity { args } => Step::StartActivity {
                    args: self.substitute_in(args),
                },
                other => other.clone(),
            })
            .collect();
        ActionScript::new(steps)
    }

    fn substitute_in(&self, args: &str) -> String {
        whatsapp_phone_re()
            .replace_all(args, |cap: &regex::Captures<'_>| {
                let who = cap[2].replace("%20", " ");
                if who.chars().all(|c| c.is_ascii_digit()) {
                    return cap[0].to_string();
                }
                match self.resolve(&who) {
                    Some(number) => {
                        tracing::info!(contact = %who, "contact resolved");
                        format!("{}{}", &cap[1], number)
                    }
                    None => {
                        tracing::warn!(contact = %who, "contact not found");
                        cap[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}
