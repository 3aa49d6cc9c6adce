use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "gemini" for Google generateContent, None for OpenAI-compatible
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (falls back to env var ROOTPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps generation roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Context-aware UI automation (taps, text, key events on the current screen).
    pub automation: Option<RoleEntry>,
    /// App-launch automation used when no foreground context is known.
    pub launch: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Program that accepts newline-delimited commands on stdin.
    #[serde(default = "default_shell_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell_program(),
            args: Vec::new(),
        }
    }
}

fn default_shell_program() -> String {
    "su".to_string()
}

/// Whether cache keys are scoped by the detected foreground screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// Scope by package and screen when a context is known, global otherwise.
    #[default]
    Contextual,
    /// Always use the bare instruction.
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Defaults to `<data_local_dir>/rootpilot/command_cache.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub key_scope: KeyScope,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    #[serde(default = "default_min_uses")]
    pub min_uses: u32,
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
    /// Background pre-resolution of common and predicted instructions in `listen`.
    #[serde(default)]
    pub warmup: bool,
    /// Pause after each model call made while warming.
    #[serde(default = "default_warmup_throttle_ms")]
    pub warmup_throttle_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            key_scope: KeyScope::default(),
            max_age_days: default_max_age_days(),
            min_uses: default_min_uses(),
            seed_defaults: true,
            warmup: false,
            warmup_throttle_ms: default_warmup_throttle_ms(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir().join("command_cache.json"))
    }
}

fn default_max_age_days() -> u32 {
    30
}

fn default_min_uses() -> u32 {
    2
}

fn default_warmup_throttle_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_detection_deadline")]
    pub deadline_ms: u64,
    #[serde(default = "default_extraction_deadline")]
    pub extraction_deadline_ms: u64,
    /// Pause between requesting the hierarchy dump and reading it back.
    #[serde(default = "default_dump_settle")]
    pub dump_settle_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_detection_deadline(),
            extraction_deadline_ms: default_extraction_deadline(),
            dump_settle_ms: default_dump_settle(),
        }
    }
}

fn default_detection_deadline() -> u64 {
    3000
}

fn default_extraction_deadline() -> u64 {
    8000
}

fn default_dump_settle() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_screen_width")]
    pub screen_width: i32,
    #[serde(default = "default_screen_height")]
    pub screen_height: i32,
    /// Pause after every shell step.
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_execution_timeout")]
    pub timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            step_delay_ms: default_step_delay(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            timeout_ms: default_execution_timeout(),
        }
    }
}

fn default_screen_width() -> i32 {
    1440
}

fn default_screen_height() -> i32 {
    3000
}

fn default_step_delay() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    1000
}

fn default_execution_timeout() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Run unmatched instructions verbatim in the shell.
    #[serde(default = "default_true")]
    pub raw_shell_fallback: bool,
    /// Append every resolution to a JSONL journal.
    #[serde(default = "default_true")]
    pub journal: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            raw_shell_fallback: true,
            journal: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `<data_local_dir>/rootpilot`, falling back to the working directory.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rootpilot"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn resolve_config_path(explicit: Option<&Path>) -> PilotResult<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(PilotError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> PilotResult<AppConfig> {
    Ok(toml::from_str(content)?)
}

pub fn load_config(explicit: Option<&Path>) -> PilotResult<AppConfig> {
    let path = resolve_config_path(explicit)?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, explicit: Option<&Path>) -> PilotResult<()> {
    let path = resolve_config_path(explicit)?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
