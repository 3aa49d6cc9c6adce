use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig, RoleEntry};
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::gemini::GeminiProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// What a generation request is for; each maps to `[llm.roles.<role>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Context-aware on-screen automation.
    Automation,
    /// App launching when no foreground context is known.
    Launch,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Automation => "automation",
            Role::Launch => "launch",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
            llm_config: LlmConfig::default(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> PilotResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            PilotError::Config(format!("Active provider '{}' not found in registry", self.active))
        })
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    fn role_entry(&self, role: Role) -> Option<&RoleEntry> {
        match role {
            Role::Automation => self.llm_config.roles.automation.as_ref(),
            Role::Launch => self.llm_config.roles.launch.as_ref(),
        }
    }

    /// Return the provider and call configuration for a generation role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature, non-streaming
    pub fn call_config_for_role(&self, role: Role) -> PilotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        if let Some(entry) = self.role_entry(role) {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                PilotError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.1)
            });
            tracing::debug!(
                role = %role,
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature,
                "resolved role config"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature,
                },
            ));
        }

        let provider = self.get_active()?;
        let (model, temperature) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        tracing::debug!(
            role = %role,
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((
            provider,
            CallConfig {
                model,
                stream: false,
                temperature,
            },
        ))
    }

    /// Build a registry from the loaded app config.
    /// Keys missing from config.toml are read from `ROOTPILOT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = entry
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .or_else(|| std::env::var(format!("ROOTPILOT_{}_API_KEY", id.to_uppercase())).ok())
                .unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key configured");
            }

            let provider: Arc<dyn LlmProvider> = match entry.adapter.as_deref() {
                Some("gemini") => Arc::new(GeminiProvider::new(id.clone(), entry.api_base.clone(), api_key)),
                Some("openai") | None => Arc::new(OpenAiCompatibleProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                )),
                Some(other) => {
                    tracing::warn!(provider = %id, adapter = other, "unknown adapter, treating as openai-compatible");
                    Arc::new(OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key))
                }
            };
            registry.register(provider);
        }
        tracing::info!(providers = ?registry.list_names(), active = %registry.active, "provider registry built");
        registry
    }
}
