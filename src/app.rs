use std::sync::Arc;

use crate::cache::CommandCache;
use crate::config::AppConfig;
use crate::contacts::{ContactDirectory, ShellContactSource};
use crate::events::EventSink;
use crate::executor::ExecutionEngine;
use crate::generation::GenerativeClient;
use crate::llm::ProviderRegistry;
use crate::perception::{ContextDetector, ElementExtractor};
use crate::resolver::{Journal, Orchestrator, Warmer};
use crate::shell::{ProcessShell, Shell};
use crate::skills::{SkillContext, SkillRegistry};

/// Every long-lived component, wired from one config.
pub struct Pilot {
    pub config: AppConfig,
    pub cache: Arc<CommandCache>,
    pub orchestrator: Arc<Orchestrator>,
    pub skills: Arc<SkillRegistry>,
    /// Present when `[cache] warmup` is on.
    pub warmer: Option<Arc<Warmer>>,
}

impl Pilot {
    pub async fn build(config: AppConfig, events: EventSink) -> Self {
        let shell: Arc<dyn Shell> = Arc::new(ProcessShell::from_config(&config.shell));
        Self::with_shell(config, shell, events).await
    }

    pub async fn with_shell(config: AppConfig, shell: Arc<dyn Shell>, events: EventSink) -> Self {
        let cache = Arc::new(CommandCache::open(&config.cache));
        let contacts =
            Arc::new(ContactDirectory::load(Arc::new(ShellContactSource::new(shell.clone()))).await);

        let registry = ProviderRegistry::from_config(&config);
        tracing::info!(providers = ?registry.list_names(), "LLM providers registered");
        let generator = GenerativeClient::new(Arc::new(registry)).with_contacts(contacts.clone());

        let mut orchestrator = Orchestrator::new(
            cache.clone(),
            Arc::new(ContextDetector::new(shell.clone(), &config.detection)),
            Arc::new(ElementExtractor::new(shell.clone(), &config.detection)),
            Arc::new(generator),
            events.clone(),
        )
        .with_key_scope(config.cache.key_scope);
        if config.skills.journal {
            match Journal::in_data_dir() {
                Ok(journal) => {
                    tracing::info!(path = %journal.path().display(), "resolution journal enabled");
                    orchestrator = orchestrator.with_journal(Arc::new(journal));
                }
                Err(e) => tracing::warn!(error = %e, "resolution journal unavailable"),
            }
        }
        let orchestrator = Arc::new(orchestrator);
        let warmer = config
            .cache
            .warmup
            .then(|| Arc::new(Warmer::from_config(orchestrator.clone(), &config.cache)));

        let engine = Arc::new(ExecutionEngine::new(
            shell.clone(),
            config.execution.clone(),
            events.clone(),
        ));
        let ctx = SkillContext {
            shell,
            orchestrator: orchestrator.clone(),
            engine,
            contacts,
            events,
        };
        let skills = Arc::new(SkillRegistry::new(ctx, &config.skills));

        Self {
            config,
            cache,
            orchestrator,
            skills,
            warmer,
        }
    }
}
