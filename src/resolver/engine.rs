use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheKey, CommandCache};
use crate::config::KeyScope;
use crate::errors::PilotResult;
use crate::events::{EventSink, PilotEvent};
use crate::generation::GenerativeClient;
use crate::patterns::{try_match, MatchResult};
use crate::perception::traits::{ContextSource, ElementSource};
use crate::perception::types::{AppContext, UIElement};
use crate::resolver::journal::Journal;
use crate::resolver::state::{Resolution, ResolutionSource, ResolutionState};

/// Cache, then deterministic patterns, then the language model.
pub struct Orchestrator {
    cache: Arc<CommandCache>,
    context: Arc<dyn ContextSource>,
    elements: Arc<dyn ElementSource>,
    generator: Arc<GenerativeClient>,
    key_scope: KeyScope,
    events: EventSink,
    journal: Option<Arc<Journal>>,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<CommandCache>,
        context: Arc<dyn ContextSource>,
        elements: Arc<dyn ElementSource>,
        generator: Arc<GenerativeClient>,
        events: EventSink,
    ) -> Self {
        Self {
            cache,
            context,
            elements,
            generator,
            key_scope: KeyScope::default(),
            events,
            journal: None,
        }
    }

    pub fn with_key_scope(mut self, key_scope: KeyScope) -> Self {
        self.key_scope = key_scope;
        self
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn cache(&self) -> &Arc<CommandCache> {
        &self.cache
    }

    /// Resolves one instruction into a script. Generation failures are returned as-is.
    pub async fn resolve(&self, instruction: &str) -> PilotResult<Resolution> {
        let started = Instant::now();
        let result = self.run_cycle(instruction, started).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(res) => {
                tracing::info!(
                    source = %res.source,
                    elapsed_ms,
                    rule = res.rule.as_deref().unwrap_or("-"),
                    steps = res.script.len(),
                    "instruction resolved"
                );
                self.events.emit(PilotEvent::Resolved {
                    source: res.source,
                    elapsed_ms: res.elapsed_ms(),
                    rule: res.rule.clone(),
                });
                self.journal(instruction, Some(res.source), elapsed_ms, Some(res.script.to_string()), None);
            }
            Err(e) => {
                tracing::warn!(error = %e, elapsed_ms, "resolution failed");
                self.journal(instruction, None, elapsed_ms, None, Some(e.to_string()));
            }
        }
        result
    }

    pub async fn detect_context(&self) -> Option<AppContext> {
        self.context.detect().await
    }

    /// Resolves ahead of use and caches the result without reading the screen.
    ///
    /// No events or journal entries are produced. Returns where the script came
    /// from; `Cache` means nothing was done.
    pub async fn prefetch(&self, instruction: &str, context: Option<&AppContext>) -> PilotResult<ResolutionSource> {
        let key = CacheKey::for_context(instruction, context, self.key_scope);
        if self.cache.contains(&key) {
            return Ok(ResolutionSource::Cache);
        }
        if let MatchResult::Matched { script, .. } = try_match(instruction, &[], context) {
            self.cache.store(key, script);
            return Ok(ResolutionSource::Pattern);
        }
        let script = self.generator.generate(instruction, context, &[]).await?;
        tracing::debug!(key = %key, steps = script.len(), "prefetched");
        self.cache.store(key, script);
        Ok(ResolutionSource::Generative)
    }

    fn journal(
        &self,
        instruction: &str,
        source: Option<ResolutionSource>,
        elapsed_ms: u64,
        script: Option<String>,
        error: Option<String>,
    ) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record(instruction, source, elapsed_ms, script, error) {
                tracing::debug!(error = %e, "journal write failed");
            }
        }
    }

    async fn run_cycle(&self, instruction: &str, started: Instant) -> PilotResult<Resolution> {
        let mut states = vec![ResolutionState::Start];

        let context = self.context.detect().await;
        states.push(ResolutionState::ContextDetected {
            context: context.clone(),
        });

        let key = CacheKey::for_context(instruction, context.as_ref(), self.key_scope);
        if let Some(entry) = self.cache.lookup(&key) {
            states.push(ResolutionState::Cached);
            return Ok(Resolution {
                script: entry.script,
                source: ResolutionSource::Cache,
                elapsed: started.elapsed(),
                rule: None,
                context,
                key,
                states,
            });
        }

        // Extracted once and shared by the matcher and the prompt builder.
        let elements: Vec<UIElement> = match self.elements.extract_elements().await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::warn!(error = %e, "element extraction failed; continuing without elements");
                Vec::new()
            }
        };

        if let MatchResult::Matched { rule, script } = try_match(instruction, &elements, context.as_ref()) {
            self.cache.store(key.clone(), script.clone());
            states.push(ResolutionState::PatternMatched { rule: rule.to_string() });
            return Ok(Resolution {
                script,
                source: ResolutionSource::Pattern,
                elapsed: started.elapsed(),
                rule: Some(rule.to_string()),
                context,
                key,
                states,
            });
        }

        match self.generator.generate(instruction, context.as_ref(), &elements).await {
            Ok(script) => {
                self.cache.store(key.clone(), script.clone());
                states.push(ResolutionState::Generated);
                Ok(Resolution {
                    script,
                    source: ResolutionSource::Generative,
                    elapsed: started.elapsed(),
                    rule: None,
                    context,
                    key,
                    states,
                })
            }
            Err(e) => {
                states.push(ResolutionState::Failed { error: e.to_string() });
                tracing::debug!(states = ?states, "resolution path");
                Err(e)
            }
        }
    }
}
