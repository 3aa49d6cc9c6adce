//! In-crate fakes for the external facilities.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::CommandCache;
use crate::config::ExecutionConfig;
use crate::contacts::{ContactDirectory, ContactSource};
use crate::errors::{PilotError, PilotResult};
use crate::events::EventSink;
use crate::executor::ExecutionEngine;
use crate::generation::GenerativeClient;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};
use crate::llm::{LlmProvider, ProviderRegistry};
use crate::perception::traits::{ContextSource, ElementSource};
use crate::perception::types::{AppContext, UIElement};
use crate::resolver::Orchestrator;
use crate::shell::{Shell, ShellOutput, ShellSession};
use crate::skills::SkillContext;

/// Shell whose sessions replay queued outputs, then a fixed fallback.
pub struct ScriptedShell {
    queued: Mutex<VecDeque<PilotResult<ShellOutput>>>,
    fallback: ShellOutput,
    delay: Duration,
    sent: Arc<Mutex<Vec<String>>>,
    opened: AtomicUsize,
}

impl ScriptedShell {
    pub fn new(outputs: Vec<PilotResult<String>>) -> Self {
        let queued = outputs
            .into_iter()
            .map(|r| r.map(|stdout| ShellOutput { stdout, exit_code: 0 }))
            .collect();
        Self {
            queued: Mutex::new(queued),
            fallback: ShellOutput::default(),
            delay: Duration::ZERO,
            sent: Arc::new(Mutex::new(Vec::new())),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn with_output(stdout: &str) -> Self {
        let mut shell = Self::new(Vec::new());
        shell.fallback.stdout = stdout.to_string();
        shell
    }

    /// Every session exits with `exit_code`.
    pub fn failing(exit_code: i32) -> Self {
        let mut shell = Self::new(Vec::new());
        shell.fallback.exit_code = exit_code;
        shell
    }

    /// Queued `(stdout, exit_code)` pairs consumed one per session.
    pub fn sequence(outputs: &[(&str, i32)]) -> Self {
        let shell = Self::new(Vec::new());
        {
            let mut queued = shell.queued.lock().unwrap();
            for (stdout, exit_code) in outputs {
                queued.push_back(Ok(ShellOutput {
                    stdout: stdout.to_string(),
                    exit_code: *exit_code,
                }));
            }
        }
        shell
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Shell for ScriptedShell {
    async fn open(&self) -> PilotResult<Box<dyn ShellSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let result = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        Ok(Box::new(ScriptedSession {
            sent: self.sent.clone(),
            result,
            delay: self.delay,
        }))
    }
}

struct ScriptedSession {
    sent: Arc<Mutex<Vec<String>>>,
    result: PilotResult<ShellOutput>,
    delay: Duration,
}

#[async_trait]
impl ShellSession for ScriptedSession {
    async fn send_line(&mut self, line: &str) -> PilotResult<()> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn close(self: Box<Self>) -> PilotResult<ShellOutput> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result
    }
}

enum Reply {
    Text(String),
    Fail(String),
}

/// LLM provider that returns a canned completion and records prompts.
pub struct FakeProvider {
    reply: Reply,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Reply::Text(text.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Reply::Fail(message.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> PilotResult<LlmResponse> {
        let prompt = messages.into_iter().map(|m| m.content).collect::<Vec<_>>().join("\n");
        self.prompts.lock().unwrap().push(prompt);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Reply::Text(text) => Ok(LlmResponse {
                content: text.clone(),
                reasoning: String::new(),
            }),
            Reply::Fail(msg) => Err(PilotError::LlmProvider(msg.clone())),
        }
    }
}

pub fn fake_registry(provider: Arc<FakeProvider>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new("fake".into());
    registry.register(provider);
    Arc::new(registry)
}

pub struct FixedContacts(pub Vec<(String, String)>);

#[async_trait]
impl ContactSource for FixedContacts {
    async fn fetch(&self) -> PilotResult<Vec<(String, String)>> {
        Ok(self.0.clone())
    }
}

pub struct FixedContext(pub Option<AppContext>);

#[async_trait]
impl ContextSource for FixedContext {
    async fn detect(&self) -> Option<AppContext> {
        self.0.clone()
    }
}

/// Element source that counts how often it is asked.
pub struct CountingElements {
    elements: Option<Vec<UIElement>>,
    calls: AtomicUsize,
}

impl CountingElements {
    pub fn new(elements: Vec<UIElement>) -> Self {
        Self {
            elements: Some(elements),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every extraction times out.
    pub fn unavailable() -> Self {
        Self {
            elements: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ElementSource for CountingElements {
    async fn extract_elements(&self) -> PilotResult<Vec<UIElement>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.elements.clone().ok_or(PilotError::DetectionTimeout(0))
    }
}

pub fn whatsapp_chat() -> AppContext {
    AppContext {
        package: "com.whatsapp".into(),
        screen: "com.whatsapp.Conversation".into(),
        app_name: "WhatsApp".into(),
        screen_description: "Chat Conversation".into(),
    }
}

/// Execution settings without pauses.
pub fn fast_execution() -> ExecutionConfig {
    ExecutionConfig {
        step_delay_ms: 0,
        retry_backoff_ms: 0,
        ..Default::default()
    }
}

/// Full skill wiring over fakes: unknown context, no on-screen elements.
pub async fn skill_context(
    shell: Arc<ScriptedShell>,
    provider: Arc<FakeProvider>,
    contacts: Vec<(&str, &str)>,
    events: EventSink,
) -> SkillContext {
    let rows = contacts
        .into_iter()
        .map(|(name, phone)| (name.to_string(), phone.to_string()))
        .collect();
    let contacts = Arc::new(ContactDirectory::load(Arc::new(FixedContacts(rows))).await);
    let generator = GenerativeClient::new(fake_registry(provider)).with_contacts(contacts.clone());
    let orchestrator = Orchestrator::new(
        Arc::new(CommandCache::in_memory()),
        Arc::new(FixedContext(None)),
        Arc::new(CountingElements::new(Vec::new())),
        Arc::new(generator),
        events.clone(),
    );
    SkillContext {
        shell: shell.clone(),
        orchestrator: Arc::new(orchestrator),
        engine: Arc::new(ExecutionEngine::new(shell, fast_execution(), events.clone())),
        contacts,
        events,
    }
}
