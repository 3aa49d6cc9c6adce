//! End-to-end resolution and execution against in-process fakes.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use rootpilot::cache::CommandCache;
use rootpilot::config::ExecutionConfig;
use rootpilot::errors::{PilotError, PilotResult};
use rootpilot::events::{EventSink, PilotEvent};
use rootpilot::executor::ExecutionEngine;
use rootpilot::generation::GenerativeClient;
use rootpilot::llm::types::{CallConfig, ChatMessage, LlmResponse};
use rootpilot::llm::{LlmProvider, ProviderRegistry};
use rootpilot::perception::traits::{ContextSource, ElementSource};
use rootpilot::perception::types::{AppContext, UIElement};
use rootpilot::resolver::{Orchestrator, ResolutionSource};
use rootpilot::script::{ActionScript, Step, KEYCODE_BACK, KEYCODE_ENTER};
use rootpilot::shell::{Shell, ShellOutput, ShellSession};

struct CannedModel {
    reply: String,
    delay: Duration,
    calls: AtomicUsize,
}

impl CannedModel {
    fn new(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmProvider for CannedModel {
    fn name(&self) -> &str {
        "canned"
    }

    async fn chat(&self, _messages: Vec<ChatMessage>, _cfg: &CallConfig) -> PilotResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(LlmResponse {
            content: self.reply.clone(),
            reasoning: String::new(),
        })
    }
}

struct Screen {
    context: Option<AppContext>,
    elements: Vec<UIElement>,
}

#[async_trait]
impl ContextSource for Screen {
    async fn detect(&self) -> Option<AppContext> {
        self.context.clone()
    }
}

#[async_trait]
impl ElementSource for Screen {
    async fn extract_elements(&self) -> PilotResult<Vec<UIElement>> {
        Ok(self.elements.clone())
    }
}

/// Shell that records lines and exits with a fixed code.
struct RecordingShell {
    exit_code: i32,
    lines: Arc<Mutex<Vec<String>>>,
    sessions: AtomicUsize,
}

impl RecordingShell {
    fn new(exit_code: i32) -> Arc<Self> {
        Arc::new(Self {
            exit_code,
            lines: Arc::new(Mutex::new(Vec::new())),
            sessions: AtomicUsize::new(0),
        })
    }
}

struct RecordingSession {
    exit_code: i32,
    lines: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Shell for RecordingShell {
    async fn open(&self) -> PilotResult<Box<dyn ShellSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            exit_code: self.exit_code,
            lines: self.lines.clone(),
        }))
    }
}

#[async_trait]
impl ShellSession for RecordingSession {
    async fn send_line(&mut self, line: &str) -> PilotResult<()> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn close(self: Box<Self>) -> PilotResult<ShellOutput> {
        Ok(ShellOutput {
            stdout: String::new(),
            exit_code: self.exit_code,
        })
    }
}

fn chat_screen() -> AppContext {
    AppContext {
        package: "com.whatsapp".into(),
        screen: "com.whatsapp.Conversation".into(),
        app_name: "WhatsApp".into(),
        screen_description: "Chat Conversation".into(),
    }
}

fn orchestrator(screen: Screen, model: Arc<CannedModel>) -> Orchestrator {
    let mut registry = ProviderRegistry::new("canned".into());
    registry.register(model);
    let screen = Arc::new(screen);
    Orchestrator::new(
        Arc::new(CommandCache::in_memory()),
        screen.clone(),
        screen,
        Arc::new(GenerativeClient::new(Arc::new(registry))),
        EventSink::discard(),
    )
}

#[tokio::test]
async fn go_back_needs_no_model() {
    let model = CannedModel::new("input keyevent 3", Duration::ZERO);
    let orch = orchestrator(
        Screen {
            context: None,
            elements: Vec::new(),
        },
        model.clone(),
    );
    let res = orch.resolve("Go back").await.unwrap();
    assert_eq!(res.source, ResolutionSource::Pattern);
    assert_eq!(res.script.steps(), &[Step::key(KEYCODE_BACK)]);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn search_pizza_builds_five_steps() {
    let search = UIElement {
        resource_id: "com.android.chrome:id/search_box_text".into(),
        clickable: true,
        center_x: 540,
        center_y: 200,
        ..Default::default()
    };
    let orch = orchestrator(
        Screen {
            context: None,
            elements: vec![search],
        },
        CannedModel::new("", Duration::ZERO),
    );
    let res = orch.resolve("search pizza").await.unwrap();
    let steps = res.script.steps();
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[0], Step::tap(540, 200));
    assert!(matches!(steps[1], Step::Wait { .. }));
    assert_eq!(steps[2], Step::type_text("pizza"));
    assert!(matches!(steps[3], Step::Wait { .. }));
    assert_eq!(steps[4], Step::key(KEYCODE_ENTER));
}

#[tokio::test]
async fn repeated_instruction_is_served_from_cache() {
    let model = CannedModel::new("input tap 300 900", Duration::from_millis(50));
    let orch = orchestrator(
        Screen {
            context: Some(chat_screen()),
            elements: Vec::new(),
        },
        model.clone(),
    );

    let first = orch.resolve("like the last photo").await.unwrap();
    let second = orch.resolve("like the last photo").await.unwrap();
    assert_eq!(first.source, ResolutionSource::Generative);
    assert_eq!(second.source, ResolutionSource::Cache);
    assert!(second.elapsed < first.elapsed);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn destructive_generation_is_rejected_whole() {
    let model = CannedModel::new("input keyevent 4\nsleep 1\nrm -rf /", Duration::ZERO);
    let orch = orchestrator(
        Screen {
            context: Some(chat_screen()),
            elements: Vec::new(),
        },
        model,
    );
    let err = orch.resolve("tidy up storage").await.unwrap_err();
    assert!(matches!(err, PilotError::GenerationRejected(_)));
    assert!(orch.cache().is_empty());
}

#[tokio::test]
async fn always_failing_script_runs_ceiling_plus_one_times() {
    let shell = RecordingShell::new(2);
    let (sink, mut rx) = EventSink::channel();
    let cfg = ExecutionConfig {
        step_delay_ms: 0,
        retry_backoff_ms: 0,
        max_retries: 2,
        ..Default::default()
    };
    let engine = ExecutionEngine::new(shell.clone(), cfg, sink);
    let script: ActionScript = "input keyevent 4".parse().unwrap();

    assert!(engine.execute_with_retry(&script).await.is_err());
    assert_eq!(shell.sessions.load(Ordering::SeqCst), 3);
    assert_eq!(shell.lines.lock().unwrap().len(), 3);

    let mut retries = 0;
    let mut terminal = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            PilotEvent::Retry { .. } => retries += 1,
            e if e.is_terminal() => terminal += 1,
            _ => {}
        }
    }
    assert_eq!(retries, 2);
    assert_eq!(terminal, 1);
}
