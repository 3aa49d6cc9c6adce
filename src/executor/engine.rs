use std::sync::Arc;
use std::time::Duration;

use crate::config::ExecutionConfig;
use crate::errors::{PilotError, PilotResult};
use crate::events::{EventSink, PilotEvent};
use crate::script::{ActionScript, Step};
use crate::shell::Shell;

/// Runs action scripts step by step over a single privileged shell session.
///
/// Each public entry point reports ordered progress on the event sink followed
/// by exactly one terminal `Completed` or `Failed` event, and returns the same
/// outcome to the caller.
pub struct ExecutionEngine {
    shell: Arc<dyn Shell>,
    cfg: ExecutionConfig,
    events: EventSink,
}

impl ExecutionEngine {
    pub fn new(shell: Arc<dyn Shell>, cfg: ExecutionConfig, events: EventSink) -> Self {
        Self { shell, cfg, events }
    }

    fn in_envelope(&self, x: i32, y: i32) -> bool {
        x > 0 && x < self.cfg.screen_width && y > 0 && y < self.cfg.screen_height
    }

    /// One pass over the script; no terminal event.
    async fn attempt(&self, script: &ActionScript) -> PilotResult<String> {
        if script.is_empty() {
            return Ok(String::new());
        }
        let total = script.len();
        let step_delay = Duration::from_millis(self.cfg.step_delay_ms);
        let mut session = self.shell.open().await?;

        for (i, step) in script.steps().iter().enumerate() {
            let line = step.to_string();
            self.events.progress(format!("Step {}/{}: {}", i + 1, total, line));

            match step {
                Step::Wait { millis } => {
                    tokio::time::sleep(Duration::from_millis(*millis)).await;
                }
                Step::Tap { x, y } if !self.in_envelope(*x, *y) => {
                    self.events.warning(format!("Skipped invalid coordinates: ({x}, {y})"));
                }
                _ => {
                    session.send_line(&line).await?;
                    tokio::time::sleep(step_delay).await;
                }
            }
        }

        let output = session.close().await?;
        if !output.success() {
            return Err(PilotError::ExecutionStepFailed(format!(
                "shell exited with {}: {}",
                output.exit_code,
                output.stdout.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// Re-runs the whole script after retryable failures, up to `max_retries` extra attempts.
    async fn attempt_with_retry(&self, script: &ActionScript) -> PilotResult<String> {
        let ceiling = self.cfg.max_retries;
        let backoff = Duration::from_millis(self.cfg.retry_backoff_ms);
        let mut attempt = 0;

        loop {
            match self.attempt(script).await {
                Ok(out) => return Ok(out),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= ceiling => {
                    return Err(PilotError::ExecutionStepFailed(format!(
                        "Failed after {ceiling} retries: {e}"
                    )));
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(attempt, ceiling, error = %e, "execution failed, retrying");
                    self.events.emit(PilotEvent::Retry { attempt, ceiling });
                    self.events.progress(format!("Retry attempt {attempt}/{ceiling}"));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn bounded<F>(&self, fut: F) -> PilotResult<String>
    where
        F: std::future::Future<Output = PilotResult<String>>,
    {
        let deadline = Duration::from_millis(self.cfg.timeout_ms);
        // Dropping the timed-out future drops the session, which kills the shell process.
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.cfg.timeout_ms, "execution deadline exceeded");
                Err(PilotError::ExecutionTimeout(self.cfg.timeout_ms))
            }
        }
    }

    fn finish(&self, result: PilotResult<String>) -> PilotResult<String> {
        match &result {
            Ok(output) => {
                tracing::info!(bytes = output.len(), "script completed");
                self.events.emit(PilotEvent::Completed { output: output.clone() });
            }
            Err(e) => {
                tracing::error!(error = %e, "script failed");
                self.events.emit(PilotEvent::Failed { error: e.to_string() });
            }
        }
        result
    }

    pub async fn execute(&self, script: &ActionScript) -> PilotResult<String> {
        let result = self.attempt(script).await;
        self.finish(result)
    }

    pub async fn execute_with_retry(&self, script: &ActionScript) -> PilotResult<String> {
        let result = self.attempt_with_retry(script).await;
        self.finish(result)
    }

    pub async fn execute_with_timeout(&self, script: &ActionScript) -> PilotResult<String> {
        let result = self.bounded(self.attempt(script)).await;
        self.finish(result)
    }

    /// Retry wrapper inside the timeout wrapper; the deadline covers every attempt.
    pub async fn run_guarded(&self, script: &ActionScript) -> PilotResult<String> {
        let result = self.bounded(self.attempt_with_retry(script)).await;
        self.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedShell;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn fast_cfg() -> ExecutionConfig {
        ExecutionConfig {
            step_delay_ms: 0,
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    fn drain(rx: &mut UnboundedReceiver<PilotEvent>) -> Vec<PilotEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn script(text: &str) -> ActionScript {
        text.parse().unwrap()
    }

    #[tokio::test]
    async fn runs_steps_in_order_over_one_session() {
        let shell = Arc::new(ScriptedShell::with_output("ok\n"));
        let (sink, mut rx) = EventSink::channel();
        let engine = ExecutionEngine::new(shell.clone(), fast_cfg(), sink);

        let out = engine
            .execute(&script("input tap 540 200\nsleep 0\ninput text 'pizza'\ninput keyevent 66"))
            .await
            .unwrap();
        assert_eq!(out, "ok\n");
        assert_eq!(shell.sessions(), 1);
        assert_eq!(
            shell.sent_lines(),
            vec!["input tap 540 200", "input text 'pizza'", "input keyevent 66"]
        );

        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            PilotEvent::Progress { message: "Step 1/4: input tap 540 200".into() }
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(matches!(events.last(), Some(PilotEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn out_of_envelope_taps_are_skipped_with_warning() {
        let shell = Arc::new(ScriptedShell::with_output(""));
        let (sink, mut rx) = EventSink::channel();
        let engine = ExecutionEngine::new(shell.clone(), fast_cfg(), sink);

        engine
            .execute(&script("input tap 5000 200\ninput tap 0 10\ninput keyevent 4"))
            .await
            .unwrap();
        assert_eq!(shell.sent_lines(), vec!["input keyevent 4"]);
        let warnings = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, PilotEvent::Warning { .. }))
            .count();
        assert_eq!(warnings, 2);
    }

    #[tokio::test]
    async fn non_zero_exit_fails_the_step() {
        let shell = Arc::new(ScriptedShell::failing(1));
        let engine = ExecutionEngine::new(shell, fast_cfg(), EventSink::discard());
        let err = engine.execute(&script("input keyevent 4")).await.unwrap_err();
        assert!(matches!(err, PilotError::ExecutionStepFailed(_)));
    }

    #[tokio::test]
    async fn retry_runs_ceiling_plus_one_attempts() {
        let shell = Arc::new(ScriptedShell::failing(1));
        let (sink, mut rx) = EventSink::channel();
        let engine = ExecutionEngine::new(shell.clone(), fast_cfg(), sink);

        let err = engine
            .execute_with_retry(&script("input keyevent 4"))
            .await
            .unwrap_err();
        assert_eq!(shell.sessions(), 4);
        assert!(err.to_string().contains("Failed after 3 retries"));

        let events = drain(&mut rx);
        let retries: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                PilotEvent::Retry { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![1, 2, 3]);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn retry_stops_on_success() {
        let shell = Arc::new(ScriptedShell::sequence(&[("", 1), ("done", 0)]));
        let engine = ExecutionEngine::new(shell.clone(), fast_cfg(), EventSink::discard());
        let out = engine.execute_with_retry(&script("input keyevent 3")).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(shell.sessions(), 2);
    }

    #[tokio::test]
    async fn timeout_cancels_and_is_not_retried() {
        let shell = Arc::new(ScriptedShell::with_output("").delayed(Duration::from_millis(500)));
        let (sink, mut rx) = EventSink::channel();
        let cfg = ExecutionConfig {
            timeout_ms: 30,
            ..fast_cfg()
        };
        let engine = ExecutionEngine::new(shell.clone(), cfg, sink);

        let err = engine.run_guarded(&script("input keyevent 4")).await.unwrap_err();
        assert!(matches!(err, PilotError::ExecutionTimeout(30)));
        assert_eq!(shell.sessions(), 1);
        assert!(matches!(drain(&mut rx).last(), Some(PilotEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn wait_steps_do_not_touch_the_shell() {
        let shell = Arc::new(ScriptedShell::with_output(""));
        let engine = ExecutionEngine::new(shell.clone(), fast_cfg(), EventSink::discard());
        engine.execute_with_timeout(&script("sleep 0.01")).await.unwrap();
        assert!(shell.sent_lines().is_empty());
    }
}
