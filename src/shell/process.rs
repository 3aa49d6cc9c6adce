use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

use crate::config::ShellConfig;
use crate::errors::{PilotError, PilotResult};
use crate::shell::{Shell, ShellOutput, ShellSession};

/// Spawns `program args…` and feeds it commands on stdin (e.g. `su`, `sh`, `adb shell`).
#[derive(Debug, Clone)]
pub struct ProcessShell {
    program: String,
    args: Vec<String>,
}

impl ProcessShell {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(cfg: &ShellConfig) -> Self {
        Self::new(cfg.program.clone(), cfg.args.clone())
    }
}

#[async_trait]
impl Shell for ProcessShell {
    async fn open(&self) -> PilotResult<Box<dyn ShellSession>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PilotError::Shell(format!("failed to spawn {}: {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PilotError::Shell("child stdin unavailable".into()))?;

        tracing::debug!(program = %self.program, pid = ?child.id(), "shell session opened");
        Ok(Box::new(ProcessSession { child, stdin }))
    }
}

struct ProcessSession {
    child: Child,
    stdin: ChildStdin,
}

#[async_trait]
impl ShellSession for ProcessSession {
    async fn send_line(&mut self, line: &str) -> PilotResult<()> {
        tracing::trace!(%line, "shell <<");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> PilotResult<ShellOutput> {
        let ProcessSession { child, mut stdin } = *self;
        // A broken pipe here means the shell already exited; its status still tells the story.
        if let Err(e) = stdin.write_all(b"exit\n").await {
            tracing::debug!(error = %e, "shell closed stdin early");
        }
        drop(stdin);

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);
        if !output.stderr.is_empty() {
            tracing::debug!(stderr = %String::from_utf8_lossy(&output.stderr), "shell stderr");
        }
        tracing::debug!(exit_code, bytes = stdout.len(), "shell session closed");
        Ok(ShellOutput { stdout, exit_code })
    }
}
