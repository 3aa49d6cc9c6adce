//! The external shell facility: a privileged, newline-driven command session.
pub mod process;

use async_trait::async_trait;

use crate::errors::PilotResult;

pub use process::ProcessShell;

/// Combined stdout and exit status of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub exit_code: i32,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One live shell process. Dropping a session before `close` must destroy it.
#[async_trait]
pub trait ShellSession: Send {
    async fn send_line(&mut self, line: &str) -> PilotResult<()>;

    /// Ends the session and collects everything it printed.
    async fn close(self: Box<Self>) -> PilotResult<ShellOutput>;
}

#[async_trait]
pub trait Shell: Send + Sync {
    async fn open(&self) -> PilotResult<Box<dyn ShellSession>>;

    /// Runs a single command line or newline-delimited sequence in a fresh session.
    async fn run(&self, command: &str) -> PilotResult<ShellOutput> {
        let mut session = self.open().await?;
        for line in command.lines().map(str::trim).filter(|l| !l.is_empty()) {
            session.send_line(line).await?;
        }
        session.close().await
    }
}
