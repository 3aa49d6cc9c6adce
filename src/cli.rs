use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::events::PilotEvent;

/// Turns spoken-style instructions into UI actions over a rooted shell.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "rootpilot")]
pub struct Cli {
    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handle one instruction end to end
    Run {
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,
    },
    /// Resolve an instruction to a script without executing it
    Resolve {
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,
    },
    /// Read instructions from stdin, one per line, handling each concurrently
    Listen,
    /// Inspect or maintain the command cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Entry count and total uses
    Stats,
    /// Drop rarely used entries older than the configured age
    Evict {
        /// Overrides cache.max_age_days
        #[arg(long)]
        max_age_days: Option<u32>,
        /// Overrides cache.min_uses
        #[arg(long)]
        min_uses: Option<u32>,
    },
    /// Remove every entry (reseeding defaults when configured)
    Clear,
}

pub fn join_instruction(words: &[String]) -> String {
    words.join(" ")
}

/// One terminal line per event.
pub fn render_event(event: &PilotEvent) -> String {
    match event {
        PilotEvent::SkillSelected { skill } => format!("[skill] {skill}"),
        PilotEvent::Resolved {
            source,
            elapsed_ms,
            rule,
        } => match rule {
            Some(rule) => format!("[resolved] {source} ({rule}) in {elapsed_ms} ms"),
            None => format!("[resolved] {source} in {elapsed_ms} ms"),
        },
        PilotEvent::Progress { message } => format!("  {message}"),
        PilotEvent::Warning { message } => format!("[warn] {message}"),
        PilotEvent::Retry { attempt, ceiling } => format!("[retry] {attempt}/{ceiling}"),
        PilotEvent::Completed { output } if output.trim().is_empty() => "[done]".to_string(),
        PilotEvent::Completed { output } => format!("[done] {}", output.trim_end()),
        PilotEvent::Failed { error } => format!("[failed] {error}"),
        PilotEvent::Log { message } => message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionSource;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["rootpilot", "--config", "/tmp/c.toml", "run", "go", "back"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Command::Run { instruction } => assert_eq!(join_instruction(&instruction), "go back"),
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::try_parse_from(["rootpilot", "cache", "evict", "--min-uses", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Evict {
                    max_age_days: None,
                    min_uses: Some(3)
                }
            }
        ));
        assert!(Cli::try_parse_from(["rootpilot", "run"]).is_err());
    }

    #[test]
    fn renders_events() {
        let line = render_event(&PilotEvent::Resolved {
            source: ResolutionSource::Pattern,
            elapsed_ms: 4,
            rule: Some("navigation".into()),
        });
        assert_eq!(line, "[resolved] pattern (navigation) in 4 ms");
        assert_eq!(render_event(&PilotEvent::Completed { output: "\n".into() }), "[done]");
    }
}
