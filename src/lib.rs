pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod contacts;
pub mod errors;
pub mod events;
pub mod executor;
pub mod generation;
pub mod llm;
pub mod patterns;
pub mod perception;
pub mod resolver;
pub mod script;
pub mod shell;
pub mod skills;

#[cfg(test)]
mod testing;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::app::Pilot;
use crate::cache::CommandCache;
use crate::cli::{render_event, CacheAction, Cli, Command};
use crate::config::AppConfig;
use crate::errors::PilotResult;
use crate::events::{EventSink, PilotEvent};

pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = match config::load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) if cli.config.is_some() => {
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!(error = %e, "no usable config.toml; using built-in defaults");
            AppConfig::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli.command, config)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "rootpilot failed");
            ExitCode::FAILURE
        }
    }
}

/// Prints events until every sink clone is dropped.
fn spawn_printer(mut rx: mpsc::UnboundedReceiver<PilotEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", render_event(&event));
        }
    })
}

async fn execute(command: Command, config: AppConfig) -> PilotResult<bool> {
    match command {
        Command::Cache { action } => Ok(maintain_cache(action, &config)),
        Command::Resolve { instruction } => {
            let pilot = Pilot::build(config, EventSink::discard()).await;
            let resolution = pilot
                .orchestrator
                .resolve(&cli::join_instruction(&instruction))
                .await?;
            println!("# source: {} ({} ms)", resolution.source, resolution.elapsed_ms());
            if let Some(rule) = &resolution.rule {
                println!("# rule: {rule}");
            }
            println!("{}", resolution.script);
            Ok(true)
        }
        Command::Run { instruction } => {
            let (sink, rx) = EventSink::channel();
            let printer = spawn_printer(rx);
            let pilot = Pilot::build(config, sink).await;
            let dispatch = pilot.skills.dispatch(&cli::join_instruction(&instruction)).await;
            // The registry holds the last sink; dropping it ends the printer.
            drop(pilot);
            let _ = printer.await;
            Ok(dispatch.is_success())
        }
        Command::Listen => listen(config).await,
    }
}

async fn listen(config: AppConfig) -> PilotResult<bool> {
    let (sink, rx) = EventSink::channel();
    let printer = spawn_printer(rx);
    let pilot = Pilot::build(config, sink).await;
    let skills = pilot.skills.clone();
    let warmer = pilot.warmer.clone();
    drop(pilot);

    // Warming never delays an instruction and is abandoned at end of input.
    let mut background = JoinSet::new();
    let (handled_tx, mut handled_rx) = mpsc::unbounded_channel::<()>();
    if let Some(warmer) = warmer {
        let startup = warmer.clone();
        background.spawn(async move {
            startup.warm_up().await;
        });
        background.spawn(async move {
            while handled_rx.recv().await.is_some() {
                while handled_rx.try_recv().is_ok() {}
                warmer.preload_current().await;
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    tracing::info!("listening for instructions on stdin");
    while let Some(line) = lines.next_line().await? {
        let instruction = line.trim().to_string();
        if instruction.is_empty() {
            continue;
        }
        let skills = Arc::clone(&skills);
        let handled = handled_tx.clone();
        tasks.spawn(async move {
            let ok = skills.dispatch(&instruction).await.is_success();
            if ok {
                let _ = handled.send(());
            }
            ok
        });
    }

    let mut all_ok = true;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(ok) => all_ok &= ok,
            Err(e) => {
                tracing::error!(error = %e, "instruction task aborted");
                all_ok = false;
            }
        }
    }
    drop(handled_tx);
    background.shutdown().await;
    drop(skills);
    let _ = printer.await;
    Ok(all_ok)
}

fn maintain_cache(action: CacheAction, config: &AppConfig) -> bool {
    let cache = CommandCache::open(&config.cache);
    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("entries: {}", stats.count);
            println!("total uses: {}", stats.total_uses);
            println!("path: {}", config.cache.resolved_path().display());
        }
        CacheAction::Evict {
            max_age_days,
            min_uses,
        } => {
            let days = max_age_days.unwrap_or(config.cache.max_age_days);
            let min_uses = min_uses.unwrap_or(config.cache.min_uses);
            let removed = cache.evict_stale(chrono::Duration::days(i64::from(days)), min_uses);
            println!("evicted {removed} entries, {} remain", cache.len());
        }
        CacheAction::Clear => {
            cache.clear();
            if config.cache.seed_defaults {
                cache.seed_defaults();
            }
            println!("cache cleared, {} entries remain", cache.len());
        }
    }
    true
}
