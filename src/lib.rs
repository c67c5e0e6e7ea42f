pub mod conditions;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod notify;
pub mod rules;
pub mod state;
pub mod targets;
pub mod watcher;
pub mod world;

#[cfg(test)]
mod testing;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver};
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    engine::{Engine, EngineCommand},
    loader::DirRuleSource,
    notify::{ChannelNotifier, LogNotifier, Notification, Notifier},
    state::SharedState,
};

/// Logging to a daily rolling file plus a panic hook that routes panics
/// through tracing. Keep the guard alive for the process lifetime; dropping
/// it flushes the writer.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "battle-notify.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("battle_notify=debug".parse()?),
        )
        .with_writer(non_blocking)
        .with_ansi(false) // log files should not contain ANSI colour codes
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging init failed: {}", e))?;

    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = rules::panic_message(info.payload());
        tracing::error!("PANIC at {}: {}", location, message);
    }));

    Ok(guard)
}

/// Drains the notification channel into the log. Stands in for the UI layer.
async fn forward_notifications(mut rx: Receiver<Notification>) {
    let sink = LogNotifier;
    while let Some(notification) = rx.recv().await {
        if let Ok(json) = serde_json::to_string(&notification) {
            tracing::debug!("Notification payload: {}", json);
        }
        sink.notify(notification);
    }
}

/// Standalone host with an empty in-process store.
pub async fn run() -> Result<()> {
    run_with_state(SharedState::default()).await
}

/// Wire config, rule source, notifier and engine around `state`, then run
/// until ctrl-c. An embedding host feeds `state` from its own game events.
pub async fn run_with_state(state: SharedState) -> Result<()> {
    let config_dir = config::config_dir();
    let cfg = config::load_or_init(&config_dir)?;

    let _guard = init_logging(&cfg.log_path(&config_dir))?;
    tracing::info!("battle-notify starting — config dir {}", config_dir.display());

    let rules_dir = cfg.rules_path(&config_dir);
    if let Err(e) = loader::install_bundled(&rules_dir) {
        tracing::warn!("Could not install sample rules into {:?}: {}", rules_dir, e);
    }

    let (note_tx, note_rx) = mpsc::channel::<Notification>(cfg.notification_buffer.max(1));
    let sink = tokio::spawn(forward_notifications(note_rx));

    let engine = Engine::new(
        Arc::new(state),
        Arc::new(ChannelNotifier::new(note_tx)),
        Box::new(DirRuleSource::new(&rules_dir)),
    );
    let handle = engine::spawn(engine, cfg.tick());

    let watcher = if cfg.watch_rules {
        Some(watcher::spawn(rules_dir.clone(), handle.sender()))
    } else {
        None
    };

    handle.send(EngineCommand::Login).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    handle.dispose().await?;
    // Engine dropped its notifier; the sink drains and ends
    if let Err(e) = sink.await {
        tracing::error!("Notification sink task error: {}", e);
    }
    if let Some(watcher) = watcher {
        match watcher.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Rule watcher failed: {}", e),
            Err(e)     => tracing::error!("Rule watcher task error: {}", e),
        }
    }

    tracing::info!("battle-notify stopped");
    Ok(())
}
