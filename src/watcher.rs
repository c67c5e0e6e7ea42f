/// Rules directory watcher: requests a reload when a rule file changes.
///
/// Runs on a blocking thread: `notify` delivers filesystem events over a std
/// channel. A burst of events (editors often write a file several times) is
/// collapsed into one `EngineCommand::Reload`. The watcher stops once the
/// engine's command channel closes.
use crate::engine::EngineCommand;
use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio::task::JoinHandle;

const SETTLE: Duration = Duration::from_millis(250);
const POLL:   Duration = Duration::from_secs(1);

pub fn is_rule_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn is_rule_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
        && event.paths.iter().any(|p| is_rule_file(p))
}

pub fn spawn(rules_dir: PathBuf, tx: Sender<EngineCommand>) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || watch(&rules_dir, tx))
}

pub fn watch(rules_dir: &Path, tx: Sender<EngineCommand>) -> Result<()> {
    tracing::info!("Rule watcher starting: {:?}", rules_dir);

    let (fs_tx, fs_rx) = std_mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(fs_tx, notify::Config::default())?;
    watcher.watch(rules_dir, RecursiveMode::NonRecursive)?;

    loop {
        match fs_rx.recv_timeout(POLL) {
            Ok(Ok(event)) if is_rule_change(&event) => {
                // Swallow the rest of the burst
                while fs_rx.recv_timeout(SETTLE).is_ok() {}

                tracing::info!("Rule files changed ({:?}) — requesting reload", event.paths);
                match tx.try_send(EngineCommand::Reload) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => tracing::warn!("Engine busy — reload request dropped"),
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!("Rule watcher error: {}", e),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::info!("Rule watcher stopped");
    Ok(())
}
