/// Rule engine: lifecycle, rule registry and tick scheduler in one owner.
///
/// The engine is either disabled (the initial state, and after returning to the
/// lobby) or enabled (after login). Enabling reloads the rule set:
///   1. clear the active rules and every reset hook
///   2. load `<subject class>` descriptors, then `common`
///   3. decode each descriptor and instantiate its rule
///   4. swap the new set in
///
/// A bad descriptor is logged and skipped; the rest still load.
///
/// `run` drives an `Engine` from one tokio task: a fixed interval calls `tick`,
/// and `EngineCommand`s arrive on a channel in the same `select!` loop, so a
/// reload can never interleave with a tick.
use crate::{
    descriptor::RuleSpec,
    loader::{RuleSource, COMMON_SCOPE},
    model::Timestamp,
    notify::Notifier,
    rules::{panic_message, Rule, RuleContext},
    world::GameState,
};
use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    state:    Arc<dyn GameState>,
    notifier: Arc<dyn Notifier>,
    source:   Box<dyn RuleSource>,
    enabled:  bool,
    rules:    Vec<Rule>,
}

impl Engine {
    pub fn new(
        state:    Arc<dyn GameState>,
        notifier: Arc<dyn Notifier>,
        source:   Box<dyn RuleSource>,
    ) -> Self {
        Self { state, notifier, source, enabled: false, rules: Vec::new() }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Login: start notifying and load the rules for the current subject.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.reload();
    }

    /// Back to lobby: stop notifying. The loaded rules stay in place.
    pub fn disable(&mut self) {
        self.enabled = false;
        tracing::info!("Engine disabled");
    }

    pub fn reload(&mut self) {
        self.rules.clear();
        self.state.clear_reset_hooks();

        let mut scopes = Vec::with_capacity(2);
        match self.state.subject() {
            Some(subject) => scopes.push(subject.class.to_ascii_lowercase()),
            None => tracing::warn!("Reload without a subject — loading common rules only"),
        }
        scopes.push(COMMON_SCOPE.to_owned());

        let mut rules = Vec::new();
        for scope in &scopes {
            self.load_scope(scope, &mut rules);
        }
        self.rules = rules;

        tracing::info!("Loaded {} rule(s) from scopes {:?}", self.rules.len(), scopes);
    }

    fn load_scope(&self, scope: &str, rules: &mut Vec<Rule>) {
        let descriptors = match self.source.load(scope) {
            Ok(Some(d)) => d,
            Ok(None) => return,
            Err(e) => {
                tracing::error!("Could not load rules for scope '{}': {}", scope, e);
                return;
            }
        };

        for descriptor in descriptors {
            match RuleSpec::try_from(&descriptor) {
                Ok(spec) => {
                    rules.push(Rule::instantiate(spec, self.state.as_ref(), Arc::clone(&self.notifier)));
                }
                Err(e) => {
                    let json = serde_json::to_string(&descriptor).unwrap_or_else(|_| format!("{:?}", descriptor));
                    tracing::error!("Skipping rule in scope '{}': {} — rule: {}", scope, e, json);
                }
            }
        }
    }

    /// Evaluate every active rule once. Does nothing while disabled.
    pub fn tick(&mut self, now_ms: Timestamp) {
        if !self.enabled {
            return;
        }

        let ctx = RuleContext {
            state:    self.state.as_ref(),
            notifier: self.notifier.as_ref(),
            now_ms,
        };
        for rule in self.rules.iter_mut() {
            // Targets are isolated inside `check`; this catches failures around them.
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| rule.check(&ctx))) {
                tracing::error!("Rule {:?} failed: {}", rule, panic_message(payload.as_ref()));
            }
        }
    }

    /// Release the rule set and every reset hook.
    pub fn dispose(&mut self) {
        self.enabled = false;
        self.rules.clear();
        self.state.clear_reset_hooks();
        tracing::info!("Engine disposed");
    }
}

// ---------------------------------------------------------------------------
// Async driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Login,
    ReturnToLobby,
    Reload,
    Shutdown,
}

pub fn wall_clock_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

pub async fn run(mut engine: Engine, mut cmd_rx: Receiver<EngineCommand>, tick: Duration) -> Result<()> {
    let mut interval = tokio::time::interval(tick);
    // A slow tick delays the next one instead of bursting to catch up
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Engine running — tick every {:?}", tick);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(EngineCommand::Login) => {
                        tracing::info!("Login — enabling engine");
                        engine.enable();
                    }
                    Some(EngineCommand::ReturnToLobby) => engine.disable(),
                    Some(EngineCommand::Reload) => {
                        if engine.is_enabled() {
                            engine.reload();
                        } else {
                            tracing::debug!("Reload requested while disabled — deferred to next login");
                        }
                    }
                    Some(EngineCommand::Shutdown) | None => break,
                }
            }

            _ = interval.tick() => engine.tick(wall_clock_ms()),
        }
    }

    engine.dispose();
    Ok(())
}

/// Handle to an engine running on its own task.
pub struct EngineHandle {
    tx:   Sender<EngineCommand>,
    task: JoinHandle<Result<()>>,
}

pub fn spawn(engine: Engine, tick: Duration) -> EngineHandle {
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(run(engine, rx, tick));
    EngineHandle { tx, task }
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("Engine task has stopped"))
    }

    /// Sender for collaborators that trigger commands themselves (e.g. the rule watcher).
    pub fn sender(&self) -> Sender<EngineCommand> {
        self.tx.clone()
    }

    /// Stop the tick timer and release the rule set.
    pub async fn dispose(self) -> Result<()> {
        // The task may already be gone; joining still reports its outcome
        let _ = self.tx.send(EngineCommand::Shutdown).await;
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("Engine task error: {}", e))?
    }
}
