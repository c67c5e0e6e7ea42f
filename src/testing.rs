//! Shared test fixtures

pub use crate::state::SharedState as State;

use crate::{
    model::Timestamp,
    notify::{ChannelNotifier, Notification},
    rules::RuleContext,
};
use tokio::sync::mpsc::{self, Receiver};

pub fn notifier() -> (ChannelNotifier, Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(64);
    (ChannelNotifier::new(tx), rx)
}

pub fn context<'a>(state: &'a State, notifier: &'a ChannelNotifier, now_ms: Timestamp) -> RuleContext<'a> {
    RuleContext { state, notifier, now_ms }
}

pub fn drain(rx: &mut Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
