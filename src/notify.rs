/// Notification sink: where matched rules deliver their configured message.
///
/// Rendering is the host's business; the engine only hands over the payload and
/// the context that matched. Two sinks ship with the crate:
///   ChannelNotifier → forwards into a bounded tokio channel (non-blocking)
///   LogNotifier     → writes each notification to the tracing log
use crate::model::{CooldownObservation, EffectId, EffectObservation, EntityInfo};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{error::TrySendError, Sender};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notification {
    /// A status-effect rule matched on `entity`.
    Effect {
        message:     String,
        entity:      EntityInfo,
        /// Last effect that produced a new match
        effect:      Option<EffectId>,
        observation: Option<EffectObservation>,
    },
    Cooldown {
        message:  String,
        cooldown: CooldownObservation,
    },
    /// A subscribed skill group was reset.
    Reset {
        message:  String,
        cooldown: CooldownObservation,
    },
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Self::Effect   { message, .. } => message,
            Self::Cooldown { message, .. } => message,
            Self::Reset    { message, .. } => message,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

// ---------------------------------------------------------------------------
// ChannelNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<Notification>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Never block a tick on a slow consumer.
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                tracing::warn!("Notification channel full — dropped '{}'", n.message());
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Notification channel closed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Effect { message, entity, effect, .. } => {
                tracing::info!("[effect] {} → {} (effect {:?})", message, entity.name, effect);
            }
            Notification::Cooldown { message, cooldown } => {
                tracing::info!("[cooldown] {} ({})", message, cooldown.id);
            }
            Notification::Reset { message, cooldown } => {
                tracing::info!("[reset] {} ({})", message, cooldown.id);
            }
        }
    }
}
