pub mod abnormal;
pub mod cooldown;
pub mod reset;

use crate::{
    descriptor::RuleSpec,
    error::RuleError,
    model::Timestamp,
    notify::Notifier,
    world::GameState,
};
use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub use abnormal::AbnormalRule;
pub use cooldown::CooldownRule;
pub use reset::ResetRule;

/// Read-only context passed to every rule check for one tick.
pub struct RuleContext<'a> {
    pub state:    &'a dyn GameState,
    pub notifier: &'a dyn Notifier,
    pub now_ms:   Timestamp,
}

impl RuleContext<'_> {
    /// Live combat flag of the subject; `false` before login.
    pub fn in_combat(&self) -> bool {
        self.state.subject().is_some_and(|s| s.combat)
    }

    /// Live enrage flag of the current boss; `false` with no boss.
    pub fn boss_enraged(&self) -> bool {
        self.state.boss().is_some_and(|b| b.enraged)
    }
}

/// One live rule of the active rule set.
#[derive(Debug)]
pub enum Rule {
    Abnormal(AbnormalRule),
    Cooldown(CooldownRule),
    Reset(ResetRule),
}

impl Rule {
    /// Build a live rule. Reset rules subscribe their hook with the store here.
    pub fn instantiate(spec: RuleSpec, state: &dyn GameState, notifier: Arc<dyn Notifier>) -> Self {
        match spec {
            RuleSpec::Abnormal { effects, condition, target, message } => {
                Self::Abnormal(AbnormalRule::new(effects, condition, target, message))
            }
            RuleSpec::Cooldown { targets, condition, message } => {
                Self::Cooldown(CooldownRule::new(targets, condition, message))
            }
            RuleSpec::Reset { skills, message } => {
                Self::Reset(ResetRule::register(&skills, message, state, notifier))
            }
        }
    }

    pub fn check(&mut self, ctx: &RuleContext) {
        match self {
            Self::Abnormal(rule) => rule.check(ctx),
            Self::Cooldown(rule) => rule.check(ctx),
            Self::Reset(rule)    => rule.check(ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one target's evaluation, turning a panic into `RuleError::Evaluation`.
pub(crate) fn isolate(target: impl Display, f: impl FnOnce()) -> Result<(), RuleError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| RuleError::Evaluation {
        target: target.to_string(),
        reason: panic_message(payload.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolate_converts_panics() {
        assert!(isolate("entity 1", || {}).is_ok());

        let err = isolate("entity 2", || panic!("store exploded")).unwrap_err();
        match err {
            RuleError::Evaluation { target, reason } => {
                assert_eq!(target, "entity 2");
                assert_eq!(reason, "store exploded");
            }
            other => panic!("Wrong error: {:?}", other),
        }
    }

    #[test]
    fn formatted_panic_message() {
        let err = isolate(5, || panic!("bad id {}", 5)).unwrap_err();
        assert_eq!(err.to_string(), "evaluation failed for target 5: bad id 5");
    }
}
