/// Condition factory: turns a rule's `type` string plus parameters into a
/// predicate over one observation.
///
/// A condition is an immutable value. `evaluate` takes the observation, the
/// target's last stored match and the tick context, and returns the new match
/// value or `None`. The only state a rule carries lives in its per-target
/// last-match map, so one condition serves every target of a rule.
///
/// Two families exist:
///   status effects → added, removed, addedorrefreshed, refreshed, expiring,
///                    missing, missingduringcombat
///   cooldowns      → expiring, expiringduringcombat, expiringduringenrage,
///                    ready, readyduringcombat, readyduringenrage
use crate::{
    error::RuleError,
    model::{CooldownObservation, EffectObservation, MatchValue, Timestamp},
    rules::RuleContext,
};
use std::collections::HashSet;

/// Construction parameters shared by both families.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionParams {
    /// Whole seconds-before-expiry values that count as "expiring now"
    pub times_to_match:    HashSet<i64>,
    pub rewarn_timeout_ms: i64,
    /// Stack count that must be exceeded
    pub required_stacks:   u32,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Whole seconds until `expires`, rounded half-up.
fn seconds_remaining(expires: Timestamp, now_ms: Timestamp) -> i64 {
    ((expires - now_ms) as f64 / 1_000.0 + 0.5).floor() as i64
}

fn is_expiring(times: &HashSet<i64>, expires: Timestamp, now_ms: Timestamp) -> bool {
    times.contains(&seconds_remaining(expires, now_ms))
}

/// `now` once more than `rewarn_timeout_ms` has passed since the last match.
fn rewarn_elapsed(now_ms: Timestamp, last_match: MatchValue, rewarn_timeout_ms: i64) -> Option<MatchValue> {
    (now_ms > last_match + rewarn_timeout_ms).then_some(now_ms)
}

/// `0` is the "never matched" sentinel and can never count as a match.
fn non_zero(value: Option<MatchValue>) -> Option<MatchValue> {
    value.filter(|v| *v != 0)
}

// ---------------------------------------------------------------------------
// Status-effect conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum AbnormalCondition {
    Added,
    Removed,
    AddedOrRefreshed { required_stacks: u32 },
    Refreshed { required_stacks: u32 },
    Expiring { times_to_match: HashSet<i64> },
    Missing { rewarn_timeout_ms: i64 },
    MissingDuringCombat { rewarn_timeout_ms: i64 },
}

impl AbnormalCondition {
    pub fn from_kind(kind: &str, params: &ConditionParams) -> Result<Self, RuleError> {
        let condition = match kind.to_ascii_lowercase().as_str() {
            "added"               => Self::Added,
            "removed"             => Self::Removed,
            "addedorrefreshed"    => Self::AddedOrRefreshed { required_stacks: params.required_stacks },
            "refreshed"           => Self::Refreshed { required_stacks: params.required_stacks },
            "expiring"            => Self::Expiring { times_to_match: params.times_to_match.clone() },
            "missing"             => Self::Missing { rewarn_timeout_ms: params.rewarn_timeout_ms },
            "missingduringcombat" => Self::MissingDuringCombat { rewarn_timeout_ms: params.rewarn_timeout_ms },
            _ => {
                return Err(RuleError::UnknownCondition {
                    family: "status effect",
                    kind:   kind.to_owned(),
                })
            }
        };
        Ok(condition)
    }

    /// Rules built on the "missing" family only fire when every configured
    /// effect matches; all others fire on any.
    pub fn requires_all(&self) -> bool {
        matches!(self, Self::Missing { .. } | Self::MissingDuringCombat { .. })
    }

    /// `obs` is `None` when the store has nothing for this (entity, effect) pair;
    /// that reads as an observation with no stacks and no timestamps.
    pub fn evaluate(
        &self,
        obs:        Option<&EffectObservation>,
        last_match: MatchValue,
        ctx:        &RuleContext,
    ) -> Option<MatchValue> {
        let obs = obs.copied().unwrap_or_default();
        let now = ctx.now_ms;

        let value = match self {
            Self::Added   => obs.added,
            Self::Removed => obs.removed,

            Self::AddedOrRefreshed { required_stacks } => {
                if obs.stacks > *required_stacks { obs.last_applied() } else { None }
            }

            Self::Refreshed { required_stacks } => {
                if obs.stacks > *required_stacks { obs.refreshed } else { None }
            }

            // Changes every tick while inside the window, so each matching
            // second is a fresh match.
            Self::Expiring { times_to_match } => {
                let expires = obs.expires.unwrap_or(0);
                if is_expiring(times_to_match, expires, now) {
                    obs.last_applied().map(|applied| applied + (expires - now))
                } else {
                    None
                }
            }

            Self::Missing { rewarn_timeout_ms } => {
                if obs.added.is_some() || obs.refreshed.is_some() {
                    None
                } else {
                    rewarn_elapsed(now, last_match, *rewarn_timeout_ms)
                }
            }

            Self::MissingDuringCombat { rewarn_timeout_ms } => {
                if obs.added.is_some() || obs.refreshed.is_some() || !ctx.in_combat() {
                    None
                } else {
                    rewarn_elapsed(now, last_match, *rewarn_timeout_ms)
                }
            }
        };
        non_zero(value)
    }
}

// ---------------------------------------------------------------------------
// Cooldown conditions
// ---------------------------------------------------------------------------

/// Extra requirement checked before a cooldown condition is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    Combat,
    /// Boss enraged while the subject is in combat.
    Enrage,
}

impl Gate {
    fn is_open(self, ctx: &RuleContext) -> bool {
        match self {
            Self::Always => true,
            Self::Combat => ctx.in_combat(),
            Self::Enrage => ctx.boss_enraged() && ctx.in_combat(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CooldownCondition {
    Expiring { times_to_match: HashSet<i64>, gate: Gate },
    Ready { rewarn_timeout_ms: i64, gate: Gate },
}

impl CooldownCondition {
    pub fn from_kind(kind: &str, params: &ConditionParams) -> Result<Self, RuleError> {
        let expiring = |gate| Self::Expiring { times_to_match: params.times_to_match.clone(), gate };
        let ready    = |gate| Self::Ready { rewarn_timeout_ms: params.rewarn_timeout_ms, gate };

        let condition = match kind.to_ascii_lowercase().as_str() {
            "expiring"             => expiring(Gate::Always),
            "expiringduringcombat" => expiring(Gate::Combat),
            "expiringduringenrage" => expiring(Gate::Enrage),
            "ready"                => ready(Gate::Always),
            "readyduringcombat"    => ready(Gate::Combat),
            "readyduringenrage"    => ready(Gate::Enrage),
            _ => {
                return Err(RuleError::UnknownCondition {
                    family: "cooldown",
                    kind:   kind.to_owned(),
                })
            }
        };
        Ok(condition)
    }

    pub fn evaluate(
        &self,
        obs:        &CooldownObservation,
        last_match: MatchValue,
        ctx:        &RuleContext,
    ) -> Option<MatchValue> {
        let now     = ctx.now_ms;
        let expires = obs.expires;

        let value = match self {
            Self::Expiring { times_to_match, gate } => {
                if gate.is_open(ctx) && is_expiring(times_to_match, expires, now) {
                    // Works out to `now`; one match per tick inside the window.
                    Some(expires - (expires - now))
                } else {
                    None
                }
            }

            Self::Ready { rewarn_timeout_ms, gate } => {
                if gate.is_open(ctx) && now > expires {
                    rewarn_elapsed(now, last_match, *rewarn_timeout_ms)
                } else {
                    None
                }
            }
        };
        non_zero(value)
    }
}
