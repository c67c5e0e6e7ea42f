/// Snapshot types read from the external stores on every tick.
///
/// Every timestamp is epoch milliseconds. Observations are plain `Copy` values:
/// the engine never holds on to a store's internal state between ticks.
use serde::{Deserialize, Serialize};
use std::fmt;

pub type EntityId  = u64;
pub type EffectId  = u32;
pub type Timestamp = i64;

/// Value returned by a matching condition. Doubles as the stored "last match"
/// of a rule target, so `0` is reserved for "never matched".
pub type MatchValue = i64;

/// Skills are grouped by id range; reset hooks subscribe to whole groups.
pub const SKILL_GROUP_DIVISOR: u32 = 10_000;

pub fn skill_group(skill_id: u32) -> u32 {
    skill_id / SKILL_GROUP_DIVISOR
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// The monitored player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id:     EntityId,
    /// Class name, used as the rule scope on reload (e.g. "warrior")
    pub class:  String,
    pub combat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boss {
    pub id:      EntityId,
    pub enraged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id:   EntityId,
    pub name: String,
    pub dead: bool,
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Most recent state of one status effect on one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectObservation {
    pub effect:    EffectId,
    pub stacks:    u32,
    pub added:     Option<Timestamp>,
    pub refreshed: Option<Timestamp>,
    pub expires:   Option<Timestamp>,
    /// Only populated by stores that report removals.
    pub removed:   Option<Timestamp>,
}

impl EffectObservation {
    /// Refresh time if the effect was refreshed, otherwise the time it was added.
    pub fn last_applied(&self) -> Option<Timestamp> {
        self.refreshed.or(self.added)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CooldownId {
    Skill(u32),
    Item(u32),
}

impl fmt::Display for CooldownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skill(id) => write!(f, "skill {}", id),
            Self::Item(id)  => write!(f, "item {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownObservation {
    pub id:      CooldownId,
    /// `0` when the ability has never been seen on cooldown.
    pub expires: Timestamp,
}
