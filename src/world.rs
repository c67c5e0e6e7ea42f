/// Read surface of the external stores consumed by the engine.
///
/// All calls are synchronous, in-memory reads; a rule's `check()` never waits on I/O.
/// An absent value means "nothing known this tick" and is treated as no-match,
/// never as an error.
use crate::model::{
    Boss, CooldownId, CooldownObservation, EffectId, EffectObservation, EntityId, EntityInfo,
    Subject,
};
use std::collections::HashSet;

/// Invoked by the cooldown store once per reset event of a subscribed skill group.
pub type ResetHook = Box<dyn Fn(&CooldownObservation) + Send + Sync>;

pub trait GameState: Send + Sync {
    /// The monitored player, `None` before login.
    fn subject(&self) -> Option<Subject>;

    /// The boss currently being fought, if any.
    fn boss(&self) -> Option<Boss>;

    /// Party members, including the subject.
    fn party_member_ids(&self) -> Vec<EntityId>;

    fn entity(&self, id: EntityId) -> Option<EntityInfo>;

    fn effect(&self, entity: EntityId, effect: EffectId) -> Option<EffectObservation>;

    fn cooldown(&self, id: CooldownId) -> CooldownObservation;

    fn register_reset_hook(&self, groups: HashSet<u32>, hook: ResetHook);

    fn clear_reset_hooks(&self);
}
