/// In-memory game state: the reference store behind the `GameState` trait.
///
/// The host's packet or log feed writes into a `TrackedState` through a cloned
/// `SharedState` handle; the engine task only reads it. Reset hooks registered by
/// reset rules live here too, and fire from `reset_skill`.
use crate::{
    model::{
        skill_group, Boss, CooldownId, CooldownObservation, EffectId, EffectObservation, EntityId,
        EntityInfo, Subject, Timestamp,
    },
    world::{GameState, ResetHook},
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

// ---------------------------------------------------------------------------
// TrackedState
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TrackedState {
    pub subject:   Option<Subject>,
    pub boss:      Option<Boss>,
    /// Party member ids, subject included
    pub party:     Vec<EntityId>,
    pub entities:  HashMap<EntityId, EntityInfo>,
    pub effects:   HashMap<(EntityId, EffectId), EffectObservation>,
    /// cooldown id -> expiry timestamp
    pub cooldowns: HashMap<CooldownId, Timestamp>,
    reset_hooks:   Vec<(HashSet<u32>, ResetHook)>,
}

impl fmt::Debug for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedState")
            .field("subject", &self.subject)
            .field("boss", &self.boss)
            .field("party", &self.party)
            .field("entities", &self.entities.len())
            .field("effects", &self.effects.len())
            .field("cooldowns", &self.cooldowns.len())
            .field("reset_hooks", &self.reset_hooks.len())
            .finish()
    }
}

impl TrackedState {
    /// Replace the subject and make sure it is a known, living entity.
    pub fn login(&mut self, subject: Subject, name: &str) {
        self.entities.insert(subject.id, EntityInfo { id: subject.id, name: name.to_owned(), dead: false });
        if !self.party.contains(&subject.id) {
            self.party.push(subject.id);
        }
        tracing::info!("Subject {} ({}) logged in", name, subject.class);
        self.subject = Some(subject);
    }

    pub fn set_combat(&mut self, combat: bool) {
        if let Some(subject) = self.subject.as_mut() {
            subject.combat = combat;
        }
    }

    pub fn upsert_entity(&mut self, info: EntityInfo) {
        self.entities.insert(info.id, info);
    }

    pub fn set_dead(&mut self, id: EntityId, dead: bool) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.dead = dead;
        }
    }

    /// First application sets `added`; re-applying a present effect sets `refreshed`.
    pub fn apply_effect(
        &mut self,
        entity:   EntityId,
        effect:   EffectId,
        stacks:   u32,
        duration: i64,
        now_ms:   Timestamp,
    ) {
        let obs = self.effects.entry((entity, effect)).or_insert(EffectObservation { effect, ..Default::default() });
        if obs.added.is_some() || obs.refreshed.is_some() {
            obs.refreshed = Some(now_ms);
        } else {
            obs.added = Some(now_ms);
        }
        obs.stacks  = stacks;
        obs.expires = Some(now_ms + duration);
        obs.removed = None;
    }

    /// Leaves a tombstone so "removed" conditions can see when it went away.
    pub fn remove_effect(&mut self, entity: EntityId, effect: EffectId, now_ms: Timestamp) {
        self.effects.insert(
            (entity, effect),
            EffectObservation { effect, removed: Some(now_ms), ..Default::default() },
        );
    }

    pub fn start_cooldown(&mut self, id: CooldownId, expires: Timestamp) {
        self.cooldowns.insert(id, expires);
    }

    fn cooldown_observation(&self, id: CooldownId) -> CooldownObservation {
        CooldownObservation { id, expires: self.cooldowns.get(&id).copied().unwrap_or(0) }
    }

    /// Drop every per-encounter observation. Hooks and the subject survive.
    pub fn clear_observations(&mut self) {
        self.effects.clear();
        self.cooldowns.clear();
        self.boss = None;
    }
}

// ---------------------------------------------------------------------------
// SharedState: cloneable handle implementing GameState
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct SharedState(Arc<RwLock<TrackedState>>);

impl SharedState {
    pub fn update<R>(&self, f: impl FnOnce(&mut TrackedState) -> R) -> R {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn read<R>(&self, f: impl FnOnce(&TrackedState) -> R) -> R {
        let guard = self.0.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Cooldown store reset event: clears the skill's cooldown and fires every
    /// hook subscribed to its group. Returns the number of hooks fired.
    pub fn reset_skill(&self, skill: u32) -> usize {
        let id = CooldownId::Skill(skill);
        self.update(|s| {
            s.cooldowns.remove(&id);
        });

        let group = skill_group(skill);
        self.read(|s| {
            let info = s.cooldown_observation(id);
            let mut fired = 0;
            for (groups, hook) in &s.reset_hooks {
                if groups.contains(&group) {
                    hook(&info);
                    fired += 1;
                }
            }
            tracing::debug!("Skill {} reset (group {}) fired {} hook(s)", skill, group, fired);
            fired
        })
    }
}

impl GameState for SharedState {
    fn subject(&self) -> Option<Subject> {
        self.read(|s| s.subject.clone())
    }

    fn boss(&self) -> Option<Boss> {
        self.read(|s| s.boss)
    }

    fn party_member_ids(&self) -> Vec<EntityId> {
        self.read(|s| s.party.clone())
    }

    fn entity(&self, id: EntityId) -> Option<EntityInfo> {
        self.read(|s| s.entities.get(&id).cloned())
    }

    fn effect(&self, entity: EntityId, effect: EffectId) -> Option<EffectObservation> {
        self.read(|s| s.effects.get(&(entity, effect)).copied())
    }

    fn cooldown(&self, id: CooldownId) -> CooldownObservation {
        self.read(|s| s.cooldown_observation(id))
    }

    fn register_reset_hook(&self, groups: HashSet<u32>, hook: ResetHook) {
        self.update(|s| s.reset_hooks.push((groups, hook)));
    }

    fn clear_reset_hooks(&self) {
        self.update(|s| s.reset_hooks.clear());
    }
}
