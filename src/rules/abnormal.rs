/// Status-effect rule: watches a set of effects on each enumerated entity.
///
/// Per target, every configured effect is evaluated against the target's last
/// stored match. An effect "hits" when it matches with a value different from
/// that last match. The rule then fires when:
///   match-any (most kinds)     → at least one effect hits
///   match-all (missing family) → every effect hits
///
/// On fire the newest hit value becomes the target's last match, so an
/// unchanged observation never notifies twice.
use super::{isolate, RuleContext};
use crate::{
    conditions::AbnormalCondition,
    model::{EffectId, EffectObservation, EntityId, MatchValue},
    notify::Notification,
    targets::TargetKind,
};
use std::collections::HashMap;

#[derive(Debug)]
pub struct AbnormalRule {
    effects:      Vec<EffectId>,
    condition:    AbnormalCondition,
    target:       TargetKind,
    message:      String,
    match_all:    bool,
    last_matches: HashMap<EntityId, MatchValue>,
}

impl AbnormalRule {
    pub fn new(
        effects:   Vec<EffectId>,
        condition: AbnormalCondition,
        target:    TargetKind,
        message:   String,
    ) -> Self {
        Self {
            match_all: condition.requires_all(),
            effects,
            condition,
            target,
            message,
            last_matches: HashMap::new(),
        }
    }

    pub fn check(&mut self, ctx: &RuleContext) {
        for entity_id in self.target.ids(ctx.state) {
            if let Err(e) = isolate(entity_id, || self.check_target(entity_id, ctx)) {
                tracing::error!("Error while checking effect rule {:?}: {}", self, e);
            }
        }
    }

    fn check_target(&mut self, entity_id: EntityId, ctx: &RuleContext) {
        if entity_id == 0 {
            return;
        }
        let Some(entity) = ctx.state.entity(entity_id) else {
            return;
        };
        if entity.dead {
            return;
        }

        let last_match = self.last_matches.get(&entity_id).copied().unwrap_or(0);

        let mut any_miss = false;
        let mut newest: Option<(MatchValue, EffectId, Option<EffectObservation>)> = None;

        for &effect in &self.effects {
            let obs = ctx.state.effect(entity_id, effect);
            match self.condition.evaluate(obs.as_ref(), last_match, ctx) {
                Some(value) if value != last_match => {
                    newest = Some((value, effect, obs));
                }
                _ => any_miss = true,
            }
        }

        if self.match_all && any_miss {
            return;
        }
        let Some((value, effect, observation)) = newest else {
            return;
        };

        tracing::debug!("Effect rule '{}' fired for entity {}", self.message, entity_id);
        ctx.notifier.notify(Notification::Effect {
            message: self.message.clone(),
            entity,
            effect: Some(effect),
            observation,
        });
        self.last_matches.insert(entity_id, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{EffectObservation, EntityInfo, Subject},
        testing::{context, drain, notifier, State},
    };

    const NOW: i64 = 1_700_000_000_000;

    fn logged_in() -> State {
        let state = State::default();
        state.update(|s| s.login(Subject { id: 1, class: "warrior".into(), combat: true }, "Me"));
        state
    }

    fn rule(effects: Vec<EffectId>, condition: AbnormalCondition, target: TargetKind) -> AbnormalRule {
        AbnormalRule::new(effects, condition, target, "msg".into())
    }

    #[test]
    fn added_or_refreshed_fires_once_for_unchanged_observation() {
        let state = logged_in();
        state.update(|s| {
            s.effects.insert((1, 100), EffectObservation {
                effect: 100, stacks: 2, added: Some(NOW - 50), ..Default::default()
            });
        });
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100], AbnormalCondition::AddedOrRefreshed { required_stacks: 1 }, TargetKind::Myself);

        r.check(&context(&state, &n, NOW));
        r.check(&context(&state, &n, NOW + 500));

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Notification::Effect { entity, effect, observation, .. } => {
                assert_eq!(entity.id, 1);
                assert_eq!(*effect, Some(100));
                assert_eq!(observation.unwrap().added, Some(NOW - 50));
            }
            other => panic!("Wrong variant: {:?}", other),
        }
        assert_eq!(r.last_matches[&1], NOW - 50);
    }

    #[test]
    fn refresh_fires_again() {
        let state = logged_in();
        state.update(|s| s.apply_effect(1, 100, 2, 30_000, NOW - 50));
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100], AbnormalCondition::AddedOrRefreshed { required_stacks: 1 }, TargetKind::Myself);

        r.check(&context(&state, &n, NOW));
        state.update(|s| s.apply_effect(1, 100, 3, 30_000, NOW + 200));
        r.check(&context(&state, &n, NOW + 500));
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn match_any_fires_on_single_effect() {
        let state = logged_in();
        state.update(|s| s.apply_effect(1, 200, 1, 30_000, NOW));
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100, 200], AbnormalCondition::Added, TargetKind::Myself);

        r.check(&context(&state, &n, NOW));
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Notification::Effect { effect: Some(200), .. }));
    }

    #[test]
    fn match_all_needs_every_effect_missing() {
        let state = logged_in();
        state.update(|s| s.apply_effect(1, 200, 1, 30_000, NOW - 1_000));
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100, 200], AbnormalCondition::Missing { rewarn_timeout_ms: 5_000 }, TargetKind::Myself);

        r.check(&context(&state, &n, NOW));
        assert!(drain(&mut rx).is_empty(), "200 is present");

        state.update(|s| { s.effects.remove(&(1, 200)); });
        r.check(&context(&state, &n, NOW));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn missing_rewarns_only_after_timeout() {
        let state = logged_in();
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100], AbnormalCondition::Missing { rewarn_timeout_ms: 5_000 }, TargetKind::Myself);

        for offset in (0..=5_000).step_by(500) {
            r.check(&context(&state, &n, NOW + offset));
        }
        assert_eq!(drain(&mut rx).len(), 1, "only the first tick fires within 5s");

        r.check(&context(&state, &n, NOW + 5_500));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn skips_dead_and_unknown_targets() {
        let state = logged_in();
        state.update(|s| {
            s.party = vec![1, 2, 3];
            s.upsert_entity(EntityInfo { id: 2, name: "Ghost".into(), dead: true });
            // 3 is in the party but unknown to the entity store
        });
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100], AbnormalCondition::Missing { rewarn_timeout_ms: 5_000 }, TargetKind::Party);

        r.check(&context(&state, &n, NOW));
        assert!(drain(&mut rx).is_empty());
        assert!(r.last_matches.is_empty());
    }

    #[test]
    fn expiring_fires_each_qualifying_second() {
        let state = logged_in();
        state.update(|s| s.apply_effect(1, 100, 1, 6_000, NOW));
        let (n, mut rx) = notifier();
        let mut r = rule(
            vec![100],
            AbnormalCondition::Expiring { times_to_match: [5, 6].into_iter().collect() },
            TargetKind::Myself,
        );

        r.check(&context(&state, &n, NOW));
        r.check(&context(&state, &n, NOW));
        r.check(&context(&state, &n, NOW + 1_000));
        r.check(&context(&state, &n, NOW + 2_000));
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn panic_in_one_target_does_not_stop_others() {
        use crate::{
            model::{Boss, CooldownId, CooldownObservation, EffectId, Subject},
            world::{GameState, ResetHook},
        };
        use std::collections::HashSet;

        struct Flaky(State);
        impl GameState for Flaky {
            fn subject(&self) -> Option<Subject> { self.0.subject() }
            fn boss(&self) -> Option<Boss> { self.0.boss() }
            fn party_member_ids(&self) -> Vec<EntityId> { self.0.party_member_ids() }
            fn entity(&self, id: EntityId) -> Option<EntityInfo> {
                if id == 2 { panic!("corrupt entity {}", id) }
                self.0.entity(id)
            }
            fn effect(&self, e: EntityId, x: EffectId) -> Option<EffectObservation> { self.0.effect(e, x) }
            fn cooldown(&self, id: CooldownId) -> CooldownObservation { self.0.cooldown(id) }
            fn register_reset_hook(&self, g: HashSet<u32>, h: ResetHook) { self.0.register_reset_hook(g, h) }
            fn clear_reset_hooks(&self) { self.0.clear_reset_hooks() }
        }

        let inner = logged_in();
        inner.update(|s| {
            s.party = vec![2, 1, 3];
            s.upsert_entity(EntityInfo { id: 3, name: "Healer".into(), dead: false });
        });
        let flaky = Flaky(inner);
        let (n, mut rx) = notifier();
        let mut r = rule(vec![100], AbnormalCondition::Missing { rewarn_timeout_ms: 5_000 }, TargetKind::PartyIncludingSelf);

        r.check(&RuleContext { state: &flaky, notifier: &n, now_ms: NOW });
        let ids: Vec<_> = drain(&mut rx)
            .into_iter()
            .map(|n| match n {
                Notification::Effect { entity, .. } => entity.id,
                other => panic!("Wrong variant: {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
