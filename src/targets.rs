/// Target enumeration: which entities or cooldowns a rule looks at.
///
/// Entity targets are recomputed from the store on every call; party makeup
/// and the current boss change between ticks. Cooldown targets are the fixed
/// skill and item lists from the rule descriptor.
use crate::{
    error::RuleError,
    model::{CooldownId, EntityId},
    world::GameState,
};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// The monitored subject
    Myself,
    MyBoss,
    /// Party members other than the subject
    Party,
    PartyIncludingSelf,
}

impl FromStr for TargetKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "self"               => Ok(Self::Myself),
            "myboss"             => Ok(Self::MyBoss),
            "party"              => Ok(Self::Party),
            "partyincludingself" => Ok(Self::PartyIncludingSelf),
            _ => Err(RuleError::UnknownTarget(s.to_owned())),
        }
    }
}

impl TargetKind {
    pub fn ids(self, state: &dyn GameState) -> Vec<EntityId> {
        match self {
            Self::Myself => state.subject().map(|s| s.id).into_iter().collect(),
            Self::MyBoss => state.boss().map(|b| b.id).into_iter().collect(),
            Self::Party => {
                let me = state.subject().map(|s| s.id);
                state
                    .party_member_ids()
                    .into_iter()
                    .filter(|id| Some(*id) != me)
                    .collect()
            }
            Self::PartyIncludingSelf => state.party_member_ids(),
        }
    }
}

/// Skills first, then items, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownTargets {
    pub skills: Vec<u32>,
    pub items:  Vec<u32>,
}

impl CooldownTargets {
    pub fn ids(&self) -> impl Iterator<Item = CooldownId> + '_ {
        self.skills
            .iter()
            .map(|&id| CooldownId::Skill(id))
            .chain(self.items.iter().map(|&id| CooldownId::Item(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::{Boss, Subject}, testing::State};

    fn party_state() -> State {
        let state = State::default();
        state.update(|s| {
            s.login(Subject { id: 1, class: "priest".into(), combat: false }, "Me");
            s.party = vec![3, 1, 2];
        });
        state
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("SELF".parse::<TargetKind>().unwrap(), TargetKind::Myself);
        assert_eq!("MyBoss".parse::<TargetKind>().unwrap(), TargetKind::MyBoss);
        assert_eq!("PartyIncludingSelf".parse::<TargetKind>().unwrap(), TargetKind::PartyIncludingSelf);
        assert!(matches!("raid".parse::<TargetKind>(), Err(RuleError::UnknownTarget(t)) if t == "raid"));
    }

    #[test]
    fn self_and_boss() {
        let state = party_state();
        assert_eq!(TargetKind::Myself.ids(&state), vec![1]);
        assert!(TargetKind::MyBoss.ids(&state).is_empty());
        state.update(|s| s.boss = Some(Boss { id: 50, enraged: false }));
        assert_eq!(TargetKind::MyBoss.ids(&state), vec![50]);
    }

    #[test]
    fn party_excludes_self() {
        let state = party_state();
        assert_eq!(TargetKind::Party.ids(&state), vec![3, 2]);
        assert_eq!(TargetKind::PartyIncludingSelf.ids(&state), vec![3, 1, 2]);
    }

    #[test]
    fn recomputed_on_every_call() {
        let state = party_state();
        assert_eq!(TargetKind::Party.ids(&state).len(), 2);
        state.update(|s| s.party.push(4));
        assert_eq!(TargetKind::Party.ids(&state), vec![3, 2, 4]);
    }

    #[test]
    fn no_subject_yields_nothing_for_self() {
        let state = State::default();
        assert!(TargetKind::Myself.ids(&state).is_empty());
    }

    #[test]
    fn cooldown_targets_skills_then_items() {
        let targets = CooldownTargets { skills: vec![500, 600], items: vec![6552] };
        let ids: Vec<_> = targets.ids().collect();
        assert_eq!(ids, vec![CooldownId::Skill(500), CooldownId::Skill(600), CooldownId::Item(6552)]);
    }
}
