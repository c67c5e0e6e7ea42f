//! Rule descriptors
//!
//! A descriptor is one `[[rule]]` table from a rule file, parsed but not yet
//! validated. `RuleSpec::try_from` sniffs its shape and validates it into one
//! of the three rule kinds:
//!
//! 1. `abnormalities` present      → status-effect rule
//! 2. `type = "reset"`             → reset rule
//! 3. `skills` or `items` present  → cooldown rule
//!
//! Anything else is a configuration error for that descriptor alone.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{
    conditions::{AbnormalCondition, ConditionParams, CooldownCondition},
    error::RuleError,
    model::EffectId,
    targets::{CooldownTargets, TargetKind},
};

const DEFAULT_TIME_REMAINING_S: i64 = 6;
const DEFAULT_REWARN_TIMEOUT_S: f64 = 5.0;
const DEFAULT_REQUIRED_STACKS:  u32 = 1;

/// A field that accepts either a single value or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(v)  => vec![v.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

fn to_vec<T: Clone>(field: &Option<OneOrMany<T>>) -> Vec<T> {
    field.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
}

/// Order-preserving dedup; rule id lists behave as sets.
fn unique<T: Copy + Eq + std::hash::Hash>(values: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    values.into_iter().filter(|v| seen.insert(*v)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abnormalities:   Option<OneOrMany<EffectId>>,

    /// Condition kind, or "reset"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind:            Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target:          Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills:          Option<OneOrMany<u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items:           Option<OneOrMany<u32>>,

    /// Seconds-before-expiry values for the expiring conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining:  Option<OneOrMany<i64>>,

    /// Seconds before a still-true condition may notify again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewarn_timeout:  Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_stacks: Option<u32>,

    #[serde(default)]
    pub message:         String,
}

impl RuleDescriptor {
    fn params(&self) -> ConditionParams {
        let times = self
            .time_remaining
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_else(|| vec![DEFAULT_TIME_REMAINING_S]);
        let rewarn_s = self.rewarn_timeout.unwrap_or(DEFAULT_REWARN_TIMEOUT_S);

        ConditionParams {
            times_to_match:    times.into_iter().collect(),
            rewarn_timeout_ms: (rewarn_s * 1_000.0).round() as i64,
            required_stacks:   self.required_stacks.unwrap_or(DEFAULT_REQUIRED_STACKS),
        }
    }

    fn is_reset(&self) -> bool {
        self.kind.as_deref().is_some_and(|k| k.eq_ignore_ascii_case("reset"))
    }
}

/// A validated rule, ready to be instantiated.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSpec {
    Abnormal {
        effects:   Vec<EffectId>,
        condition: AbnormalCondition,
        target:    TargetKind,
        message:   String,
    },
    Cooldown {
        targets:   CooldownTargets,
        condition: CooldownCondition,
        message:   String,
    },
    Reset {
        skills:  Vec<u32>,
        message: String,
    },
}

impl TryFrom<&RuleDescriptor> for RuleSpec {
    type Error = RuleError;

    fn try_from(d: &RuleDescriptor) -> Result<Self, Self::Error> {
        if d.abnormalities.is_some() {
            let kind   = d.kind.as_deref().ok_or(RuleError::MissingField("type"))?;
            let target = d.target.as_deref().ok_or(RuleError::MissingField("target"))?;
            return Ok(Self::Abnormal {
                effects:   unique(to_vec(&d.abnormalities)),
                condition: AbnormalCondition::from_kind(kind, &d.params())?,
                target:    target.parse()?,
                message:   d.message.clone(),
            });
        }

        if d.is_reset() {
            return Ok(Self::Reset {
                skills:  unique(to_vec(&d.skills)),
                message: d.message.clone(),
            });
        }

        if d.skills.is_some() || d.items.is_some() {
            let kind = d.kind.as_deref().ok_or(RuleError::MissingField("type"))?;
            return Ok(Self::Cooldown {
                targets: CooldownTargets {
                    skills: unique(to_vec(&d.skills)),
                    items:  unique(to_vec(&d.items)),
                },
                condition: CooldownCondition::from_kind(kind, &d.params())?,
                message:   d.message.clone(),
            });
        }

        Err(RuleError::UnrecognizedShape)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Gate;

    #[derive(Deserialize)]
    struct RuleFile {
        rule: Vec<RuleDescriptor>,
    }

    fn parse(toml_str: &str) -> Vec<RuleDescriptor> {
        toml::from_str::<RuleFile>(toml_str).unwrap().rule
    }

    #[test]
    fn effect_rule_with_defaults() {
        let d = &parse(
            r#"
            [[rule]]
            abnormalities = 4020
            type = "Expiring"
            target = "self"
            message = "Buff expiring"
            "#,
        )[0];

        let spec = RuleSpec::try_from(d).unwrap();
        assert_eq!(
            spec,
            RuleSpec::Abnormal {
                effects:   vec![4020],
                condition: AbnormalCondition::Expiring { times_to_match: HashSet::from([6]) },
                target:    TargetKind::Myself,
                message:   "Buff expiring".into(),
            }
        );
    }

    #[test]
    fn explicit_parameters_override_defaults() {
        let d = &parse(
            r#"
            [[rule]]
            abnormalities = [1, 2, 2]
            type = "missingduringcombat"
            target = "party"
            rewarn_timeout = 2.5
            "#,
        )[0];

        match RuleSpec::try_from(d).unwrap() {
            RuleSpec::Abnormal { effects, condition, target, message } => {
                assert_eq!(effects, vec![1, 2]);
                assert_eq!(condition, AbnormalCondition::MissingDuringCombat { rewarn_timeout_ms: 2_500 });
                assert_eq!(target, TargetKind::Party);
                assert!(message.is_empty());
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn explicit_zero_stacks_is_honoured() {
        let d = RuleDescriptor {
            abnormalities:   Some(OneOrMany::One(1)),
            kind:            Some("refreshed".into()),
            target:          Some("self".into()),
            required_stacks: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            RuleSpec::try_from(&d).unwrap(),
            RuleSpec::Abnormal { condition: AbnormalCondition::Refreshed { required_stacks: 0 }, .. }
        ));
    }

    #[test]
    fn cooldown_rule_from_skills_and_items() {
        let d = &parse(
            r#"
            [[rule]]
            skills = [500, 600]
            items = 6552
            type = "expiringDuringEnrage"
            time_remaining = [3, 6]
            message = "Get ready"
            "#,
        )[0];

        match RuleSpec::try_from(d).unwrap() {
            RuleSpec::Cooldown { targets, condition, .. } => {
                assert_eq!(targets, CooldownTargets { skills: vec![500, 600], items: vec![6552] });
                assert_eq!(
                    condition,
                    CooldownCondition::Expiring { times_to_match: HashSet::from([3, 6]), gate: Gate::Enrage }
                );
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn reset_wins_over_skills() {
        let d = &parse(
            r#"
            [[rule]]
            type = "RESET"
            skills = [181100, 181101]
            message = "Reset!"
            "#,
        )[0];
        assert_eq!(
            RuleSpec::try_from(d).unwrap(),
            RuleSpec::Reset { skills: vec![181_100, 181_101], message: "Reset!".into() }
        );
    }

    #[test]
    fn abnormalities_win_over_reset() {
        let d = RuleDescriptor {
            abnormalities: Some(OneOrMany::One(1)),
            kind:          Some("reset".into()),
            target:        Some("self".into()),
            ..Default::default()
        };
        assert!(matches!(RuleSpec::try_from(&d), Err(RuleError::UnknownCondition { .. })));
    }

    #[test]
    fn rejects_bad_descriptors() {
        let no_shape = RuleDescriptor { kind: Some("ready".into()), ..Default::default() };
        assert!(matches!(RuleSpec::try_from(&no_shape), Err(RuleError::UnrecognizedShape)));

        let no_target = RuleDescriptor {
            abnormalities: Some(OneOrMany::One(1)),
            kind:          Some("added".into()),
            ..Default::default()
        };
        assert!(matches!(RuleSpec::try_from(&no_target), Err(RuleError::MissingField("target"))));

        let bad_target = RuleDescriptor { target: Some("raid".into()), ..no_target.clone() };
        assert!(matches!(RuleSpec::try_from(&bad_target), Err(RuleError::UnknownTarget(_))));

        let no_type = RuleDescriptor { skills: Some(OneOrMany::One(5)), ..Default::default() };
        assert!(matches!(RuleSpec::try_from(&no_type), Err(RuleError::MissingField("type"))));
    }

    #[test]
    fn descriptor_serialises_for_logging() {
        let d = RuleDescriptor { skills: Some(OneOrMany::One(5)), ..Default::default() };
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"skills":5,"message":""}"#);
    }
}
