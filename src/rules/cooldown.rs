/// Cooldown rule: watches a fixed list of skills and items.
///
/// Each id keeps its own last match; a notification fires whenever the
/// condition yields a value different from that id's last match.
use super::{isolate, RuleContext};
use crate::{
    conditions::CooldownCondition,
    model::{CooldownId, MatchValue},
    notify::Notification,
    targets::CooldownTargets,
};
use std::collections::HashMap;

#[derive(Debug)]
pub struct CooldownRule {
    targets:      CooldownTargets,
    condition:    CooldownCondition,
    message:      String,
    last_matches: HashMap<CooldownId, MatchValue>,
}

impl CooldownRule {
    pub fn new(targets: CooldownTargets, condition: CooldownCondition, message: String) -> Self {
        Self { targets, condition, message, last_matches: HashMap::new() }
    }

    pub fn check(&mut self, ctx: &RuleContext) {
        let ids: Vec<CooldownId> = self.targets.ids().collect();
        for id in ids {
            if let Err(e) = isolate(id, || self.check_target(id, ctx)) {
                tracing::error!("Error while checking cooldown rule {:?}: {}", self, e);
            }
        }
    }

    fn check_target(&mut self, id: CooldownId, ctx: &RuleContext) {
        let last_match = self.last_matches.get(&id).copied().unwrap_or(0);
        let info = ctx.state.cooldown(id);

        match self.condition.evaluate(&info, last_match, ctx) {
            Some(value) if value != last_match => {
                tracing::debug!("Cooldown rule '{}' fired for {}", self.message, id);
                ctx.notifier.notify(Notification::Cooldown {
                    message:  self.message.clone(),
                    cooldown: info,
                });
                self.last_matches.insert(id, value);
            }
            _ => {}
        }
    }
}
