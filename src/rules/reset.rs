/// Reset rule: event-driven, not polled.
///
/// On creation it subscribes a hook with the cooldown store for the skill
/// groups of its configured skills. The store calls the hook once per reset;
/// the hook forwards straight to the notifier. `check` does nothing.
use super::RuleContext;
use crate::{
    model::skill_group,
    notify::{Notification, Notifier},
    world::GameState,
};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct ResetRule {
    groups:  HashSet<u32>,
    message: String,
}

impl ResetRule {
    pub fn register(
        skills:   &[u32],
        message:  String,
        state:    &dyn GameState,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let groups: HashSet<u32> = skills.iter().copied().map(skill_group).collect();

        let hook_message = message.clone();
        state.register_reset_hook(
            groups.clone(),
            Box::new(move |info| {
                notifier.notify(Notification::Reset {
                    message:  hook_message.clone(),
                    cooldown: *info,
                });
            }),
        );
        tracing::debug!("Reset rule '{}' subscribed to groups {:?}", message, groups);

        Self { groups, message }
    }

    /// Skill groups the hook is subscribed to.
    pub fn groups(&self) -> &HashSet<u32> {
        &self.groups
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&mut self, _ctx: &RuleContext) {}
}
