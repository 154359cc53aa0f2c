use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    matcher::find_match,
    model::{Direction, Mode, PlanId, PlanSnapshot, RuleId},
    traffic::TrafficEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Block,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("ALLOW"),
            Action::Block => f.write_str("BLOCK"),
        }
    }
}

/// Outcome of evaluating one event against one plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub plan_id: PlanId,
    pub plan_revision: u64,
    pub direction: Direction,
    pub matched_rule_id: Option<RuleId>,
    pub action: Action,
    pub mode: Mode,
}

impl Decision {
    /// Whether a downstream enforcer should apply `action`; Monitor only records it
    pub fn enforced(&self) -> bool {
        self.mode == Mode::Enforce
    }

    pub fn into_record(self, event: TrafficEvent, decided_at: DateTime<Utc>) -> DecisionRecord {
        DecisionRecord {
            plan_id: self.plan_id,
            plan_revision: self.plan_revision,
            direction: self.direction,
            matched_rule_id: self.matched_rule_id,
            action: self.action,
            mode: self.mode,
            event,
            decided_at,
        }
    }
}

/// Persisted form of a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub plan_id: PlanId,
    pub plan_revision: u64,
    pub direction: Direction,
    pub matched_rule_id: Option<RuleId>,
    pub action: Action,
    pub mode: Mode,
    pub event: TrafficEvent,
    pub decided_at: DateTime<Utc>,
}

/// Evaluate an event against a consistent snapshot of a plan
///
/// Explicit rules are permits: a match allows, no match blocks. The plan's
/// mode is carried through but never changes the action.
pub fn evaluate(snapshot: &PlanSnapshot, event: &TrafficEvent) -> Decision {
    let matched = find_match(snapshot.rules(event.direction), event);
    let action = match matched {
        Some(_) => Action::Allow,
        None => Action::Block,
    };

    Decision {
        plan_id: snapshot.plan.id,
        plan_revision: snapshot.plan.revision,
        direction: event.direction,
        matched_rule_id: matched.map(|rule| rule.id),
        action,
        mode: snapshot.plan.mode,
    }
}
