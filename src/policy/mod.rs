pub mod decision;
pub mod matcher;
pub mod model;
pub mod traffic;
pub mod validate;

// Re-export main types for convenience
pub use decision::{Action, Decision, DecisionRecord, evaluate};
pub use matcher::find_match;
pub use model::{
    Direction, Mode, NewPlan, NewRule, PlanId, PlanSnapshot, PlanUpdate, Protocol, Rule, RuleId,
    RuleKind, RuleStatus, RuleTarget, SecurityPlan,
};
pub use traffic::TrafficEvent;
pub use validate::{PlanPatch, PlanSpec, RuleSpec};
