pub mod memory;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::{
    error::Result,
    policy::{
        DecisionRecord, NewPlan, NewRule, PlanId, PlanSnapshot, PlanUpdate, Rule, RuleId,
        SecurityPlan,
    },
};

pub use memory::MemoryStore;

/// Storage of plans and their rules
///
/// Implementations apply every mutation atomically and recompute the plan's
/// `rule_count` from the stored rules. `snapshot` must return the plan and all
/// of its rules as of a single instant.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlanStore: Send + Sync + 'static {
    async fn create_plan(&self, plan: NewPlan) -> Result<SecurityPlan>;
    async fn update_plan(&self, id: PlanId, update: PlanUpdate) -> Result<SecurityPlan>;
    /// Delete a plan and every rule it owns; returns the number of rules removed
    async fn delete_plan(&self, id: PlanId) -> Result<usize>;
    async fn plan(&self, id: PlanId) -> Result<SecurityPlan>;
    async fn plan_by_name(&self, name: &str) -> Result<SecurityPlan>;
    async fn list_plans(&self) -> Result<Vec<SecurityPlan>>;

    async fn add_rule(&self, plan_id: PlanId, rule: NewRule) -> Result<Rule>;
    async fn update_rule(&self, plan_id: PlanId, rule_id: RuleId, rule: NewRule) -> Result<Rule>;
    async fn delete_rule(&self, plan_id: PlanId, rule_id: RuleId) -> Result<()>;

    async fn snapshot(&self, plan_id: PlanId) -> Result<PlanSnapshot>;
}

/// Append-only storage of decision records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DecisionLog: Send + Sync + 'static {
    async fn append(&self, record: DecisionRecord) -> Result<()>;
    /// Records for a plan, oldest first
    async fn records(&self, plan_id: PlanId) -> Result<Vec<DecisionRecord>>;
}

/// Store whose reads never complete
#[cfg(test)]
pub(crate) struct StalledStore;

#[cfg(test)]
#[async_trait]
impl PlanStore for StalledStore {
    async fn create_plan(&self, _: NewPlan) -> Result<SecurityPlan> {
        unimplemented!()
    }
    async fn update_plan(&self, _: PlanId, _: PlanUpdate) -> Result<SecurityPlan> {
        unimplemented!()
    }
    async fn delete_plan(&self, _: PlanId) -> Result<usize> {
        unimplemented!()
    }
    async fn plan(&self, _: PlanId) -> Result<SecurityPlan> {
        std::future::pending().await
    }
    async fn plan_by_name(&self, _: &str) -> Result<SecurityPlan> {
        std::future::pending().await
    }
    async fn list_plans(&self) -> Result<Vec<SecurityPlan>> {
        std::future::pending().await
    }
    async fn add_rule(&self, _: PlanId, _: NewRule) -> Result<Rule> {
        unimplemented!()
    }
    async fn update_rule(&self, _: PlanId, _: RuleId, _: NewRule) -> Result<Rule> {
        unimplemented!()
    }
    async fn delete_rule(&self, _: PlanId, _: RuleId) -> Result<()> {
        unimplemented!()
    }
    async fn snapshot(&self, _: PlanId) -> Result<PlanSnapshot> {
        std::future::pending().await
    }
}
