use std::sync::Arc;

use crate::{
    error::Result,
    policy::{PlanId, PlanPatch, PlanSpec, Rule, RuleId, RuleSpec, SecurityPlan},
    store::PlanStore,
};

/// Plan and rule management: validates raw input before anything is written
pub struct PlanManager {
    store: Arc<dyn PlanStore>,
}

impl PlanManager {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self { store }
    }

    pub async fn create_plan(&self, spec: &PlanSpec) -> Result<SecurityPlan> {
        let plan = spec.validate().inspect_err(|err| {
            log::warn!("Rejected plan '{}': {}", spec.name, err);
        })?;
        self.store.create_plan(plan).await
    }

    pub async fn update_plan(&self, id: PlanId, patch: &PlanPatch) -> Result<SecurityPlan> {
        let current = self.store.plan(id).await?;
        let update = patch.validate(&current.name).inspect_err(|err| {
            log::warn!("Rejected update of plan '{}': {}", current.name, err);
        })?;
        self.store.update_plan(id, update).await
    }

    /// Delete a plan together with its rules; returns how many rules went with it
    pub async fn delete_plan(&self, id: PlanId) -> Result<usize> {
        self.store.delete_plan(id).await
    }

    pub async fn add_rule(&self, plan_id: PlanId, spec: &RuleSpec) -> Result<Rule> {
        let rule = spec.validate().inspect_err(|err| {
            log::warn!("Rejected rule for plan {}: {}", plan_id, err);
        })?;
        self.store.add_rule(plan_id, rule).await
    }

    pub async fn update_rule(
        &self,
        plan_id: PlanId,
        rule_id: RuleId,
        spec: &RuleSpec,
    ) -> Result<Rule> {
        let rule = spec.validate().inspect_err(|err| {
            log::warn!("Rejected edit of rule {} in plan {}: {}", rule_id, plan_id, err);
        })?;
        self.store.update_rule(plan_id, rule_id, rule).await
    }

    pub async fn delete_rule(&self, plan_id: PlanId, rule_id: RuleId) -> Result<()> {
        self.store.delete_rule(plan_id, rule_id).await
    }

    pub async fn plan(&self, id: PlanId) -> Result<SecurityPlan> {
        self.store.plan(id).await
    }

    pub async fn plan_by_name(&self, name: &str) -> Result<SecurityPlan> {
        self.store.plan_by_name(name).await
    }

    pub async fn list_plans(&self) -> Result<Vec<SecurityPlan>> {
        self.store.list_plans().await
    }

    /// All rules of a plan, inbound first, each direction in precedence order
    pub async fn rules(&self, plan_id: PlanId) -> Result<Vec<Rule>> {
        let snapshot = self.store.snapshot(plan_id).await?;
        Ok(snapshot.inbound.into_iter().chain(snapshot.outbound).collect())
    }
}
