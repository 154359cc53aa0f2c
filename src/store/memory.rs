use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{Result, RulewardError},
    policy::{
        DecisionRecord, Direction, NewPlan, NewRule, PlanId, PlanSnapshot, PlanUpdate, Rule,
        RuleId, SecurityPlan,
    },
};

use super::{DecisionLog, PlanStore};

pub const DEFAULT_DECISION_CAPACITY: usize = 10_000;

#[derive(Default)]
struct Inner {
    plans: HashMap<PlanId, SecurityPlan>,
    rules: HashMap<PlanId, Vec<Rule>>,
    decisions: HashMap<PlanId, VecDeque<DecisionRecord>>,
    next_sequence: u64,
}

impl Inner {
    fn plan_mut(&mut self, id: PlanId) -> Result<&mut SecurityPlan> {
        self.plans
            .get_mut(&id)
            .ok_or_else(|| RulewardError::PlanNotFound {
                plan: id.to_string(),
            })
    }

    /// Recompute the derived fields of a plan after its rules changed
    fn touch(&mut self, id: PlanId) -> Result<()> {
        let rule_count = self.rules.get(&id).map_or(0, Vec::len);
        let plan = self.plan_mut(id)?;
        plan.rule_count = rule_count;
        plan.revision += 1;
        plan.updated_at = Utc::now();
        Ok(())
    }
}

/// In-process plan store and decision log
///
/// Every operation runs under a single lock acquisition: writers take the
/// write lock for the whole mutation, snapshots take the read lock, so an
/// evaluation never observes a half-applied change. Deleting a plan also
/// drops its decision records.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    decision_capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_decision_capacity(DEFAULT_DECISION_CAPACITY)
    }

    /// Keep at most `capacity` decision records per plan, dropping the oldest
    pub fn with_decision_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            decision_capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn create_plan(&self, plan: NewPlan) -> Result<SecurityPlan> {
        let mut inner = self.inner.write().await;
        if inner
            .plans
            .values()
            .any(|existing| existing.name.eq_ignore_ascii_case(&plan.name))
        {
            return Err(RulewardError::DuplicatePlanName { name: plan.name });
        }

        let now = Utc::now();
        let created = SecurityPlan {
            id: Uuid::new_v4(),
            name: plan.name,
            description: plan.description,
            owner: plan.owner,
            mode: plan.mode,
            targets: plan.targets,
            rule_count: 0,
            revision: 1,
            created_at: now,
            updated_at: now,
        };
        inner.plans.insert(created.id, created.clone());
        inner.rules.insert(created.id, Vec::new());
        log::info!("Created plan '{}' ({})", created.name, created.id);
        Ok(created)
    }

    async fn update_plan(&self, id: PlanId, update: PlanUpdate) -> Result<SecurityPlan> {
        let mut inner = self.inner.write().await;
        let plan = inner.plan_mut(id)?;
        if let Some(description) = update.description {
            plan.description = description;
        }
        if let Some(owner) = update.owner {
            plan.owner = owner;
        }
        if let Some(mode) = update.mode {
            plan.mode = mode;
        }
        if let Some(targets) = update.targets {
            plan.targets = targets;
        }
        plan.revision += 1;
        plan.updated_at = Utc::now();
        Ok(plan.clone())
    }

    async fn delete_plan(&self, id: PlanId) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let plan = inner
            .plans
            .remove(&id)
            .ok_or_else(|| RulewardError::PlanNotFound {
                plan: id.to_string(),
            })?;
        let removed = inner.rules.remove(&id).map_or(0, |rules| rules.len());
        let records = inner.decisions.remove(&id).map_or(0, |records| records.len());
        log::info!(
            "Deleted plan '{}' ({}), {} rule(s) and {} decision record(s)",
            plan.name,
            id,
            removed,
            records
        );
        Ok(removed)
    }

    async fn plan(&self, id: PlanId) -> Result<SecurityPlan> {
        let inner = self.inner.read().await;
        inner
            .plans
            .get(&id)
            .cloned()
            .ok_or_else(|| RulewardError::PlanNotFound {
                plan: id.to_string(),
            })
    }

    async fn plan_by_name(&self, name: &str) -> Result<SecurityPlan> {
        let inner = self.inner.read().await;
        inner
            .plans
            .values()
            .find(|plan| plan.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| RulewardError::PlanNotFound {
                plan: name.to_string(),
            })
    }

    async fn list_plans(&self) -> Result<Vec<SecurityPlan>> {
        let inner = self.inner.read().await;
        let mut plans: Vec<SecurityPlan> = inner.plans.values().cloned().collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn add_rule(&self, plan_id: PlanId, rule: NewRule) -> Result<Rule> {
        let mut inner = self.inner.write().await;
        inner.plan_mut(plan_id)?;

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        let created = Rule {
            id: Uuid::new_v4(),
            plan_id,
            kind: rule.kind,
            protocol: rule.protocol,
            port_range: rule.port_range,
            description: rule.description,
            status: rule.status,
            priority: rule.priority,
            target: rule.target,
            created_at: Utc::now(),
            sequence,
        };
        inner
            .rules
            .entry(plan_id)
            .or_default()
            .push(created.clone());
        inner.touch(plan_id)?;
        log::info!(
            "Added {} rule {} to plan {} (priority {})",
            created.direction(),
            created.id,
            plan_id,
            created.priority
        );
        Ok(created)
    }

    async fn update_rule(&self, plan_id: PlanId, rule_id: RuleId, rule: NewRule) -> Result<Rule> {
        let mut inner = self.inner.write().await;
        inner.plan_mut(plan_id)?;

        let existing = inner
            .rules
            .get_mut(&plan_id)
            .and_then(|rules| rules.iter_mut().find(|r| r.id == rule_id))
            .ok_or(RulewardError::RuleNotFound {
                plan: plan_id,
                rule: rule_id,
            })?;
        existing.kind = rule.kind;
        existing.protocol = rule.protocol;
        existing.port_range = rule.port_range;
        existing.description = rule.description;
        existing.status = rule.status;
        existing.priority = rule.priority;
        existing.target = rule.target;
        let updated = existing.clone();

        inner.touch(plan_id)?;
        Ok(updated)
    }

    async fn delete_rule(&self, plan_id: PlanId, rule_id: RuleId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.plan_mut(plan_id)?;

        let rules = inner.rules.entry(plan_id).or_default();
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        if rules.len() == before {
            return Err(RulewardError::RuleNotFound {
                plan: plan_id,
                rule: rule_id,
            });
        }
        inner.touch(plan_id)?;
        log::info!("Deleted rule {} from plan {}", rule_id, plan_id);
        Ok(())
    }

    async fn snapshot(&self, plan_id: PlanId) -> Result<PlanSnapshot> {
        let inner = self.inner.read().await;
        let plan = inner
            .plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| RulewardError::PlanNotFound {
                plan: plan_id.to_string(),
            })?;

        let (mut inbound, mut outbound): (Vec<Rule>, Vec<Rule>) = inner
            .rules
            .get(&plan_id)
            .map(|rules| rules.iter().cloned().partition(|r| r.direction() == Direction::Inbound))
            .unwrap_or_default();
        let precedence = |r: &Rule| (r.priority, r.sequence);
        inbound.sort_by_key(precedence);
        outbound.sort_by_key(precedence);

        Ok(PlanSnapshot {
            plan,
            inbound,
            outbound,
        })
    }
}

#[async_trait]
impl DecisionLog for MemoryStore {
    async fn append(&self, record: DecisionRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        let records = inner.decisions.entry(record.plan_id).or_default();
        if records.len() >= self.decision_capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }

    async fn records(&self, plan_id: PlanId) -> Result<Vec<DecisionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .decisions
            .get(&plan_id)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default())
    }
}
