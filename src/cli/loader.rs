use crate::error::RulewardError;
use crate::policy::SecurityPlan;
use crate::service::PlanManager;

use super::config::ConfigFile;

/// Apply the plans declared in a configuration file through the plan manager
pub struct PlanLoader;

impl PlanLoader {
    /// Create every configured plan and its rules, stopping at the first rejection
    pub async fn load(
        config: &ConfigFile,
        manager: &PlanManager,
    ) -> Result<Vec<SecurityPlan>, RulewardError> {
        let mut loaded = Vec::with_capacity(config.plans.len());

        for entry in &config.plans {
            let plan = manager.create_plan(&entry.plan).await?;
            for (index, rule) in entry.rules.iter().enumerate() {
                manager.add_rule(plan.id, rule).await.inspect_err(|err| {
                    log::error!("Plan '{}' rule #{} rejected: {}", plan.name, index + 1, err);
                })?;
            }
            // Re-read so rule_count and revision reflect the rules just added
            let plan = manager.plan(plan.id).await?;
            log::info!(
                "Loaded plan '{}' ({} mode, {} rules)",
                plan.name,
                plan.mode,
                plan.rule_count
            );
            loaded.push(plan);
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        cli::config::PlanConfig,
        error::ErrorKind,
        policy::{Direction, Mode, PlanSpec, RuleKind, RuleSpec},
        store::MemoryStore,
    };

    fn plan(name: &str, rules: Vec<RuleSpec>) -> PlanConfig {
        PlanConfig {
            plan: PlanSpec {
                name: name.to_string(),
                owner: "ops".to_string(),
                mode: Mode::Enforce,
                ..Default::default()
            },
            rules,
        }
    }

    fn https() -> RuleSpec {
        RuleSpec {
            direction: Direction::Inbound,
            kind: RuleKind::Https,
            source: Some("0.0.0.0/0".to_string()),
            priority: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn load_creates_plans_with_rules() {
        let config = ConfigFile {
            plans: vec![plan("web-tier", vec![https(), https()]), plan("api-tier", vec![])],
            ..Default::default()
        };
        let manager = PlanManager::new(Arc::new(MemoryStore::new()));

        let plans = PlanLoader::load(&config, &manager).await.unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].rule_count, 2);
        assert_eq!(plans[1].rule_count, 0);
        assert_eq!(manager.list_plans().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_rule_fails_the_load() {
        let bad = RuleSpec {
            port_range: Some("abc".to_string()),
            ..https()
        };
        let config = ConfigFile {
            plans: vec![plan("web-tier", vec![https(), bad])],
            ..Default::default()
        };
        let manager = PlanManager::new(Arc::new(MemoryStore::new()));

        let err = PlanLoader::load(&config, &manager).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn duplicate_plan_names_fail_the_load() {
        let config = ConfigFile {
            plans: vec![plan("web-tier", vec![]), plan("Web-Tier", vec![])],
            ..Default::default()
        };
        let manager = PlanManager::new(Arc::new(MemoryStore::new()));

        let err = PlanLoader::load(&config, &manager).await.unwrap_err();
        assert!(matches!(err, RulewardError::DuplicatePlanName { .. }));
    }
}
