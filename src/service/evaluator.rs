use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    error::{Result, RulewardError},
    policy::{self, DecisionRecord, PlanId, PlanSnapshot, SecurityPlan, TrafficEvent},
    store::{DecisionLog, PlanStore},
};

use super::alert::{AlertPolicy, AlertSink};

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_ALERT_TIMEOUT: Duration = Duration::from_millis(500);

/// Runs the decision engine against stored plans and records the outcome
///
/// Every store read and the record write are bounded by `storage_timeout`.
/// Matching itself is synchronous. Alerts are sent after the record is written,
/// bounded by `alert_timeout`, and their failures are only logged.
pub struct Evaluator {
    store: Arc<dyn PlanStore>,
    decisions: Arc<dyn DecisionLog>,
    alerts: Arc<dyn AlertSink>,
    alert_policy: AlertPolicy,
    storage_timeout: Duration,
    alert_timeout: Duration,
}

impl Evaluator {
    pub fn new(
        store: Arc<dyn PlanStore>,
        decisions: Arc<dyn DecisionLog>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            store,
            decisions,
            alerts,
            alert_policy: AlertPolicy::default(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            alert_timeout: DEFAULT_ALERT_TIMEOUT,
        }
    }

    pub fn with_alert_policy(mut self, policy: AlertPolicy) -> Self {
        self.alert_policy = policy;
        self
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn with_alert_timeout(mut self, timeout: Duration) -> Self {
        self.alert_timeout = timeout;
        self
    }

    pub async fn plan(&self, plan_id: PlanId) -> Result<SecurityPlan> {
        self.bounded(self.store.plan(plan_id), || format!("reading plan {}", plan_id))
            .await
    }

    pub async fn plan_by_name(&self, name: &str) -> Result<SecurityPlan> {
        self.bounded(self.store.plan_by_name(name), || format!("looking up plan '{}'", name))
            .await
    }

    async fn bounded<T>(
        &self,
        read: impl Future<Output = Result<T>>,
        what: impl FnOnce() -> String,
    ) -> Result<T> {
        tokio::time::timeout(self.storage_timeout, read)
            .await
            .map_err(|_| RulewardError::Storage {
                reason: format!("timed out after {:?} {}", self.storage_timeout, what()),
            })?
    }

    /// Read a consistent snapshot of the plan, failing rather than waiting forever
    pub async fn snapshot(&self, plan_id: PlanId) -> Result<PlanSnapshot> {
        tokio::time::timeout(self.storage_timeout, self.store.snapshot(plan_id))
            .await
            .map_err(|_| RulewardError::SnapshotTimeout {
                plan: plan_id,
                timeout: self.storage_timeout,
            })?
    }

    /// Evaluate one event against the current rules of a plan and persist the record
    pub async fn evaluate(&self, plan_id: PlanId, event: TrafficEvent) -> Result<DecisionRecord> {
        let snapshot = self.snapshot(plan_id).await?;
        let decision = policy::evaluate(&snapshot, &event);
        log::debug!(
            "Plan '{}' r{}: {} {} {:?}/{:?} -> {} (rule {:?}, {})",
            snapshot.plan.name,
            snapshot.plan.revision,
            event.direction,
            event.address,
            event.protocol,
            event.port,
            decision.action,
            decision.matched_rule_id,
            decision.mode
        );

        let record = decision.into_record(event, Utc::now());
        self.bounded(self.decisions.append(record.clone()), || {
            format!("writing decision for plan {}", plan_id)
        })
        .await?;

        if let Some(alert) = self.alert_policy.alert_for(&snapshot.plan, &record) {
            match tokio::time::timeout(self.alert_timeout, self.alerts.raise(alert)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::warn!("Failed to raise alert for plan {}: {}", plan_id, err),
                Err(_) => log::warn!(
                    "Alert for plan {} dropped after {:?}",
                    plan_id,
                    self.alert_timeout
                ),
            }
        }

        Ok(record)
    }

    pub async fn records(&self, plan_id: PlanId) -> Result<Vec<DecisionRecord>> {
        self.bounded(self.decisions.records(plan_id), || {
            format!("reading decisions for plan {}", plan_id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        policy::{Action, Mode, PlanSpec, Protocol, RuleId, RuleSpec},
        service::{
            alert::{LogAlertSink, MockAlertSink, SecurityAlert},
            manager::PlanManager,
        },
        store::{MemoryStore, MockDecisionLog, MockPlanStore, StalledStore},
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        manager: PlanManager,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                manager: PlanManager::new(store.clone()),
                store,
            }
        }

        fn evaluator(&self, alerts: Arc<dyn AlertSink>) -> Evaluator {
            Evaluator::new(self.store.clone(), self.store.clone(), alerts)
        }

        async fn plan(&self, name: &str, mode: Mode) -> PlanId {
            let spec = PlanSpec {
                name: name.to_string(),
                owner: "ops".to_string(),
                mode,
                ..Default::default()
            };
            self.manager.create_plan(&spec).await.unwrap().id
        }

        async fn inbound(
            &self,
            plan_id: PlanId,
            priority: i32,
            ports: &str,
            source: &str,
        ) -> RuleId {
            let spec = RuleSpec {
                direction: crate::policy::Direction::Inbound,
                protocol: Some("TCP".to_string()),
                port_range: Some(ports.to_string()),
                source: Some(source.to_string()),
                priority,
                ..Default::default()
            };
            self.manager.add_rule(plan_id, &spec).await.unwrap().id
        }
    }

    fn tcp_from(ip: &str, port: u16) -> TrafficEvent {
        TrafficEvent::inbound(ip.parse().unwrap(), Protocol::Tcp, Some(port))
    }

    #[tokio::test]
    async fn web_tier_allows_https_and_blocks_ssh() {
        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;
        let rule = fx.inbound(plan, 1, "80-443", "0.0.0.0/0").await;
        let evaluator = fx.evaluator(Arc::new(LogAlertSink));

        let https = evaluator.evaluate(plan, tcp_from("203.0.113.5", 443)).await.unwrap();
        assert_eq!(https.action, Action::Allow);
        assert_eq!(https.matched_rule_id, Some(rule));

        let ssh = evaluator.evaluate(plan, tcp_from("203.0.113.5", 22)).await.unwrap();
        assert_eq!(ssh.action, Action::Block);
        assert_eq!(ssh.matched_rule_id, None);

        assert_eq!(evaluator.records(plan).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lower_priority_value_wins() {
        let fx = Fixture::new();
        let plan = fx.plan("internal", Mode::Enforce).await;
        fx.inbound(plan, 5, "All", "10.0.0.0/8").await;
        let b = fx.inbound(plan, 1, "All", "0.0.0.0/0").await;
        let evaluator = fx.evaluator(Arc::new(LogAlertSink));

        let record = evaluator.evaluate(plan, tcp_from("10.1.2.3", 8080)).await.unwrap();
        assert_eq!(record.matched_rule_id, Some(b));
    }

    #[tokio::test]
    async fn monitor_plan_records_block_without_alert() {
        let fx = Fixture::new();
        let plan = fx.plan("monitor-only", Mode::Monitor).await;
        fx.inbound(plan, 1, "443", "192.0.2.0/24").await;

        let mut alerts = MockAlertSink::new();
        alerts.expect_raise().times(0);
        let evaluator = fx.evaluator(Arc::new(alerts));

        let record = evaluator.evaluate(plan, tcp_from("203.0.113.5", 80)).await.unwrap();
        assert_eq!(record.action, Action::Block);
        assert_eq!(record.mode, Mode::Monitor);
    }

    #[tokio::test]
    async fn enforced_block_is_alerted() {
        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;

        let mut alerts = MockAlertSink::new();
        alerts
            .expect_raise()
            .times(1)
            .withf(|alert| alert.plan_name == "web-tier")
            .returning(|_| Ok(()));
        let evaluator = fx.evaluator(Arc::new(alerts));

        evaluator.evaluate(plan, tcp_from("203.0.113.5", 22)).await.unwrap();
    }

    #[tokio::test]
    async fn alert_failure_does_not_fail_decision() {
        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;

        let mut alerts = MockAlertSink::new();
        alerts.expect_raise().returning(|_| {
            Err(RulewardError::Alert {
                reason: "pager offline".to_string(),
            })
        });
        let evaluator = fx.evaluator(Arc::new(alerts));

        let record = evaluator.evaluate(plan, tcp_from("203.0.113.5", 22)).await.unwrap();
        assert_eq!(record.action, Action::Block);
        assert_eq!(evaluator.records(plan).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_not_a_block() {
        let mut store = MockPlanStore::new();
        store.expect_snapshot().returning(|_| {
            Err(RulewardError::Storage {
                reason: "connection refused".to_string(),
            })
        });
        let mut decisions = MockDecisionLog::new();
        decisions.expect_append().times(0);
        let evaluator =
            Evaluator::new(Arc::new(store), Arc::new(decisions), Arc::new(LogAlertSink));

        let err = evaluator
            .evaluate(PlanId::nil(), tcp_from("203.0.113.5", 443))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[tokio::test]
    async fn failed_record_write_surfaces_as_infrastructure_error() {
        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;

        let mut decisions = MockDecisionLog::new();
        decisions.expect_append().returning(|_| {
            Err(RulewardError::Storage {
                reason: "disk full".to_string(),
            })
        });
        let evaluator =
            Evaluator::new(fx.store.clone(), Arc::new(decisions), Arc::new(LogAlertSink));

        let err = evaluator
            .evaluate(plan, tcp_from("203.0.113.5", 443))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    fn stalled_evaluator() -> Evaluator {
        Evaluator::new(
            Arc::new(StalledStore),
            Arc::new(MemoryStore::new()),
            Arc::new(LogAlertSink),
        )
        .with_storage_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn slow_snapshot_times_out() {
        let err = stalled_evaluator()
            .evaluate(PlanId::nil(), tcp_from("203.0.113.5", 443))
            .await
            .unwrap_err();
        assert!(matches!(err, RulewardError::SnapshotTimeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[tokio::test]
    async fn slow_plan_lookup_times_out() {
        let evaluator = stalled_evaluator();

        let by_id = evaluator.plan(PlanId::nil()).await.unwrap_err();
        assert!(matches!(by_id, RulewardError::Storage { .. }));
        assert_eq!(by_id.kind(), ErrorKind::Infrastructure);

        let by_name = evaluator.plan_by_name("web-tier").await.unwrap_err();
        assert!(matches!(by_name, RulewardError::Storage { .. }));
        assert_eq!(by_name.kind(), ErrorKind::Infrastructure);
    }

    #[tokio::test]
    async fn hung_alert_sink_does_not_hold_decision() {
        struct HungAlertSink;

        #[async_trait::async_trait]
        impl AlertSink for HungAlertSink {
            async fn raise(&self, _: SecurityAlert) -> Result<()> {
                std::future::pending().await
            }
        }

        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;
        let evaluator = fx
            .evaluator(Arc::new(HungAlertSink))
            .with_alert_timeout(Duration::from_millis(50));

        let record = evaluator.evaluate(plan, tcp_from("203.0.113.5", 22)).await.unwrap();
        assert_eq!(record.action, Action::Block);
        assert_eq!(evaluator.records(plan).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_evaluation_yields_identical_records() {
        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;
        fx.inbound(plan, 1, "80-443", "0.0.0.0/0").await;
        let evaluator = fx.evaluator(Arc::new(LogAlertSink));

        let mut first = evaluator.evaluate(plan, tcp_from("203.0.113.5", 443)).await.unwrap();
        let second = evaluator.evaluate(plan, tcp_from("203.0.113.5", 443)).await.unwrap();
        first.decided_at = second.decided_at;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn rejected_rule_is_never_evaluated() {
        let fx = Fixture::new();
        let plan = fx.plan("web-tier", Mode::Enforce).await;
        let bad = RuleSpec {
            direction: crate::policy::Direction::Inbound,
            protocol: Some("TCP".to_string()),
            port_range: Some("abc".to_string()),
            source: Some("0.0.0.0/0".to_string()),
            ..Default::default()
        };
        let err = fx.manager.add_rule(plan, &bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let evaluator = fx.evaluator(Arc::new(LogAlertSink));
        let snapshot = evaluator.snapshot(plan).await.unwrap();
        assert!(snapshot.inbound.is_empty());
        let record = evaluator.evaluate(plan, tcp_from("203.0.113.5", 80)).await.unwrap();
        assert_eq!(record.action, Action::Block);
    }
}
