use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::{
    error::Result,
    policy::{Action, DecisionRecord, Mode, PlanId, SecurityPlan, TrafficEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Would-be block recorded by a monitoring plan
    Low,
    /// Traffic dropped by an enforcing plan
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub plan_id: PlanId,
    pub plan_name: String,
    pub severity: Severity,
    pub mode: Mode,
    pub event: TrafficEvent,
    pub raised_at: DateTime<Utc>,
}

/// Receiver of alerts for blocked traffic. Delivery is best effort.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn raise(&self, alert: SecurityAlert) -> Result<()>;
}

/// Alert sink that writes through the `log` facade
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise(&self, alert: SecurityAlert) -> Result<()> {
        match alert.severity {
            Severity::High => log::warn!(
                "Blocked {} {} {} from {} (plan '{}')",
                alert.event.direction,
                alert.event.method,
                alert.event.path,
                alert.event.address,
                alert.plan_name
            ),
            Severity::Low => log::info!(
                "Would block {} {} {} from {} (plan '{}', monitor mode)",
                alert.event.direction,
                alert.event.method,
                alert.event.path,
                alert.event.address,
                alert.plan_name
            ),
        }
        Ok(())
    }
}

/// Which decisions produce alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub enabled: bool,
    /// Also alert on would-be blocks of monitoring plans
    pub include_monitor: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            include_monitor: false,
        }
    }
}

impl AlertPolicy {
    pub fn alert_for(&self, plan: &SecurityPlan, record: &DecisionRecord) -> Option<SecurityAlert> {
        if !self.enabled || record.action != Action::Block {
            return None;
        }
        let severity = match record.mode {
            Mode::Enforce => Severity::High,
            Mode::Monitor if self.include_monitor => Severity::Low,
            Mode::Monitor => return None,
        };
        Some(SecurityAlert {
            plan_id: record.plan_id,
            plan_name: plan.name.clone(),
            severity,
            mode: record.mode,
            event: record.event.clone(),
            raised_at: record.decided_at,
        })
    }
}
