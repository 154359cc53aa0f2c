use std::{net::IpAddr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RulewardError},
    policy::{Action, Direction, Mode, PlanId, Protocol, RuleId, TrafficEvent},
};

use super::evaluator::Evaluator;

/// Plan reference accepted by the simulator: an id, or failing that a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanRef {
    Id(PlanId),
    Name(String),
}

impl PlanRef {
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<PlanId>()
            .map(PlanRef::Id)
            .unwrap_or_else(|_| PlanRef::Name(raw.trim().to_string()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub plan: PlanRef,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_path")]
    pub path: String,
    pub ip: IpAddr,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

impl SimulationRequest {
    pub fn new(plan: PlanRef, ip: IpAddr) -> Self {
        Self {
            plan,
            method: default_method(),
            path: default_path(),
            ip,
            direction: Direction::Inbound,
            protocol: None,
            port: None,
        }
    }

    /// Build the event to evaluate, filling in protocol (TCP) and port
    ///
    /// Without an explicit port, ICMP carries none, an "https://" path implies
    /// 443 and anything else 80. `All` describes rules, not packets, and is refused.
    pub fn to_event(&self) -> Result<TrafficEvent> {
        let protocol = self.protocol.unwrap_or(Protocol::Tcp);
        if protocol == Protocol::All {
            return Err(RulewardError::validation(
                "protocol",
                "a simulated request must be TCP, UDP or ICMP",
            ));
        }
        let port = match (self.port, protocol) {
            (Some(port), _) => Some(port),
            (None, Protocol::Icmp) => None,
            (None, _) if self.path.to_ascii_lowercase().starts_with("https://") => Some(443),
            (None, _) => Some(80),
        };

        Ok(TrafficEvent {
            direction: self.direction,
            method: self.method.to_ascii_uppercase(),
            path: self.path.clone(),
            address: self.ip,
            protocol,
            port,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub plan_id: PlanId,
    pub action: Action,
    pub matched_rule_id: Option<RuleId>,
    pub mode: Mode,
    pub direction: Direction,
    /// False for monitoring plans: the action is informational only
    pub enforced: bool,
}

/// Evaluates one-off simulated requests against a plan
pub struct Simulator {
    evaluator: Arc<Evaluator>,
}

impl Simulator {
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    pub async fn resolve(&self, plan: &PlanRef) -> Result<PlanId> {
        let plan = match plan {
            PlanRef::Id(id) => self.evaluator.plan(*id).await?,
            PlanRef::Name(name) => self.evaluator.plan_by_name(name).await?,
        };
        Ok(plan.id)
    }

    pub async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse> {
        let event = request.to_event()?;
        let plan_id = self.resolve(&request.plan).await?;
        let record = self.evaluator.evaluate(plan_id, event).await?;

        Ok(SimulationResponse {
            plan_id,
            action: record.action,
            matched_rule_id: record.matched_rule_id,
            mode: record.mode,
            direction: record.direction,
            enforced: record.mode == Mode::Enforce,
        })
    }
}
