use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::RulewardError,
    net::{AddressExpr, PortRange},
};

pub type PlanId = Uuid;
pub type RuleId = Uuid;

/// Whether computed decisions are applied or only recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    #[serde(alias = "Monitor", alias = "MONITOR")]
    Monitor,
    #[serde(alias = "Enforce", alias = "ENFORCE")]
    Enforce,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Monitor => f.write_str("monitor"),
            Mode::Enforce => f.write_str("enforce"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    All,
}

impl Protocol {
    /// ICMP and All rules match regardless of port
    pub fn ignores_ports(self) -> bool {
        matches!(self, Protocol::Icmp | Protocol::All)
    }

    /// Whether a rule with this protocol admits traffic carried over `traffic`
    pub fn admits(self, traffic: Protocol) -> bool {
        self == Protocol::All || self == traffic
    }
}

impl FromStr for Protocol {
    type Err = RulewardError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            "all" | "*" => Ok(Protocol::All),
            other => Err(RulewardError::validation(
                "protocol",
                format!("'{other}' is not one of TCP, UDP, ICMP, All"),
            )),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = RulewardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::All => "All",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleStatus {
    #[default]
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "inactive")]
    Inactive,
}

/// Informational rule label. Never matched against traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleKind {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "SSH")]
    Ssh,
    #[serde(rename = "Custom-TCP")]
    CustomTcp,
    #[serde(rename = "Custom-UDP")]
    CustomUdp,
    #[serde(rename = "All-ICMP")]
    AllIcmp,
    #[serde(rename = "All-Traffic")]
    AllTraffic,
    #[default]
    Custom,
}

impl RuleKind {
    /// Conventional protocol and port for the label, if it has one
    pub fn preset(self) -> (Option<Protocol>, Option<PortRange>) {
        match self {
            RuleKind::Http => (Some(Protocol::Tcp), Some(PortRange::Single(80))),
            RuleKind::Https => (Some(Protocol::Tcp), Some(PortRange::Single(443))),
            RuleKind::Ssh => (Some(Protocol::Tcp), Some(PortRange::Single(22))),
            RuleKind::CustomTcp => (Some(Protocol::Tcp), None),
            RuleKind::CustomUdp => (Some(Protocol::Udp), None),
            RuleKind::AllIcmp => (Some(Protocol::Icmp), Some(PortRange::All)),
            RuleKind::AllTraffic => (Some(Protocol::All), Some(PortRange::All)),
            RuleKind::Custom => (None, None),
        }
    }
}

/// Direction-specific half of a rule: who may send (inbound) or be reached (outbound)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum RuleTarget {
    Inbound { source: AddressExpr },
    Outbound { destination: AddressExpr },
}

impl RuleTarget {
    pub fn direction(&self) -> Direction {
        match self {
            RuleTarget::Inbound { .. } => Direction::Inbound,
            RuleTarget::Outbound { .. } => Direction::Outbound,
        }
    }

    pub fn address(&self) -> &AddressExpr {
        match self {
            RuleTarget::Inbound { source } => source,
            RuleTarget::Outbound { destination } => destination,
        }
    }
}

/// A stored permit rule owned by one plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub plan_id: PlanId,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub protocol: Protocol,
    pub port_range: PortRange,
    pub description: Option<String>,
    pub status: RuleStatus,
    /// Lower value wins
    pub priority: i32,
    #[serde(flatten)]
    pub target: RuleTarget,
    pub created_at: DateTime<Utc>,
    /// Store-assigned creation counter; orders rules of equal priority
    pub sequence: u64,
}

impl Rule {
    pub fn direction(&self) -> Direction {
        self.target.direction()
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }
}

/// Validated rule contents, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub kind: RuleKind,
    pub protocol: Protocol,
    pub port_range: PortRange,
    pub description: Option<String>,
    pub status: RuleStatus,
    pub priority: i32,
    pub target: RuleTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPlan {
    pub id: PlanId,
    /// Unique and immutable after creation
    pub name: String,
    pub description: String,
    pub owner: String,
    pub mode: Mode,
    pub targets: BTreeSet<String>,
    /// Always equal to the number of rules stored for the plan
    pub rule_count: usize,
    /// Bumped on every plan or rule mutation
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated plan contents, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub mode: Mode,
    pub targets: BTreeSet<String>,
}

/// Validated edit of a plan's mutable fields; `None` leaves a field unchanged
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanUpdate {
    pub description: Option<String>,
    pub owner: Option<String>,
    pub mode: Option<Mode>,
    pub targets: Option<BTreeSet<String>>,
}

/// A plan and its rules as they stood at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSnapshot {
    pub plan: SecurityPlan,
    pub inbound: Vec<Rule>,
    pub outbound: Vec<Rule>,
}

impl PlanSnapshot {
    pub fn rules(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }
}
