//! Raw plan/rule input and its validation into writable values.
//!
//! Every write goes through here: a `RuleSpec` only becomes a `NewRule` once
//! its address, port and protocol expressions parse and the fields required by
//! its direction are present.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RulewardError},
    net::{AddressExpr, PortRange},
};

use super::model::{
    Direction, Mode, NewPlan, NewRule, PlanUpdate, Protocol, RuleKind, RuleStatus, RuleTarget,
};

const MAX_NAME_LEN: usize = 64;

/// Plan as submitted by a caller or a config file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlanSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Edit of an existing plan as submitted by a caller
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlanPatch {
    /// Present only to be rejected: names are immutable
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

/// Rule as submitted by a caller or a config file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleSpec {
    pub direction: Direction,
    #[serde(default, rename = "type")]
    pub kind: RuleKind,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port_range: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: RuleStatus,
    #[serde(default)]
    pub priority: i32,
}

impl PlanSpec {
    pub fn validate(&self) -> Result<NewPlan> {
        Ok(NewPlan {
            name: validate_name(&self.name)?,
            description: self.description.trim().to_string(),
            owner: validate_owner(&self.owner)?,
            mode: self.mode,
            targets: validate_targets(&self.targets)?,
        })
    }
}

impl PlanPatch {
    /// Validate against the plan's current name; renaming is refused
    pub fn validate(&self, current_name: &str) -> Result<PlanUpdate> {
        if let Some(name) = &self.name
            && name.trim() != current_name
        {
            return Err(RulewardError::validation(
                "name",
                format!("plan '{current_name}' cannot be renamed"),
            ));
        }

        Ok(PlanUpdate {
            description: self.description.as_deref().map(|d| d.trim().to_string()),
            owner: self.owner.as_deref().map(validate_owner).transpose()?,
            mode: self.mode,
            targets: self.targets.as_deref().map(validate_targets).transpose()?,
        })
    }
}

impl RuleSpec {
    pub fn validate(&self) -> Result<NewRule> {
        let (preset_protocol, preset_ports) = self.kind.preset();

        let protocol = match non_blank(&self.protocol) {
            Some(raw) => raw.parse::<Protocol>()?,
            None => preset_protocol
                .ok_or_else(|| RulewardError::validation("protocol", "missing value"))?,
        };

        let port_range = match non_blank(&self.port_range) {
            Some(raw) => raw.parse::<PortRange>()?,
            None if protocol.ignores_ports() => PortRange::All,
            None => preset_ports
                .ok_or_else(|| RulewardError::validation("port_range", "missing value"))?,
        };

        let target = match self.direction {
            Direction::Inbound => {
                reject_present("destination", &self.destination, "inbound")?;
                RuleTarget::Inbound {
                    source: parse_address("source", &self.source)?,
                }
            }
            Direction::Outbound => {
                reject_present("source", &self.source, "outbound")?;
                RuleTarget::Outbound {
                    destination: parse_address("destination", &self.destination)?,
                }
            }
        };

        Ok(NewRule {
            kind: self.kind,
            protocol,
            port_range,
            description: non_blank(&self.description).map(str::to_string),
            status: self.status,
            priority: self.priority,
            target,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_address(field: &str, value: &Option<String>) -> Result<AddressExpr> {
    let raw = non_blank(value).ok_or_else(|| RulewardError::validation(field, "missing value"))?;
    raw.parse::<AddressExpr>().map_err(|err| match err {
        RulewardError::Validation { reason, .. } => RulewardError::validation(field, reason),
        other => other,
    })
}

fn reject_present(field: &str, value: &Option<String>, direction: &str) -> Result<()> {
    if non_blank(value).is_some() {
        return Err(RulewardError::validation(
            field,
            format!("not allowed on an {direction} rule"),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RulewardError::validation("name", "missing value"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(RulewardError::validation(
            "name",
            format!("longer than {MAX_NAME_LEN} characters"),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
    {
        return Err(RulewardError::validation(
            "name",
            format!("'{name}' may only contain letters, digits, spaces, '-', '_' and '.'"),
        ));
    }
    Ok(name.to_string())
}

fn validate_owner(owner: &str) -> Result<String> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(RulewardError::validation("owner", "missing value"));
    }
    Ok(owner.to_string())
}

fn validate_targets(targets: &[String]) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for raw in targets {
        let target = raw.trim();
        if target.is_empty() {
            return Err(RulewardError::validation("targets", "empty target entry"));
        }
        if target.chars().any(char::is_whitespace) {
            return Err(RulewardError::validation(
                "targets",
                format!("'{target}' contains whitespace"),
            ));
        }
        set.insert(target.to_string());
    }
    Ok(set)
}
