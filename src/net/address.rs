use std::{fmt, net::IpAddr, str::FromStr};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::RulewardError;

/// Address expression accepted in a rule's source or destination
///
/// Three textual forms are accepted:
/// - exact address: "203.0.113.5", "2001:db8::1"
/// - CIDR block: "10.0.0.0/8", "2001:db8::/32"
/// - wildcard: "0.0.0.0/0" (every IPv4 address), "::/0" (every IPv6 address)
///
/// Host bits below the prefix are ignored, so "10.1.2.3/8" covers the same
/// addresses as "10.0.0.0/8".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AddressExpr {
    Host(IpAddr),
    Network(IpNetwork),
}

impl AddressExpr {
    /// Whether the expression covers a whole address family
    pub fn is_wildcard(&self) -> bool {
        matches!(self, AddressExpr::Network(net) if net.prefix() == 0)
    }

    /// Test membership of a concrete address. Mismatched families never match.
    pub fn contains(&self, candidate: IpAddr) -> bool {
        match (self, candidate) {
            (AddressExpr::Host(host), candidate) => *host == candidate,
            (AddressExpr::Network(IpNetwork::V4(net)), IpAddr::V4(v4)) => net.contains(v4),
            (AddressExpr::Network(IpNetwork::V6(net)), IpAddr::V6(v6)) => net.contains(v6),
            _ => false,
        }
    }
}

impl FromStr for AddressExpr {
    type Err = RulewardError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_address_expr(input).map_err(|reason| RulewardError::validation("address", reason))
    }
}

fn parse_address_expr(input: &str) -> Result<AddressExpr, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }

    let Some((addr_part, prefix_part)) = trimmed.split_once('/') else {
        return trimmed
            .parse::<IpAddr>()
            .map(AddressExpr::Host)
            .map_err(|_| format!("'{trimmed}' is not an IP address or CIDR block"));
    };

    let addr = addr_part
        .parse::<IpAddr>()
        .map_err(|_| format!("'{addr_part}' is not an IP address"))?;
    if prefix_part.is_empty() || !prefix_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{prefix_part}' is not a prefix length"));
    }
    let prefix = prefix_part
        .parse::<u8>()
        .map_err(|_| format!("prefix length {prefix_part} is out of range"))?;

    IpNetwork::new(addr, prefix)
        .map(AddressExpr::Network)
        .map_err(|_| {
            let max = if addr.is_ipv4() { 32 } else { 128 };
            format!("prefix length {prefix} exceeds {max}")
        })
}

impl TryFrom<String> for AddressExpr {
    type Error = RulewardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AddressExpr> for String {
    fn from(value: AddressExpr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AddressExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressExpr::Host(ip) => write!(f, "{ip}"),
            AddressExpr::Network(net) => write!(f, "{}/{}", net.network(), net.prefix()),
        }
    }
}

/// Decide whether `candidate` falls inside `expression`
///
/// Malformed expressions never match; they are rejected when a rule is
/// written, so evaluation never has to fail on them.
///
/// # Examples
/// ```
/// use ruleward::net::address_matches;
///
/// let ip = "10.1.2.3".parse().unwrap();
/// assert!(address_matches(ip, "10.0.0.0/8"));
/// assert!(!address_matches(ip, "::/0"));
/// assert!(!address_matches(ip, "not-an-address"));
/// ```
pub fn address_matches(candidate: IpAddr, expression: &str) -> bool {
    parse_address_expr(expression)
        .map(|expr| expr.contains(candidate))
        .unwrap_or(false)
}
