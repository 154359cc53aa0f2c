use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::RulewardError;

/// Port expression of a rule: "All", a single port, or an inclusive "start-end" range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortRange {
    All,
    Single(u16),
    Range { start: u16, end: u16 },
}

impl PortRange {
    /// Test a concrete port. A missing port (e.g. ICMP traffic) only matches `All`.
    pub fn contains(&self, candidate: Option<u16>) -> bool {
        match (self, candidate) {
            (PortRange::All, _) => true,
            (_, None) => false,
            (PortRange::Single(port), Some(candidate)) => *port == candidate,
            (PortRange::Range { start, end }, Some(candidate)) => {
                (*start..=*end).contains(&candidate)
            }
        }
    }
}

impl FromStr for PortRange {
    type Err = RulewardError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_port_range(input).map_err(|reason| RulewardError::validation("port_range", reason))
    }
}

fn parse_port_range(input: &str) -> Result<PortRange, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }
    if trimmed.eq_ignore_ascii_case("all") || trimmed == "*" {
        return Ok(PortRange::All);
    }

    match trimmed.split_once('-') {
        Some((start, end)) => {
            let start = parse_port(start)?;
            let end = parse_port(end)?;
            if start > end {
                return Err(format!("range start {start} is greater than end {end}"));
            }
            if start == end {
                return Ok(PortRange::Single(start));
            }
            Ok(PortRange::Range { start, end })
        }
        None => parse_port(trimmed).map(PortRange::Single),
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{raw}' is not a port number"));
    }
    raw.parse::<u16>()
        .map_err(|_| format!("port {raw} is out of range (0-65535)"))
}

impl TryFrom<String> for PortRange {
    type Error = RulewardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortRange> for String {
    fn from(value: PortRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRange::All => f.write_str("All"),
            PortRange::Single(port) => write!(f, "{port}"),
            PortRange::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

/// Decide whether `candidate` falls inside the port `expression`
///
/// Malformed expressions never match.
pub fn port_matches(candidate: Option<u16>, expression: &str) -> bool {
    parse_port_range(expression)
        .map(|range| range.contains(candidate))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(80, true)]
    #[case(443, true)]
    #[case(200, true)]
    #[case(79, false)]
    #[case(444, false)]
    fn test_range_boundaries(#[case] port: u16, #[case] expected: bool) {
        assert_eq!(port_matches(Some(port), "80-443"), expected);
    }

    #[rstest]
    #[case("All", PortRange::All)]
    #[case("all", PortRange::All)]
    #[case("*", PortRange::All)]
    #[case("22", PortRange::Single(22))]
    #[case(" 8080 ", PortRange::Single(8080))]
    #[case("0", PortRange::Single(0))]
    #[case("65535", PortRange::Single(65535))]
    #[case("1024-2048", PortRange::Range { start: 1024, end: 2048 })]
    #[case("1024 - 2048", PortRange::Range { start: 1024, end: 2048 })]
    #[case("53-53", PortRange::Single(53))]
    fn test_parse_valid(#[case] input: &str, #[case] expected: PortRange) {
        assert_eq!(input.parse::<PortRange>().unwrap(), expected);
    }

    #[rstest]
    #[case("abc", "not a number")]
    #[case("", "empty")]
    #[case("65536", "too large")]
    #[case("-1", "negative")]
    #[case("443-80", "reversed range")]
    #[case("80-", "open range")]
    #[case("80-90-100", "three parts")]
    #[case("+80", "sign prefix")]
    fn test_parse_invalid(#[case] input: &str, #[case] _description: &str) {
        let err = input.parse::<PortRange>().unwrap_err();
        assert!(
            matches!(err, RulewardError::Validation { ref field, .. } if field == "port_range")
        );
        assert!(!port_matches(Some(80), input));
    }

    #[test]
    fn missing_port_matches_only_all() {
        assert!(PortRange::All.contains(None));
        assert!(!PortRange::Single(0).contains(None));
        assert!(!PortRange::Range { start: 0, end: 65535 }.contains(None));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for text in ["All", "22", "80-443"] {
            assert_eq!(text.parse::<PortRange>().unwrap().to_string(), text);
        }
    }
}
