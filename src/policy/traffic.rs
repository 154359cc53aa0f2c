use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::model::{Direction, Protocol};

/// One candidate connection presented to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficEvent {
    pub direction: Direction,
    pub method: String,
    pub path: String,
    /// Source address for inbound traffic, destination address for outbound
    pub address: IpAddr,
    pub protocol: Protocol,
    /// Absent for portless protocols such as ICMP
    pub port: Option<u16>,
}

impl TrafficEvent {
    pub fn inbound(source: IpAddr, protocol: Protocol, port: Option<u16>) -> Self {
        Self {
            direction: Direction::Inbound,
            method: "GET".to_string(),
            path: "/".to_string(),
            address: source,
            protocol,
            port,
        }
    }

    pub fn outbound(destination: IpAddr, protocol: Protocol, port: Option<u16>) -> Self {
        Self {
            direction: Direction::Outbound,
            ..Self::inbound(destination, protocol, port)
        }
    }

    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = method.into();
        self.path = path.into();
        self
    }
}
