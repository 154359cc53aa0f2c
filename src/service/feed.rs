use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    sync::Arc,
    time::Duration,
};

use ipnetwork::IpNetwork;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::{
    error::{ErrorKind, Result, RulewardError},
    net::AddressExpr,
    policy::{Action, Direction, PlanId, Protocol, TrafficEvent},
};

use super::{evaluator::Evaluator, sync::ShutdownSignal};

pub const DEFAULT_FEED_INTERVAL: Duration = Duration::from_secs(1);

/// Supplier of traffic events for the live feed
#[cfg_attr(test, automock)]
pub trait TrafficSource: Send + 'static {
    fn next_event(&mut self) -> TrafficEvent;
}

/// Pools that synthetic traffic is drawn from
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrafficProfile {
    /// Hosts or CIDR blocks; addresses are picked uniformly inside a block
    pub addresses: Vec<AddressExpr>,
    pub ports: Vec<u16>,
    pub methods: Vec<String>,
    pub paths: Vec<String>,
    /// Share of events generated as outbound, between 0 and 1
    pub outbound_ratio: f64,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        let addresses = ["203.0.113.0/24", "198.51.100.0/24", "192.0.2.0/24", "10.0.0.0/8"]
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect();
        Self {
            addresses,
            ports: vec![22, 80, 443, 3306, 5432, 8080],
            methods: ["GET", "GET", "GET", "POST", "PUT", "DELETE"]
                .map(String::from)
                .to_vec(),
            paths: ["/", "/login", "/api/v1/orders", "/api/v1/users", "/admin", "/health"]
                .map(String::from)
                .to_vec(),
            outbound_ratio: 0.1,
        }
    }
}

impl TrafficProfile {
    pub fn validate(&self) -> Result<()> {
        if self.addresses.is_empty() {
            return Err(RulewardError::validation(
                "feed.traffic.addresses",
                "at least one address is required",
            ));
        }
        if !(0.0..=1.0).contains(&self.outbound_ratio) {
            return Err(RulewardError::validation(
                "feed.traffic.outbound_ratio",
                format!("{} is not between 0 and 1", self.outbound_ratio),
            ));
        }
        Ok(())
    }
}

/// Synthetic traffic drawn from a [`TrafficProfile`]
///
/// Mostly TCP, with a little UDP (DNS, NTP, syslog ports) and ICMP mixed in.
pub struct RandomTraffic {
    rng: StdRng,
    profile: TrafficProfile,
}

impl RandomTraffic {
    pub fn new(profile: TrafficProfile) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            profile,
        }
    }

    /// Deterministic sequence, for reproducible runs
    pub fn seeded(profile: TrafficProfile, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
        }
    }

    fn address(&mut self) -> IpAddr {
        match self.profile.addresses.choose(&mut self.rng).copied() {
            Some(AddressExpr::Host(host)) => host,
            Some(AddressExpr::Network(IpNetwork::V4(net))) => {
                let host_mask = u32::MAX.checked_shr(u32::from(net.prefix())).unwrap_or(0);
                let offset = self.rng.gen_range(0..=host_mask);
                IpAddr::V4(Ipv4Addr::from(u32::from(net.network()) | offset))
            }
            Some(AddressExpr::Network(IpNetwork::V6(net))) => {
                let host_mask = u128::MAX.checked_shr(u32::from(net.prefix())).unwrap_or(0);
                let offset = self.rng.gen_range(0..=host_mask);
                IpAddr::V6(Ipv6Addr::from(u128::from(net.network()) | offset))
            }
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl TrafficSource for RandomTraffic {
    fn next_event(&mut self) -> TrafficEvent {
        let direction = if self.rng.gen_bool(self.profile.outbound_ratio.clamp(0.0, 1.0)) {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
        let protocol = match self.rng.gen_range(0..20) {
            0 => Protocol::Icmp,
            1 | 2 => Protocol::Udp,
            _ => Protocol::Tcp,
        };
        let port = match protocol {
            Protocol::Icmp => None,
            Protocol::Udp => [53u16, 123, 514].choose(&mut self.rng).copied(),
            _ => self.profile.ports.choose(&mut self.rng).copied().or(Some(80)),
        };
        let method = self
            .profile
            .methods
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "GET".to_string());
        let path = self
            .profile
            .paths
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "/".to_string());

        TrafficEvent {
            direction,
            method,
            path,
            address: self.address(),
            protocol,
            port,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub evaluated: u64,
    pub allowed: u64,
    pub blocked: u64,
    /// Events dropped because storage was unavailable
    pub failed: u64,
}

/// Continuously evaluates generated traffic against one plan
pub struct LiveFeed {
    evaluator: Arc<Evaluator>,
    source: Box<dyn TrafficSource>,
    plan_id: PlanId,
    interval: Duration,
    limit: Option<u64>,
}

impl LiveFeed {
    pub fn new(evaluator: Arc<Evaluator>, source: Box<dyn TrafficSource>, plan_id: PlanId) -> Self {
        Self {
            evaluator,
            source,
            plan_id,
            interval: DEFAULT_FEED_INTERVAL,
            limit: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop after this many events instead of running until shutdown
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run until shutdown, the event limit, or the plan disappearing
    ///
    /// Infrastructure failures skip the event and keep the feed going; any
    /// other error ends the run.
    pub async fn run(mut self, shutdown: Arc<ShutdownSignal>) -> Result<FeedSummary> {
        let mut summary = FeedSummary::default();

        loop {
            let seen = summary.evaluated + summary.failed;
            if shutdown.is_shutdown() || self.limit.is_some_and(|limit| seen >= limit) {
                break;
            }

            let event = self.source.next_event();
            match self.evaluator.evaluate(self.plan_id, event).await {
                Ok(record) => {
                    summary.evaluated += 1;
                    match record.action {
                        Action::Allow => summary.allowed += 1,
                        Action::Block => summary.blocked += 1,
                    }
                }
                Err(err) if err.kind() == ErrorKind::Infrastructure => {
                    summary.failed += 1;
                    log::warn!("Live feed skipped an event for plan {}: {}", self.plan_id, err);
                }
                Err(err) => {
                    log::error!("Live feed for plan {} stopped: {}", self.plan_id, err);
                    return Err(err);
                }
            }

            if shutdown.wait_timeout_or_shutdown(self.interval).await {
                break;
            }
        }

        log::info!(
            "Live feed for plan {} finished: {} evaluated, {} allowed, {} blocked, {} failed",
            self.plan_id,
            summary.evaluated,
            summary.allowed,
            summary.blocked,
            summary.failed
        );
        Ok(summary)
    }
}
