use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RulewardError},
    policy::{PlanSpec, RuleSpec},
    service::{AlertPolicy, TrafficProfile},
    store::memory::DEFAULT_DECISION_CAPACITY,
};

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub plans: Vec<PlanConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single storage read or write during evaluation
    pub snapshot_timeout_ms: u64,
    /// Decision records retained per plan; the oldest are dropped first
    pub decision_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_ms: 500,
            decision_capacity: DEFAULT_DECISION_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub interval_ms: u64,
    /// Stop after this many events; unset runs until interrupted
    pub count: Option<u64>,
    pub bucket_secs: i64,
    pub seed: Option<u64>,
    pub traffic: TrafficProfile,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            count: None,
            bucket_secs: 10,
            seed: None,
            traffic: TrafficProfile::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Also alert on blocks that a monitoring plan only records
    pub include_monitor: bool,
    /// How long a single alert may take before it is dropped
    pub timeout_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let policy = AlertPolicy::default();
        Self {
            enabled: policy.enabled,
            include_monitor: policy.include_monitor,
            timeout_ms: 500,
        }
    }
}

/// A plan declared in the configuration file together with its rules
#[derive(Debug, Deserialize, Serialize)]
pub struct PlanConfig {
    #[serde(flatten)]
    pub plan: PlanSpec,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl ConfigFile {
    /// Load configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ConfigFile =
            toml::from_str(&content).map_err(|source| RulewardError::ConfigParse {
                path: PathBuf::from(path),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the engine and feed settings; plans are validated when loaded
    pub fn validate(&self) -> Result<()> {
        if self.engine.snapshot_timeout_ms == 0 {
            return Err(RulewardError::validation(
                "engine.snapshot_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.alerts.timeout_ms == 0 {
            return Err(RulewardError::validation(
                "alerts.timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.engine.decision_capacity == 0 {
            return Err(RulewardError::validation(
                "engine.decision_capacity",
                "must be greater than zero",
            ));
        }
        if self.feed.bucket_secs <= 0 {
            return Err(RulewardError::validation(
                "feed.bucket_secs",
                "must be greater than zero",
            ));
        }
        self.feed.traffic.validate()
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.snapshot_timeout_ms)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alerts.timeout_ms)
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            enabled: self.alerts.enabled,
            include_monitor: self.alerts.include_monitor,
        }
    }
}
