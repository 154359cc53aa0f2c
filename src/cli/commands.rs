use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    error::Result,
    policy::{Action, Direction, Protocol, SecurityPlan},
    service::{
        BucketCount, Evaluator, FeedSummary, LiveFeed, LogAlertSink, PlanManager, PlanRef,
        RandomTraffic, ShutdownSignal, SimulationRequest, Simulator, TrafficStats,
    },
    store::MemoryStore,
};

use super::{
    args::{Args, Command, LiveArgs, SimulateArgs},
    config::ConfigFile,
    loader::PlanLoader,
};

/// In-memory engine populated from a configuration file
pub struct Engine {
    pub manager: PlanManager,
    pub evaluator: Arc<Evaluator>,
    pub plans: Vec<SecurityPlan>,
}

impl Engine {
    pub async fn build(config: &ConfigFile) -> Result<Self> {
        let store = Arc::new(MemoryStore::with_decision_capacity(
            config.engine.decision_capacity,
        ));
        let manager = PlanManager::new(store.clone());
        let plans = PlanLoader::load(config, &manager).await?;
        let evaluator = Evaluator::new(store.clone(), store, Arc::new(LogAlertSink))
            .with_alert_policy(config.alert_policy())
            .with_storage_timeout(config.snapshot_timeout())
            .with_alert_timeout(config.alert_timeout());

        Ok(Self {
            manager,
            evaluator: Arc::new(evaluator),
            plans,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveReport {
    pub summary: FeedSummary,
    pub buckets: Vec<BucketCount>,
}

/// Run the selected subcommand and return the process exit code
pub async fn run(args: Args) -> Result<i32> {
    match args.command {
        Command::Validate { config } => {
            let config = ConfigFile::load(&config)?;
            let engine = Engine::build(&config).await?;
            print_json(&engine.plans)?;
            Ok(0)
        }
        Command::Simulate(args) => simulate(args).await,
        Command::Live(args) => {
            let report = live(args).await?;
            print_json(&report)?;
            Ok(0)
        }
    }
}

async fn simulate(args: SimulateArgs) -> Result<i32> {
    let config = ConfigFile::load(&args.config)?;
    let engine = Engine::build(&config).await?;

    let request = SimulationRequest {
        plan: PlanRef::parse(&args.plan),
        method: args.method,
        path: args.path,
        ip: args.ip,
        direction: if args.outbound {
            Direction::Outbound
        } else {
            Direction::Inbound
        },
        protocol: args.protocol.as_deref().map(str::parse::<Protocol>).transpose()?,
        port: args.port,
    };

    let response = Simulator::new(engine.evaluator).simulate(&request).await?;
    print_json(&response)?;

    if args.fail_on_block && response.action == Action::Block {
        return Ok(1);
    }
    Ok(0)
}

async fn live(args: LiveArgs) -> Result<LiveReport> {
    let config = ConfigFile::load(&args.config)?;
    let engine = Engine::build(&config).await?;
    let simulator = Simulator::new(engine.evaluator.clone());
    let plan_id = simulator.resolve(&PlanRef::parse(&args.plan)).await?;

    let traffic = config.feed.traffic.clone();
    let source = match args.seed.or(config.feed.seed) {
        Some(seed) => RandomTraffic::seeded(traffic, seed),
        None => RandomTraffic::new(traffic),
    };
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(config.feed.interval_ms));
    let mut feed = LiveFeed::new(engine.evaluator.clone(), Box::new(source), plan_id)
        .with_interval(interval);
    if let Some(count) = args.count.or(config.feed.count) {
        feed = feed.with_limit(count);
    }

    let shutdown = ShutdownSignal::new();
    let interrupt = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Interrupt received, stopping live feed");
                shutdown.shutdown();
            }
        })
    };

    log::info!("Live feed started for plan {}", plan_id);
    let result = feed.run(shutdown).await;
    interrupt.abort();
    let summary = result?;

    let records = engine.evaluator.records(plan_id).await?;
    let width = args.bucket_secs.unwrap_or(config.feed.bucket_secs);
    Ok(LiveReport {
        summary,
        buckets: TrafficStats::bucketed(&records, width),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RulewardError};
    use rstest::rstest;
    use std::{io::Write, path::PathBuf};

    const CONFIG: &str = r#"
[[plans]]
name = "web-tier"
owner = "ops"
mode = "enforce"

[[plans.rules]]
direction = "inbound"
protocol = "TCP"
port_range = "80-443"
source = "0.0.0.0/0"
priority = 1

[[plans.rules]]
direction = "inbound"
type = "SSH"
source = "10.0.0.0/8"
priority = 5
"#;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{content}").unwrap();
        tmp
    }

    fn simulate_args(config: PathBuf, ip: &str, port: u16) -> SimulateArgs {
        SimulateArgs {
            config,
            plan: "web-tier".to_string(),
            ip: ip.parse().unwrap(),
            method: "GET".to_string(),
            path: "/".to_string(),
            protocol: None,
            port: Some(port),
            outbound: false,
            fail_on_block: true,
        }
    }

    #[tokio::test]
    async fn engine_loads_configured_plans() {
        let tmp = config_file(CONFIG);
        let config = ConfigFile::load(tmp.path()).unwrap();
        let engine = Engine::build(&config).await.unwrap();
        assert_eq!(engine.plans.len(), 1);
        assert_eq!(engine.plans[0].rule_count, 2);
    }

    #[tokio::test]
    async fn bundled_example_config_loads() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("plans.example.toml");
        let config = ConfigFile::load(&path).unwrap();
        let engine = Engine::build(&config).await.unwrap();
        let names: Vec<_> = engine.plans.iter().map(|plan| plan.name.as_str()).collect();
        assert_eq!(names, ["web-tier", "api-tier"]);
        assert_eq!(engine.plans[0].rule_count, 4);
    }

    #[tokio::test]
    async fn simulate_exit_codes() {
        let tmp = config_file(CONFIG);
        let allowed = simulate(simulate_args(tmp.path().to_path_buf(), "203.0.113.5", 443));
        assert_eq!(allowed.await.unwrap(), 0);

        let blocked = simulate(simulate_args(tmp.path().to_path_buf(), "203.0.113.5", 22));
        assert_eq!(blocked.await.unwrap(), 1);

        let internal_ssh = simulate(simulate_args(tmp.path().to_path_buf(), "10.1.2.3", 22));
        assert_eq!(internal_ssh.await.unwrap(), 0);
    }

    #[rstest]
    #[case("SCTP", "unknown protocol")]
    #[case("All", "rule-only protocol")]
    #[tokio::test]
    async fn simulate_rejects_protocol(#[case] protocol: &str, #[case] _description: &str) {
        let tmp = config_file(CONFIG);
        let mut args = simulate_args(tmp.path().to_path_buf(), "203.0.113.5", 443);
        args.protocol = Some(protocol.to_string());
        let err = simulate(args).await.unwrap_err();
        assert!(matches!(err, RulewardError::Validation { ref field, .. } if field == "protocol"));
    }

    #[tokio::test]
    async fn live_runs_for_count_and_buckets_records() {
        let tmp = config_file(CONFIG);
        let args = LiveArgs {
            config: tmp.path().to_path_buf(),
            plan: "web-tier".to_string(),
            count: Some(5),
            interval_ms: Some(1),
            bucket_secs: Some(3600),
            seed: Some(11),
        };

        let report = live(args).await.unwrap();
        assert_eq!(report.summary.evaluated, 5);
        assert_eq!(report.summary.allowed + report.summary.blocked, 5);
        let bucketed: u64 = report.buckets.iter().map(|b| b.allowed + b.blocked).sum();
        assert_eq!(bucketed, 5);
    }

    #[tokio::test]
    async fn live_for_unknown_plan_is_not_found() {
        let tmp = config_file(CONFIG);
        let args = LiveArgs {
            config: tmp.path().to_path_buf(),
            plan: "api-tier".to_string(),
            count: Some(1),
            interval_ms: Some(1),
            bucket_secs: None,
            seed: None,
        };
        assert_eq!(live(args).await.unwrap_err().kind(), ErrorKind::NotFound);
    }
}
