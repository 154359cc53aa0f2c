pub mod alert;
pub mod evaluator;
pub mod feed;
pub mod manager;
pub mod simulate;
pub mod stats;
pub mod sync;

pub use alert::{AlertPolicy, AlertSink, LogAlertSink, SecurityAlert, Severity};
pub use evaluator::Evaluator;
pub use feed::{FeedSummary, LiveFeed, RandomTraffic, TrafficProfile, TrafficSource};
pub use manager::PlanManager;
pub use simulate::{PlanRef, SimulationRequest, SimulationResponse, Simulator};
pub use stats::{BucketCount, TrafficStats};
pub use sync::ShutdownSignal;
