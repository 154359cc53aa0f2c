use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::policy::{Action, DecisionRecord};

/// Allowed and blocked decisions within one time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCount {
    pub start: DateTime<Utc>,
    pub allowed: u64,
    pub blocked: u64,
}

pub struct TrafficStats;

impl TrafficStats {
    /// Group records into buckets of `width_secs`, oldest bucket first
    ///
    /// Buckets are aligned to the Unix epoch. Empty buckets are omitted and a
    /// zero width yields no buckets.
    pub fn bucketed(records: &[DecisionRecord], width_secs: i64) -> Vec<BucketCount> {
        if width_secs <= 0 {
            return Vec::new();
        }

        let mut buckets: BTreeMap<i64, (u64, u64)> = BTreeMap::new();
        for record in records {
            let ts = record.decided_at.timestamp();
            let start = ts - ts.rem_euclid(width_secs);
            let entry = buckets.entry(start).or_default();
            match record.action {
                Action::Allow => entry.0 += 1,
                Action::Block => entry.1 += 1,
            }
        }

        buckets
            .into_iter()
            .filter_map(|(start, (allowed, blocked))| {
                Some(BucketCount {
                    start: DateTime::from_timestamp(start, 0)?,
                    allowed,
                    blocked,
                })
            })
            .collect()
    }
}
