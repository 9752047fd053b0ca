//! Capacity supplied by a policy over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spdt_core::Policy;

/// Capacity, in forecast units, that becomes active at `time`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CapacityPoint {
    pub time: DateTime<Utc>,
    pub requests_capacity: f64,
}

/// One point per scaling action, in timeline order.
pub fn capacity_supply(policy: &Policy) -> Vec<CapacityPoint> {
    policy
        .scaling_actions
        .iter()
        .map(|a| CapacityPoint {
            time: a.start,
            requests_capacity: a.metrics.requests_capacity,
        })
        .collect()
}
