//! Export of a selected policy as states for the cluster scheduler.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use spdt_core::{InfrastructureState, Policy, ServiceState, VmSet};

/// Decimal gigabytes, matching the scheduler's byte conversion.
const BYTES_PER_GB: f64 = 1e9;

/// Per-service deployment request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceToSchedule {
    pub replicas: u32,
    /// CPU limit in millicores, e.g. `"500m"`.
    pub cpu: String,
    /// Memory limit in bytes.
    pub memory: u64,
}

impl From<&ServiceState> for ServiceToSchedule {
    fn from(service: &ServiceState) -> Self {
        Self {
            replicas: service.replicas,
            cpu: format!("{}m", (service.cpu_cores * 1000.0).round() as u64),
            memory: (service.mem_gb * BYTES_PER_GB).round() as u64,
        }
    }
}

/// One state handed to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StateToSchedule {
    /// When the scheduler must begin applying the state.
    #[serde(rename = "ISODate")]
    pub launch_time: DateTime<Utc>,
    #[serde(rename = "ExpectedTime")]
    pub expected_start: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceToSchedule>,
    pub name: String,
    /// Target VM counts; types being removed appear with count 0.
    #[serde(rename = "VMs")]
    pub vms: BTreeMap<String, u32>,
}

/// Stable name of a desired state: hex SHA-256 of its canonical JSON.
pub fn state_hash(state: &InfrastructureState) -> String {
    // string-keyed BTreeMaps only: serialization is infallible and key-ordered
    let canonical = serde_json::to_vec(state).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// Desired counts plus explicit zeros for every type only in `initial`.
fn vms_with_removed(initial: &VmSet, desired: &VmSet) -> BTreeMap<String, u32> {
    let mut vms: BTreeMap<String, u32> = initial.types().map(|t| (t.to_string(), 0)).collect();
    for (vm_type, count) in desired.iter() {
        vms.insert(vm_type.to_string(), count);
    }
    vms
}

pub fn states_to_schedule(policy: &Policy) -> Vec<StateToSchedule> {
    policy
        .scaling_actions
        .iter()
        .map(|action| StateToSchedule {
            launch_time: action.transition_start,
            expected_start: action.start,
            services: action
                .desired_state
                .services
                .iter()
                .map(|(name, service)| (name.clone(), ServiceToSchedule::from(service)))
                .collect(),
            name: state_hash(&action.desired_state),
            vms: vms_with_removed(&action.initial_state.vms, &action.desired_state.vms),
        })
        .collect()
}
