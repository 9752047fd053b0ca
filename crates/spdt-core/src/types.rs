//! Domain types shared across SPDT crates.
//!
//! VM and performance profiles come from the catalog, forecasts from the
//! forecasting component. Everything from `CriticalInterval` down is
//! produced by the derivation engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of a VM type, e.g. `t2.large`.
pub type VmType = String;

// ── Catalog entries ───────────────────────────────────────────────

/// Hourly pricing of a VM type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pricing {
    /// Price per hour.
    pub price: f64,
    #[serde(default)]
    pub unit: String,
}

/// Immutable catalog entry describing one VM type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmProfile {
    #[serde(rename = "type")]
    pub vm_type: VmType,
    pub cpu_cores: f64,
    pub mem_gb: f64,
    #[serde(default)]
    pub os: String,
    pub pricing: Pricing,
}

impl VmProfile {
    pub fn price(&self) -> f64 {
        self.pricing.price
    }
}

/// Resources granted to each container replica.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceLimit {
    pub cpu_cores: f64,
    pub mem_gb: f64,
}

impl ResourceLimit {
    pub fn new(cpu_cores: f64, mem_gb: f64) -> Self {
        Self { cpu_cores, mem_gb }
    }

    /// Stable key used to index profiles by limit.
    pub fn key(&self) -> String {
        format!("{:.3}:{:.3}", self.cpu_cores, self.mem_gb)
    }

    /// Whether this limit fits under the given ceiling on both resources.
    pub fn fits_under(&self, cpu_ceiling: f64, mem_ceiling: f64) -> bool {
        self.cpu_cores <= cpu_ceiling && self.mem_gb <= mem_ceiling
    }
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cpu / {} GB", self.cpu_cores, self.mem_gb)
    }
}

/// Throughput of a replica set of a given size under one limit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSetting {
    pub replicas: u32,
    /// Maximum sustained requests per second (MSC).
    pub msc_per_second: f64,
    pub boot_time_secs: f64,
    #[serde(default)]
    pub boot_time_std_dev_secs: f64,
}

/// All known performance settings for one resource limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceProfile {
    pub limit: ResourceLimit,
    pub settings: Vec<PerformanceSetting>,
}

impl PerformanceProfile {
    pub fn setting_for(&self, replicas: u32) -> Option<&PerformanceSetting> {
        self.settings.iter().find(|s| s.replicas == replicas)
    }
}

/// Measured boot and shutdown times for `instances` VMs of one type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BootShutdownTime {
    #[serde(alias = "NumInstances")]
    pub instances: u32,
    #[serde(alias = "BootTime")]
    pub boot_secs: f64,
    #[serde(alias = "ShutDownTime")]
    pub shutdown_secs: f64,
}

/// Booting-time history for one VM type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmBootProfile {
    #[serde(alias = "VMType")]
    pub vm_type: VmType,
    #[serde(alias = "InstanceValues")]
    pub values: Vec<BootShutdownTime>,
}

/// Read-only snapshot of the VM types a policy may use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmCatalog {
    profiles: BTreeMap<VmType, VmProfile>,
}

impl VmCatalog {
    pub fn new(profiles: impl IntoIterator<Item = VmProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.vm_type.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, vm_type: &str) -> Option<&VmProfile> {
        self.profiles.get(vm_type)
    }

    pub fn contains(&self, vm_type: &str) -> bool {
        self.profiles.contains_key(vm_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VmProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The VM type with the most CPU, then memory, then price.
    pub fn largest(&self) -> Option<&VmProfile> {
        self.profiles.values().max_by(|a, b| {
            a.cpu_cores
                .total_cmp(&b.cpu_cores)
                .then(a.mem_gb.total_cmp(&b.mem_gb))
                .then(a.price().total_cmp(&b.price()))
        })
    }
}

// ── Infrastructure state ──────────────────────────────────────────

/// Number of VMs of each type. Zero counts are pruned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct VmSet(BTreeMap<VmType, u32>);

impl VmSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(vm_type: &str, count: u32) -> Self {
        let mut set = Self::new();
        set.add(vm_type, count);
        set
    }

    pub fn get(&self, vm_type: &str) -> u32 {
        self.0.get(vm_type).copied().unwrap_or(0)
    }

    /// Add `count` instances of `vm_type`. Adding zero is a no-op.
    pub fn add(&mut self, vm_type: &str, count: u32) {
        if count > 0 {
            *self.0.entry(vm_type.to_string()).or_insert(0) += count;
        }
    }

    /// Remove up to `count` instances of `vm_type`, dropping the entry at zero.
    pub fn remove(&mut self, vm_type: &str, count: u32) {
        if let Some(n) = self.0.get_mut(vm_type) {
            *n = n.saturating_sub(count);
            if *n == 0 {
                self.0.remove(vm_type);
            }
        }
    }

    /// Union of two sets, summing counts of shared types.
    pub fn merged(&self, other: &VmSet) -> VmSet {
        let mut out = self.clone();
        for (vm_type, count) in other.iter() {
            out.add(vm_type, count);
        }
        out
    }

    pub fn pruned(mut self) -> Self {
        self.0.retain(|_, n| *n > 0);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn total_vms(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn type_count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|n| *n == 0)
    }
}

impl FromIterator<(VmType, u32)> for VmSet {
    fn from_iter<I: IntoIterator<Item = (VmType, u32)>>(iter: I) -> Self {
        let mut set = VmSet::new();
        for (vm_type, count) in iter {
            set.add(&vm_type, count);
        }
        set
    }
}

/// Scale and per-replica limits of one service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceState {
    #[serde(alias = "scale")]
    pub replicas: u32,
    #[serde(alias = "cpu")]
    pub cpu_cores: f64,
    #[serde(alias = "memory")]
    pub mem_gb: f64,
}

impl ServiceState {
    pub fn limit(&self) -> ResourceLimit {
        ResourceLimit::new(self.cpu_cores, self.mem_gb)
    }
}

/// A point-in-time desired (or observed) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InfrastructureState {
    pub services: BTreeMap<String, ServiceState>,
    pub vms: VmSet,
}

impl InfrastructureState {
    pub fn service(&self, name: &str) -> Option<&ServiceState> {
        self.services.get(name)
    }
}

// ── Forecast and derivation ───────────────────────────────────────

/// Forecasted number of requests at one instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub requests: f64,
}

/// Forecast received from the forecasting component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    #[serde(default)]
    pub id: String,
    pub service_name: String,
    pub values: Vec<ForecastSample>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Unit of the forecast's request counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Granularity {
    #[serde(rename = "h")]
    #[default]
    Hour,
    #[serde(rename = "m")]
    Minute,
    #[serde(rename = "s")]
    Second,
}

impl Granularity {
    /// Seconds per granularity unit.
    pub fn factor(self) -> f64 {
        match self {
            Granularity::Hour => 3600.0,
            Granularity::Minute => 60.0,
            Granularity::Second => 1.0,
        }
    }

    /// Convert a per-second capacity into forecast units.
    pub fn from_per_second(self, per_second: f64) -> f64 {
        per_second * self.factor()
    }
}

/// Coalesced span of the forecast carrying one representative load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CriticalInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Representative load in requests per second.
    pub requests: f64,
}

/// Per-interval resource decision made by a strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContainerConfiguration {
    pub limit: ResourceLimit,
    pub setting: PerformanceSetting,
    pub vms: VmSet,
}

// ── Policies ──────────────────────────────────────────────────────

/// Metrics of a single scaling action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionMetrics {
    pub cost: f64,
    pub over_provision: f64,
    pub under_provision: f64,
    /// Requests the configuration can serve, in forecast units.
    pub requests_capacity: f64,
    pub cpu_utilization: f64,
    pub mem_utilization: f64,
    pub shadow_time_secs: f64,
    pub transition_time_secs: f64,
    pub elapsed_time_secs: f64,
}

/// One step of a policy timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingAction {
    /// When the change must begin so `desired_state` is ready at `start`.
    pub transition_start: DateTime<Utc>,
    pub initial_state: InfrastructureState,
    pub desired_state: InfrastructureState,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub metrics: ActionMetrics,
}

/// Aggregate metrics of a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyMetrics {
    pub cost: f64,
    pub over_provision: f64,
    pub under_provision: f64,
    pub scaling_actions: usize,
    pub vm_scaling_actions: usize,
    pub container_scaling_actions: usize,
    pub derivation_started: DateTime<Utc>,
    pub derivation_finished: DateTime<Utc>,
    pub derivation_duration_secs: f64,
    pub avg_shadow_time_secs: f64,
    pub avg_transition_time_secs: f64,
    pub avg_elapsed_time_secs: f64,
}

impl PolicyMetrics {
    /// Fresh metrics for a derivation started at `started`.
    pub fn started_at(started: DateTime<Utc>) -> Self {
        Self {
            cost: 0.0,
            over_provision: 0.0,
            under_provision: 0.0,
            scaling_actions: 0,
            vm_scaling_actions: 0,
            container_scaling_actions: 0,
            derivation_started: started,
            derivation_finished: started,
            derivation_duration_secs: 0.0,
            avg_shadow_time_secs: 0.0,
            avg_transition_time_secs: 0.0,
            avg_elapsed_time_secs: 0.0,
        }
    }
}

/// Lifecycle of a derived policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    #[default]
    Discarded,
    Selected,
    Scheduled,
}

/// Strategy used to derive a policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Naive,
    AlwaysResize,
    BestResourcePair,
    OnlyDeltaLoad,
    ResizeWhenBeneficial,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Naive,
        Algorithm::AlwaysResize,
        Algorithm::BestResourcePair,
        Algorithm::OnlyDeltaLoad,
        Algorithm::ResizeWhenBeneficial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Naive => "naive",
            Algorithm::AlwaysResize => "always-resize",
            Algorithm::BestResourcePair => "best-resource-pair",
            Algorithm::OnlyDeltaLoad => "only-delta-load",
            Algorithm::ResizeWhenBeneficial => "resize-when-beneficial",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown algorithm: {s}"))
    }
}

/// Keys of `Policy::parameters`.
pub mod params {
    pub const METHOD: &str = "scaling-method";
    pub const HETEROGENEOUS: &str = "heterogeneous-vms-allowed";
    pub const RESIZE_PODS: &str = "pods-resize-allowed";
    pub const METHOD_HORIZONTAL: &str = "horizontal";
}

/// A derived scaling policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: String,
    pub algorithm: Algorithm,
    pub scaling_actions: Vec<ScalingAction>,
    pub metrics: PolicyMetrics,
    pub parameters: BTreeMap<String, String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: PolicyStatus,
}

/// How VM time is charged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingUnit {
    /// Whole seconds, rounded down.
    Second,
    /// Whole hours, rounded up.
    #[default]
    Hour,
}

impl BillingUnit {
    /// Chargeable hours for a span of `secs` seconds.
    pub fn billed_hours(self, secs: f64) -> f64 {
        let secs = secs.max(0.0);
        match self {
            BillingUnit::Second => secs.floor() / 3600.0,
            BillingUnit::Hour => (secs / 3600.0).ceil(),
        }
    }
}
