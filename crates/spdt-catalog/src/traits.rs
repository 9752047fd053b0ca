//! Collaborator interfaces consumed by the derivation engine.

use spdt_core::{
    BootShutdownTime, ContainerConfiguration, InfrastructureState, PerformanceProfile,
    PerformanceSetting, ResourceLimit,
};

use crate::error::CatalogResult;

/// Source of container performance data.
pub trait ProfileCatalog: Send + Sync {
    /// Setting for exactly `replicas` replicas under `limit`, if measured.
    fn find_by_limit_and_replicas(
        &self,
        limit: &ResourceLimit,
        replicas: u32,
    ) -> CatalogResult<Option<PerformanceSetting>>;

    fn find_profile_by_limit(&self, limit: &ResourceLimit)
    -> CatalogResult<Option<PerformanceProfile>>;

    /// Every known limit fitting under the given ceiling, sorted by CPU then memory.
    fn find_all_under_limit(
        &self,
        cpu_ceiling: f64,
        mem_ceiling: f64,
    ) -> CatalogResult<Vec<ResourceLimit>>;

    /// Configurations under the ceiling able to serve at least `min_rate`.
    ///
    /// Sorted by CPU, then memory, then replicas, then rate.
    fn match_under_limits_above_rate(
        &self,
        cpu_ceiling: f64,
        mem_ceiling: f64,
        min_rate: f64,
    ) -> CatalogResult<Vec<ContainerConfiguration>>;

    /// Insert a setting, replacing any existing one with the same replica count.
    fn upsert_setting(&self, limit: &ResourceLimit, setting: PerformanceSetting)
    -> CatalogResult<()>;
}

/// Source of VM boot and shutdown durations.
pub trait VmTimesStore: Send + Sync {
    fn boot_shutdown_time(&self, vm_type: &str, count: u32)
    -> CatalogResult<Option<BootShutdownTime>>;

    fn record_boot_shutdown_time(&self, vm_type: &str, times: BootShutdownTime)
    -> CatalogResult<()>;
}

/// Estimates boot and shutdown durations for VM types with no recorded history.
pub trait VmTimesPredictor: Send + Sync {
    fn predict_boot_shutdown_time(&self, vm_type: &str, count: u32)
    -> CatalogResult<BootShutdownTime>;
}

/// Estimates performance for replica counts the catalog has not measured.
pub trait Predictor: Send + Sync {
    /// Smallest replica set under `limit` able to serve `rate` req/s.
    fn predict_replicas(&self, rate: f64, limit: &ResourceLimit)
    -> CatalogResult<PerformanceSetting>;

    /// Expected throughput of `replicas` replicas under `limit`.
    fn predict_capacity(&self, replicas: u32, limit: &ResourceLimit)
    -> CatalogResult<PerformanceSetting>;
}

/// Supplies the currently deployed infrastructure.
pub trait LiveStateObserver: Send + Sync {
    fn current_state(&self) -> CatalogResult<InfrastructureState>;
}
