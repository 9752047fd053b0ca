use std::sync::Arc;

use spdt_catalog::{Predictor, ProfileCatalog, VmTimesPredictor, VmTimesStore};
use spdt_core::constants::DEFAULT_MAX_CLUSTER_SIZE;
use spdt_core::{Granularity, ResourceLimit, ServiceState, VmCatalog, VmProfile};

use crate::error::{DerivationError, DerivationResult};
use crate::timeline::VmTimes;

/// Read-only inputs shared by every strategy of a derivation run.
///
/// Cloning is cheap; all collaborators are behind `Arc`.
#[derive(Clone)]
pub struct DerivationContext {
    /// Service whose replicas are scaled.
    pub service_name: String,
    pub vms: Arc<VmCatalog>,
    pub catalog: Arc<dyn ProfileCatalog>,
    pub predictor: Arc<dyn Predictor>,
    pub vm_times: Arc<dyn VmTimesStore>,
    /// Consulted when `vm_times` has no history for a VM type.
    pub vm_times_predictor: Option<Arc<dyn VmTimesPredictor>>,
    pub granularity: Granularity,
    /// Largest number of VMs a single homogeneous set may contain.
    pub max_cluster_size: u32,
}

impl DerivationContext {
    pub fn new(
        service_name: impl Into<String>,
        vms: Arc<VmCatalog>,
        catalog: Arc<dyn ProfileCatalog>,
        predictor: Arc<dyn Predictor>,
        vm_times: Arc<dyn VmTimesStore>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            vms,
            catalog,
            predictor,
            vm_times,
            vm_times_predictor: None,
            granularity: Granularity::default(),
            max_cluster_size: DEFAULT_MAX_CLUSTER_SIZE,
        }
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_max_cluster_size(mut self, max_cluster_size: u32) -> Self {
        self.max_cluster_size = max_cluster_size;
        self
    }

    pub fn with_vm_times_predictor(mut self, predictor: Arc<dyn VmTimesPredictor>) -> Self {
        self.vm_times_predictor = Some(predictor);
        self
    }

    /// Boot/shutdown lookups backed by the store and, on a miss, the predictor.
    pub fn vm_times(&self) -> VmTimes<'_> {
        let times = VmTimes::new(self.vm_times.as_ref());
        match &self.vm_times_predictor {
            Some(predictor) => times.with_predictor(predictor.as_ref()),
            None => times,
        }
    }

    /// The largest VM type available.
    ///
    /// An empty catalog cannot host even a single replica.
    pub fn largest_vm(&self) -> DerivationResult<&VmProfile> {
        self.vms.largest().ok_or(DerivationError::NoSuitableVms {
            replicas: 1,
            limit: ResourceLimit::new(0.0, 0.0),
        })
    }

    pub fn vm_profile(&self, vm_type: &str) -> DerivationResult<&VmProfile> {
        self.vms
            .get(vm_type)
            .ok_or_else(|| DerivationError::UnknownVmType(vm_type.to_string()))
    }

    /// The scaled service as found in `state`.
    pub fn scaled_service<'s>(
        &self,
        state: &'s spdt_core::InfrastructureState,
    ) -> DerivationResult<&'s ServiceState> {
        state
            .service(&self.service_name)
            .ok_or_else(|| DerivationError::ServiceNotDeployed(self.service_name.clone()))
    }
}
