use spdt_core::{ContainerConfiguration, InfrastructureState, VmProfile};
use tracing::warn;

use crate::context::DerivationContext;
use crate::error::{DerivationError, DerivationResult};
use crate::strategy::{ConfigurationSelector, IntervalCursor};
use crate::vmset::{build_homogeneous_set, homogeneous_set_of_type};

/// Keeps the deployed container limit and VM type; only counts change.
#[derive(Debug, Clone, Copy, Default)]
pub struct Naive;

impl Naive {
    /// Deployed VM type with the most memory.
    fn deployed_vm_type<'c>(
        current: &InfrastructureState,
        ctx: &'c DerivationContext,
    ) -> DerivationResult<Option<&'c VmProfile>> {
        let mut chosen: Option<&VmProfile> = None;
        for vm_type in current.vms.types() {
            let vm = ctx.vm_profile(vm_type)?;
            if chosen.is_none_or(|c| vm.mem_gb > c.mem_gb) {
                chosen = Some(vm);
            }
        }
        match chosen {
            Some(vm) if current.vms.type_count() > 1 => {
                warn!(vm_type = %vm.vm_type, "several VM types deployed, scaling the one with most memory");
            }
            _ => {}
        }
        Ok(chosen)
    }
}

impl ConfigurationSelector for Naive {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration> {
        let limit = ctx.scaled_service(current)?.limit();
        let mut config = ctx.estimate_pods_configuration(cursor.interval().requests, &limit)?;
        let replicas = config.setting.replicas;

        config.vms = match Self::deployed_vm_type(current, ctx)? {
            Some(vm) => homogeneous_set_of_type(replicas, &limit, vm, ctx.max_cluster_size)
                .ok_or(DerivationError::NoSuitableVms { replicas, limit })?,
            None => build_homogeneous_set(replicas, &limit, &ctx.vms, ctx.max_cluster_size)?,
        };
        Ok(config)
    }
}
