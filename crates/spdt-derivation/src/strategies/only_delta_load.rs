use spdt_core::{ContainerConfiguration, InfrastructureState};
use tracing::trace;

use crate::context::DerivationContext;
use crate::error::DerivationResult;
use crate::strategy::{ConfigurationSelector, IntervalCursor};
use crate::vmset::{build_homogeneous_set, release_vms, vm_set_replica_capacity};

const LOAD_EPSILON: f64 = 1e-9;

/// Adjusts only for the difference between requested and provisioned load.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyDeltaLoad;

/// Outcome of sizing for the load delta alone.
pub(crate) struct DeltaConfiguration {
    pub config: ContainerConfiguration,
    /// Requested minus currently provisioned load, in req/s.
    pub load_delta: f64,
}

impl DeltaConfiguration {
    pub fn unchanged(&self) -> bool {
        self.load_delta.abs() < LOAD_EPSILON
    }
}

/// Keep the current limit; add VMs for missing replicas, or release VMs
/// holding only excess capacity.
pub(crate) fn delta_configuration(
    rate: f64,
    current: &InfrastructureState,
    ctx: &DerivationContext,
) -> DerivationResult<DeltaConfiguration> {
    let service = ctx.scaled_service(current)?;
    let limit = service.limit();
    let provisioned = ctx.state_load_capacity(service.replicas, &limit)?;
    let load_delta = rate - provisioned.msc_per_second;

    if load_delta.abs() < LOAD_EPSILON {
        let mut setting = provisioned;
        setting.replicas = service.replicas;
        return Ok(DeltaConfiguration {
            config: ContainerConfiguration {
                limit,
                setting,
                vms: current.vms.clone(),
            },
            load_delta,
        });
    }

    let mut config = ctx.estimate_pods_configuration(rate, &limit)?;
    let replicas = config.setting.replicas;
    let hosted = vm_set_replica_capacity(&current.vms, &limit, &ctx.vms)?;

    config.vms = if load_delta > 0.0 {
        if hosted >= replicas {
            current.vms.clone()
        } else {
            let extra =
                build_homogeneous_set(replicas - hosted, &limit, &ctx.vms, ctx.max_cluster_size)?;
            current.vms.merged(&extra)
        }
    } else {
        release_vms(&current.vms, hosted.saturating_sub(replicas), &limit, &ctx.vms)?
    };
    trace!(rate, load_delta, replicas, hosted, "delta configuration sized");
    Ok(DeltaConfiguration { config, load_delta })
}

impl ConfigurationSelector for OnlyDeltaLoad {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration> {
        Ok(delta_configuration(cursor.interval().requests, current, ctx)?.config)
    }
}
