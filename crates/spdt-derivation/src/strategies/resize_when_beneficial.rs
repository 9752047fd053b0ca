use spdt_core::{ContainerConfiguration, InfrastructureState, VmSet};
use tracing::debug;

use super::always_resize::resize_configuration;
use super::only_delta_load::delta_configuration;
use crate::context::DerivationContext;
use crate::error::{DerivationError, DerivationResult};
use crate::strategy::{ConfigurationSelector, IntervalCursor};
use crate::vmset::{delta_vm_set, vm_set_cost};

/// Chooses between a delta-only adjustment and a full repack, repacking only
/// when it is strictly cheaper over its useful lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeWhenBeneficial;

/// Seconds from the current interval until the first upcoming interval whose
/// load exceeds `capacity`, capped at the end of the horizon.
fn useful_lifetime_secs(cursor: &IntervalCursor<'_>, capacity: f64) -> f64 {
    let start = cursor.interval().start;
    let until = cursor
        .upcoming()
        .iter()
        .find(|i| i.requests > capacity)
        .map_or(cursor.horizon_end(), |i| i.start);
    (until - start).num_milliseconds().max(0) as f64 / 1000.0
}

/// Cost of keeping removed VMs running while they shut down.
fn reconfiguration_cost(
    current: &VmSet,
    target: &VmSet,
    ctx: &DerivationContext,
) -> DerivationResult<f64> {
    let (_, removed) = delta_vm_set(current, target);
    if removed.is_empty() {
        return Ok(0.0);
    }
    let shutdown_secs = ctx.vm_times().shutdown_time(&removed);
    Ok(vm_set_cost(&removed, &ctx.vms)? * shutdown_secs / 3600.0)
}

/// Running cost over the option's lifetime plus the cost of reaching it.
fn option_cost(
    option: &ContainerConfiguration,
    cursor: &IntervalCursor<'_>,
    current: &InfrastructureState,
    ctx: &DerivationContext,
) -> DerivationResult<f64> {
    let hourly = vm_set_cost(&option.vms, &ctx.vms)?;
    let lifetime = useful_lifetime_secs(cursor, option.setting.msc_per_second);
    Ok(hourly * lifetime / 3600.0 + reconfiguration_cost(&current.vms, &option.vms, ctx)?)
}

impl ConfigurationSelector for ResizeWhenBeneficial {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration> {
        let rate = cursor.interval().requests;
        let delta = delta_configuration(rate, current, ctx)?;
        if delta.unchanged() {
            return Ok(delta.config);
        }

        let repack = match resize_configuration(rate, ctx) {
            Ok(config) => config,
            Err(e @ (DerivationError::NoProfileAvailable { .. } | DerivationError::NoSuitableVms { .. })) => {
                debug!(error = %e, "no repack option, keeping delta configuration");
                return Ok(delta.config);
            }
            Err(e) => return Err(e),
        };

        if vm_set_cost(&repack.vms, &ctx.vms)? > vm_set_cost(&delta.config.vms, &ctx.vms)? {
            return Ok(delta.config);
        }
        let repack_cost = option_cost(&repack, cursor, current, ctx)?;
        let delta_cost = option_cost(&delta.config, cursor, current, ctx)?;
        debug!(
            index = cursor.index(),
            repack_cost,
            delta_cost,
            "resize comparison"
        );
        if repack_cost < delta_cost {
            Ok(repack)
        } else {
            Ok(delta.config)
        }
    }
}
