use spdt_core::{ContainerConfiguration, InfrastructureState, ResourceLimit};

use crate::context::DerivationContext;
use crate::error::DerivationResult;
use crate::strategy::{ConfigurationSelector, IntervalCursor};
use crate::vmset::{available_resources, build_homogeneous_set};

/// Re-derives limits and replicas from scratch for every interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysResize;

/// Ceiling for container limits: what the largest VM offers to replicas.
pub(crate) fn largest_vm_ceiling(ctx: &DerivationContext) -> DerivationResult<ResourceLimit> {
    let (cpu, mem) = available_resources(ctx.largest_vm()?);
    Ok(ResourceLimit::new(cpu, mem))
}

/// Best catalog configuration for `rate` packed on a fresh homogeneous set.
pub(crate) fn resize_configuration(
    rate: f64,
    ctx: &DerivationContext,
) -> DerivationResult<ContainerConfiguration> {
    let ceiling = largest_vm_ceiling(ctx)?;
    let mut config = ctx.select_profile_under_vm_limits(rate, &ceiling)?;
    config.vms = build_homogeneous_set(
        config.setting.replicas,
        &config.limit,
        &ctx.vms,
        ctx.max_cluster_size,
    )?;
    Ok(config)
}

impl ConfigurationSelector for AlwaysResize {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        _current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration> {
        resize_configuration(cursor.interval().requests, ctx)
    }
}
