use spdt_core::{ContainerConfiguration, CriticalInterval, InfrastructureState, ResourceLimit, VmType};
use tracing::{debug, info};

use super::always_resize::largest_vm_ceiling;
use crate::context::DerivationContext;
use crate::error::{DerivationError, DerivationResult};
use crate::strategy::{ConfigurationSelector, IntervalCursor};
use crate::vmset::homogeneous_set_of_type;

/// One (limit, VM type) pair fixed for the whole policy.
///
/// The pair is the cheapest way to serve the peak load of the horizon,
/// ties broken by fewer replicas.
#[derive(Debug, Clone, PartialEq)]
pub struct BestResourcePair {
    pub limit: ResourceLimit,
    pub vm_type: VmType,
}

impl BestResourcePair {
    pub fn find(intervals: &[CriticalInterval], ctx: &DerivationContext) -> DerivationResult<Self> {
        let peak = intervals
            .iter()
            .map(|i| i.requests)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
            .ok_or(DerivationError::EmptyForecast)?;
        let ceiling = largest_vm_ceiling(ctx)?;
        let limits = ctx
            .catalog
            .find_all_under_limit(ceiling.cpu_cores, ceiling.mem_gb)?;

        let mut sized = Vec::with_capacity(limits.len());
        for limit in &limits {
            match ctx.estimate_pods_configuration(peak, limit) {
                Ok(config) => sized.push(config),
                Err(DerivationError::NoProfileAvailable { detail, .. }) => {
                    debug!(%limit, %detail, "limit skipped");
                }
                Err(e) => return Err(e),
            }
        }

        let mut best: Option<(f64, u32, BestResourcePair)> = None;
        for vm in ctx.vms.iter() {
            for config in &sized {
                let replicas = config.setting.replicas;
                let Some(set) =
                    homogeneous_set_of_type(replicas, &config.limit, vm, ctx.max_cluster_size)
                else {
                    continue;
                };
                let cost = vm.price() * set.total_vms() as f64;
                let better = match &best {
                    None => true,
                    Some((best_cost, best_replicas, _)) => {
                        cost < *best_cost || (cost == *best_cost && replicas < *best_replicas)
                    }
                };
                if better {
                    let pair = BestResourcePair {
                        limit: config.limit,
                        vm_type: vm.vm_type.clone(),
                    };
                    best = Some((cost, replicas, pair));
                }
            }
        }

        let (cost, replicas, pair) = best.ok_or_else(|| match sized.first() {
            Some(config) => DerivationError::NoSuitableVms {
                replicas: config.setting.replicas,
                limit: config.limit,
            },
            None => DerivationError::NoProfileAvailable {
                limit: ceiling,
                detail: format!("no limit under the largest VM serves {peak:.2} req/s"),
            },
        })?;
        info!(limit = %pair.limit, vm_type = %pair.vm_type, cost, replicas, peak, "best resource pair selected");
        Ok(pair)
    }
}

impl ConfigurationSelector for BestResourcePair {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        _current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration> {
        let vm = ctx.vm_profile(&self.vm_type)?;
        let mut config = ctx.estimate_pods_configuration(cursor.interval().requests, &self.limit)?;
        let replicas = config.setting.replicas;
        config.vms = homogeneous_set_of_type(replicas, &self.limit, vm, ctx.max_cluster_size).ok_or(
            DerivationError::NoSuitableVms {
                replicas,
                limit: self.limit,
            },
        )?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::*;
    use spdt_core::VmSet;

    #[test]
    fn pair_minimizes_cost_at_peak() {
        let small = ResourceLimit::new(0.5, 1.0);
        let big = ResourceLimit::new(2.0, 4.0);
        let ctx = test_context(
            vec![make_vm("m", 4.0, 16.0, 1.0), make_vm("l", 8.0, 32.0, 1.5)],
            vec![linear_profile(small, 20.0, 20), linear_profile(big, 100.0, 5)],
        );
        let loads = intervals(&[50.0, 300.0, 120.0], 600);

        let pair = BestResourcePair::find(&loads, &ctx).unwrap();
        // small: 15 replicas -> m cap 7 (3 VMs, $3) or l cap 15 (1 VM, $1.5)
        // big: 3 replicas -> m cap 1 (3 VMs, $3) or l cap 3 (1 VM, $1.5), fewer replicas wins the tie
        assert_eq!(pair.limit, big);
        assert_eq!(pair.vm_type, "l");

        let cursor = IntervalCursor::new(&loads, 0).unwrap();
        let current = deployed(1, small, VmSet::single("m", 1));
        let config = pair.select(&cursor, &current, &ctx).unwrap();
        assert_eq!(config.limit, big);
        assert_eq!(config.setting.replicas, 1);
        assert_eq!(config.vms, VmSet::single("l", 1));
    }

    #[test]
    fn no_profiles_under_largest_vm() {
        let ctx = test_context(vec![make_vm("m", 4.0, 16.0, 1.0)], vec![]);
        let loads = intervals(&[50.0], 600);
        let err = BestResourcePair::find(&loads, &ctx).unwrap_err();
        assert!(matches!(err, DerivationError::NoProfileAvailable { .. }));
    }
}
