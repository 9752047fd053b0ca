//! Translating request rates into replica sets through the profile catalog.

use spdt_core::{ContainerConfiguration, PerformanceSetting, ResourceLimit, VmSet};
use tracing::{debug, info};

use crate::context::DerivationContext;
use crate::error::{DerivationError, DerivationResult};

impl DerivationContext {
    /// Replicas under `limit` needed to serve `rate` req/s.
    ///
    /// Starts from the single-replica throughput; when the catalog has no
    /// adequate entry for the estimated count, the predictor is consulted and
    /// its answer cached back into the catalog.
    pub fn estimate_pods_configuration(
        &self,
        rate: f64,
        limit: &ResourceLimit,
    ) -> DerivationResult<ContainerConfiguration> {
        let base = self
            .catalog
            .find_by_limit_and_replicas(limit, 1)?
            .filter(|s| s.msc_per_second > 0.0)
            .ok_or_else(|| DerivationError::NoProfileAvailable {
                limit: *limit,
                detail: "no single-replica baseline".to_string(),
            })?;

        let estimated = (rate / base.msc_per_second).ceil().max(1.0) as u32;
        match self.catalog.find_by_limit_and_replicas(limit, estimated)? {
            Some(setting) if setting.msc_per_second >= rate => {
                return Ok(configuration(*limit, setting));
            }
            _ => {}
        }

        let predicted = self.predictor.predict_replicas(rate, limit).map_err(|e| {
            DerivationError::NoProfileAvailable {
                limit: *limit,
                detail: format!("prediction for {rate:.2} req/s failed: {e}"),
            }
        })?;
        info!(%limit, rate, replicas = predicted.replicas, "using predicted replicas");
        self.catalog.upsert_setting(limit, predicted)?;
        Ok(configuration(*limit, predicted))
    }

    /// Throughput of `replicas` replicas under `limit`.
    ///
    /// Falls back to the predictor when the catalog has no entry.
    pub fn state_load_capacity(
        &self,
        replicas: u32,
        limit: &ResourceLimit,
    ) -> DerivationResult<PerformanceSetting> {
        if let Some(setting) = self.catalog.find_by_limit_and_replicas(limit, replicas)? {
            return Ok(setting);
        }
        let predicted = self.predictor.predict_capacity(replicas, limit).map_err(|e| {
            DerivationError::NoProfileAvailable {
                limit: *limit,
                detail: format!("capacity of {replicas} replicas unknown: {e}"),
            }
        })?;
        debug!(%limit, replicas, msc = predicted.msc_per_second, "using predicted capacity");
        Ok(predicted)
    }

    /// Best catalog configuration under a VM-sized ceiling serving `rate`.
    ///
    /// Prefers the closest throughput, then the smallest total footprint,
    /// then fewer replicas.
    pub fn select_profile_under_vm_limits(
        &self,
        rate: f64,
        ceiling: &ResourceLimit,
    ) -> DerivationResult<ContainerConfiguration> {
        let candidates =
            self.catalog
                .match_under_limits_above_rate(ceiling.cpu_cores, ceiling.mem_gb, rate)?;
        candidates
            .into_iter()
            .min_by(|a, b| {
                let footprint = |c: &ContainerConfiguration| {
                    let n = c.setting.replicas as f64;
                    n * c.limit.cpu_cores + n * c.limit.mem_gb
                };
                (rate - a.setting.msc_per_second)
                    .abs()
                    .total_cmp(&(rate - b.setting.msc_per_second).abs())
                    .then(footprint(a).total_cmp(&footprint(b)))
                    .then(a.setting.replicas.cmp(&b.setting.replicas))
            })
            .ok_or_else(|| DerivationError::NoProfileAvailable {
                limit: *ceiling,
                detail: format!("no configuration serves {rate:.2} req/s"),
            })
    }
}

fn configuration(limit: ResourceLimit, setting: PerformanceSetting) -> ContainerConfiguration {
    ContainerConfiguration {
        limit,
        setting,
        vms: VmSet::new(),
    }
}
