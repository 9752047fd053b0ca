//! Least-squares MSC model.
//!
//! Fits `msc = a * replicas + b` over the settings the catalog already holds
//! for a limit. With a single measurement (or a non-increasing fit) the model
//! degrades to a proportional one through the mean per-replica rate.
//!
//! VM boot and shutdown times for types without history are estimated from
//! the types that have it.

use std::sync::Arc;

use spdt_core::constants::DEFAULT_POD_BOOT_SECS;
use spdt_core::{BootShutdownTime, PerformanceSetting, ResourceLimit};
use tracing::{debug, trace};

use crate::error::{CatalogError, CatalogResult};
use crate::store::CatalogStore;
use crate::traits::{Predictor, ProfileCatalog, VmTimesPredictor};

/// Upper bound on replicas the model will propose.
const MAX_PREDICTED_REPLICAS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearModel {
    slope: f64,
    intercept: f64,
    boot_secs: f64,
    boot_std_dev_secs: f64,
}

impl LinearModel {
    fn capacity(&self, replicas: u32) -> f64 {
        (self.slope * replicas as f64 + self.intercept).max(0.0)
    }

    fn setting(&self, replicas: u32) -> PerformanceSetting {
        PerformanceSetting {
            replicas,
            msc_per_second: self.capacity(replicas),
            boot_time_secs: self.boot_secs,
            boot_time_std_dev_secs: self.boot_std_dev_secs,
        }
    }
}

/// Regression-based predictor over a profile catalog.
#[derive(Clone)]
pub struct RegressionPredictor {
    catalog: Arc<dyn ProfileCatalog>,
}

impl RegressionPredictor {
    pub fn new(catalog: Arc<dyn ProfileCatalog>) -> Self {
        Self { catalog }
    }

    fn fit(&self, limit: &ResourceLimit) -> CatalogResult<LinearModel> {
        let profile = self
            .catalog
            .find_profile_by_limit(limit)?
            .ok_or_else(|| CatalogError::NoData(format!("no profile for limit {limit}")))?;
        let points: Vec<&PerformanceSetting> = profile
            .settings
            .iter()
            .filter(|s| s.replicas > 0)
            .collect();
        if points.is_empty() {
            return Err(CatalogError::NoData(format!("no settings for limit {limit}")));
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|s| s.replicas as f64).sum::<f64>() / n;
        let mean_y = points.iter().map(|s| s.msc_per_second).sum::<f64>() / n;
        let sxx: f64 = points
            .iter()
            .map(|s| (s.replicas as f64 - mean_x).powi(2))
            .sum();
        let sxy: f64 = points
            .iter()
            .map(|s| (s.replicas as f64 - mean_x) * (s.msc_per_second - mean_y))
            .sum();

        let (mut slope, mut intercept) = if sxx > 0.0 {
            let slope = sxy / sxx;
            (slope, mean_y - slope * mean_x)
        } else {
            (0.0, 0.0)
        };
        if slope <= 0.0 {
            slope = points
                .iter()
                .map(|s| s.msc_per_second / s.replicas as f64)
                .sum::<f64>()
                / n;
            intercept = 0.0;
        }
        if slope <= 0.0 {
            return Err(CatalogError::NoData(format!(
                "settings for limit {limit} carry no throughput"
            )));
        }

        let boots: Vec<f64> = points
            .iter()
            .map(|s| s.boot_time_secs)
            .filter(|b| *b > 0.0)
            .collect();
        let boot_secs = if boots.is_empty() {
            DEFAULT_POD_BOOT_SECS
        } else {
            boots.iter().sum::<f64>() / boots.len() as f64
        };
        let boot_std_dev_secs = points
            .iter()
            .map(|s| s.boot_time_std_dev_secs)
            .fold(0.0, f64::max);

        let model = LinearModel {
            slope,
            intercept,
            boot_secs,
            boot_std_dev_secs,
        };
        trace!(%limit, slope, intercept, points = points.len(), "msc model fitted");
        Ok(model)
    }
}

impl Predictor for RegressionPredictor {
    fn predict_replicas(
        &self,
        rate: f64,
        limit: &ResourceLimit,
    ) -> CatalogResult<PerformanceSetting> {
        let model = self.fit(limit)?;
        let estimate = ((rate - model.intercept) / model.slope).ceil();
        let mut replicas = if estimate.is_finite() && estimate >= 1.0 {
            (estimate as u32).min(MAX_PREDICTED_REPLICAS)
        } else {
            1
        };
        while model.capacity(replicas) < rate && replicas < MAX_PREDICTED_REPLICAS {
            replicas += 1;
        }
        if model.capacity(replicas) < rate {
            return Err(CatalogError::NoData(format!(
                "{rate} req/s exceeds {MAX_PREDICTED_REPLICAS} replicas under limit {limit}"
            )));
        }
        Ok(model.setting(replicas))
    }

    fn predict_capacity(
        &self,
        replicas: u32,
        limit: &ResourceLimit,
    ) -> CatalogResult<PerformanceSetting> {
        Ok(self.fit(limit)?.setting(replicas))
    }
}

/// Boot/shutdown estimates averaged over every other VM type's history.
///
/// For each recorded type the entry nearest to the requested instance count
/// is taken.
#[derive(Clone)]
pub struct FleetVmTimesPredictor {
    store: CatalogStore,
}

impl FleetVmTimesPredictor {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }
}

impl VmTimesPredictor for FleetVmTimesPredictor {
    fn predict_boot_shutdown_time(
        &self,
        vm_type: &str,
        count: u32,
    ) -> CatalogResult<BootShutdownTime> {
        let nearest: Vec<BootShutdownTime> = self
            .store
            .list_boot_profiles()?
            .iter()
            .filter(|p| p.vm_type != vm_type)
            .filter_map(|p| {
                p.values
                    .iter()
                    .min_by_key(|v| v.instances.abs_diff(count))
                    .copied()
            })
            .collect();
        if nearest.is_empty() {
            return Err(CatalogError::NoData(format!(
                "no VM booting history to estimate {vm_type}"
            )));
        }

        let n = nearest.len() as f64;
        let times = BootShutdownTime {
            instances: count,
            boot_secs: nearest.iter().map(|t| t.boot_secs).sum::<f64>() / n,
            shutdown_secs: nearest.iter().map(|t| t.shutdown_secs).sum::<f64>() / n,
        };
        debug!(%vm_type, count, boot = times.boot_secs, shutdown = times.shutdown_secs, "vm times estimated");
        Ok(times)
    }
}
