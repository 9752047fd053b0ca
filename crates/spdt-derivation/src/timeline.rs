//! Timeline assembly.
//!
//! Folds per-interval desired states into scaling actions. Consecutive equal
//! states merge into one action; otherwise the transition start is moved
//! earlier by the VM boot, node join, and pod boot latencies of the change.

use chrono::{DateTime, Duration, Utc};
use spdt_catalog::{VmTimesPredictor, VmTimesStore};
use spdt_core::constants::{
    CONTAINER_START_SECS, DEFAULT_VM_BOOT_SECS, DEFAULT_VM_SHUTDOWN_SECS, NODE_JOIN_SECS,
};
use spdt_core::{
    ActionMetrics, BootShutdownTime, ContainerConfiguration, CriticalInterval, Granularity,
    InfrastructureState, ScalingAction, VmSet,
};
use tracing::{debug, warn};

use crate::vmset::delta_vm_set;

fn seconds(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

/// Boot and shutdown durations for VM sets.
///
/// A type without recorded history is estimated by the predictor, when one is
/// attached, and the estimate is recorded in the store. Defaults apply only
/// when both fail.
#[derive(Clone, Copy)]
pub struct VmTimes<'a> {
    store: &'a dyn VmTimesStore,
    predictor: Option<&'a dyn VmTimesPredictor>,
}

impl<'a> VmTimes<'a> {
    pub fn new(store: &'a dyn VmTimesStore) -> Self {
        Self { store, predictor: None }
    }

    pub fn with_predictor(mut self, predictor: &'a dyn VmTimesPredictor) -> Self {
        self.predictor = Some(predictor);
        self
    }

    fn lookup(&self, vm_type: &str, count: u32) -> Option<BootShutdownTime> {
        match self.store.boot_shutdown_time(vm_type, count) {
            Ok(Some(times)) => return Some(times),
            Ok(None) => {}
            Err(e) => {
                warn!(%vm_type, count, error = %e, "vm times lookup failed");
                return None;
            }
        }
        let predictor = self.predictor?;
        match predictor.predict_boot_shutdown_time(vm_type, count) {
            Ok(times) => {
                if let Err(e) = self.store.record_boot_shutdown_time(vm_type, times) {
                    warn!(%vm_type, count, error = %e, "failed to cache predicted vm times");
                }
                Some(times)
            }
            Err(e) => {
                warn!(%vm_type, count, error = %e, "vm times prediction failed");
                None
            }
        }
    }

    /// Seconds needed to boot every VM in `set`, summed per type.
    pub fn boot_time(&self, set: &VmSet) -> f64 {
        set.iter()
            .map(|(vm_type, count)| match self.lookup(vm_type, count) {
                Some(times) => times.boot_secs,
                None => {
                    warn!(%vm_type, count, default = DEFAULT_VM_BOOT_SECS, "no boot time known, using default");
                    DEFAULT_VM_BOOT_SECS
                }
            })
            .sum()
    }

    /// Seconds needed to shut down every VM in `set`, summed per type.
    pub fn shutdown_time(&self, set: &VmSet) -> f64 {
        set.iter()
            .map(|(vm_type, count)| match self.lookup(vm_type, count) {
                Some(times) => times.shutdown_secs,
                None => {
                    warn!(%vm_type, count, default = DEFAULT_VM_SHUTDOWN_SECS, "no shutdown time known, using default");
                    DEFAULT_VM_SHUTDOWN_SECS
                }
            })
            .sum()
    }
}

/// Accumulates the scaling actions of one policy.
pub struct TimelineBuilder<'a> {
    vm_times: VmTimes<'a>,
    granularity: Granularity,
    current: InfrastructureState,
    actions: Vec<ScalingAction>,
}

impl<'a> TimelineBuilder<'a> {
    /// Start from the observed live state.
    pub fn new(
        vm_times: VmTimes<'a>,
        granularity: Granularity,
        initial: InfrastructureState,
    ) -> Self {
        Self {
            vm_times,
            granularity,
            current: initial,
            actions: Vec::new(),
        }
    }

    /// State left by the last folded interval.
    pub fn current_state(&self) -> &InfrastructureState {
        &self.current
    }

    pub fn actions(&self) -> &[ScalingAction] {
        &self.actions
    }

    /// Fold the desired state for `interval` into the timeline.
    pub fn push(
        &mut self,
        interval: &CriticalInterval,
        desired: InfrastructureState,
        config: &ContainerConfiguration,
    ) {
        match self.actions.last_mut() {
            Some(last) if last.desired_state == desired => {
                last.end = interval.end;
                return;
            }
            _ => {}
        }

        let (added, removed) = delta_vm_set(&self.current.vms, &desired.vms);
        let pod_boot = config.setting.boot_time_secs;
        let transition_start = match (added.is_empty(), removed.is_empty()) {
            (false, false) => {
                if let Some(last) = self.actions.last_mut() {
                    let shutdown = self.vm_times.shutdown_time(&removed);
                    last.end += seconds(shutdown);
                }
                self.scale_out_start(&added, interval.start, pod_boot)
            }
            (true, false) => {
                let shutdown = self.vm_times.shutdown_time(&removed);
                interval.start - seconds(shutdown)
            }
            _ => self.scale_out_start(&added, interval.start, pod_boot),
        };

        debug!(
            start = %interval.start,
            %transition_start,
            added = added.total_vms(),
            removed = removed.total_vms(),
            "scaling action added"
        );
        self.actions.push(ScalingAction {
            transition_start,
            initial_state: self.current.clone(),
            desired_state: desired.clone(),
            start: interval.start,
            end: interval.end,
            metrics: ActionMetrics {
                requests_capacity: self.granularity.from_per_second(config.setting.msc_per_second),
                ..ActionMetrics::default()
            },
        });
        self.current = desired;
    }

    fn scale_out_start(&self, added: &VmSet, start: DateTime<Utc>, pod_boot: f64) -> DateTime<Utc> {
        if added.is_empty() {
            start - seconds(CONTAINER_START_SECS)
        } else {
            let boot = self.vm_times.boot_time(added);
            start - seconds(boot + NODE_JOIN_SECS + pod_boot)
        }
    }

    pub fn finish(self) -> Vec<ScalingAction> {
        self.actions
    }
}
