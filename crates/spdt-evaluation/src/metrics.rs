//! Policy scoring against the forecast.
//!
//! Actions and forecast samples are walked together; the sample pointer only
//! moves forward. Each action owns the samples from its start up to the next
//! action's start (the last action up to and including its end).

use chrono::{DateTime, Utc};
use spdt_core::{
    ActionMetrics, BillingUnit, ForecastSample, InfrastructureState, Policy, PolicyMetrics,
    ScalingAction, VmCatalog,
};
use tracing::debug;

use crate::error::{MetricsError, MetricsResult};

fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Round up to whole cents.
fn round_up_cents(amount: f64) -> f64 {
    ((amount * 100.0) - 1e-9).ceil().max(0.0) / 100.0
}

#[derive(Debug, Default)]
struct Provisioning {
    over: f64,
    under: f64,
    samples: usize,
}

impl Provisioning {
    fn record(&mut self, capacity: f64, actual: f64) {
        if actual <= 0.0 {
            return;
        }
        let deviation = (capacity - actual).abs() * 100.0 / actual;
        if capacity >= actual {
            self.over += deviation;
        } else {
            self.under += deviation;
        }
        self.samples += 1;
    }

    fn averages(&self) -> (f64, f64) {
        if self.samples == 0 {
            return (0.0, 0.0);
        }
        let n = self.samples as f64;
        (self.over / n, self.under / n)
    }
}

/// CPU and memory utilization of `state`, in percent of its VM resources.
pub fn utilization(state: &InfrastructureState, vms: &VmCatalog) -> MetricsResult<(f64, f64)> {
    let (cpu_requested, mem_requested) = state.services.values().fold((0.0, 0.0), |(c, m), s| {
        (c + s.replicas as f64 * s.cpu_cores, m + s.replicas as f64 * s.mem_gb)
    });
    let mut cpu_available = 0.0;
    let mut mem_available = 0.0;
    for (vm_type, count) in state.vms.iter() {
        let vm = vms
            .get(vm_type)
            .ok_or_else(|| MetricsError::UnknownVmType(vm_type.to_string()))?;
        cpu_available += vm.cpu_cores * count as f64;
        mem_available += vm.mem_gb * count as f64;
    }
    let percent = |requested: f64, available: f64| {
        if available > 0.0 {
            requested / available * 100.0
        } else {
            0.0
        }
    };
    Ok((
        percent(cpu_requested, cpu_available),
        percent(mem_requested, mem_available),
    ))
}

/// Cost of running the VMs of `state` for `secs` seconds.
pub fn state_cost(
    state: &InfrastructureState,
    vms: &VmCatalog,
    billing: BillingUnit,
    secs: f64,
) -> MetricsResult<f64> {
    let hours = billing.billed_hours(secs);
    state.vms.iter().try_fold(0.0, |total, (vm_type, count)| {
        let vm = vms
            .get(vm_type)
            .ok_or_else(|| MetricsError::UnknownVmType(vm_type.to_string()))?;
        Ok(total + vm.price() * count as f64 * hours)
    })
}

fn action_metrics(
    action: &ScalingAction,
    previous: Option<&ScalingAction>,
    provisioning: &Provisioning,
    vms: &VmCatalog,
    billing: BillingUnit,
) -> MetricsResult<ActionMetrics> {
    let elapsed = secs_between(action.start, action.end).max(0.0);
    let (over, under) = provisioning.averages();
    let (cpu_utilization, mem_utilization) = utilization(&action.desired_state, vms)?;
    Ok(ActionMetrics {
        cost: round_up_cents(state_cost(&action.desired_state, vms, billing, elapsed)?),
        over_provision: over,
        under_provision: under,
        requests_capacity: action.metrics.requests_capacity,
        cpu_utilization,
        mem_utilization,
        shadow_time_secs: previous
            .map_or(0.0, |p| secs_between(action.transition_start, p.end).max(0.0)),
        transition_time_secs: secs_between(action.transition_start, action.start).max(0.0),
        elapsed_time_secs: elapsed,
    })
}

/// Score every action of `policy` against the forecast `samples` and
/// replace its metrics. Derivation timestamps are preserved.
pub fn compute_policy_metrics(
    policy: &mut Policy,
    samples: &[ForecastSample],
    vms: &VmCatalog,
    billing: BillingUnit,
) -> MetricsResult<()> {
    let actions = &policy.scaling_actions;
    let mut scored = Vec::with_capacity(actions.len());
    let mut cursor = 0;

    for (i, action) in actions.iter().enumerate() {
        let next_start = actions.get(i + 1).map(|a| a.start);
        let in_window = |ts: DateTime<Utc>| match next_start {
            Some(next) => ts < next,
            None => ts <= action.end,
        };

        while cursor < samples.len() && samples[cursor].timestamp < action.start {
            cursor += 1;
        }
        let mut provisioning = Provisioning::default();
        while cursor < samples.len() && in_window(samples[cursor].timestamp) {
            provisioning.record(action.metrics.requests_capacity, samples[cursor].requests);
            cursor += 1;
        }

        let previous = i.checked_sub(1).and_then(|p| actions.get(p));
        scored.push(action_metrics(action, previous, &provisioning, vms, billing)?);
    }

    let n = scored.len();
    let mean = |f: fn(&ActionMetrics) -> f64| {
        if n == 0 {
            0.0
        } else {
            scored.iter().map(f).sum::<f64>() / n as f64
        }
    };
    let metrics = PolicyMetrics {
        cost: round_up_cents(scored.iter().map(|m| m.cost).sum()),
        over_provision: mean(|m| m.over_provision),
        under_provision: mean(|m| m.under_provision),
        scaling_actions: n,
        vm_scaling_actions: actions
            .iter()
            .filter(|a| a.initial_state.vms != a.desired_state.vms)
            .count(),
        container_scaling_actions: actions
            .iter()
            .filter(|a| a.initial_state.services != a.desired_state.services)
            .count(),
        derivation_started: policy.metrics.derivation_started,
        derivation_finished: policy.metrics.derivation_finished,
        derivation_duration_secs: policy.metrics.derivation_duration_secs,
        avg_shadow_time_secs: mean(|m| m.shadow_time_secs),
        avg_transition_time_secs: mean(|m| m.transition_time_secs),
        avg_elapsed_time_secs: mean(|m| m.elapsed_time_secs),
    };

    for (action, metrics) in policy.scaling_actions.iter_mut().zip(scored) {
        action.metrics = metrics;
    }
    debug!(
        id = %policy.id,
        algorithm = %policy.algorithm,
        cost = metrics.cost,
        over = metrics.over_provision,
        under = metrics.under_provision,
        "policy scored"
    );
    policy.metrics = metrics;
    Ok(())
}
