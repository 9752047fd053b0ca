//! Planner: derives complete policies.
//!
//! A single derivation is synchronous: intervals are decided in order, each
//! one starting from the state the previous one left. Independent strategies
//! run concurrently on the blocking pool, each bounded by a timeout, and a
//! failing strategy never affects the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use spdt_catalog::LiveStateObserver;
use spdt_core::constants::DEFAULT_STRATEGY_TIMEOUT_SECS;
use spdt_core::{
    Algorithm, ContainerConfiguration, CriticalInterval, InfrastructureState, Policy,
    PolicyMetrics, PolicyStatus, ServiceState,
};
use tracing::{error, info, warn};

use crate::context::DerivationContext;
use crate::error::{DerivationError, DerivationResult};
use crate::strategy::{ConfigurationSelector, IntervalCursor, Strategy};
use crate::timeline::TimelineBuilder;

/// Derives scaling policies against a live infrastructure state.
#[derive(Clone)]
pub struct Planner {
    ctx: DerivationContext,
    live: Arc<dyn LiveStateObserver>,
    strategy_timeout: Duration,
}

impl Planner {
    pub fn new(ctx: DerivationContext, live: Arc<dyn LiveStateObserver>) -> Self {
        Self {
            ctx,
            live,
            strategy_timeout: Duration::from_secs(DEFAULT_STRATEGY_TIMEOUT_SECS),
        }
    }

    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    pub fn context(&self) -> &DerivationContext {
        &self.ctx
    }

    /// Check that the live state can seed a derivation.
    fn validate_live_state(&self, live: &InfrastructureState) -> DerivationResult<()> {
        let service = self.ctx.scaled_service(live)?;
        if service.replicas == 0 {
            return Err(DerivationError::ServiceNotDeployed(
                self.ctx.service_name.clone(),
            ));
        }
        for vm_type in live.vms.types() {
            self.ctx.vm_profile(vm_type)?;
        }
        Ok(())
    }

    /// Desired state: `current` with the scaled service and VM set replaced.
    fn desired_state(
        &self,
        current: &InfrastructureState,
        config: &ContainerConfiguration,
    ) -> InfrastructureState {
        let mut desired = current.clone();
        desired.services.insert(
            self.ctx.service_name.clone(),
            ServiceState {
                replicas: config.setting.replicas.max(1),
                cpu_cores: config.limit.cpu_cores,
                mem_gb: config.limit.mem_gb,
            },
        );
        desired.vms = config.vms.clone().pruned();
        desired
    }

    /// Derive one policy with `algorithm`.
    pub fn derive(
        &self,
        algorithm: Algorithm,
        intervals: &[CriticalInterval],
    ) -> DerivationResult<Policy> {
        let started = Utc::now();
        if intervals.is_empty() {
            return Err(DerivationError::EmptyForecast);
        }
        let live = self.live.current_state()?;
        self.validate_live_state(&live)?;

        let strategy = Strategy::prepare(algorithm, intervals, &self.ctx)?;
        info!(%algorithm, intervals = intervals.len(), "deriving policy");

        let mut timeline =
            TimelineBuilder::new(self.ctx.vm_times(), self.ctx.granularity, live);
        for index in 0..intervals.len() {
            let cursor = IntervalCursor::new(intervals, index)
                .ok_or_else(|| DerivationError::Internal(format!("interval {index} out of range")))?;
            let config = strategy.select(&cursor, timeline.current_state(), &self.ctx)?;
            let desired = self.desired_state(timeline.current_state(), &config);
            timeline.push(cursor.interval(), desired, &config);
        }
        let actions = timeline.finish();

        let (window_start, window_end) = match (actions.first(), actions.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => return Err(DerivationError::Internal("policy has no actions".to_string())),
        };

        let finished = Utc::now();
        let mut metrics = PolicyMetrics::started_at(started);
        metrics.scaling_actions = actions.len();
        metrics.derivation_finished = finished;
        metrics.derivation_duration_secs =
            (finished - started).num_microseconds().unwrap_or(0) as f64 / 1e6;

        let policy = Policy {
            id: uuid::Uuid::new_v4().to_string(),
            algorithm,
            scaling_actions: actions,
            metrics,
            parameters: strategy.parameters(),
            window_start,
            window_end,
            status: PolicyStatus::Discarded,
        };
        info!(
            %algorithm,
            id = %policy.id,
            actions = policy.scaling_actions.len(),
            "policy derived"
        );
        Ok(policy)
    }

    /// Derive one policy per algorithm concurrently.
    ///
    /// Results come back in the order of `algorithms`. Every strategy shares
    /// one deadline, measured from the moment they are all spawned.
    pub async fn derive_all(
        &self,
        algorithms: &[Algorithm],
        intervals: Arc<Vec<CriticalInterval>>,
    ) -> Vec<(Algorithm, DerivationResult<Policy>)> {
        let deadline = tokio::time::Instant::now() + self.strategy_timeout;
        let handles: Vec<_> = algorithms
            .iter()
            .map(|&algorithm| {
                let planner = self.clone();
                let intervals = Arc::clone(&intervals);
                let handle =
                    tokio::task::spawn_blocking(move || planner.derive(algorithm, &intervals));
                (algorithm, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (algorithm, handle) in handles {
            let result = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => {
                    error!(%algorithm, error = %join_err, "derivation task failed");
                    Err(DerivationError::Internal(join_err.to_string()))
                }
                Err(_) => Err(DerivationError::Timeout {
                    algorithm,
                    secs: self.strategy_timeout.as_secs(),
                }),
            };
            if let Err(e) = &result {
                warn!(%algorithm, error = %e, "strategy produced no policy");
            }
            results.push((algorithm, result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::*;
    use spdt_catalog::{CatalogResult, StaticLiveState};
    use spdt_core::{ResourceLimit, VmSet, params};

    /// Serves a fixed state after a fixed delay.
    struct SlowLiveState {
        state: InfrastructureState,
        delay: Duration,
    }

    impl LiveStateObserver for SlowLiveState {
        fn current_state(&self) -> CatalogResult<InfrastructureState> {
            std::thread::sleep(self.delay);
            Ok(self.state.clone())
        }
    }

    fn limit() -> ResourceLimit {
        ResourceLimit::new(1.0, 2.0)
    }

    fn planner(live: InfrastructureState) -> Planner {
        let ctx = test_context(
            vec![make_vm("m", 4.0, 16.0, 1.0), make_vm("l", 8.0, 32.0, 1.8)],
            vec![linear_profile(limit(), 50.0, 30)],
        );
        Planner::new(ctx, Arc::new(StaticLiveState::new(live)))
    }

    #[test]
    fn derive_sets_window_and_parameters() {
        let planner = planner(deployed(1, limit(), VmSet::single("m", 1)));
        let loads = intervals(&[100.0, 400.0, 100.0], 600);
        let policy = planner.derive(Algorithm::Naive, &loads).unwrap();

        assert_eq!(policy.algorithm, Algorithm::Naive);
        assert_eq!(policy.status, PolicyStatus::Discarded);
        assert_eq!(policy.window_start, loads[0].start);
        assert_eq!(policy.window_end, loads[2].end);
        assert_eq!(policy.parameters[params::HETEROGENEOUS], "false");
        assert_eq!(policy.metrics.scaling_actions, policy.scaling_actions.len());
        assert!(policy.metrics.derivation_finished >= policy.metrics.derivation_started);
        assert!(!policy.id.is_empty());
    }

    #[test]
    fn timeline_chains_states() {
        let planner = planner(deployed(1, limit(), VmSet::single("m", 1)));
        let loads = intervals(&[100.0, 400.0, 400.0, 100.0], 600);
        let policy = planner.derive(Algorithm::Naive, &loads).unwrap();

        assert_eq!(policy.scaling_actions.len(), 3);
        for pair in policy.scaling_actions.windows(2) {
            assert_eq!(pair[1].initial_state, pair[0].desired_state);
            assert_ne!(pair[1].desired_state, pair[0].desired_state);
            assert!(pair[0].start <= pair[1].start);
        }
        assert_eq!(policy.scaling_actions[1].end, loads[2].end);
    }

    #[test]
    fn undeployed_service_fails() {
        let planner = planner(deployed(0, limit(), VmSet::single("m", 1)));
        let loads = intervals(&[100.0], 600);
        assert!(matches!(
            planner.derive(Algorithm::Naive, &loads),
            Err(DerivationError::ServiceNotDeployed(_))
        ));
    }

    #[test]
    fn unknown_live_vm_type_fails() {
        let planner = planner(deployed(1, limit(), VmSet::single("ghost", 1)));
        let loads = intervals(&[100.0], 600);
        assert!(matches!(
            planner.derive(Algorithm::OnlyDeltaLoad, &loads),
            Err(DerivationError::UnknownVmType(vm)) if vm == "ghost"
        ));
    }

    #[test]
    fn empty_intervals_fail() {
        let planner = planner(deployed(1, limit(), VmSet::single("m", 1)));
        assert!(matches!(
            planner.derive(Algorithm::Naive, &[]),
            Err(DerivationError::EmptyForecast)
        ));
    }

    #[tokio::test]
    async fn derive_all_runs_every_strategy() {
        let planner = planner(deployed(2, limit(), VmSet::single("m", 1)));
        let loads = Arc::new(intervals(&[100.0, 300.0, 150.0], 900));
        let results = planner.derive_all(&Algorithm::ALL, loads).await;

        assert_eq!(results.len(), Algorithm::ALL.len());
        for ((algorithm, result), expected) in results.iter().zip(Algorithm::ALL) {
            assert_eq!(*algorithm, expected);
            let policy = result.as_ref().unwrap();
            assert_eq!(policy.algorithm, expected);
            for action in &policy.scaling_actions {
                let replicas = action.desired_state.service("api").unwrap().replicas;
                assert!(replicas >= 1);
                assert!(!action.desired_state.vms.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn failing_strategy_does_not_block_others() {
        let planner = planner(deployed(1, limit(), VmSet::single("m", 1)));
        // beyond every catalog entry under the largest VM
        let loads = Arc::new(intervals(&[5000.0], 600));
        let results = planner
            .derive_all(&[Algorithm::AlwaysResize, Algorithm::Naive], loads)
            .await;
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }

    #[tokio::test]
    async fn strategies_share_one_deadline() {
        let ctx = test_context(
            vec![make_vm("m", 4.0, 16.0, 1.0)],
            vec![linear_profile(limit(), 50.0, 30)],
        );
        let live = SlowLiveState {
            state: deployed(1, limit(), VmSet::single("m", 1)),
            delay: Duration::from_millis(450),
        };
        let planner = Planner::new(ctx, Arc::new(live))
            .with_strategy_timeout(Duration::from_millis(300));
        let loads = Arc::new(intervals(&[100.0], 600));

        // both start together, so both overrun the same deadline
        let results = planner
            .derive_all(&[Algorithm::Naive, Algorithm::OnlyDeltaLoad], loads)
            .await;
        for (algorithm, result) in &results {
            assert!(
                matches!(result, Err(DerivationError::Timeout { .. })),
                "{algorithm} should have timed out"
            );
        }
    }

    #[test]
    fn empty_vm_catalog_has_no_suitable_vms() {
        let ctx = test_context(vec![], vec![linear_profile(limit(), 50.0, 30)]);
        let live = StaticLiveState::new(deployed(1, limit(), VmSet::new()));
        let planner = Planner::new(ctx, Arc::new(live));
        let loads = intervals(&[100.0], 600);
        for algorithm in [Algorithm::AlwaysResize, Algorithm::BestResourcePair] {
            assert!(matches!(
                planner.derive(algorithm, &loads),
                Err(DerivationError::NoSuitableVms { .. })
            ));
        }
    }
}
