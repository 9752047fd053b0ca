//! End-to-end derivation over a small forecast: interval processing, the
//! Naive strategy, and timeline assembly against an in-memory catalog.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use spdt_catalog::{CatalogStore, ProfileCatalog, RegressionPredictor, StaticLiveState};
use spdt_core::{
    Algorithm, ForecastSample, Granularity, InfrastructureState, PerformanceProfile,
    PerformanceSetting, Pricing, ResourceLimit, ServiceState, VmCatalog, VmProfile, VmSet,
};
use spdt_derivation::{DerivationContext, Planner, process_forecast};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

fn limit() -> ResourceLimit {
    ResourceLimit::new(1.0, 2.0)
}

fn samples() -> Vec<ForecastSample> {
    [(0, 100.0), (60, 100.0), (400, 500.0)]
        .into_iter()
        .map(|(offset, requests)| ForecastSample {
            timestamp: t0() + Duration::seconds(offset),
            requests,
        })
        .collect()
}

/// Catalog holding one VM type and only the single-replica baseline.
fn planner() -> Planner {
    let store = CatalogStore::open_in_memory().unwrap();
    store
        .put_performance_profile(&PerformanceProfile {
            limit: limit(),
            settings: vec![PerformanceSetting {
                replicas: 1,
                msc_per_second: 50.0,
                boot_time_secs: 10.0,
                boot_time_std_dev_secs: 0.0,
            }],
        })
        .unwrap();
    let vm = VmProfile {
        vm_type: "T".to_string(),
        cpu_cores: 4.0,
        mem_gb: 16.0,
        os: "linux".to_string(),
        pricing: Pricing { price: 1.0, unit: "USD".to_string() },
    };
    let catalog: Arc<dyn ProfileCatalog> = Arc::new(store.clone());
    let ctx = DerivationContext::new(
        "api",
        Arc::new(VmCatalog::new([vm])),
        catalog.clone(),
        Arc::new(RegressionPredictor::new(catalog)),
        Arc::new(store),
    )
    .with_granularity(Granularity::Second);

    let mut live = InfrastructureState::default();
    live.services.insert(
        "api".to_string(),
        ServiceState { replicas: 1, cpu_cores: 1.0, mem_gb: 2.0 },
    );
    live.vms = VmSet::single("T", 1);
    Planner::new(ctx, Arc::new(StaticLiveState::new(live)))
}

#[test]
fn forecast_coalesces_into_two_intervals() {
    let intervals = process_forecast(&samples(), Granularity::Second).unwrap();
    assert_eq!(intervals.len(), 2);
    assert_eq!(intervals[0].start, t0());
    assert_eq!(intervals[0].end, t0() + Duration::seconds(400));
    assert_eq!(intervals[0].requests, 100.0);
    assert_eq!(intervals[1].start, t0() + Duration::seconds(400));
    assert_eq!(intervals[1].end, t0() + Duration::seconds(400));
    assert_eq!(intervals[1].requests, 500.0);
}

#[test]
fn naive_policy_scales_replicas_then_vms() {
    let intervals = process_forecast(&samples(), Granularity::Second).unwrap();
    let policy = planner().derive(Algorithm::Naive, &intervals).unwrap();
    assert_eq!(policy.scaling_actions.len(), 2);

    let first = &policy.scaling_actions[0];
    assert_eq!(first.desired_state.service("api").unwrap().replicas, 2);
    assert_eq!(first.desired_state.vms, VmSet::single("T", 1));
    // no VM change: only container start latency
    assert_eq!(first.transition_start, t0() - Duration::seconds(10));

    let second = &policy.scaling_actions[1];
    assert_eq!(second.initial_state, first.desired_state);
    assert_eq!(second.desired_state.service("api").unwrap().replicas, 10);
    // T hosts 3 replicas of 1 CPU / 2 GB after the cluster reservation
    assert_eq!(second.desired_state.vms, VmSet::single("T", 4));
    // default VM boot 20 s + node join 120 s + pod boot 10 s
    assert!(second.transition_start <= second.start - Duration::seconds(150));
    assert_eq!(second.metrics.requests_capacity, 500.0);
}

#[test]
fn predictions_are_cached_in_the_catalog() {
    let store = CatalogStore::open_in_memory().unwrap();
    store
        .put_performance_profile(&PerformanceProfile {
            limit: limit(),
            settings: vec![PerformanceSetting {
                replicas: 1,
                msc_per_second: 50.0,
                boot_time_secs: 10.0,
                boot_time_std_dev_secs: 0.0,
            }],
        })
        .unwrap();
    let catalog: Arc<dyn ProfileCatalog> = Arc::new(store.clone());
    let ctx = DerivationContext::new(
        "api",
        Arc::new(VmCatalog::new(Vec::<VmProfile>::new())),
        catalog.clone(),
        Arc::new(RegressionPredictor::new(catalog.clone())),
        Arc::new(store),
    );

    let config = ctx.estimate_pods_configuration(500.0, &limit()).unwrap();
    assert_eq!(config.setting.replicas, 10);
    let cached = catalog.find_by_limit_and_replicas(&limit(), 10).unwrap();
    assert_eq!(cached.map(|s| s.msc_per_second), Some(500.0));
}

#[tokio::test]
async fn predicting_strategies_derive_the_scenario() {
    // Always-Resize only picks measured settings, so it is left out here.
    let algorithms = [
        Algorithm::Naive,
        Algorithm::BestResourcePair,
        Algorithm::OnlyDeltaLoad,
        Algorithm::ResizeWhenBeneficial,
    ];
    let intervals = Arc::new(process_forecast(&samples(), Granularity::Second).unwrap());
    let results = planner().derive_all(&algorithms, intervals).await;
    assert_eq!(results.len(), algorithms.len());

    for (algorithm, result) in results {
        let policy = result.unwrap_or_else(|e| panic!("{algorithm} failed: {e}"));
        let last = policy.scaling_actions.last().unwrap();
        assert_eq!(last.desired_state.service("api").unwrap().replicas, 10, "{algorithm}");
        assert!(last.desired_state.vms.total_vms() >= 4, "{algorithm}");
    }
}
