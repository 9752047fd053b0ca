use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use spdt_catalog::loader::seed_store;
use spdt_catalog::{
    CatalogStore, FleetVmTimesPredictor, LiveStateObserver, Predictor, ProfileCatalog,
    RegressionPredictor, StaticLiveState, VmTimesStore,
};
use spdt_core::{Algorithm, Policy};
use spdt_derivation::{DerivationContext, Planner, detect_forecast_update, process_forecast};
use spdt_evaluation::{
    CapacityPoint, SelectionError, StateToSchedule, capacity_supply, compute_policy_metrics,
    select_policy, states_to_schedule,
};
use tracing::{info, warn};

use super::Workspace;

/// A strategy that produced no policy.
#[derive(Debug, Serialize)]
pub struct Failure {
    pub algorithm: Algorithm,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct DeriveReport {
    pub selected: Policy,
    pub candidates: Vec<Policy>,
    pub failures: Vec<Failure>,
    pub schedule: Vec<StateToSchedule>,
    pub supply: Vec<CapacityPoint>,
}

/// What a derive run did.
#[derive(Debug)]
pub enum DeriveOutcome {
    Derived(DeriveReport),
    /// The forecast moved too little since the last run to re-derive.
    Unchanged { rmse: f64 },
}

fn open_store(ws: &Workspace) -> anyhow::Result<CatalogStore> {
    let catalog = &ws.config.catalog;
    let store = match &catalog.db_path {
        Some(path) => CatalogStore::open(&ws.resolve(path))?,
        None => CatalogStore::open_in_memory()?,
    };
    let boot_times = catalog.vm_boot_times_file.as_ref().map(|p| ws.resolve(p));
    seed_store(
        &store,
        &ws.resolve(&catalog.vm_profiles_file),
        &ws.resolve(&catalog.performance_profiles_file),
        boot_times.as_deref(),
    )
    .context("seeding catalog")?;
    Ok(store)
}

/// Derive, score, and select. Candidates are persisted whether or not one
/// fits the budget.
///
/// A forecast that changed insignificantly since the stored one is skipped
/// unless `force` is set. When a significant change keeps the same window,
/// derivation starts at the first changed sample.
pub async fn run(
    ws: &Workspace,
    algorithm: Option<Algorithm>,
    force: bool,
) -> anyhow::Result<DeriveOutcome> {
    let config = &ws.config;
    let store = open_store(ws)?;
    let live: Arc<dyn LiveStateObserver> = Arc::new(
        StaticLiveState::from_file(&ws.resolve(&config.catalog.live_state_file))
            .context("loading live state")?,
    );

    let forecast = ws.forecast()?;
    let service = &config.service.main_service_name;
    let trimmed = match store.latest_forecast(service)? {
        Some(previous) => {
            let update = detect_forecast_update(&previous, &forecast);
            if !update.significant && !force {
                info!(%service, rmse = update.rmse, "forecast unchanged since last run, skipping");
                return Ok(DeriveOutcome::Unchanged { rmse: update.rmse });
            }
            if let Some(trimmed) = &update.trimmed {
                info!(
                    %service,
                    conflict_index = ?update.conflict_index,
                    from = %trimmed.start_time,
                    "deriving from the first changed sample"
                );
            }
            update.trimmed
        }
        None => None,
    };
    store.put_forecast(&forecast)?;

    let samples = ws.samples(trimmed.as_ref().unwrap_or(&forecast));
    let intervals = Arc::new(process_forecast(&samples, config.forecast.granularity)?);

    let vms = Arc::new(store.vm_catalog()?);
    let catalog: Arc<dyn ProfileCatalog> = Arc::new(store.clone());
    let predictor: Arc<dyn Predictor> = Arc::new(RegressionPredictor::new(catalog.clone()));
    let vm_times: Arc<dyn VmTimesStore> = Arc::new(store.clone());
    let ctx = DerivationContext::new(service.clone(), vms.clone(), catalog, predictor, vm_times)
        .with_vm_times_predictor(Arc::new(FleetVmTimesPredictor::new(store.clone())))
        .with_granularity(config.forecast.granularity)
        .with_max_cluster_size(config.derivation.max_cluster_size);
    let planner = Planner::new(ctx, live)
        .with_strategy_timeout(Duration::from_secs(config.derivation.strategy_timeout_secs));

    let algorithms = match algorithm {
        Some(a) => vec![a],
        None => config.derivation.algorithm.algorithms(),
    };
    info!(
        %service,
        intervals = intervals.len(),
        strategies = algorithms.len(),
        "deriving policies"
    );

    let mut policies = Vec::new();
    let mut failures = Vec::new();
    for (algorithm, result) in planner.derive_all(&algorithms, intervals).await {
        match result {
            Ok(mut policy) => {
                compute_policy_metrics(&mut policy, &samples, &vms, config.pricing.billing_unit)?;
                policies.push(policy);
            }
            Err(e) => failures.push(Failure {
                algorithm,
                error: e.to_string(),
            }),
        }
    }
    if policies.is_empty() {
        anyhow::bail!("every strategy failed: {failures:?}");
    }

    match select_policy(policies, config.pricing.budget) {
        Ok(selection) => {
            store.put_policy(&selection.selected)?;
            for candidate in &selection.candidates {
                store.put_policy(candidate)?;
            }
            Ok(DeriveOutcome::Derived(DeriveReport {
                schedule: states_to_schedule(&selection.selected),
                supply: capacity_supply(&selection.selected),
                selected: selection.selected,
                candidates: selection.candidates,
                failures,
            }))
        }
        Err(SelectionError::BudgetExceeded {
            budget,
            cheapest,
            shortfall,
            candidates,
        }) => {
            for candidate in &candidates {
                store.put_policy(candidate)?;
                warn!(
                    algorithm = %candidate.algorithm,
                    cost = candidate.metrics.cost,
                    "candidate over budget"
                );
            }
            anyhow::bail!(
                "no policy fits the budget of {budget:.2}: cheapest costs {cheapest:.2} ({shortfall:.2} over)"
            )
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn derive(
    config_path: &Path,
    algorithm: Option<Algorithm>,
    output: Option<&Path>,
    force: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::load(config_path)?;
    let report = match run(&ws, algorithm, force).await? {
        DeriveOutcome::Derived(report) => report,
        DeriveOutcome::Unchanged { rmse } => {
            println!("✓ Forecast unchanged (RMSE {rmse:.3}), nothing to derive. Use --force to re-derive.");
            return Ok(());
        }
    };
    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "✓ Selected {} policy {} ({:.2}), report in {}",
                report.selected.algorithm,
                report.selected.id,
                report.selected.metrics.cost,
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
