//! Budget-aware policy selection.

use std::cmp::Ordering;

use spdt_core::{Policy, PolicyStatus};
use tracing::{info, warn};

use crate::error::{SelectionError, SelectionResult};

/// The chosen policy and the candidates it was chosen over.
#[derive(Debug, Clone)]
pub struct Selection {
    pub selected: Policy,
    /// Remaining candidates, cheapest first, all marked discarded.
    pub candidates: Vec<Policy>,
}

fn by_cost_then_container_actions(a: &Policy, b: &Policy) -> Ordering {
    a.metrics
        .cost
        .total_cmp(&b.metrics.cost)
        .then(a.metrics.container_scaling_actions.cmp(&b.metrics.container_scaling_actions))
}

/// Pick the cheapest scored policy within `budget`, ties broken by fewer
/// container scaling actions.
pub fn select_policy(mut candidates: Vec<Policy>, budget: f64) -> SelectionResult<Selection> {
    if candidates.is_empty() {
        return Err(SelectionError::NoCandidates);
    }
    candidates.sort_by(by_cost_then_container_actions);
    for candidate in &mut candidates {
        candidate.status = PolicyStatus::Discarded;
    }

    let Some(index) = candidates.iter().position(|p| p.metrics.cost <= budget) else {
        let cheapest = candidates[0].metrics.cost;
        warn!(budget, cheapest, candidates = candidates.len(), "no policy fits the budget");
        return Err(SelectionError::BudgetExceeded {
            budget,
            cheapest,
            shortfall: cheapest - budget,
            candidates,
        });
    };

    let mut selected = candidates.remove(index);
    selected.status = PolicyStatus::Selected;
    info!(
        id = %selected.id,
        algorithm = %selected.algorithm,
        cost = selected.metrics.cost,
        budget,
        "policy selected"
    );
    Ok(Selection {
        selected,
        candidates,
    })
}
