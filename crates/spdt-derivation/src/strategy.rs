//! Resource configuration selection.
//!
//! Every strategy answers the same question: given the interval at the
//! cursor and the state left by the previous interval, which container
//! configuration and VM set should be active? `Strategy` is the closed set
//! of implementations, chosen per derivation run from configuration.

use std::collections::BTreeMap;

use spdt_core::{
    Algorithm, ContainerConfiguration, CriticalInterval, InfrastructureState, params,
};

use crate::context::DerivationContext;
use crate::error::DerivationResult;
use crate::strategies::{
    AlwaysResize, BestResourcePair, Naive, OnlyDeltaLoad, ResizeWhenBeneficial,
};

/// Position of the interval being decided within the whole horizon.
#[derive(Debug, Clone, Copy)]
pub struct IntervalCursor<'a> {
    intervals: &'a [CriticalInterval],
    index: usize,
}

impl<'a> IntervalCursor<'a> {
    /// `None` when `index` is out of range.
    pub fn new(intervals: &'a [CriticalInterval], index: usize) -> Option<Self> {
        (index < intervals.len()).then_some(Self { intervals, index })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn interval(&self) -> &'a CriticalInterval {
        &self.intervals[self.index]
    }

    /// The current interval and every one after it.
    pub fn upcoming(&self) -> &'a [CriticalInterval] {
        &self.intervals[self.index..]
    }

    /// End of the last interval of the horizon.
    pub fn horizon_end(&self) -> chrono::DateTime<chrono::Utc> {
        self.intervals[self.intervals.len() - 1].end
    }
}

/// Chooses the configuration for one critical interval.
pub trait ConfigurationSelector {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration>;
}

/// A prepared derivation strategy.
#[derive(Debug, Clone)]
pub enum Strategy {
    Naive(Naive),
    AlwaysResize(AlwaysResize),
    BestResourcePair(BestResourcePair),
    OnlyDeltaLoad(OnlyDeltaLoad),
    ResizeWhenBeneficial(ResizeWhenBeneficial),
}

impl Strategy {
    /// Build the strategy for `algorithm`, running any once-per-policy
    /// precomputation over the full set of intervals.
    pub fn prepare(
        algorithm: Algorithm,
        intervals: &[CriticalInterval],
        ctx: &DerivationContext,
    ) -> DerivationResult<Self> {
        Ok(match algorithm {
            Algorithm::Naive => Strategy::Naive(Naive),
            Algorithm::AlwaysResize => Strategy::AlwaysResize(AlwaysResize),
            Algorithm::BestResourcePair => {
                Strategy::BestResourcePair(BestResourcePair::find(intervals, ctx)?)
            }
            Algorithm::OnlyDeltaLoad => Strategy::OnlyDeltaLoad(OnlyDeltaLoad),
            Algorithm::ResizeWhenBeneficial => {
                Strategy::ResizeWhenBeneficial(ResizeWhenBeneficial)
            }
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Strategy::Naive(_) => Algorithm::Naive,
            Strategy::AlwaysResize(_) => Algorithm::AlwaysResize,
            Strategy::BestResourcePair(_) => Algorithm::BestResourcePair,
            Strategy::OnlyDeltaLoad(_) => Algorithm::OnlyDeltaLoad,
            Strategy::ResizeWhenBeneficial(_) => Algorithm::ResizeWhenBeneficial,
        }
    }

    /// Policy parameters describing how this strategy scales.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let (heterogeneous, resize_pods) = match self {
            Strategy::Naive(_) => (false, false),
            Strategy::AlwaysResize(_) => (true, true),
            Strategy::BestResourcePair(_) => (false, true),
            Strategy::OnlyDeltaLoad(_) => (true, false),
            Strategy::ResizeWhenBeneficial(_) => (true, true),
        };
        BTreeMap::from([
            (params::METHOD.to_string(), params::METHOD_HORIZONTAL.to_string()),
            (params::HETEROGENEOUS.to_string(), heterogeneous.to_string()),
            (params::RESIZE_PODS.to_string(), resize_pods.to_string()),
        ])
    }
}

impl ConfigurationSelector for Strategy {
    fn select(
        &self,
        cursor: &IntervalCursor<'_>,
        current: &InfrastructureState,
        ctx: &DerivationContext,
    ) -> DerivationResult<ContainerConfiguration> {
        match self {
            Strategy::Naive(s) => s.select(cursor, current, ctx),
            Strategy::AlwaysResize(s) => s.select(cursor, current, ctx),
            Strategy::BestResourcePair(s) => s.select(cursor, current, ctx),
            Strategy::OnlyDeltaLoad(s) => s.select(cursor, current, ctx),
            Strategy::ResizeWhenBeneficial(s) => s.select(cursor, current, ctx),
        }
    }
}
