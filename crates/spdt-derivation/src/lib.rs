//! spdt-derivation: turns a forecast into candidate scaling policies.
//!
//! The pipeline runs one way:
//!
//! 1. `intervals` coalesces forecast samples into critical intervals.
//! 2. A `Strategy` picks a container configuration for each interval,
//!    using the bin-packing helpers in `vmset` and the catalog lookups in
//!    `sizing`.
//! 3. `TimelineBuilder` folds the chosen states into scaling actions with
//!    boot/shutdown-aware transition times.
//!
//! `Planner` drives the pipeline for one strategy or for several
//! strategies concurrently.

pub mod context;
pub mod error;
pub mod forecast_update;
pub mod intervals;
pub mod planner;
pub mod sizing;
pub mod strategies;
pub mod strategy;
pub mod timeline;
pub mod vmset;

pub use context::DerivationContext;
pub use error::{DerivationError, DerivationResult};
pub use forecast_update::{ForecastUpdate, detect_forecast_update};
pub use intervals::{filter_horizon, process_forecast};
pub use planner::Planner;
pub use strategy::{ConfigurationSelector, IntervalCursor, Strategy};
pub use timeline::{TimelineBuilder, VmTimes};
