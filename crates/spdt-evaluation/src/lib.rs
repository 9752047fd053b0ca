//! spdt-evaluation: scores derived policies and picks one.
//!
//! - `metrics` walks a policy against the forecast it was derived from
//! - `selector` chooses the cheapest policy within budget
//! - `supply` and `schedule` turn a policy into its capacity curve and into
//!   the states handed to the cluster scheduler

pub mod error;
pub mod metrics;
pub mod schedule;
pub mod selector;
pub mod supply;

pub use error::{MetricsError, MetricsResult, SelectionError, SelectionResult};
pub use metrics::compute_policy_metrics;
pub use schedule::{ServiceToSchedule, StateToSchedule, states_to_schedule};
pub use selector::{Selection, select_policy};
pub use supply::{CapacityPoint, capacity_supply};
