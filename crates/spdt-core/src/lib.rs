//! spdt-core: shared types for the scaling-policy derivation engine.
//!
//! Holds the domain model (VM and performance profiles, infrastructure
//! states, critical intervals, scaling actions, policies), the engine's
//! fixed constants, and the `spdt.toml` configuration parser.

pub mod config;
pub mod constants;
pub mod types;

pub use config::SpdtConfig;
pub use types::*;
