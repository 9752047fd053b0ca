//! spdt-catalog: the engine's external collaborators.
//!
//! Defines the collaborator seams the derivation engine depends on
//! (`ProfileCatalog`, `VmTimesStore`, `VmTimesPredictor`, `Predictor`,
//! `LiveStateObserver`)
//! and ships concrete implementations:
//!
//! - **`CatalogStore`**: redb-backed store for VM profiles, performance
//!   profiles, VM booting times, forecasts, and derived policies. Supports
//!   on-disk and in-memory backends (the latter for tests).
//! - **`RegressionPredictor`**: least-squares MSC model over the settings
//!   already known for a limit.
//! - **`FleetVmTimesPredictor`**: boot/shutdown estimates for unrecorded VM
//!   types, averaged over the types the store has history for.
//! - **`StaticLiveState`**: a live-state observer serving a fixed state.
//! - **`loader`**: JSON file loaders for all of the above.
//!
//! All traits are `Send + Sync` so a catalog snapshot can be shared across
//! concurrently running strategies.

pub mod error;
pub mod loader;
pub mod predictor;
pub mod store;
pub mod tables;
pub mod traits;

pub use error::{CatalogError, CatalogResult};
pub use loader::StaticLiveState;
pub use predictor::{FleetVmTimesPredictor, RegressionPredictor};
pub use store::CatalogStore;
pub use traits::{LiveStateObserver, Predictor, ProfileCatalog, VmTimesPredictor, VmTimesStore};
