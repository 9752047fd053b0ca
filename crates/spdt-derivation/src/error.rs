//! Derivation error types.

use spdt_catalog::CatalogError;
use spdt_core::{Algorithm, ResourceLimit};
use thiserror::Error;

/// Errors that abort the derivation of one candidate policy.
#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("forecast contains no samples")]
    EmptyForecast,

    #[error("no performance profile available for limit {limit}: {detail}")]
    NoProfileAvailable { limit: ResourceLimit, detail: String },

    #[error("no VM type can host {replicas} replicas with limit {limit}")]
    NoSuitableVms { replicas: u32, limit: ResourceLimit },

    #[error("service not deployed: {0}")]
    ServiceNotDeployed(String),

    #[error("unknown VM type: {0}")]
    UnknownVmType(String),

    #[error("{algorithm} did not finish within {secs}s")]
    Timeout { algorithm: Algorithm, secs: u64 },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type DerivationResult<T> = Result<T, DerivationError>;
