//! spdt.toml configuration parser.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_CLUSTER_SIZE, DEFAULT_STRATEGY_TIMEOUT_SECS};
use crate::types::{Algorithm, BillingUnit, Granularity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpdtConfig {
    pub service: ServiceConfig,
    pub forecast: ForecastConfig,
    pub pricing: PricingConfig,
    #[serde(default)]
    pub derivation: DerivationConfig,
    pub catalog: CatalogConfig,
    pub horizon: Option<HorizonConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub app_name: String,
    pub app_type: Option<String>,
    /// Service whose replicas are scaled.
    pub main_service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub granularity: Granularity,
    pub forecast_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Maximum total cost of a selected policy over its window.
    pub budget: f64,
    #[serde(default)]
    pub billing_unit: BillingUnit,
}

/// Which strategies to run: `"all"` or a single algorithm name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlgorithmChoice {
    #[default]
    All,
    One(Algorithm),
}

impl AlgorithmChoice {
    pub fn algorithms(self) -> Vec<Algorithm> {
        match self {
            AlgorithmChoice::All => Algorithm::ALL.to_vec(),
            AlgorithmChoice::One(a) => vec![a],
        }
    }
}

impl Serialize for AlgorithmChoice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AlgorithmChoice::All => serializer.serialize_str("all"),
            AlgorithmChoice::One(a) => serializer.serialize_str(a.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for AlgorithmChoice {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "all" {
            return Ok(AlgorithmChoice::All);
        }
        s.parse()
            .map(AlgorithmChoice::One)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationConfig {
    #[serde(default)]
    pub algorithm: AlgorithmChoice,
    #[serde(default = "default_max_cluster_size")]
    pub max_cluster_size: u32,
    #[serde(default = "default_strategy_timeout_secs")]
    pub strategy_timeout_secs: u64,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmChoice::All,
            max_cluster_size: DEFAULT_MAX_CLUSTER_SIZE,
            strategy_timeout_secs: DEFAULT_STRATEGY_TIMEOUT_SECS,
        }
    }
}

fn default_max_cluster_size() -> u32 {
    DEFAULT_MAX_CLUSTER_SIZE
}

fn default_strategy_timeout_secs() -> u64 {
    DEFAULT_STRATEGY_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub vm_profiles_file: PathBuf,
    pub performance_profiles_file: PathBuf,
    pub vm_boot_times_file: Option<PathBuf>,
    pub live_state_file: PathBuf,
    /// Persistent catalog database. In-memory when absent.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HorizonConfig {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

impl SpdtConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SpdtConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal spdt.toml for the given service.
    pub fn scaffold(app_name: &str, main_service_name: &str) -> Self {
        SpdtConfig {
            service: ServiceConfig {
                app_name: app_name.to_string(),
                app_type: None,
                main_service_name: main_service_name.to_string(),
            },
            forecast: ForecastConfig {
                granularity: Granularity::Hour,
                forecast_file: PathBuf::from("forecast.json"),
            },
            pricing: PricingConfig {
                budget: 100.0,
                billing_unit: BillingUnit::Hour,
            },
            derivation: DerivationConfig::default(),
            catalog: CatalogConfig {
                vm_profiles_file: PathBuf::from("vm_profiles.json"),
                performance_profiles_file: PathBuf::from("performance_profiles.json"),
                vm_boot_times_file: Some(PathBuf::from("vm_boot_times.json")),
                live_state_file: PathBuf::from("current_state.json"),
                db_path: None,
            },
            horizon: None,
        }
    }
}
