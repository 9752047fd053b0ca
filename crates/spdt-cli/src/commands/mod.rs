pub mod derive;
pub mod init;
pub mod intervals;

use std::path::{Path, PathBuf};

use anyhow::Context;
use spdt_catalog::loader::load_forecast;
use spdt_core::{Forecast, ForecastSample, SpdtConfig};
use spdt_derivation::filter_horizon;

/// A loaded config plus the directory its relative paths resolve against.
pub struct Workspace {
    pub config: SpdtConfig,
    base: PathBuf,
}

impl Workspace {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config = SpdtConfig::from_file(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self { config, base })
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    pub fn forecast(&self) -> anyhow::Result<Forecast> {
        let path = self.resolve(&self.config.forecast.forecast_file);
        load_forecast(&path).with_context(|| format!("loading forecast {}", path.display()))
    }

    /// Forecast samples inside the configured horizon.
    pub fn samples(&self, forecast: &Forecast) -> Vec<ForecastSample> {
        match &self.config.horizon {
            Some(horizon) => filter_horizon(&forecast.values, horizon),
            None => forecast.values.clone(),
        }
    }
}
