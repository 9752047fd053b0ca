//! Detect whether a newly received forecast warrants re-derivation.

use spdt_core::Forecast;
use spdt_core::constants::FORECAST_RMSE_THRESHOLD;
use tracing::{debug, info};

/// How a new forecast relates to the one previously stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastUpdate {
    /// RMSE above the significance threshold.
    pub significant: bool,
    pub rmse: f64,
    /// First sample that differs, when both forecasts cover the same window.
    pub conflict_index: Option<usize>,
    /// The new forecast trimmed to start at the conflict point.
    pub trimmed: Option<Forecast>,
}

/// Root-mean-square error between the overlapping samples of two forecasts.
pub fn forecast_rmse(previous: &Forecast, new: &Forecast) -> f64 {
    let n = previous.values.len().min(new.values.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = previous
        .values
        .iter()
        .zip(&new.values)
        .map(|(a, b)| (a.requests - b.requests).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}

pub fn detect_forecast_update(previous: &Forecast, new: &Forecast) -> ForecastUpdate {
    let rmse = forecast_rmse(previous, new);
    let significant = rmse > FORECAST_RMSE_THRESHOLD;

    let same_window =
        previous.values.len() == new.values.len() && previous.start_time == new.start_time;
    let conflict_index = if significant && same_window {
        previous
            .values
            .iter()
            .zip(&new.values)
            .position(|(a, b)| a.requests != b.requests)
    } else {
        None
    };

    let trimmed = conflict_index.and_then(|index| {
        let first = new.values.get(index)?;
        let mut forecast = new.clone();
        forecast.values = new.values[index..].to_vec();
        forecast.start_time = first.timestamp;
        Some(forecast)
    });

    if significant {
        info!(
            service = %new.service_name,
            rmse,
            conflict_index = ?conflict_index,
            "forecast changed significantly"
        );
    } else {
        debug!(service = %new.service_name, rmse, "forecast change below threshold");
    }

    ForecastUpdate {
        significant,
        rmse,
        conflict_index,
        trimmed,
    }
}
