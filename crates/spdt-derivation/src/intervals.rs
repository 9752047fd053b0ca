//! Critical interval processing.
//!
//! Consecutive samples closer than the coalescing window to the first sample
//! of the current interval are merged; the interval carries the mean of the
//! merged loads, rescaled to requests per second.

use chrono::Duration;
use spdt_core::config::HorizonConfig;
use spdt_core::constants::INTERVAL_COALESCE_WINDOW_SECS;
use spdt_core::{CriticalInterval, ForecastSample, Granularity};
use tracing::debug;

use crate::error::{DerivationError, DerivationResult};

struct OpenInterval {
    start: ForecastSample,
    sum: f64,
    count: usize,
}

impl OpenInterval {
    fn new(sample: ForecastSample) -> Self {
        Self {
            start: sample,
            sum: sample.requests,
            count: 1,
        }
    }

    fn close(&self, end: ForecastSample, factor: f64) -> CriticalInterval {
        CriticalInterval {
            start: self.start.timestamp,
            end: end.timestamp,
            requests: self.sum / self.count as f64 / factor,
        }
    }
}

/// Convert forecast samples into critical intervals.
///
/// Samples must be strictly increasing in time. Intervals tile the span from
/// the first to the last sample: a closed interval ends where the next one
/// starts, and the final interval ends at the last sample.
pub fn process_forecast(
    samples: &[ForecastSample],
    granularity: Granularity,
) -> DerivationResult<Vec<CriticalInterval>> {
    let (first, rest) = samples.split_first().ok_or(DerivationError::EmptyForecast)?;
    let window = Duration::seconds(INTERVAL_COALESCE_WINDOW_SECS);
    let factor = granularity.factor();

    let mut intervals = Vec::new();
    let mut open = OpenInterval::new(*first);
    let mut previous = *first;

    for (i, sample) in rest.iter().enumerate() {
        if sample.timestamp <= previous.timestamp {
            return Err(DerivationError::Internal(format!(
                "forecast samples out of order at index {}",
                i + 1
            )));
        }
        if sample.timestamp - open.start.timestamp < window {
            open.sum += sample.requests;
            open.count += 1;
        } else {
            intervals.push(open.close(*sample, factor));
            open = OpenInterval::new(*sample);
        }
        previous = *sample;
    }
    intervals.push(open.close(previous, factor));

    debug!(samples = samples.len(), intervals = intervals.len(), "forecast processed");
    Ok(intervals)
}

/// Keep only the samples inside the scaling horizon.
pub fn filter_horizon(samples: &[ForecastSample], horizon: &HorizonConfig) -> Vec<ForecastSample> {
    samples
        .iter()
        .filter(|s| horizon.contains(s.timestamp))
        .copied()
        .collect()
}
