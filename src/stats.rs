//! ==============================================================================
//! stats.rs - per-kind summary statistics
//! ==============================================================================
//!
//! purpose:
//!     count, extrema, arithmetic mean and population standard deviation of a
//!     set of readings. pure; computed with the same formulas for each kind.
//!
//! edge case:
//!     an empty set yields all zeros so dashboard cards render before any
//!     data has loaded.
//!
//! ==============================================================================

use serde::Serialize;

use crate::domain::{SensorKind, SensorRecord};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Stats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub std_dev: f64,
}

impl Stats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let count = values.len();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // rounding can push the mean of equal values one ulp outside [min, max]
        let avg = (values.iter().sum::<f64>() / count as f64).clamp(min, max);
        let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / count as f64;

        Self { count, min, max, avg, std_dev: variance.sqrt() }
    }

    /// Statistics over the records of one kind.
    pub fn for_kind(records: &[SensorRecord], kind: SensorKind) -> Self {
        let values: Vec<f64> = records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.value.as_f64())
            .collect();
        Self::from_values(&values)
    }

    /// card lines with two fractional digits, e.g. `Average Value: 21.50 ºC`
    pub fn lines(&self, unit: &str) -> Vec<String> {
        vec![
            format!("Count: {}", self.count),
            format!("Average Value: {:.2} {}", self.avg, unit),
            format!("Min Value: {:.2} {}", self.min, unit),
            format!("Max Value: {:.2} {}", self.max, unit),
            format!("Standard Deviation: {:.2} {}", self.std_dev, unit),
        ]
    }
}
