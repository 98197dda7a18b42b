//! Streaming aggregation of trial results, grouped by test size.
//!
//! Only running sums are kept per (test size, measurement) cell, so memory is
//! bounded by the number of distinct sizes and names, not by the number of
//! trials.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

#[derive(Clone, Copy, Debug, Default)]
struct RunningStats {
    count: u64,
    sum: f64,
    // Welford state: running mean and sum of squared deviations.
    w_mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        let delta = value - self.w_mean;
        self.w_mean += delta / self.count as f64;
        self.m2 += delta * (value - self.w_mean);
    }

    fn finish(&self) -> MeasurementStats {
        let n = self.count.max(1) as f64;
        let mean = self.sum / n;
        let stddev = if self.count > 1 {
            (self.m2 / (n - 1.0)).max(0.0).sqrt()
        } else {
            0.0
        };
        MeasurementStats {
            mean,
            min: self.min,
            max: self.max,
            stddev,
        }
    }
}

/// Summary of one measurement at one test size, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; zero for a single trial.
    pub stddev: f64,
}

#[derive(Clone, Debug, Default)]
struct SizeBucket {
    trials: u64,
    cells: BTreeMap<String, RunningStats>,
}

/// Accumulates trials one at a time.
///
/// The first recorded trial fixes the measurement name set for the run; every
/// later trial must report exactly the same names.
#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    names: Option<BTreeSet<String>>,
    buckets: BTreeMap<u64, SizeBucket>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, test_size: u64, measurements: &BTreeMap<String, f64>) -> Result<()> {
        let names = self
            .names
            .get_or_insert_with(|| measurements.keys().cloned().collect());
        if let Some(missing) = names.iter().find(|n| !measurements.contains_key(*n)) {
            return Err(HarnessError::MissingMeasurement {
                test_size,
                name: missing.clone(),
            });
        }
        if let Some(extra) = measurements.keys().find(|n| !names.contains(*n)) {
            return Err(HarnessError::UnexpectedMeasurement {
                test_size,
                name: extra.clone(),
            });
        }

        let bucket = self.buckets.entry(test_size).or_default();
        bucket.trials += 1;
        for (name, &duration) in measurements {
            bucket.cells.entry(name.clone()).or_default().push(duration);
        }
        Ok(())
    }

    pub fn trials(&self) -> u64 {
        self.buckets.values().map(|b| b.trials).sum()
    }

    pub fn finish(self) -> Aggregated {
        let names = self.names.unwrap_or_default().into_iter().collect();
        let rows = self
            .buckets
            .into_iter()
            .map(|(test_size, bucket)| SizeRow {
                test_size,
                trials: bucket.trials,
                measurements: bucket
                    .cells
                    .iter()
                    .map(|(name, stats)| (name.clone(), stats.finish()))
                    .collect(),
            })
            .collect();
        Aggregated { names, rows }
    }
}

/// Aggregated results for one test size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeRow {
    pub test_size: u64,
    /// Trials actually completed at this size.
    pub trials: u64,
    pub measurements: BTreeMap<String, MeasurementStats>,
}

impl SizeRow {
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.measurements.get(name).map(|m| m.mean)
    }
}

/// All rows of a sweep, ascending by test size.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregated {
    /// Distinct measurement names, sorted.
    pub names: Vec<String>,
    pub rows: Vec<SizeRow>,
}

impl Aggregated {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn test_sizes(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.test_size).collect()
    }

    /// `(test_size, mean)` points of one measurement, ascending by size.
    pub fn series(&self, name: &str) -> Vec<(u64, f64)> {
        self.rows
            .iter()
            .filter_map(|r| r.mean(name).map(|m| (r.test_size, m)))
            .collect()
    }
}

/// Console table: one row per test size, one column of means per name.
impl fmt::Display for Aggregated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self.names.iter().map(|n| n.len().max(12)).collect();

        write!(f, "{:>12} {:>6}", "test_size", "trials")?;
        for (name, w) in self.names.iter().zip(widths.iter().copied()) {
            write!(f, "  {name:>w$}")?;
        }
        writeln!(f)?;

        for row in &self.rows {
            write!(f, "{:>12} {:>6}", row.test_size, row.trials)?;
            for (name, w) in self.names.iter().zip(widths.iter().copied()) {
                match row.mean(name) {
                    Some(mean) => write!(f, "  {mean:>w$.6e}")?,
                    None => write!(f, "  {:>w$}", "-")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
