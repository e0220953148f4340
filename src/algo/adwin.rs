//! ADWIN (Adaptive Windowing)
//!
//! Keeps a variable-length window over the stream, summarized by an
//! exponential histogram of buckets, and shrinks it from the old end when
//! two sub-windows have means that differ by more than a Hoeffding-style
//! bound allows.
//!
//! References:
//! - Bifet, A., & Gavaldà, R. (2007). Learning from Time-Changing Data with
//!   Adaptive Windowing. SDM.

use crate::algo::bucket_list::BucketList;
use crate::algo::bucket_row::{Bucket, BucketRow};
use crate::config::AdwinConfig;
use crate::detector::DriftDetector;
use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw observations summarized by one bucket at `level`.
#[inline]
fn bucket_size(level: usize) -> u64 {
    1u64 << level
}

/// Snapshots are validated on restore: the config must pass
/// [`AdwinConfig::validate`] and the buckets must satisfy
/// [`Adwin::check_invariants`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AdwinState")]
pub struct Adwin {
    config: AdwinConfig,
    /// Observations seen since construction or reset
    time: u64,
    /// Observations currently represented by the buckets
    window_length: u64,
    window_sum: f64,
    /// Sum of squared deviations from the window mean
    window_variance: f64,
    buckets: BucketList,
}

/// Unchecked form of a deserialized [`Adwin`].
#[derive(Deserialize)]
struct AdwinState {
    config: AdwinConfig,
    time: u64,
    window_length: u64,
    window_sum: f64,
    window_variance: f64,
    buckets: BucketList,
}

impl TryFrom<AdwinState> for Adwin {
    type Error = DriftError;

    fn try_from(state: AdwinState) -> Result<Self> {
        state.config.validate()?;
        let max_buckets = state.config.max_buckets;
        if state.buckets.max_buckets() != max_buckets {
            return Err(DriftError::invariant(format!(
                "bucket list sized for {} buckets, config says {}",
                state.buckets.max_buckets(),
                max_buckets
            )));
        }
        if let Some((level, row)) = state
            .buckets
            .iter()
            .find(|(_, row)| row.capacity() != max_buckets + 1)
        {
            return Err(DriftError::invariant(format!(
                "row {} has capacity {}, expected {}",
                level,
                row.capacity(),
                max_buckets + 1
            )));
        }
        if state.window_length > state.time {
            return Err(DriftError::invariant(format!(
                "window of {} observations after {} in total",
                state.window_length, state.time
            )));
        }

        let adwin = Self {
            config: state.config,
            time: state.time,
            window_length: state.window_length,
            window_sum: state.window_sum,
            window_variance: state.window_variance,
            buckets: state.buckets,
        };
        adwin.check_invariants()?;
        Ok(adwin)
    }
}

impl Adwin {
    pub fn new(config: AdwinConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            time: 0,
            window_length: 0,
            window_sum: 0.0,
            window_variance: 0.0,
            buckets: BucketList::new(config.max_buckets),
        })
    }

    /// Add an observation and search for a cut if one is due.
    ///
    /// Returns true if at least one bucket was evicted by this call.
    pub fn observe(&mut self, value: f64) -> Result<bool> {
        if !value.is_finite() {
            return Err(DriftError::InvalidInput(format!(
                "observation must be finite, got {}",
                value
            )));
        }

        self.time += 1;
        self.insert_element(value)?;
        self.reduce_window()
    }

    fn insert_element(&mut self, value: f64) -> Result<()> {
        self.buckets.head_mut().insert(value, 0.0)?;

        let incremental_variance = if self.window_length > 0 {
            let n = self.window_length as f64;
            let mean = self.window_sum / n;
            n * (value - mean).powi(2) / (n + 1.0)
        } else {
            0.0
        };

        self.window_variance += incremental_variance;
        self.window_length += 1;
        self.window_sum += value;

        self.compress_rows()
    }

    /// Merge the two oldest buckets of every full row into the next row,
    /// cascading upward until a row has room.
    fn compress_rows(&mut self) -> Result<()> {
        let max_buckets = self.config.max_buckets;
        let mut level = 0;

        while self.buckets.get(level).is_some_and(BucketRow::is_full) {
            let n = bucket_size(level) as f64;
            let (row, next) = self
                .buckets
                .with_next_mut(level)
                .ok_or_else(|| DriftError::invariant(format!("no bucket row at level {}", level)))?;

            let merged = match row.buckets() {
                [first, second, ..] => first.merge(*second, n),
                _ => {
                    return Err(DriftError::invariant(format!(
                        "full row at level {} holds fewer than two buckets",
                        level
                    )));
                }
            };
            next.insert(merged.sum, merged.variance)?;
            row.compress(2)?;

            if next.len() <= max_buckets {
                break;
            }
            level += 1;
        }
        Ok(())
    }

    /// Evict the oldest buckets for as long as some cut proves the window
    /// holds two populations.
    fn reduce_window(&mut self) -> Result<bool> {
        if self.time % self.config.min_clock != 0 || self.window_length <= self.config.min_win_len {
            return Ok(false);
        }

        let mut changed = false;
        while self.find_cut()? {
            self.delete_element()?;
            changed = true;
        }
        Ok(changed)
    }

    /// Walk cut points from the oldest bucket toward the newest and report
    /// whether any of them exceeds the bound.
    fn find_cut(&self) -> Result<bool> {
        let min_sub = self.config.min_sub_win_len.saturating_add(1);
        let mut n0 = 0u64;
        let mut sum0 = 0.0;

        for (level, row) in self.buckets.iter().rev() {
            let size = bucket_size(level);
            for bucket in row.buckets() {
                n0 += size;
                // the newest bucket would leave the recent side empty
                if n0 >= self.window_length {
                    return Ok(false);
                }
                let n1 = self.window_length - n0;
                sum0 += bucket.sum;
                let sum1 = self.window_sum - sum0;
                let diff = sum0 / n0 as f64 - sum1 / n1 as f64;

                if n0 > min_sub && n1 > min_sub && diff.abs() > self.epsilon_cut(n0, n1)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Bound a mean difference between sub-windows of `n0` and `n1`
    /// observations must exceed to count as drift.
    pub fn epsilon_cut(&self, n0: u64, n1: u64) -> Result<f64> {
        if self.window_length <= 1 {
            return Err(DriftError::invariant(format!(
                "cut bound evaluated on a window of length {}",
                self.window_length
            )));
        }
        let min_sub = self.config.min_sub_win_len as f64;
        let len = self.window_length as f64;

        let m = 1.0 / (n0 as f64 - min_sub + 1.0) + 1.0 / (n1 as f64 - min_sub + 1.0);
        let d = (2.0 * len.ln() / self.config.delta).ln();
        let variance = self.window_variance / len;

        Ok((2.0 * m * variance * d).sqrt() + 2.0 / 3.0 * m * d)
    }

    /// Drop the oldest bucket of the tail row, returning how many raw
    /// observations it held.
    fn delete_element(&mut self) -> Result<u64> {
        let level = self
            .buckets
            .tail_level()
            .ok_or_else(|| DriftError::invariant("eviction from an empty bucket list"))?;
        let bucket = self
            .buckets
            .tail()
            .and_then(BucketRow::oldest)
            .copied()
            .ok_or_else(|| DriftError::invariant(format!("tail row at level {} is empty", level)))?;

        let size = bucket_size(level);
        if size >= self.window_length {
            return Err(DriftError::invariant(format!(
                "evicting {} observations from a window of {}",
                size, self.window_length
            )));
        }

        self.window_length -= size;
        self.window_sum -= bucket.sum;

        let n = size as f64;
        let rest = self.window_length as f64;
        let bucket_mean = bucket.sum / n;
        let decremental_variance = bucket.variance
            + n * rest * (bucket_mean - self.window_sum / rest).powi(2) / (n + rest);
        self.window_variance = (self.window_variance - decremental_variance).max(0.0);

        if let Some(tail) = self.buckets.tail_mut() {
            tail.compress(1)?;
        }
        while self.buckets.len() > 1 && self.buckets.tail().is_some_and(BucketRow::is_empty) {
            self.buckets.remove_tail();
        }

        debug!(
            time = self.time,
            evicted = size,
            window_length = self.window_length,
            "ADWIN window cut"
        );
        Ok(size)
    }

    /// Verify the structural invariants of the bucket histogram.
    pub fn check_invariants(&self) -> Result<()> {
        let max_buckets = self.config.max_buckets;
        let mut length = 0u64;
        let mut sum = 0.0;
        // (count, sum, variance) of all buckets combined
        let mut combined = (0.0f64, 0.0f64, 0.0f64);

        for (level, row) in self.buckets.iter() {
            if row.len() > max_buckets {
                return Err(DriftError::invariant(format!(
                    "row {} holds {} buckets, limit is {}",
                    level,
                    row.len(),
                    max_buckets
                )));
            }
            let n = bucket_size(level) as f64;
            for bucket in row.buckets() {
                length += bucket_size(level);
                sum += bucket.sum;
                combined = combine(combined, (n, *bucket));
            }
        }

        if length != self.window_length {
            return Err(DriftError::invariant(format!(
                "window length {} but buckets hold {}",
                self.window_length, length
            )));
        }
        let tolerance = 1e-9 * (1.0 + self.window_length as f64);
        if (sum - self.window_sum).abs() > tolerance.max(1e-9 * sum.abs()) {
            return Err(DriftError::invariant(format!(
                "window sum {} but buckets sum to {}",
                self.window_sum, sum
            )));
        }
        if (combined.2 - self.window_variance).abs() > 1e-6 * (1.0 + combined.2.abs()) {
            return Err(DriftError::invariant(format!(
                "window variance {} but buckets combine to {}",
                self.window_variance, combined.2
            )));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.time = 0;
        self.window_length = 0;
        self.window_sum = 0.0;
        self.window_variance = 0.0;
        self.buckets = BucketList::new(self.config.max_buckets);
    }

    pub fn config(&self) -> &AdwinConfig {
        &self.config
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn window_length(&self) -> u64 {
        self.window_length
    }

    pub fn window_sum(&self) -> f64 {
        self.window_sum
    }

    pub fn window_variance(&self) -> f64 {
        self.window_variance
    }

    pub fn mean(&self) -> f64 {
        if self.window_length == 0 {
            0.0
        } else {
            self.window_sum / self.window_length as f64
        }
    }

    /// Per-observation variance of the window.
    pub fn variance(&self) -> f64 {
        if self.window_length == 0 {
            0.0
        } else {
            self.window_variance / self.window_length as f64
        }
    }

    pub fn row_count(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket rows with their level, finest first.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &BucketRow)> {
        self.buckets.iter()
    }
}

fn combine((n_a, sum_a, var_a): (f64, f64, f64), (n_b, b): (f64, Bucket)) -> (f64, f64, f64) {
    if n_a == 0.0 {
        return (n_b, b.sum, b.variance);
    }
    let delta = sum_a / n_a - b.sum / n_b;
    let cross = n_a * n_b * delta * delta / (n_a + n_b);
    (n_a + n_b, sum_a + b.sum, var_a + b.variance + cross)
}

impl DriftDetector for Adwin {
    fn name(&self) -> &str {
        "ADWIN"
    }

    fn observe(&mut self, value: f64) -> Result<bool> {
        Adwin::observe(self, value)
    }

    fn reset(&mut self) {
        Adwin::reset(self)
    }
}
