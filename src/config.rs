//! Detector and monitor configuration.
//!
//! Every config deserializes from partial JSON (missing fields fall back to
//! the defaults below) and is validated before a detector is built from it.

use crate::algo::adwin::Adwin;
use crate::algo::page_hinkley::PageHinkley;
use crate::detector::DriftDetector;
use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest accepted `max_buckets`; rows hold at most one more bucket.
pub const MAX_BUCKETS_LIMIT: usize = 1024;

/// Parameters of the adaptive windowing detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdwinConfig {
    /// Confidence of the cut test, in (0, 1)
    pub delta: f64,
    /// Buckets a row may hold before its two oldest are merged upward
    pub max_buckets: usize,
    /// Cut search runs every `min_clock` observations
    pub min_clock: u64,
    /// Window must be longer than this before a cut search runs
    pub min_win_len: u64,
    /// Each side of a cut must be longer than `min_sub_win_len + 1`
    pub min_sub_win_len: u64,
}

impl Default for AdwinConfig {
    fn default() -> Self {
        Self {
            delta: 0.002,
            max_buckets: 5,
            min_clock: 32,
            min_win_len: 10,
            min_sub_win_len: 5,
        }
    }
}

impl AdwinConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(DriftError::config("delta", format!("{} is outside (0, 1)", self.delta)));
        }
        if self.max_buckets < 1 || self.max_buckets > MAX_BUCKETS_LIMIT {
            return Err(DriftError::config(
                "max_buckets",
                format!("{} is outside [1, {}]", self.max_buckets, MAX_BUCKETS_LIMIT),
            ));
        }
        if self.min_clock < 1 {
            return Err(DriftError::config("min_clock", "must be positive"));
        }
        // window_length > min_win_len >= 1 keeps ln(window_length) positive in the cut bound
        if self.min_win_len < 1 {
            return Err(DriftError::config("min_win_len", "must be positive"));
        }
        if self.min_sub_win_len < 1 {
            return Err(DriftError::config("min_sub_win_len", "must be positive"));
        }
        // each side of a cut needs more than min_sub_win_len + 1 observations
        if self.min_sub_win_len > u64::MAX - 2 {
            return Err(DriftError::config("min_sub_win_len", "leaves no room for a cut"));
        }
        Ok(())
    }
}

/// How the Page-Hinkley cumulative statistic is compared against `lambda`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CumulativeMode {
    /// Signal when `cumsum - min(cumsum) > lambda`
    #[default]
    MinTracking,
    /// Signal when the `alpha`-discounted `cumsum > lambda`
    Discounted,
}

/// Parameters of the Page-Hinkley test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageHinkleyConfig {
    /// Magnitude of change tolerated per observation
    pub delta: f64,
    /// Detection threshold
    pub lambda: f64,
    /// Forgetting factor, only used in `Discounted` mode
    pub alpha: f64,
    pub mode: CumulativeMode,
}

impl Default for PageHinkleyConfig {
    fn default() -> Self {
        Self {
            delta: 0.005,
            lambda: 50.0,
            alpha: 1.0 - 0.0001,
            mode: CumulativeMode::MinTracking,
        }
    }
}

impl PageHinkleyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.delta.is_finite() && self.delta > 0.0) {
            return Err(DriftError::config("delta", "must be positive"));
        }
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(DriftError::config("lambda", "must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(DriftError::config("alpha", format!("{} is outside (0, 1]", self.alpha)));
        }
        Ok(())
    }
}

/// Selects and parameterizes one detector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    Adwin(AdwinConfig),
    PageHinkley(PageHinkleyConfig),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::Adwin(AdwinConfig::default())
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Adwin(c) => c.validate(),
            Self::PageHinkley(c) => c.validate(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn DriftDetector>> {
        Ok(match *self {
            Self::Adwin(c) => Box::new(Adwin::new(c)?),
            Self::PageHinkley(c) => Box::new(PageHinkley::new(c)?),
        })
    }
}

/// Configuration of the sharded multi-stream monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub detector: DetectorConfig,
    /// Worker threads; 0 means one per available core
    pub shards: usize,
    /// Bounded capacity of each shard's ingest channel
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            shards: 0,
            channel_capacity: 10_000,
        }
    }
}

impl MonitorConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        if self.channel_capacity < 1 {
            return Err(DriftError::config("channel_capacity", "must be positive"));
        }
        Ok(())
    }

    /// Resolved worker count.
    pub fn shard_count(&self) -> usize {
        if self.shards > 0 {
            self.shards
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}
