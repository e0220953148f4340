use crate::config::{CumulativeMode, PageHinkleyConfig};
use crate::detector::DriftDetector;
use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};

/// Page-Hinkley test for an increase in the mean of a stream.
///
/// O(1) memory: a running mean and a cumulative sum of deviations from it.
/// All statistics are reset in the same call that signals a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PageHinkleyState")]
pub struct PageHinkley {
    config: PageHinkleyConfig,
    /// Observations since the last reset
    num: u64,
    x_mean: f64,
    cumsum: f64,
    /// Smallest `cumsum` since the last reset (min-tracking mode)
    cumsum_min: f64,
}

#[derive(Deserialize)]
struct PageHinkleyState {
    config: PageHinkleyConfig,
    num: u64,
    x_mean: f64,
    cumsum: f64,
    cumsum_min: f64,
}

impl TryFrom<PageHinkleyState> for PageHinkley {
    type Error = DriftError;

    fn try_from(state: PageHinkleyState) -> Result<Self> {
        state.config.validate()?;
        if ![state.x_mean, state.cumsum, state.cumsum_min]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(DriftError::invariant("non-finite Page-Hinkley statistics"));
        }
        let min_tracking = state.config.mode == CumulativeMode::MinTracking;
        if state.cumsum_min > 0.0 || (min_tracking && state.cumsum_min > state.cumsum) {
            return Err(DriftError::invariant(format!(
                "running minimum {} above cumulative sum {}",
                state.cumsum_min, state.cumsum
            )));
        }
        Ok(Self {
            config: state.config,
            num: state.num,
            x_mean: state.x_mean,
            cumsum: state.cumsum,
            cumsum_min: state.cumsum_min,
        })
    }
}

impl PageHinkley {
    pub fn new(config: PageHinkleyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            num: 0,
            x_mean: 0.0,
            cumsum: 0.0,
            cumsum_min: 0.0,
        })
    }

    pub fn observe(&mut self, x: f64) -> Result<bool> {
        if !x.is_finite() {
            return Err(DriftError::InvalidInput(format!(
                "observation must be finite, got {}",
                x
            )));
        }

        self.num += 1;
        let n = self.num as f64;
        self.x_mean = (x + self.x_mean * (n - 1.0)) / n;
        let deviation = x - self.x_mean - self.config.delta;

        let change_detected = match self.config.mode {
            CumulativeMode::Discounted => {
                self.cumsum = self.cumsum * self.config.alpha + deviation;
                self.cumsum > self.config.lambda
            }
            CumulativeMode::MinTracking => {
                self.cumsum += deviation;
                self.cumsum_min = self.cumsum_min.min(self.cumsum);
                self.cumsum - self.cumsum_min > self.config.lambda
            }
        };

        if change_detected {
            self.reset();
        }
        Ok(change_detected)
    }

    pub fn reset(&mut self) {
        self.num = 0;
        self.x_mean = 0.0;
        self.cumsum = 0.0;
        self.cumsum_min = 0.0;
    }

    /// Current test statistic compared against `lambda`.
    pub fn statistic(&self) -> f64 {
        match self.config.mode {
            CumulativeMode::Discounted => self.cumsum,
            CumulativeMode::MinTracking => self.cumsum - self.cumsum_min,
        }
    }

    pub fn config(&self) -> &PageHinkleyConfig {
        &self.config
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn mean(&self) -> f64 {
        self.x_mean
    }
}

impl DriftDetector for PageHinkley {
    fn name(&self) -> &str {
        "Page-Hinkley"
    }

    fn observe(&mut self, value: f64) -> Result<bool> {
        PageHinkley::observe(self, value)
    }

    fn reset(&mut self) {
        PageHinkley::reset(self)
    }
}
