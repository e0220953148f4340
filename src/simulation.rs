//! Synthetic streams with a controlled abrupt drift.
//!
//! Seeded so that benchmark and test runs are reproducible.

use crate::error::{DriftError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamKind {
    /// 0/1 draws with success probability `before`, then `after`
    Bernoulli { before: f64, after: f64 },
    /// Normal draws with mean `before`, then `after`
    Gaussian { before: f64, after: f64, std_dev: f64 },
}

enum Source {
    Bernoulli { before: f64, after: f64 },
    Gaussian { before: Normal<f64>, after: Normal<f64> },
}

pub struct StreamGenerator {
    kind: StreamKind,
    source: Source,
    /// Index of the first post-drift sample
    drift_at: u64,
    emitted: u64,
    rng: StdRng,
}

impl StreamGenerator {
    pub fn new(kind: StreamKind, drift_at: u64, seed: u64) -> Result<Self> {
        let source = match kind {
            StreamKind::Bernoulli { before, after } => {
                for (field, p) in [("before", before), ("after", after)] {
                    if !(0.0..=1.0).contains(&p) {
                        return Err(DriftError::config(field, format!("probability {} is outside [0, 1]", p)));
                    }
                }
                Source::Bernoulli { before, after }
            }
            StreamKind::Gaussian { before, after, std_dev } => {
                let normal = |mean: f64| {
                    Normal::new(mean, std_dev)
                        .map_err(|e| DriftError::config("std_dev", e.to_string()))
                };
                Source::Gaussian {
                    before: normal(before)?,
                    after: normal(after)?,
                }
            }
        };

        Ok(Self {
            kind,
            source,
            drift_at,
            emitted: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn drift_at(&self) -> u64 {
        self.drift_at
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn next_value(&mut self) -> f64 {
        let drifted = self.emitted >= self.drift_at;
        self.emitted += 1;

        match &self.source {
            Source::Bernoulli { before, after } => {
                let p = if drifted { *after } else { *before };
                if self.rng.random_bool(p) { 1.0 } else { 0.0 }
            }
            Source::Gaussian { before, after } => {
                let dist = if drifted { after } else { before };
                dist.sample(&mut self.rng)
            }
        }
    }
}

impl Iterator for StreamGenerator {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_value())
    }
}
