//! Prequential (test-then-train) evaluation.

use crate::error::{DriftError, Result};
use crate::learner::Estimator;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Per-instance outcome of a prequential run, aligned with the rows that
/// followed the warm-up batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrequentialReport {
    pub predictions: Vec<f64>,
    /// Wall time of each predict + partial_fit step
    pub step_times: Vec<Duration>,
}

impl PrequentialReport {
    /// Fraction of predictions equal to `labels`.
    pub fn accuracy(&self, labels: &[f64]) -> f64 {
        if self.predictions.is_empty() {
            return 0.0;
        }
        let correct = self
            .predictions
            .iter()
            .zip(labels)
            .filter(|(p, y)| p == y)
            .count();
        correct as f64 / self.predictions.len() as f64
    }

    /// Accuracy over a trailing window ending at each instance.
    pub fn rolling_accuracy(&self, labels: &[f64], window: usize) -> Vec<f64> {
        let window = window.max(1);
        let hits: Vec<f64> = self
            .predictions
            .iter()
            .zip(labels)
            .map(|(p, y)| if p == y { 1.0 } else { 0.0 })
            .collect();

        let mut out = Vec::with_capacity(hits.len());
        let mut running = 0.0;
        for (i, hit) in hits.iter().enumerate() {
            running += hit;
            if i >= window {
                running -= hits[i - window];
            }
            out.push(running / (i + 1).min(window) as f64);
        }
        out
    }

    pub fn total_time(&self) -> Duration {
        self.step_times.iter().sum()
    }
}

/// Fit `estimator` on the first `n_train` rows, then for every remaining
/// row in order predict it and only afterwards train on it.
pub fn prequential<E: Estimator>(
    x: &[Vec<f64>],
    y: &[f64],
    estimator: &mut E,
    n_train: usize,
) -> Result<PrequentialReport> {
    if x.len() != y.len() {
        return Err(DriftError::InvalidInput(format!(
            "{} samples but {} labels",
            x.len(),
            y.len()
        )));
    }
    if n_train == 0 || n_train > y.len() {
        return Err(DriftError::InvalidInput(format!(
            "warm-up of {} rows for {} samples",
            n_train,
            y.len()
        )));
    }

    estimator.fit(&x[..n_train], &y[..n_train])?;

    let remaining = y.len() - n_train;
    let mut report = PrequentialReport {
        predictions: Vec::with_capacity(remaining),
        step_times: Vec::with_capacity(remaining),
    };

    for (xi, &yi) in x[n_train..].iter().zip(&y[n_train..]) {
        let start = Instant::now();
        report.predictions.push(estimator.predict(xi)?);
        estimator.partial_fit(xi, yi)?;
        report.step_times.push(start.elapsed());
    }

    info!(
        instances = remaining,
        accuracy = report.accuracy(&y[n_train..]),
        elapsed_ms = report.total_time().as_secs_f64() * 1e3,
        "Prequential evaluation finished."
    );
    Ok(report)
}
