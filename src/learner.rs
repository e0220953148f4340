//! Consumers of the drift signal.
//!
//! Nothing here trains a model itself: estimators are supplied by the
//! caller through the [`Estimator`] capability trait.

use crate::detector::DriftDetector;
use crate::error::{DriftError, Result};
use std::collections::VecDeque;
use tracing::{debug, info};

/// An incrementally trainable predictor.
pub trait Estimator {
    /// Train from scratch on a batch.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// Update with a single labelled instance.
    fn partial_fit(&mut self, x: &[f64], y: f64) -> Result<()>;

    fn predict(&self, x: &[f64]) -> Result<f64>;

    /// An unfitted estimator with the same hyper-parameters.
    fn fresh(&self) -> Self
    where
        Self: Sized;
}

fn check_batch(x: &[Vec<f64>], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(DriftError::InvalidInput(format!(
            "{} samples but {} labels",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(DriftError::InvalidInput("empty training batch".into()));
    }
    Ok(())
}

/// Wraps an estimator and replaces it with a fresh one whenever the
/// detector reports drift in its per-instance correctness.
pub struct DriftReactive<E, D> {
    estimator: E,
    detector: D,
    changes: u64,
}

impl<E: Estimator, D: DriftDetector> DriftReactive<E, D> {
    pub fn new(estimator: E, detector: D) -> Self {
        Self {
            estimator,
            detector,
            changes: 0,
        }
    }

    /// Number of times the estimator has been replaced.
    pub fn changes(&self) -> u64 {
        self.changes
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}

impl<E: Estimator, D: DriftDetector + Clone> Estimator for DriftReactive<E, D> {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.estimator.fit(x, y)
    }

    fn partial_fit(&mut self, x: &[f64], y: f64) -> Result<()> {
        let predicted = self.estimator.predict(x)?;
        let correct = if predicted == y { 1.0 } else { 0.0 };

        if self.detector.observe(correct)? {
            self.changes += 1;
            info!(
                detector = self.detector.name(),
                changes = self.changes,
                "Drift detected, replacing estimator."
            );
            self.estimator = self.estimator.fresh();
        }
        self.estimator.partial_fit(x, y)
    }

    fn predict(&self, x: &[f64]) -> Result<f64> {
        self.estimator.predict(x)
    }

    fn fresh(&self) -> Self {
        let mut detector = self.detector.clone();
        detector.reset();
        Self::new(self.estimator.fresh(), detector)
    }
}

/// Fixed-capacity buffer of labelled instances.
#[derive(Debug, Clone)]
pub struct BatchBuffer {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    capacity: usize,
}

impl BatchBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an instance; fails when the buffer is already full.
    pub fn push(&mut self, x: &[f64], y: f64) -> Result<()> {
        if self.is_full() {
            return Err(DriftError::invariant(format!(
                "push into full batch buffer of {}",
                self.capacity
            )));
        }
        self.x.push(x.to_vec());
        self.y.push(y);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.y.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take the buffered instances, leaving the buffer empty.
    pub fn flush(&mut self) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = std::mem::replace(&mut self.x, Vec::with_capacity(self.capacity));
        let y = std::mem::replace(&mut self.y, Vec::with_capacity(self.capacity));
        (x, y)
    }
}

/// Ensemble of batch models, each trained on one full buffer of recent
/// instances. Predictions are the member average thresholded at 0.5.
pub struct BatchEnsemble<E> {
    prototype: E,
    members: VecDeque<E>,
    max_members: usize,
    buffer: BatchBuffer,
}

impl<E: Estimator> BatchEnsemble<E> {
    pub fn new(prototype: E, max_members: usize) -> Result<Self> {
        if max_members < 1 {
            return Err(DriftError::config("max_members", "must be at least 1"));
        }
        Ok(Self {
            prototype,
            members: VecDeque::with_capacity(max_members),
            max_members,
            buffer: BatchBuffer::new(0),
        })
    }

    pub fn members(&self) -> usize {
        self.members.len()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn add_member(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let mut member = self.prototype.fresh();
        member.fit(x, y)?;
        if self.members.len() == self.max_members {
            self.members.pop_front();
        }
        self.members.push_back(member);
        debug!(members = self.members.len(), batch = y.len(), "Trained ensemble member.");
        Ok(())
    }
}

impl<E: Estimator> Estimator for BatchEnsemble<E> {
    /// Train the first member; the batch length fixes the buffer size
    /// used for every later member.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        check_batch(x, y)?;
        self.add_member(x, y)?;
        self.buffer = BatchBuffer::new(y.len());
        Ok(())
    }

    fn partial_fit(&mut self, x: &[f64], y: f64) -> Result<()> {
        if self.buffer.capacity() == 0 {
            return Err(DriftError::Estimator("partial_fit called before fit".into()));
        }
        self.buffer.push(x, y)?;
        if self.buffer.is_full() {
            let (bx, by) = self.buffer.flush();
            self.add_member(&bx, &by)?;
        }
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> Result<f64> {
        if self.members.is_empty() {
            return Err(DriftError::Estimator("ensemble has no fitted members".into()));
        }
        let mut total = 0.0;
        for member in &self.members {
            total += member.predict(x)?;
        }
        let average = total / self.members.len() as f64;
        Ok(if average >= 0.5 { 1.0 } else { 0.0 })
    }

    fn fresh(&self) -> Self {
        Self {
            prototype: self.prototype.fresh(),
            members: VecDeque::with_capacity(self.max_members),
            max_members: self.max_members,
            buffer: BatchBuffer::new(0),
        }
    }
}
