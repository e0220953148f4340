use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Aggregate of `2^level` consecutive raw observations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub sum: f64,
    /// Sum of squared deviations from the bucket mean
    pub variance: f64,
}

impl Bucket {
    pub fn new(sum: f64, variance: f64) -> Self {
        Self { sum, variance }
    }

    /// Combine two equally sized buckets of `n` observations each.
    ///
    /// The cross term `n·n·(u1-u2)²/(2n)` makes the variance of the merged
    /// bucket exact, so `sum` and `variance` stay additive across merges.
    pub fn merge(self, other: Bucket, n: f64) -> Bucket {
        let u1 = self.sum / n;
        let u2 = other.sum / n;
        let ext_var = n * n * (u1 - u2).powi(2) / (n + n);
        Bucket {
            sum: self.sum + other.sum,
            variance: self.variance + other.variance + ext_var,
        }
    }
}

/// Fixed-capacity row of buckets that all summarize the same number of
/// observations. Oldest bucket first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRow {
    buckets: SmallVec<[Bucket; 8]>,
    capacity: usize,
}

impl BucketRow {
    /// Row holding at most `max_buckets + 1` buckets.
    pub fn new(max_buckets: usize) -> Self {
        Self {
            buckets: SmallVec::new(),
            capacity: max_buckets.saturating_add(1),
        }
    }

    /// Append a bucket after the newest one.
    pub fn insert(&mut self, sum: f64, variance: f64) -> Result<()> {
        if self.buckets.len() >= self.capacity {
            return Err(DriftError::invariant(format!(
                "insert into full bucket row ({} of {})",
                self.buckets.len(),
                self.capacity
            )));
        }
        self.buckets.push(Bucket::new(sum, variance));
        Ok(())
    }

    /// Drop the `n` oldest buckets, shifting the rest to the front.
    pub fn compress(&mut self, n: usize) -> Result<()> {
        if n > self.buckets.len() {
            return Err(DriftError::invariant(format!(
                "compress({}) on a row holding {} buckets",
                n,
                self.buckets.len()
            )));
        }
        self.buckets.drain(..n);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buckets.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    pub fn oldest(&self) -> Option<&Bucket> {
        self.buckets.first()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn sum(&self) -> f64 {
        self.buckets.iter().map(|b| b.sum).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_until_full() {
        let mut row = BucketRow::new(2);
        assert_eq!(row.capacity(), 3);
        for i in 0..3 {
            row.insert(i as f64, 0.0).unwrap();
        }
        assert!(row.is_full());
        assert!(matches!(
            row.insert(9.0, 0.0),
            Err(DriftError::InvariantViolation(_))
        ));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_capacity_saturates() {
        let mut row = BucketRow::new(usize::MAX);
        assert_eq!(row.capacity(), usize::MAX);
        row.insert(1.0, 0.0).unwrap();
        assert!(!row.is_full());
    }

    #[test]
    fn test_compress_shifts_oldest_out() {
        let mut row = BucketRow::new(5);
        for i in 1..=4 {
            row.insert(i as f64, i as f64 * 0.5).unwrap();
        }
        row.compress(2).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Bucket::new(3.0, 1.5)));
        assert_eq!(row.get(1), Some(&Bucket::new(4.0, 2.0)));
        assert_eq!(row.get(2), None);

        row.compress(2).unwrap();
        assert!(row.is_empty());
    }

    #[test]
    fn test_compress_more_than_held_fails() {
        let mut row = BucketRow::new(5);
        row.insert(1.0, 0.0).unwrap();
        assert!(matches!(
            row.compress(2),
            Err(DriftError::InvariantViolation(_))
        ));
        assert_eq!(row.len(), 1, "failed compress must not touch the row");
    }

    #[test]
    fn test_merge_matches_direct_computation() {
        // level 1 buckets: [1, 3] and [6, 10]
        let a = Bucket::new(4.0, 2.0);
        let b = Bucket::new(16.0, 8.0);
        let merged = a.merge(b, 2.0);

        let raw = [1.0, 3.0, 6.0, 10.0];
        let mean = raw.iter().sum::<f64>() / 4.0;
        let ss: f64 = raw.iter().map(|x| (x - mean).powi(2)).sum();

        assert_eq!(merged.sum, 20.0);
        assert!((merged.variance - ss).abs() < 1e-12);
    }

    #[test]
    fn test_merge_is_associative_for_aggregates() {
        let raw = [0.5, 2.0, -1.0, 4.0, 3.5, 3.5, 0.0, 7.0];
        let leaves: Vec<Bucket> = raw.iter().map(|&x| Bucket::new(x, 0.0)).collect();

        let pairs: Vec<Bucket> = leaves.chunks(2).map(|c| c[0].merge(c[1], 1.0)).collect();
        let quads: Vec<Bucket> = pairs.chunks(2).map(|c| c[0].merge(c[1], 2.0)).collect();
        let all = quads[0].merge(quads[1], 4.0);

        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let ss: f64 = raw.iter().map(|x| (x - mean).powi(2)).sum();
        assert!((all.sum - raw.iter().sum::<f64>()).abs() < 1e-12);
        assert!((all.variance - ss).abs() < 1e-9);
    }
}
