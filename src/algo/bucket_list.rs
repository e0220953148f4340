use crate::algo::bucket_row::BucketRow;
use serde::{Deserialize, Serialize};

/// Rows of buckets ordered by granularity.
///
/// Rows live in one vector indexed by level: the head (index 0) holds
/// single observations, the tail (last index) holds the oldest, coarsest
/// buckets. Neighbours are `level - 1` and `level + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketList {
    rows: Vec<BucketRow>,
    max_buckets: usize,
}

impl BucketList {
    pub fn new(max_buckets: usize) -> Self {
        let mut list = Self {
            rows: Vec::with_capacity(16),
            max_buckets,
        };
        list.add_head();
        list
    }

    fn add_head(&mut self) {
        self.rows.insert(0, BucketRow::new(self.max_buckets));
    }

    /// Append an empty row after the tail; it becomes the new tail.
    pub fn add_tail(&mut self) -> &mut BucketRow {
        self.rows.push(BucketRow::new(self.max_buckets));
        let level = self.rows.len() - 1;
        &mut self.rows[level]
    }

    /// Detach the tail row. Removing the last row leaves the list empty
    /// until the next insert recreates the head.
    pub fn remove_tail(&mut self) -> Option<BucketRow> {
        self.rows.pop()
    }

    pub fn head(&self) -> Option<&BucketRow> {
        self.rows.first()
    }

    /// Head row, recreated if the list was emptied.
    pub fn head_mut(&mut self) -> &mut BucketRow {
        if self.rows.is_empty() {
            self.add_head();
        }
        &mut self.rows[0]
    }

    pub fn tail(&self) -> Option<&BucketRow> {
        self.rows.last()
    }

    pub fn tail_mut(&mut self) -> Option<&mut BucketRow> {
        self.rows.last_mut()
    }

    /// Level of the tail row.
    pub fn tail_level(&self) -> Option<usize> {
        self.rows.len().checked_sub(1)
    }

    pub fn get(&self, level: usize) -> Option<&BucketRow> {
        self.rows.get(level)
    }

    /// Row at `level` together with the row above it, creating the latter
    /// when `level` is the tail.
    pub fn with_next_mut(&mut self, level: usize) -> Option<(&mut BucketRow, &mut BucketRow)> {
        if level >= self.rows.len() {
            return None;
        }
        if level + 1 == self.rows.len() {
            self.add_tail();
        }
        let (lower, upper) = self.rows.split_at_mut(level + 1);
        Some((&mut lower[level], &mut upper[0]))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with their level, head first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &BucketRow)> {
        self.rows.iter().enumerate()
    }

    pub fn max_buckets(&self) -> usize {
        self.max_buckets
    }
}
