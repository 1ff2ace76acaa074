//! # Sliding Window
//! Bounded FIFO history of the most recent sentiment scores.
//!
//! Capacity is fixed at construction (`window duration / sample interval`,
//! e.g. 1h / 20s = 180 points). Each push evicts at most one element from
//! the front, so the contents are always the `min(count, capacity)` most
//! recent scores in arrival order.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    buf: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window. A zero capacity is bumped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // avoid preallocating absurd configs
            buf: VecDeque::with_capacity(capacity.min(10_000) + 1),
            capacity,
        }
    }

    /// Append a score, evicting the oldest one if the window is full.
    /// Returns the evicted score, if any.
    pub fn push(&mut self, score: f64) -> Option<f64> {
        self.buf.push_back(score);
        if self.buf.len() > self.capacity {
            self.buf.pop_front()
        } else {
            None
        }
    }

    /// Copy of the contents, oldest first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.buf.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> + '_ {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.buf.back().copied()
    }
}
