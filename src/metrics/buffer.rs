// Bounded sample buffer
// Author: kelexine (https://github.com/kelexine)

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Anything stored in a sample buffer carries the time it was observed
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Fixed-capacity append-only buffer. Once full, each push evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct SampleBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> SampleBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning the evicted one if the buffer was full
    pub fn push(&mut self, sample: T) -> Option<T> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<T: Timestamped + Clone> SampleBuffer<T> {
    /// Samples strictly newer than `cutoff`, oldest first
    pub fn since(&self, cutoff: DateTime<Utc>) -> Vec<T> {
        self.samples
            .iter()
            .filter(|s| s.timestamp() > cutoff)
            .cloned()
            .collect()
    }
}
