//! Range-constrained fuzzing support
//!
//! The merged byte ranges of a CAN ID selection constrain generated
//! payloads to values actually observed on the bus. Sent frames are kept in
//! an explicitly owned, bounded history rather than ambient state.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::ranges::ByteRange;

/// Default capacity of the sent-frame history
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Payload generator drawing each byte uniformly from its merged range
///
/// Bytes without an observed range stay zero; the payload is sized to the
/// highest covered byte index.
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    ranges: Vec<ByteRange>,
    payload_len: usize,
}

impl PayloadGenerator {
    /// Build a generator from merged byte ranges (ascending by index)
    pub fn new(ranges: Vec<ByteRange>) -> Self {
        let payload_len = ranges
            .iter()
            .map(|r| r.index as usize + 1)
            .max()
            .unwrap_or(0);
        Self { ranges, payload_len }
    }

    /// Length of generated payloads
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// The ranges constraining this generator
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// Generate one payload
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Vec<u8> {
        let mut payload = vec![0u8; self.payload_len];
        for range in &self.ranges {
            let value = if range.min == range.max {
                range.min
            } else {
                rng.gen_range(range.min..=range.max)
            };
            payload[range.index as usize] = value;
        }
        payload
    }
}

/// One frame sent to the bus
#[derive(Debug, Clone, PartialEq)]
pub struct SentFrame {
    pub timestamp: DateTime<Utc>,
    pub can_id: String,
    pub data: Vec<u8>,
}

/// Bounded record of sent frames, oldest dropped first
#[derive(Debug, Clone)]
pub struct FrameHistory {
    frames: VecDeque<SentFrame>,
    capacity: usize,
}

impl FrameHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Record a sent frame, dropping the oldest entry when full
    pub fn record(&mut self, can_id: impl Into<String>, data: Vec<u8>) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(SentFrame {
            timestamp: Utc::now(),
            can_id: can_id.into(),
            data,
        });
    }

    /// Iterate frames oldest first
    pub fn iter(&self) -> impl Iterator<Item = &SentFrame> {
        self.frames.iter()
    }

    /// The most recently sent frame
    pub fn last(&self) -> Option<&SentFrame> {
        self.frames.back()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
