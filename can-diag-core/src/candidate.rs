//! Correlation candidates
//!
//! A [`Candidate`] is one hypothesis produced by the correlation engine: a
//! byte span of a CAN identifier whose decoded values track a known OBD-II
//! PID reading. This module owns ranking, confidence tiers, de-duplication
//! across live updates, and the derivation of a persistable [`Signal`] from
//! an accepted candidate.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::signal::{ByteOrder, Signal};
use crate::types::{DiagError, Result};

/// Decode shape tested by the correlation engine
///
/// A closed set: dispatching width and order through the enum keeps the
/// codec mapping exhaustive instead of comparing model strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// One byte, unsigned
    SingleByte,
    /// Two bytes, little-endian word
    TwoByteLe,
    /// Two bytes, big-endian word
    TwoByteBe,
}

impl ModelType {
    /// Field width in bits
    pub fn bit_length(&self) -> u8 {
        match self {
            ModelType::SingleByte => 8,
            ModelType::TwoByteLe | ModelType::TwoByteBe => 16,
        }
    }

    /// Bytes spanned by the field
    pub fn span_bytes(&self) -> u8 {
        self.bit_length() / 8
    }

    /// Byte order of the derived signal
    pub fn byte_order(&self) -> ByteOrder {
        match self {
            ModelType::SingleByte | ModelType::TwoByteLe => ByteOrder::LittleEndian,
            ModelType::TwoByteBe => ByteOrder::BigEndian,
        }
    }

    /// Read the raw word this model would decode at `byte_index`
    ///
    /// Returns `None` when the payload does not cover the span. Used to
    /// preview a candidate against captured bytes.
    pub fn read_raw(&self, data: &[u8], byte_index: usize) -> Option<u64> {
        let end = byte_index + self.span_bytes() as usize;
        if end > data.len() {
            return None;
        }
        let word = &data[byte_index..end];
        Some(match self {
            ModelType::SingleByte => word[0] as u64,
            ModelType::TwoByteLe => LittleEndian::read_u16(word) as u64,
            ModelType::TwoByteBe => BigEndian::read_u16(word) as u64,
        })
    }
}

/// Confidence tier driving accept/reject presentation and thresholding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Tier for an engine-reported confidence in [0, 1]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ConfidenceTier::High
        } else if confidence >= 0.5 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::High => write!(f, "high"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::Low => write!(f, "low"),
        }
    }
}

/// Identity of a candidate for de-duplication across live updates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateKey {
    pub can_id: String,
    pub model: String,
    pub byte_index: u8,
    pub byte_end: u8,
}

/// One hypothesis linking a CAN byte span to an OBD-II PID
///
/// Immutable once received; the confidence value is engine-computed and
/// treated as opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Arbitration ID the hypothesis applies to
    pub can_id: String,
    /// Engine-chosen textual identifier of the decode shape
    pub model: String,
    /// Typed decode shape
    pub model_type: ModelType,
    /// First byte of the tested span
    pub byte_index: u8,
    /// Last byte of the tested span, inclusive
    pub byte_end: u8,
    /// Pearson correlation coefficient, in [-1, 1]
    pub pearson: f64,
    /// Spearman rank correlation coefficient, in [-1, 1]
    pub spearman: f64,
    /// Engine-computed confidence, in [0, 1]
    pub confidence: f64,
    /// Best-fit scale mapping raw bytes to the PID's physical value
    pub scale: f64,
    /// Best-fit offset mapping raw bytes to the PID's physical value
    pub offset: f64,
    /// Number of time-aligned samples behind the hypothesis
    pub n_samples: usize,
    /// Sample timestamps, non-decreasing, co-indexed with the value series
    #[serde(default)]
    pub timestamps: Vec<f64>,
    /// OBD-II readings per timestamp
    #[serde(default)]
    pub obd_values: Vec<f64>,
    /// CAN values per timestamp, after the model's decode and affine fit
    #[serde(default)]
    pub can_transformed: Vec<f64>,
}

impl Candidate {
    /// De-duplication identity: `(can_id, model, byte_index, byte_end)`
    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            can_id: self.can_id.clone(),
            model: self.model.clone(),
            byte_index: self.byte_index,
            byte_end: self.byte_end,
        }
    }

    /// Confidence tier of this candidate
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    /// Check the co-indexed series invariant
    ///
    /// `timestamps`, `obd_values` and `can_transformed` must all have length
    /// `n_samples`, and timestamps must be non-decreasing.
    pub fn validate(&self) -> Result<()> {
        if self.timestamps.len() != self.n_samples
            || self.obd_values.len() != self.n_samples
            || self.can_transformed.len() != self.n_samples
        {
            return Err(DiagError::Engine(format!(
                "candidate {} @{}: series lengths {}/{}/{} do not match n_samples {}",
                self.can_id,
                self.byte_index,
                self.timestamps.len(),
                self.obd_values.len(),
                self.can_transformed.len(),
                self.n_samples
            )));
        }
        if self.timestamps.windows(2).any(|w| w[1] < w[0]) {
            return Err(DiagError::Engine(format!(
                "candidate {} @{}: timestamps are not non-decreasing",
                self.can_id, self.byte_index
            )));
        }
        Ok(())
    }

    /// Derive a persistable signal from this candidate
    ///
    /// Single-byte and little-endian models start at `byte_index * 8`; the
    /// big-endian model starts at the MSB of its first byte (Motorola
    /// numbering), so decoding the derived signal reproduces exactly the
    /// byte span the engine tested. The engine's models are unsigned-only,
    /// and the advisory bounds come from the observed OBD values rather
    /// than the raw byte range.
    pub fn to_signal(&self, name: impl Into<String>) -> Signal {
        let start_bit = match self.model_type.byte_order() {
            ByteOrder::LittleEndian => self.byte_index * 8,
            ByteOrder::BigEndian => self.byte_index * 8 + 7,
        };

        let (min_val, max_val) = self
            .obd_values
            .iter()
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                None => Some((v, v)),
            })
            .unwrap_or((0.0, 0.0));

        Signal::new(self.can_id.clone(), name)
            .with_position(start_bit, self.model_type.bit_length())
            .with_byte_order(self.model_type.byte_order())
            .with_scaling(self.scale, self.offset)
            .with_bounds(min_val, max_val)
    }
}

/// Order candidates for selection
///
/// Stable ordering: confidence descending, ties broken by |pearson|
/// descending, then |spearman| descending, so "select top candidate" is
/// deterministic and reproducible.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.pearson.abs().total_cmp(&a.pearson.abs()))
            .then_with(|| b.spearman.abs().total_cmp(&a.spearman.abs()))
    });
}

/// Running candidate collection of a live discovery session
///
/// Upserts keep the latest hypothesis per identity: a later candidate with
/// the same `(can_id, model, byte_index, byte_end)` supersedes the earlier
/// one. Reads are ranked snapshots.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    items: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a batch of candidates, superseding same-identity entries
    pub fn apply(&mut self, batch: Vec<Candidate>) {
        for candidate in batch {
            let key = candidate.key();
            match self.items.iter_mut().find(|c| c.key() == key) {
                Some(existing) => *existing = candidate,
                None => self.items.push(candidate),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Ranked snapshot of the current candidates
    pub fn snapshot(&self) -> Vec<Candidate> {
        let mut snapshot = self.items.clone();
        rank_candidates(&mut snapshot);
        snapshot
    }

    /// The current top-ranked candidate, if any
    pub fn best(&self) -> Option<Candidate> {
        self.snapshot().into_iter().next()
    }
}
