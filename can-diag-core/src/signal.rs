//! CAN signal definitions
//!
//! A [`Signal`] is a decode/encode rule for one bit field within frames of a
//! given CAN identifier, following the DBC semantic model: start bit, length,
//! byte order, signedness and an affine raw-to-physical transform.

use serde::{Deserialize, Serialize};

use crate::types::{DiagError, Result};

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little-endian (Intel format): start bit is the LSB of the field
    LittleEndian,
    /// Big-endian (Motorola format): start bit is the MSB of the field
    BigEndian,
}

/// A CAN signal definition
///
/// `start_bit` is 0-based. With `LittleEndian` byte order bit 0 is the least
/// significant bit of the frame's first byte; with `BigEndian` the in-byte
/// numbering is 7..0 and the start bit names the most significant bit of the
/// field (DBC "Motorola" convention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Identity assigned by the signal store; absent until saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Arbitration ID, canonical uppercase hex without `0x` prefix
    pub can_id: String,
    /// Human label, unique within a CAN ID's signal set
    pub name: String,
    /// Start bit in the CAN frame
    pub start_bit: u8,
    /// Length in bits (1-64)
    pub length: u8,
    /// Byte order for extraction
    pub byte_order: ByteOrder,
    /// Two's-complement sign extension over `length` bits when true
    pub is_signed: bool,
    /// Scale factor to convert raw value to physical value
    pub scale: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Advisory minimum physical value (not enforced during decode)
    pub min_val: f64,
    /// Advisory maximum physical value (not enforced during decode)
    pub max_val: f64,
    /// Engineering unit (e.g., "rpm", "km/h")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Free-form description, no semantic effect on decode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Signal {
    /// Create a new unsigned little-endian 8-bit signal with identity scaling
    pub fn new(can_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            can_id: normalize_can_id(&can_id.into()),
            name: name.into(),
            start_bit: 0,
            length: 8,
            byte_order: ByteOrder::LittleEndian,
            is_signed: false,
            scale: 1.0,
            offset: 0.0,
            min_val: 0.0,
            max_val: 0.0,
            unit: None,
            comment: None,
        }
    }

    /// Builder method: set bit position and length
    pub fn with_position(mut self, start_bit: u8, length: u8) -> Self {
        self.start_bit = start_bit;
        self.length = length;
        self
    }

    /// Builder method: set byte order
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Builder method: mark the raw value as signed
    pub fn signed(mut self, is_signed: bool) -> Self {
        self.is_signed = is_signed;
        self
    }

    /// Builder method: set the affine transform coefficients
    pub fn with_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Builder method: set advisory physical bounds
    pub fn with_bounds(mut self, min_val: f64, max_val: f64) -> Self {
        self.min_val = min_val;
        self.max_val = max_val;
        self
    }

    /// Builder method: set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Builder method: set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// First bit of the field in MSB-first frame numbering
    ///
    /// Maps the byte order's start-bit convention onto a single linear
    /// numbering (bit 0 = MSB of byte 0) so that span checks work the same
    /// way for both orders.
    pub(crate) fn msb0_start(&self) -> usize {
        let start = self.start_bit as usize;
        match self.byte_order {
            // LSB-position numbering: the field spans towards higher bits,
            // its first frame bit is the start bit itself
            ByteOrder::LittleEndian => start,
            // Motorola: in-byte numbering is 7..0, bit 7 is the MSB
            ByteOrder::BigEndian => (start / 8) * 8 + (7 - start % 8),
        }
    }

    /// Number of frame bytes needed to cover this field
    pub fn required_bytes(&self) -> usize {
        let span_end = match self.byte_order {
            ByteOrder::LittleEndian => self.start_bit as usize + self.length as usize,
            ByteOrder::BigEndian => self.msb0_start() + self.length as usize,
        };
        (span_end + 7) / 8
    }

    /// Validate the definition against the frame addressing invariants
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 || self.length > 64 {
            return Err(DiagError::InvalidSignal(format!(
                "signal '{}' has length {} (must be 1-64 bits)",
                self.name, self.length
            )));
        }
        let span_end = match self.byte_order {
            ByteOrder::LittleEndian => self.start_bit as usize + self.length as usize,
            ByteOrder::BigEndian => self.msb0_start() + self.length as usize,
        };
        if span_end > 64 {
            return Err(DiagError::InvalidSignal(format!(
                "signal '{}' at start bit {} with {} bits extends past the 64-bit frame",
                self.name, self.start_bit, self.length
            )));
        }
        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(DiagError::InvalidSignal(format!(
                "signal '{}' has non-finite scaling",
                self.name
            )));
        }
        Ok(())
    }
}

/// Canonicalize a CAN identifier: trim, strip `0x` prefix, uppercase
pub fn normalize_can_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_uppercase()
}

/// The set of signals sharing one CAN identifier
///
/// Derived view over a signal collection; the grouping key is `can_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub can_id: String,
    pub signals: Vec<Signal>,
}
