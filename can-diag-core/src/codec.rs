//! Signal codec
//!
//! Extracts physical values from raw CAN frame payloads based on a
//! [`Signal`] definition, and packs physical values back into frame bytes.
//! Handles bit extraction, endianness, sign extension and the affine
//! raw-to-physical transform.
//!
//! All functions are pure and deterministic; they are safe to call from any
//! thread without synchronization.

use crate::signal::{ByteOrder, Signal};
use crate::types::{DiagError, Result};

/// Frame length used for encoded payloads (classic CAN)
pub const FRAME_LEN: usize = 8;

/// Decode the physical value of a signal from frame bytes
///
/// Extracts `length` bits starting at `start_bit` honoring the byte order,
/// sign-extends when the signal is signed, then applies
/// `raw * scale + offset`.
///
/// Fails with [`DiagError::DecodeOutOfRange`] if the frame is shorter than
/// the field requires.
pub fn decode(signal: &Signal, data: &[u8]) -> Result<f64> {
    let raw = decode_raw(signal, data)?;
    Ok(raw as f64 * signal.scale + signal.offset)
}

/// Decode the raw (pre-scaling) integer value of a signal from frame bytes
pub fn decode_raw(signal: &Signal, data: &[u8]) -> Result<i64> {
    signal.validate()?;

    let needed = signal.required_bytes();
    if needed > data.len() {
        return Err(DiagError::DecodeOutOfRange {
            needed,
            actual: data.len(),
        });
    }

    let pattern = match signal.byte_order {
        ByteOrder::LittleEndian => {
            extract_little_endian(data, signal.start_bit as usize, signal.length as usize)
        }
        ByteOrder::BigEndian => {
            extract_big_endian(data, signal.start_bit as usize, signal.length as usize)
        }
    };

    let raw = if signal.is_signed {
        sign_extend(pattern, signal.length as usize)
    } else {
        pattern as i64
    };

    Ok(raw)
}

/// Encode a physical value into a zero-initialized 8-byte frame
///
/// Applies the inverse affine transform `round((value - offset) / scale)`,
/// clamps the result to the integer range representable at
/// `length`/`is_signed`, and writes the bit pattern at the signal's
/// position and order.
///
/// Fails with [`DiagError::EncodeValueOutOfRange`] if `scale` is zero or
/// the value is not a number.
pub fn encode(signal: &Signal, value: f64) -> Result<Vec<u8>> {
    let mut data = vec![0u8; FRAME_LEN];
    encode_into(signal, value, &mut data)?;
    Ok(data)
}

/// Encode a physical value into an existing frame buffer
///
/// Bits outside the signal's field are left untouched, so multiple signals
/// of one message can be packed into the same frame.
pub fn encode_into(signal: &Signal, value: f64, data: &mut [u8]) -> Result<()> {
    signal.validate()?;

    if signal.scale == 0.0 {
        return Err(DiagError::EncodeValueOutOfRange(format!(
            "signal '{}' has scale 0, value {} cannot be mapped to a raw integer",
            signal.name, value
        )));
    }
    if value.is_nan() {
        return Err(DiagError::EncodeValueOutOfRange(format!(
            "signal '{}': value is NaN",
            signal.name
        )));
    }

    let needed = signal.required_bytes();
    if needed > data.len() {
        return Err(DiagError::DecodeOutOfRange {
            needed,
            actual: data.len(),
        });
    }

    let raw = clamp_raw(signal, (value - signal.offset) / signal.scale);
    let mask = if signal.length as usize >= 64 {
        u64::MAX
    } else {
        (1u64 << signal.length) - 1
    };
    let pattern = (raw as u64) & mask;

    match signal.byte_order {
        ByteOrder::LittleEndian => {
            write_little_endian(data, signal.start_bit as usize, signal.length as usize, pattern)
        }
        ByteOrder::BigEndian => {
            write_big_endian(data, signal.start_bit as usize, signal.length as usize, pattern)
        }
    }

    Ok(())
}

/// Clamp a raw candidate value to the representable range of the field
fn clamp_raw(signal: &Signal, raw: f64) -> i64 {
    let length = signal.length as u32;
    let (lo, hi): (i128, i128) = if signal.is_signed {
        (-(1i128 << (length - 1)), (1i128 << (length - 1)) - 1)
    } else {
        (0, (1i128 << length) - 1)
    };

    // Clamp in floating point first so huge values never overflow the cast
    let rounded = raw.round().clamp(lo as f64, hi as f64);
    (rounded as i128).clamp(lo, hi) as i64
}

/// Extract a bit field with little-endian (Intel) byte order
///
/// The start bit points to the LSB of the field; bits are numbered from LSB
/// to MSB within each byte and the field grows towards higher bit numbers.
fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = bit_pos % 8;

        let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
        result |= (bit_value as u64) << i;
    }

    result
}

/// Extract a bit field with big-endian (Motorola) byte order
///
/// The start bit points to the MSB of the field, with in-byte numbering
/// 7..0 (bit 7 is the MSB of each byte). The field walks down within the
/// byte and continues at bit 7 of the next byte.
fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut byte_idx = start_bit / 8;
    let mut bit_in_byte = start_bit % 8;
    let mut result: u64 = 0;

    for _ in 0..length {
        let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
        result = (result << 1) | bit_value as u64;

        if bit_in_byte == 0 {
            byte_idx += 1;
            bit_in_byte = 7;
        } else {
            bit_in_byte -= 1;
        }
    }

    result
}

/// Write a bit pattern with little-endian (Intel) byte order
fn write_little_endian(data: &mut [u8], start_bit: usize, length: usize, pattern: u64) {
    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = bit_pos % 8;

        let bit_value = ((pattern >> i) & 0x01) as u8;
        data[byte_idx] = (data[byte_idx] & !(1 << bit_in_byte)) | (bit_value << bit_in_byte);
    }
}

/// Write a bit pattern with big-endian (Motorola) byte order
fn write_big_endian(data: &mut [u8], start_bit: usize, length: usize, pattern: u64) {
    let mut byte_idx = start_bit / 8;
    let mut bit_in_byte = start_bit % 8;

    for i in 0..length {
        let bit_value = ((pattern >> (length - 1 - i)) & 0x01) as u8;
        data[byte_idx] = (data[byte_idx] & !(1 << bit_in_byte)) | (bit_value << bit_in_byte);

        if bit_in_byte == 0 {
            byte_idx += 1;
            bit_in_byte = 7;
        } else {
            bit_in_byte -= 1;
        }
    }
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the field's MSB is set, fill the upper bits with 1s to produce the
/// two's-complement signed value.
fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}
