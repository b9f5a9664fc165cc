//! Byte-range statistics aggregation
//!
//! Captured traffic is summarized per CAN identifier as per-byte min/max and
//! distinct-value counts. [`merge_byte_ranges`] folds the analyses of a
//! selected set of identifiers into one range set, which constrains fuzzed
//! payloads to plausible values and feeds the range visualization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::signal::normalize_can_id;

/// Observed statistics for one byte offset (0-7) of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// Byte offset within the payload
    pub index: u8,
    /// Smallest value observed at this offset
    pub min: u8,
    /// Largest value observed at this offset
    pub max: u8,
    /// Count of distinct values observed, saturating
    ///
    /// Display-only richness indicator; once merged across identifiers it is
    /// no longer an exact cardinality.
    pub unique: u32,
}

/// Per-identifier capture analysis as delivered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanIdAnalysis {
    /// Arbitration ID this analysis belongs to
    pub can_id: String,
    /// Total frames observed for this identifier
    pub count: u64,
    /// Frames that contributed to the byte statistics
    pub sample_count: u64,
    /// Example payloads, hex-encoded
    #[serde(default)]
    pub samples: Vec<String>,
    /// One entry per byte offset actually observed
    pub byte_ranges: Vec<ByteRange>,
}

/// Merge per-identifier byte statistics across a selection of CAN IDs
///
/// For every byte index present in at least one selected identifier's
/// analysis the output holds one merged range: min of mins, max of maxes,
/// and the largest `unique` count (a width quantity: merging widens the
/// allowed span without implying a higher true cardinality). The result is
/// ordered ascending by index; indices absent from all selected identifiers
/// are omitted.
///
/// The output depends only on the selection set and the input analyses, not
/// on their iteration order.
pub fn merge_byte_ranges(analyses: &[CanIdAnalysis], selected_ids: &[String]) -> Vec<ByteRange> {
    let selected: Vec<String> = selected_ids.iter().map(|id| normalize_can_id(id)).collect();
    let mut merged: BTreeMap<u8, ByteRange> = BTreeMap::new();

    for analysis in analyses {
        if !selected.contains(&normalize_can_id(&analysis.can_id)) {
            continue;
        }

        for range in &analysis.byte_ranges {
            merged
                .entry(range.index)
                .and_modify(|m| {
                    m.min = m.min.min(range.min);
                    m.max = m.max.max(range.max);
                    m.unique = m.unique.max(range.unique);
                })
                .or_insert(*range);
        }
    }

    log::debug!(
        "Merged byte ranges for {} of {} analyses: {} byte offsets",
        selected.len(),
        analyses.len(),
        merged.len()
    );

    merged.into_values().collect()
}
