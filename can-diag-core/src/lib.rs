//! CAN Diagnostics Core Library
//!
//! Backend core of a vehicle CAN diagnostics console: define signals over
//! CAN frames (the DBC model), constrain fuzzed payloads to observed value
//! ranges, and discover unknown signals by correlating captured traffic
//! against a known OBD-II PID reading.
//!
//! # Architecture
//!
//! The library is focused on the algorithmic core:
//! - Bit-level signal codec (decode/encode with Intel and Motorola byte
//!   orders, sign extension, affine scaling)
//! - Byte-range aggregation across a selected set of CAN identifiers
//! - Correlation-candidate ranking, confidence tiers and signal derivation
//! - The offline and live correlation session state machine
//!
//! The library does NOT:
//! - Render any UI (tables, forms, dialogs are the application's job)
//! - Talk to the bus or own socket transports (collaborators pump typed
//!   commands and events through channels)
//! - Compute correlation coefficients (the external engine does)
//!
//! # Example Usage
//!
//! ```
//! use can_diag_core::{codec, ByteOrder, Signal};
//!
//! // 16-bit Motorola speed signal in the first two payload bytes
//! let speed = Signal::new("1A0", "VehicleSpeed")
//!     .with_position(7, 16)
//!     .with_byte_order(ByteOrder::BigEndian)
//!     .with_scaling(0.01, 0.0)
//!     .with_unit("km/h");
//!
//! let frame = [0x12, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
//! let kmh = codec::decode(&speed, &frame).unwrap();
//! assert!((kmh - 46.6).abs() < 0.01);
//! ```

// Public modules
pub mod candidate;
pub mod codec;
pub mod fuzz;
pub mod protocol;
pub mod ranges;
pub mod samples;
pub mod session;
pub mod signal;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use candidate::{
    rank_candidates, Candidate, CandidateKey, CandidateSet, ConfidenceTier, ModelType,
};
pub use protocol::{
    CorrelationEngine, CorrelationRequest, CorrelationResponse, EngineEvent, LiveCommand,
};
pub use ranges::{merge_byte_ranges, ByteRange, CanIdAnalysis};
pub use samples::{ObdSample, SampleSet};
pub use session::{CorrelationSession, LiveConfig, RunStats, SessionState};
pub use signal::{normalize_can_id, ByteOrder, Message, Signal};
pub use store::{SignalStore, StoreStats};
pub use types::{DiagError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty store and a fresh session
        let store = SignalStore::new();
        assert_eq!(store.stats().num_signals, 0);

        let session = CorrelationSession::new();
        assert_eq!(session.state(), SessionState::Idle);
    }
}
