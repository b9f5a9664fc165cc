//! Correlation engine wire contract
//!
//! The engine that computes Pearson/Spearman correlation over raw captures
//! is an external collaborator. This module pins down its request/response
//! and streaming message shapes; transport mechanics (HTTP, WebSocket) stay
//! outside the library; the live session only sees typed commands and
//! events moving through channels.

use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::samples::ObdSample;
use crate::types::Result;

/// One-shot correlation request against recorded samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRequest {
    /// Time-value samples of the target PID
    pub samples: Vec<ObdSample>,
    /// Alignment-window tolerance in milliseconds
    pub window_ms: u32,
    /// Target OBD-II PID, e.g. "0C"
    pub pid: String,
    /// Optional mission/log scope to correlate against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
}

/// Engine response to an offline correlation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResponse {
    /// Zero or more candidates, engine order
    pub candidates: Vec<Candidate>,
    /// Distinct CAN identifiers the engine considered
    pub total_ids_analyzed: u32,
    /// Frames processed across the capture
    pub total_frames_processed: u64,
    /// Engine-side processing time
    pub elapsed_ms: f64,
}

/// Offline correlation collaborator
///
/// Implementations wrap whatever transport reaches the engine; failures
/// must map to [`crate::DiagError::Transport`] (request never reached the
/// engine or no usable reply) or [`crate::DiagError::Engine`] (the engine
/// replied with an explicit error).
pub trait CorrelationEngine {
    fn correlate(&self, request: &CorrelationRequest) -> Result<CorrelationResponse>;
}

/// Command sent to the engine over a live streaming connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum LiveCommand {
    /// Begin sampling the PID and streaming correlation updates
    Start {
        pid: String,
        interface: String,
        #[serde(rename = "intervalMs")]
        interval_ms: u64,
        service: String,
        #[serde(rename = "correlationIntervalS")]
        correlation_interval_s: u64,
    },
    /// Best-effort request to end the stream
    Stop,
}

/// Event emitted by the engine over a live streaming connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// One freshly sampled PID reading
    ObdSample {
        value: f64,
        #[serde(rename = "sampleCount")]
        sample_count: u64,
    },
    /// Incremental candidate batch
    CorrelationUpdate {
        candidates: Vec<Candidate>,
        #[serde(rename = "canIdsCount")]
        can_ids_count: u32,
        /// Marks the last update of the stream
        #[serde(rename = "final")]
        is_final: bool,
    },
    /// Engine-side failure; terminates the stream
    Error { message: String },
}
