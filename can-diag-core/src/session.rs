//! Correlation session
//!
//! Orchestrates the signal-discovery workflow against the external
//! correlation engine: a one-shot offline run over recorded samples, or a
//! live streaming run that applies incremental candidate batches as they
//! arrive.
//!
//! The live path is an explicit state machine consuming a message channel;
//! events are applied strictly in receipt order by a single consumer. The
//! session exclusively owns its mutable state; readers get ranked
//! snapshots, never references into the running set.

use tokio::sync::mpsc;

use crate::candidate::{Candidate, CandidateSet};
use crate::protocol::{CorrelationEngine, CorrelationRequest, EngineEvent, LiveCommand};
use crate::samples::ObdSample;
use crate::types::{DiagError, Result};

/// Minimum offline sample count accepted by the engine contract
pub const MIN_OFFLINE_SAMPLES: usize = 3;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No active or finished run
    Idle,
    /// Target PID accepted, run not yet issued
    Configuring,
    /// Request in flight or stream open
    Running,
    /// Offline response applied, or live stream ended with a final batch
    Completed,
    /// Transport failure or explicit engine error
    Failed,
    /// Operator stopped a live stream
    Stopped,
}

impl SessionState {
    /// Terminal states count as idle: a new run may start and `stop` is a
    /// no-op. Only `Running` and `Configuring` occupy the session.
    pub fn is_idle(&self) -> bool {
        !matches!(self, SessionState::Running | SessionState::Configuring)
    }
}

/// Offline run metadata reported by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub total_ids_analyzed: u32,
    pub total_frames_processed: u64,
    pub elapsed_ms: f64,
}

/// Parameters of a live streaming run
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Target OBD-II PID, e.g. "0C"
    pub pid: String,
    /// CAN interface the engine samples on
    pub interface: String,
    /// PID polling interval in milliseconds
    pub sample_interval_ms: u64,
    /// OBD service, e.g. "01" (current data)
    pub service: String,
    /// Seconds between correlation updates
    pub correlation_interval_s: u64,
}

impl LiveConfig {
    pub fn new(pid: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            interface: "can0".to_string(),
            sample_interval_ms: 200,
            service: "01".to_string(),
            correlation_interval_s: 5,
        }
    }

    /// Builder method: set the CAN interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Builder method: set the PID polling interval
    pub fn with_sample_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sample_interval_ms = interval_ms;
        self
    }

    /// Builder method: set the OBD service
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Builder method: set the correlation update interval
    pub fn with_correlation_interval_s(mut self, interval_s: u64) -> Self {
        self.correlation_interval_s = interval_s;
        self
    }

    fn start_command(&self) -> LiveCommand {
        LiveCommand::Start {
            pid: self.pid.clone(),
            interface: self.interface.clone(),
            interval_ms: self.sample_interval_ms,
            service: self.service.clone(),
            correlation_interval_s: self.correlation_interval_s,
        }
    }
}

/// One operator's discovery session
///
/// Holds at most one outstanding run; starting a new one while another is
/// running fails with [`DiagError::AlreadyRunning`]. Partial results of a
/// stopped or failed stream are retained until the next start.
pub struct CorrelationSession {
    state: SessionState,
    pid: Option<String>,
    candidates: CandidateSet,
    run_stats: Option<RunStats>,
    sample_count: u64,
    last_sample: Option<f64>,
    can_ids_count: u32,
    stream_done: bool,
    last_error: Option<String>,
    commands: Option<mpsc::Sender<LiveCommand>>,
}

impl CorrelationSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            pid: None,
            candidates: CandidateSet::new(),
            run_stats: None,
            sample_count: 0,
            last_sample: None,
            can_ids_count: 0,
            stream_done: false,
            last_error: None,
            commands: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Target PID of the current or last run
    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }

    /// Offline run metadata, if the last run was offline and completed
    pub fn run_stats(&self) -> Option<RunStats> {
        self.run_stats
    }

    /// Cumulative live sample count reported by the engine
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Most recent live PID reading
    pub fn last_sample(&self) -> Option<f64> {
        self.last_sample
    }

    /// Distinct CAN identifiers considered in the latest live batch
    pub fn can_ids_count(&self) -> u32 {
        self.can_ids_count
    }

    /// Error message of the last failed run, passed through unmodified
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Ranked snapshot of the current candidate set
    pub fn candidates(&self) -> Vec<Candidate> {
        self.candidates.snapshot()
    }

    /// Top-ranked candidate, if any
    pub fn best_candidate(&self) -> Option<Candidate> {
        self.candidates.best()
    }

    /// Reset per-run state and claim the session for a new run
    fn begin(&mut self, pid: &str) -> Result<()> {
        if !self.state.is_idle() {
            return Err(DiagError::AlreadyRunning);
        }
        self.state = SessionState::Configuring;
        self.pid = Some(pid.to_string());
        self.candidates.clear();
        self.run_stats = None;
        self.sample_count = 0;
        self.last_sample = None;
        self.can_ids_count = 0;
        self.stream_done = false;
        self.last_error = None;
        self.commands = None;
        Ok(())
    }

    /// Run a one-shot correlation over recorded samples
    ///
    /// Fewer than [`MIN_OFFLINE_SAMPLES`] samples fails with
    /// [`DiagError::InsufficientSamples`] before anything is sent (exactly
    /// the minimum is accepted). Engine and transport failures move the
    /// session to `Failed` with the message passed through; there is no
    /// automatic retry.
    pub fn start_offline(
        &mut self,
        engine: &dyn CorrelationEngine,
        pid: &str,
        samples: &[ObdSample],
        window_ms: u32,
        scope_id: Option<String>,
    ) -> Result<RunStats> {
        self.begin(pid)?;

        if samples.len() < MIN_OFFLINE_SAMPLES {
            self.state = SessionState::Idle;
            return Err(DiagError::InsufficientSamples { got: samples.len() });
        }

        let request = CorrelationRequest {
            samples: samples.to_vec(),
            window_ms,
            pid: pid.to_string(),
            scope_id,
        };

        self.state = SessionState::Running;
        log::info!(
            "Offline correlation for PID {} over {} samples (window {} ms)",
            pid,
            samples.len(),
            window_ms
        );

        match engine.correlate(&request) {
            Ok(response) => {
                let stats = RunStats {
                    total_ids_analyzed: response.total_ids_analyzed,
                    total_frames_processed: response.total_frames_processed,
                    elapsed_ms: response.elapsed_ms,
                };
                log::info!(
                    "Correlation complete: {} candidate(s) from {} CAN IDs in {:.1} ms",
                    response.candidates.len(),
                    stats.total_ids_analyzed,
                    stats.elapsed_ms
                );
                self.candidates.apply(response.candidates);
                self.run_stats = Some(stats);
                self.state = SessionState::Completed;
                Ok(stats)
            }
            Err(err) => {
                log::warn!("Offline correlation failed: {}", err);
                self.last_error = Some(err.to_string());
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    /// Open a live discovery run
    ///
    /// Sends the `start` command through `commands` and enters `Running`.
    /// The caller's transport pumps engine events into the channel consumed
    /// by [`run_live`](Self::run_live) (or hands them to
    /// [`handle_event`](Self::handle_event) directly).
    pub fn start_live(
        &mut self,
        config: &LiveConfig,
        commands: mpsc::Sender<LiveCommand>,
    ) -> Result<()> {
        self.begin(&config.pid)?;

        log::info!(
            "Live correlation for PID {} on {} (sample {} ms, update {} s)",
            config.pid,
            config.interface,
            config.sample_interval_ms,
            config.correlation_interval_s
        );

        if let Err(err) = commands.try_send(config.start_command()) {
            self.state = SessionState::Failed;
            let message = format!("failed to send start command: {}", err);
            self.last_error = Some(message.clone());
            return Err(DiagError::Transport(message));
        }

        self.commands = Some(commands);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Apply one engine event
    ///
    /// Events are expected in receipt order; anything arriving outside
    /// `Running` is ignored. A batch flagged final ends the candidate
    /// stream: the session completes and later batches are dropped.
    pub fn handle_event(&mut self, event: EngineEvent) {
        if self.state != SessionState::Running {
            log::debug!("Ignoring engine event outside a running session");
            return;
        }

        match event {
            EngineEvent::ObdSample { value, sample_count } => {
                self.last_sample = Some(value);
                self.sample_count = sample_count;
            }
            EngineEvent::CorrelationUpdate { candidates, can_ids_count, is_final } => {
                if self.stream_done {
                    log::debug!("Dropping correlation update after final batch");
                    return;
                }
                log::debug!(
                    "Applying correlation update: {} candidate(s), {} CAN IDs, final={}",
                    candidates.len(),
                    can_ids_count,
                    is_final
                );
                self.candidates.apply(candidates);
                self.can_ids_count = can_ids_count;
                if is_final {
                    self.stream_done = true;
                    self.state = SessionState::Completed;
                    self.commands = None;
                }
            }
            EngineEvent::Error { message } => {
                log::warn!("Engine error: {}", message);
                self.last_error = Some(message);
                self.state = SessionState::Failed;
                self.commands = None;
            }
        }
    }

    /// Consume engine events until the stream ends
    ///
    /// Single consumer, FIFO: updates are applied in receipt order. Channel
    /// closure while running is a transport failure, so the session never
    /// hangs on a dead connection.
    pub async fn run_live(&mut self, events: &mut mpsc::Receiver<EngineEvent>) {
        while self.state == SessionState::Running {
            match events.recv().await {
                Some(event) => self.handle_event(event),
                None => {
                    if self.state == SessionState::Running {
                        log::warn!("Event stream closed while running");
                        self.last_error = Some("event stream closed unexpectedly".to_string());
                        self.state = SessionState::Failed;
                        self.commands = None;
                    }
                    break;
                }
            }
        }
    }

    /// Stop a live run
    ///
    /// Safe at any point after start, including before the first event: a
    /// best-effort `stop` command is sent and the local state leaves
    /// `Running` without waiting for an acknowledgment. On a session that
    /// is not running this is a no-op. Candidates applied so far are
    /// retained.
    pub fn stop(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(commands) = self.commands.take() {
            if commands.try_send(LiveCommand::Stop).is_err() {
                log::debug!("Stop command could not be delivered; closing anyway");
            }
        }
        log::info!("Live correlation stopped by operator");
        self.state = SessionState::Stopped;
    }
}

impl Default for CorrelationSession {
    fn default() -> Self {
        Self::new()
    }
}
