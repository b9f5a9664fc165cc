//! End-to-end discovery workflow tests
//!
//! Drives the whole chain the way the console does: merge observed byte
//! ranges, run a correlation session against a stubbed engine, accept the
//! winning candidate and decode frames with the derived signal.

use can_diag_core::{
    codec, merge_byte_ranges, ByteRange, CanIdAnalysis, Candidate, CorrelationEngine,
    CorrelationRequest, CorrelationResponse, CorrelationSession, DiagError, EngineEvent,
    LiveConfig, ModelType, ObdSample, SessionState, SignalStore,
};
use tokio::sync::mpsc;

struct StubEngine;

impl CorrelationEngine for StubEngine {
    fn correlate(&self, request: &CorrelationRequest) -> can_diag_core::Result<CorrelationResponse> {
        assert_eq!(request.pid, "0C");
        Ok(CorrelationResponse {
            candidates: vec![rpm_candidate(0.93), weak_candidate()],
            total_ids_analyzed: 41,
            total_frames_processed: 182_000,
            elapsed_ms: 240.0,
        })
    }
}

fn rpm_candidate(confidence: f64) -> Candidate {
    Candidate {
        can_id: "1A0".to_string(),
        model: "two_byte_be_linear".to_string(),
        model_type: ModelType::TwoByteBe,
        byte_index: 2,
        byte_end: 3,
        pearson: 0.97,
        spearman: 0.95,
        confidence,
        scale: 0.25,
        offset: 0.0,
        n_samples: 3,
        timestamps: vec![0.0, 1.0, 2.0],
        obd_values: vec![800.0, 1500.0, 3000.0],
        can_transformed: vec![810.0, 1490.0, 3010.0],
    }
}

fn weak_candidate() -> Candidate {
    Candidate {
        can_id: "2B4".to_string(),
        model: "single_byte_linear".to_string(),
        model_type: ModelType::SingleByte,
        byte_index: 0,
        byte_end: 0,
        pearson: 0.41,
        spearman: 0.39,
        confidence: 0.3,
        scale: 12.0,
        offset: 0.0,
        n_samples: 3,
        timestamps: vec![0.0, 1.0, 2.0],
        obd_values: vec![800.0, 1500.0, 3000.0],
        can_transformed: vec![900.0, 1100.0, 2400.0],
    }
}

fn samples() -> Vec<ObdSample> {
    vec![
        ObdSample { timestamp: 0.0, value: 10.0 },
        ObdSample { timestamp: 1.0, value: 20.0 },
        ObdSample { timestamp: 2.0, value: 30.0 },
    ]
}

#[test]
fn offline_discovery_accept_flow() {
    let mut session = CorrelationSession::new();
    let stats = session
        .start_offline(&StubEngine, "0C", &samples(), 50, None)
        .unwrap();

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(stats.total_ids_analyzed, 41);

    // Ranked snapshot puts the strong candidate first
    let ranked = session.candidates();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].can_id, "1A0");
    assert_eq!(ranked[0].tier().to_string(), "high");

    // Operator accepts: derived signal decodes the tested span
    let winner = session.best_candidate().unwrap();
    let signal = winner.to_signal("EngineRpm");
    assert_eq!(signal.start_bit, 23);
    assert_eq!(signal.length, 16);
    assert_eq!(signal.min_val, 800.0);
    assert_eq!(signal.max_val, 3000.0);

    let mut store = SignalStore::new();
    let id = store.add(signal).unwrap();
    let stored = store.get(id).unwrap();

    // 0x0BB8 = 3000 raw, scaled by 0.25 -> 750 rpm
    let frame = [0x00, 0x00, 0x0B, 0xB8, 0x00, 0x00, 0x00, 0x00];
    let rpm = codec::decode(stored, &frame).unwrap();
    assert!((rpm - 750.0).abs() < 1e-9);
}

#[test]
fn offline_requires_three_samples() {
    let mut session = CorrelationSession::new();
    let short = &samples()[..2];
    let err = session
        .start_offline(&StubEngine, "0C", short, 50, None)
        .unwrap_err();
    assert!(matches!(err, DiagError::InsufficientSamples { got: 2 }));
    assert!(session.state().is_idle());
}

#[tokio::test]
async fn live_discovery_stream_flow() {
    let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = mpsc::channel(8);

    let mut session = CorrelationSession::new();
    let config = LiveConfig::new("0C")
        .with_interface("vcan0")
        .with_sample_interval_ms(100);
    session.start_live(&config, cmd_tx).unwrap();

    // Transport would serialize and forward this to the engine
    let start = cmd_rx.recv().await.unwrap();
    let wire = serde_json::to_value(&start).unwrap();
    assert_eq!(wire["action"], "start");
    assert_eq!(wire["intervalMs"], 100);

    // Engine streams samples and two candidate batches; the second
    // supersedes the first entry and is flagged final
    event_tx
        .send(EngineEvent::ObdSample { value: 812.0, sample_count: 1 })
        .await
        .unwrap();
    event_tx
        .send(EngineEvent::CorrelationUpdate {
            candidates: vec![rpm_candidate(0.55)],
            can_ids_count: 18,
            is_final: false,
        })
        .await
        .unwrap();
    event_tx
        .send(EngineEvent::CorrelationUpdate {
            candidates: vec![rpm_candidate(0.91), weak_candidate()],
            can_ids_count: 37,
            is_final: true,
        })
        .await
        .unwrap();

    session.run_live(&mut event_rx).await;

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.sample_count(), 1);
    assert_eq!(session.can_ids_count(), 37);

    let ranked = session.candidates();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].confidence, 0.91);
}

#[tokio::test]
async fn live_discovery_engine_error() {
    let (cmd_tx, _cmd_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = mpsc::channel(8);

    let mut session = CorrelationSession::new();
    session.start_live(&LiveConfig::new("0D"), cmd_tx).unwrap();

    event_tx
        .send(EngineEvent::Error { message: "bus unavailable".to_string() })
        .await
        .unwrap();
    session.run_live(&mut event_rx).await;

    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.last_error(), Some("bus unavailable"));

    // A failed session is idle again: stop is a no-op, restart works
    session.stop();
    assert_eq!(session.state(), SessionState::Failed);
    let (cmd_tx2, _cmd_rx2) = mpsc::channel(8);
    session.start_live(&LiveConfig::new("0D"), cmd_tx2).unwrap();
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn merged_ranges_constrain_fuzz_payloads() {
    use can_diag_core::fuzz::PayloadGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let analyses = vec![
        CanIdAnalysis {
            can_id: "1A0".to_string(),
            count: 500,
            sample_count: 500,
            samples: Vec::new(),
            byte_ranges: vec![
                ByteRange { index: 0, min: 0x10, max: 0x1F, unique: 16 },
                ByteRange { index: 2, min: 0x00, max: 0x40, unique: 60 },
            ],
        },
        CanIdAnalysis {
            can_id: "2B4".to_string(),
            count: 200,
            sample_count: 200,
            samples: Vec::new(),
            byte_ranges: vec![ByteRange { index: 0, min: 0x08, max: 0x18, unique: 10 }],
        },
    ];

    let merged = merge_byte_ranges(&analyses, &["1A0".to_string(), "2B4".to_string()]);
    assert_eq!(merged[0], ByteRange { index: 0, min: 0x08, max: 0x1F, unique: 16 });

    let generator = PayloadGenerator::new(merged);
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..100 {
        let payload = generator.generate(&mut rng);
        assert_eq!(payload.len(), 3);
        assert!(payload[0] >= 0x08 && payload[0] <= 0x1F);
        assert_eq!(payload[1], 0);
        assert!(payload[2] <= 0x40);
    }
}
