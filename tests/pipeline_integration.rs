//! End-to-end pipeline tests
//!
//! Exercise the full publish → channel → open path with the in-memory
//! channel: policy regimes, masking, round trips, tamper detection, key
//! mismatch, selection-only mode, subscribers, and concurrency.

use a3s_fsae::wire::{decode_record, encode_record, record_from_value};
use a3s_fsae::{
    Algorithm, CipherBox, Context, EncryptionHeader, EngineerSubscriber, EnvelopeCodec,
    EventState, FieldFailureReason, FieldKey, FsaeConfig, LatencyWindow, MemoryChannel,
    OpenStatus, PerfLog, Record, RiskLevel, Role, SensitivityEntry, TelemetryChannel,
    TelemetryPublisher, ViewerSubscriber, HEADER_FIELD,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

fn test_codec() -> EnvelopeCodec {
    EnvelopeCodec::new(&FieldKey::new("kid-2025Q4-demo", [0x5A; 32]))
}

fn telemetry() -> Record {
    record_from_value(serde_json::json!({
        "timestamp": 1_760_000_000.125,
        "device_id": "machine-01",
        "operator_id": "op-1138",
        "temperature": 25.31,
        "pressure": 1.012,
        "speed": 1013,
        "fault_code": 0,
        "geo_lat": 31.2304,
        "geo_lon": 121.4737,
        "firmware": "v2.4.1"
    }))
    .unwrap()
}

fn all_contexts() -> Vec<Context> {
    let mut out = Vec::new();
    for risk in [RiskLevel::Lan, RiskLevel::WiFi, RiskLevel::Public, RiskLevel::Unknown] {
        for role in [Role::Viewer, Role::Engineer, Role::Admin] {
            for state in [EventState::Normal, EventState::Alert] {
                out.push(Context::new(risk, role, state));
            }
        }
    }
    out
}

fn header(record: &Record) -> EncryptionHeader {
    EncryptionHeader::from_record(record).unwrap().unwrap()
}

fn masked(mut record: Record) -> Record {
    record.insert("device_id".into(), "machin****".into());
    record
}

// ─── Round Trip ──────────────────────────────────────────────────

#[test]
fn test_roundtrip_every_context() {
    let codec = test_codec();

    for ctx in all_contexts() {
        let sealed = codec.seal(&telemetry(), &ctx, true).unwrap();
        let wire = encode_record(&sealed).unwrap();
        let opened = codec.open(decode_record(&wire).unwrap());

        assert!(opened.report.is_complete(), "ctx {:?}: {:?}", ctx, opened.report);

        let expected = masked(telemetry());
        for (field, value) in &expected {
            assert_eq!(&opened.record[field], value, "ctx {:?} field {}", ctx, field);
        }
        assert_eq!(opened.record.len(), expected.len() + 1);
    }
}

#[test]
fn test_unselected_fields_identical_to_masked_input() {
    let codec = test_codec();
    let ctx = Context::new(RiskLevel::Lan, Role::Engineer, EventState::Normal);
    let sealed = codec.seal(&telemetry(), &ctx, true).unwrap();
    let hdr = header(&sealed);

    let input = masked(telemetry());
    for (field, value) in &input {
        if hdr.enc_fields.contains(field) {
            assert!(CipherBox::is_cipher_box(&sealed[field]));
        } else {
            assert_eq!(&sealed[field], value);
        }
    }
}

#[test]
fn test_enc_fields_sorted_and_unique_everywhere() {
    let codec = test_codec();
    for ctx in all_contexts() {
        for apply_cipher in [true, false] {
            let sealed = codec.seal(&telemetry(), &ctx, apply_cipher).unwrap();
            let fields = header(&sealed).enc_fields;
            let mut normalized = fields.clone();
            normalized.sort();
            normalized.dedup();
            assert_eq!(fields, normalized);
        }
    }
}

// ─── Policy ──────────────────────────────────────────────────────

#[test]
fn test_regimes_on_reference_table() {
    let codec = test_codec();
    let seal = |ctx: Context| header(&codec.seal(&telemetry(), &ctx, false).unwrap()).enc_fields;

    let high = vec![
        "fault_code", "geo_lat", "geo_lon", "operator_id", "pressure", "speed", "temperature",
    ];
    let high_and_medium = vec![
        "device_id", "fault_code", "geo_lat", "geo_lon", "operator_id", "pressure", "speed",
        "temperature", "timestamp",
    ];

    assert_eq!(seal(Context::default()), high);
    assert_eq!(seal(Context::default().with_risk(RiskLevel::WiFi).with_role(Role::Viewer)), high);
    assert_eq!(seal(Context::default().with_risk(RiskLevel::WiFi)), high_and_medium);
    assert_eq!(
        seal(Context::default().with_event_state(EventState::Alert).with_role(Role::Viewer)),
        high_and_medium
    );
}

#[test]
fn test_device_id_masking_survives_transport() {
    let codec = test_codec();
    let mut data = telemetry();
    data.insert("device_id".into(), "ab".into());

    let sealed = codec.seal(&data, &Context::default().with_risk(RiskLevel::Public), false).unwrap();
    assert_eq!(sealed["device_id"], "****");
}

// ─── Selection-Only Mode ─────────────────────────────────────────

#[test]
fn test_no_cipher_mode_has_no_boxes() {
    let codec = test_codec();
    let ctx = Context::default().with_event_state(EventState::Alert);
    let sealed = codec.seal(&telemetry(), &ctx, false).unwrap();

    assert_eq!(sealed[HEADER_FIELD]["algorithm"], "NONE");
    assert!(sealed.values().all(|v| !CipherBox::is_cipher_box(v)));

    let opened = codec.open(sealed);
    let mut expected = masked(telemetry());
    expected.insert(HEADER_FIELD.into(), opened.record[HEADER_FIELD].clone());
    assert_eq!(opened.record, expected);
    assert_eq!(opened.report.status, OpenStatus::Passthrough(Algorithm::NoEncryption));
}

// ─── Failure Handling ────────────────────────────────────────────

#[test]
fn test_bit_flips_isolate_to_one_field() {
    let codec = test_codec();
    let sealed = codec.seal(&telemetry(), &Context::default(), true).unwrap();
    let fields = header(&sealed).enc_fields;

    for target in &fields {
        for part in ["nonce", "ciphertext"] {
            let mut tampered = sealed.clone();
            let encoded = tampered[target.as_str()][part].as_str().unwrap().to_string();
            let mut bytes = BASE64.decode(encoded).unwrap();
            let last = bytes.len() - 1;
            bytes[last] ^= 0x04;
            tampered[target.as_str()][part] = BASE64.encode(&bytes).into();

            let opened = codec.open(tampered.clone());
            assert_eq!(opened.report.failures.len(), 1, "{} {}", target, part);
            assert_eq!(opened.report.failures[0].field, *target);
            assert_eq!(
                opened.report.failures[0].reason,
                FieldFailureReason::AuthenticationFailed
            );
            assert_eq!(opened.record[target.as_str()], tampered[target.as_str()]);
            assert_eq!(opened.report.decrypted.len(), fields.len() - 1);
        }
    }
}

#[test]
fn test_unknown_key_id_returns_record_untouched() {
    let sealed = test_codec()
        .seal(&telemetry(), &Context::default().with_risk(RiskLevel::WiFi), true)
        .unwrap();

    let stranger = EnvelopeCodec::new(&FieldKey::new("kid-rotated", [0x5A; 32]));
    let opened = stranger.open(sealed.clone());

    assert_eq!(opened.record, sealed);
    assert_eq!(opened.report.status, OpenStatus::KeyMismatch("kid-2025Q4-demo".into()));
}

#[test]
fn test_malformed_payloads_rejected_at_boundary() {
    assert!(decode_record(b"[]").is_err());
    assert!(decode_record(b"\"speed\"").is_err());
    assert!(decode_record(b"{\"speed\":").is_err());
}

// ─── Configuration ───────────────────────────────────────────────

#[test]
fn test_codec_from_config_with_custom_table() {
    let mut config = FsaeConfig::with_key("kid-cfg", &[0x33; 32]);
    config.policy_id = "SIT-plant-7".to_string();
    config
        .sensitivity
        .insert("vibration".to_string(), SensitivityEntry::new(3, 0, 0));
    config
        .sensitivity
        .insert("speed".to_string(), SensitivityEntry::new(0, 0, 1));

    let codec = EnvelopeCodec::from_config(&config).unwrap();
    assert_eq!(codec.policy_id(), "SIT-plant-7");
    assert_eq!(codec.key_id(), "kid-cfg");
    let data = record_from_value(serde_json::json!({"vibration": 0.4, "speed": 900})).unwrap();
    let sealed = codec.seal(&data, &Context::default(), true).unwrap();

    let hdr = header(&sealed);
    assert_eq!(hdr.policy_id, "SIT-plant-7");
    assert_eq!(hdr.key_id.as_deref(), Some("kid-cfg"));
    assert_eq!(hdr.enc_fields, vec!["vibration"]);
    assert_eq!(sealed["speed"], 900);
}

// ─── Channel + Subscribers ───────────────────────────────────────

#[tokio::test]
async fn test_publisher_to_engineer_and_viewer() {
    let codec = Arc::new(test_codec());
    let channel = Arc::new(MemoryChannel::default());
    let mut engineer_stream = channel.subscribe().await.unwrap();
    let mut viewer_stream = channel.subscribe().await.unwrap();

    let publisher = TelemetryPublisher::new(codec.clone(), channel.clone());
    let ctx = Context::default().with_risk(RiskLevel::WiFi);
    let report = tokio_test::assert_ok!(publisher.publish(&telemetry(), &ctx).await);
    assert_eq!(report.algorithm, Algorithm::Aes256Gcm);

    let mut engineer = EngineerSubscriber::new(codec.clone())
        .with_window(LatencyWindow::new(10.0, 1_760_000_000.0));
    let payload = engineer_stream.next().await.unwrap().unwrap();
    let opened = engineer.handle_at(&payload, 1_760_000_000.5).unwrap();
    assert!(opened.report.is_complete());
    assert_eq!(opened.record["operator_id"], "op-1138");
    assert_eq!(opened.record["device_id"], "machin****");

    let viewer = ViewerSubscriber::default();
    let payload = viewer_stream.next().await.unwrap().unwrap();
    let view = viewer.handle(&payload).unwrap();
    assert_eq!(view.len(), 4);
    assert!(CipherBox::is_cipher_box(&view["speed"]));
    assert!(CipherBox::is_cipher_box(&view["timestamp"]));
    assert!(!view.contains_key("operator_id"));
}

#[tokio::test]
async fn test_engineer_run_writes_perf_log() {
    let codec = Arc::new(test_codec());
    let channel = Arc::new(MemoryChannel::default());
    let stream = channel.subscribe().await.unwrap();

    let log_path = std::env::temp_dir()
        .join(format!("a3s-fsae-test-{}", uuid::Uuid::new_v4()))
        .join("perf_log.csv");
    let log = PerfLog::open(&log_path).unwrap();

    let publisher = TelemetryPublisher::new(codec.clone(), channel.clone());
    let mut data = telemetry();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    data.insert("timestamp".into(), now.into());
    for _ in 0..3 {
        publisher.publish(&data, &Context::default()).await.unwrap();
    }
    drop(publisher);

    // Window too long for the background ticker to close
    let mut engineer = EngineerSubscriber::new(codec)
        .with_window(LatencyWindow::new(3600.0, now))
        .with_perf_log(log.clone());
    let handle = tokio::spawn(async move {
        engineer.run(stream).await.unwrap();
        engineer
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    drop(channel);
    let mut engineer = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(engineer.last_mode(), a3s_fsae::CryptoMode::On);

    let stats = engineer.tick_at(now + 3600.0).unwrap().unwrap();
    assert_eq!(stats.messages, 3);
    assert_eq!(stats.samples, 3);

    let content = std::fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "time,mode,msgs_per_sec,p50_ms,p95_ms");
    assert!(lines[1].contains(",crypto_on,"));

    std::fs::remove_dir_all(log_path.parent().unwrap()).unwrap();
}

// ─── Concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_seal_open_50_tasks() {
    let codec = Arc::new(test_codec());
    let mut handles = Vec::new();

    for i in 0..50 {
        let codec = codec.clone();
        handles.push(tokio::spawn(async move {
            let mut data = telemetry();
            data.insert("speed".into(), i.into());
            let ctx = if i % 2 == 0 {
                Context::default().with_event_state(EventState::Alert)
            } else {
                Context::default().with_risk(RiskLevel::Public)
            };
            let sealed = codec.seal(&data, &ctx, true).unwrap();
            let nonce = sealed["speed"]["nonce"].as_str().unwrap().to_string();
            let opened = codec.open(sealed);
            assert_eq!(opened.record["speed"], i);
            nonce
        }));
    }

    let mut nonces = std::collections::HashSet::new();
    for handle in handles {
        assert!(nonces.insert(handle.await.unwrap()));
    }
    assert_eq!(nonces.len(), 50);
}
