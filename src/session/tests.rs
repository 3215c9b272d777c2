use super::*;
use crate::autobalance::PhaseState;
use crate::measurement::{FrequencyMode, MaterialType};
use crate::protocol::{encode, RawMeasurement, SerialCommand};

fn session_with(config: &AppConfig) -> (DeviceSession<MockTransport>, MockTransport) {
    let mock = MockTransport::new();
    (DeviceSession::new(mock.clone(), config), mock)
}

fn configured_session() -> (DeviceSession<MockTransport>, MockTransport) {
    let (mut session, mock) = session_with(&AppConfig::default());
    session.initialize().unwrap();
    session.set_frequency_index(1).unwrap();
    mock.clear_sent();
    (session, mock)
}

fn measurement_frame(magnitude: f64, frequency: f64, temperature: f64) -> Vec<u8> {
    let raw = RawMeasurement {
        frequency,
        magnitude,
        phase: 0.1,
        temperature,
    };
    encode(SerialCommand::StartMeasurement, &raw.encode()).unwrap()
}

#[test]
fn test_full_lifecycle_sends_expected_commands() {
    let (mut session, mock) = session_with(&AppConfig::default());
    assert_eq!(session.state(), SessionState::Idle);

    session.initialize().unwrap();
    assert_eq!(session.state(), SessionState::Initialized);

    assert_eq!(session.set_frequency_index(2).unwrap(), 34_000);
    assert_eq!(session.state(), SessionState::Configured);

    session.set_gain(2.5).unwrap();
    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Measuring);

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    // GET_VERSION, SET_FREQUENCY, SET_GAIN, START, STOP on the serial table
    assert_eq!(mock.sent_commands(), vec![0x08, 0x03, 0x04, 0x01, 0x02]);

    let frequency_frame = &mock.sent_frames()[1];
    assert_eq!(&frequency_frame[4..8], &34_000u32.to_le_bytes());
}

#[test]
fn test_ble_session_uses_ble_table() {
    let mut config = AppConfig::default();
    config.protocol.variant = ProtocolVariant::Ble;
    let (mut session, mock) = session_with(&config);

    session.initialize().unwrap();
    session.set_frequency_index(0).unwrap();

    let frames = mock.sent_frames();
    assert_eq!(frames[1][1], 0x04);
    assert_eq!(&frames[1][4..8], &19_000u32.to_be_bytes());

    // no SET_GAIN over BLE
    assert!(matches!(
        session.set_gain(1.0),
        Err(SessionError::Protocol(ProtocolError::UnsupportedCommand { .. }))
    ));
}

#[test]
fn test_operations_out_of_order_are_rejected() {
    let (mut session, mock) = session_with(&AppConfig::default());

    assert!(matches!(
        session.start(),
        Err(SessionError::InvalidState { state: "Idle", .. })
    ));
    assert!(matches!(
        session.set_frequency_index(0),
        Err(SessionError::InvalidState { .. })
    ));

    session.initialize().unwrap();
    assert!(matches!(
        session.start(),
        Err(SessionError::InvalidState {
            state: "Initialized",
            ..
        })
    ));
    assert_eq!(mock.sent_commands(), vec![0x08]);
}

#[test]
fn test_frequency_validation() {
    let (mut session, mock) = configured_session();

    assert!(matches!(
        session.set_frequency_index(7),
        Err(SessionError::InvalidFrequency { .. })
    ));
    assert!(matches!(
        session.set_frequency_hz(500),
        Err(SessionError::InvalidFrequency { .. })
    ));

    session.set_frequency_hz(90_400).unwrap();
    assert_eq!(session.frequency_hz(), Some(90_400));
    assert_eq!(mock.sent_commands(), vec![0x03]);
}

#[test]
fn test_legacy_frequency_mode() {
    let mut config = AppConfig::default();
    config.protocol.frequency_mode = FrequencyMode::Legacy;
    let (mut session, _mock) = session_with(&config);
    session.initialize().unwrap();

    session.set_frequency_hz(1000).unwrap();
    assert_eq!(session.state(), SessionState::Configured);

    assert!(session.set_frequency_hz(0).is_err());
    assert!(session.set_frequency_hz(1001).is_err());
    match session.set_frequency_index(0) {
        Err(SessionError::InvalidFrequency { allowed, .. }) => {
            assert_eq!(allowed, "1..=1000 Hz")
        }
        other => panic!("expected InvalidFrequency, got {:?}", other),
    }
}

#[test]
fn test_measurement_frames_become_readings() {
    let (mut session, _mock) = configured_session();
    session.start().unwrap();

    let events = session.on_bytes(&measurement_frame(240.0, 20.0, 25.0));
    match events.as_slice() {
        [SessionEvent::Reading(reading)] => {
            assert_eq!(reading.material, MaterialType::IronMetal);
            assert!(reading.depth > 0.0);
        }
        other => panic!("expected one reading, got {:?}", other),
    }
}

#[test]
fn test_invalid_measurements_are_rejected_not_read() {
    let (mut session, _mock) = configured_session();
    session.start().unwrap();

    let mut stream = measurement_frame(300.0, 22_600.0, 90.0);
    stream.extend(measurement_frame(1500.0, 22_600.0, 25.0));
    stream.extend(measurement_frame(300.0, 0.0, 25.0));

    let events = session.on_bytes(&stream);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| matches!(
        event,
        SessionEvent::Rejected(MeasurementError::InvalidMeasurement { .. })
    )));
}

#[test]
fn test_corrupt_frame_is_dropped_and_stream_continues() {
    let (mut session, _mock) = configured_session();
    session.start().unwrap();

    let mut corrupt = measurement_frame(200.0, 19_000.0, 20.0);
    corrupt[10] ^= 0x40;
    let good = measurement_frame(200.0, 19_000.0, 20.0);

    let mut stream = corrupt;
    stream.extend_from_slice(&good);

    // split delivery across the frame boundary
    let mut events = session.on_bytes(&stream[..20]);
    events.extend(session.on_bytes(&stream[20..]));

    assert_eq!(session.dropped_frames(), 1);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SessionEvent::Reading(_)));
    assert_eq!(session.state(), SessionState::Measuring);
}

#[test]
fn test_corrupt_length_or_header_keeps_following_frames() {
    let (mut session, _mock) = configured_session();
    session.start().unwrap();

    let mut bad_length = measurement_frame(200.0, 19_000.0, 20.0);
    bad_length[3] = 0xFF;
    let mut bad_header = measurement_frame(200.0, 19_000.0, 20.0);
    bad_header[0] = 0x55;

    let mut stream = bad_length;
    for _ in 0..3 {
        stream.extend(measurement_frame(150.0, 19_000.0, 20.0));
    }
    stream.extend(bad_header);
    stream.extend(measurement_frame(150.0, 19_000.0, 20.0));

    let events = session.on_bytes(&stream);
    let readings = events
        .iter()
        .filter(|event| matches!(event, SessionEvent::Reading(_)))
        .count();
    assert_eq!(readings, 4);
    assert_eq!(session.state(), SessionState::Measuring);
}

#[test]
fn test_stray_marker_in_noise_does_not_stall_stream() {
    let (mut session, _mock) = configured_session();
    session.start().unwrap();

    let mut stream = vec![0xAA, 0x01, 0xFF, 0xFF];
    for _ in 0..10 {
        stream.extend(measurement_frame(150.0, 19_000.0, 20.0));
    }

    let events = session.on_bytes(&stream);
    assert_eq!(events.len(), 10);
    assert!(events
        .iter()
        .all(|event| matches!(event, SessionEvent::Reading(_))));
}

#[test]
fn test_version_response_is_recorded() {
    let (mut session, _mock) = session_with(&AppConfig::default());
    session.initialize().unwrap();

    let frame = encode(SerialCommand::GetVersion, b"EMF-3.1").unwrap();
    let events = session.on_bytes(&frame);

    assert_eq!(session.firmware_version(), Some("EMF-3.1"));
    assert_eq!(
        events,
        vec![SessionEvent::Response(DeviceResponse::Version {
            version: "EMF-3.1".to_string()
        })]
    );
}

#[test]
fn test_apply_autobalance_only_when_saved() {
    let (mut session, mock) = configured_session();

    let unsaved = AutobalanceState {
        horizontal_phase: PhaseState::Finished,
        ..Default::default()
    };
    assert!(!session.apply_autobalance(&unsaved).unwrap());
    assert!(mock.sent_frames().is_empty());

    let saved = AutobalanceState {
        horizontal_phase: PhaseState::Saved,
        ..Default::default()
    };
    assert!(session.apply_autobalance(&saved).unwrap());
    assert_eq!(mock.sent_frames(), vec![vec![0xAA, 0x07, 0x01, 0x00, 0x01, 0xB3]]);
}

#[test]
fn test_transport_failure_keeps_state() {
    let (mut session, mock) = configured_session();
    mock.set_failure(Some("link down"));

    assert_eq!(
        session.start(),
        Err(SessionError::Transport {
            reason: "link down".to_string()
        })
    );
    assert_eq!(session.state(), SessionState::Configured);
}

#[test]
fn test_stop_is_safe_from_any_state() {
    let (mut session, mock) = session_with(&AppConfig::default());
    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(mock.sent_frames().is_empty());

    // a stopped session can be initialized again
    session.initialize().unwrap();
    assert_eq!(session.state(), SessionState::Initialized);
}
