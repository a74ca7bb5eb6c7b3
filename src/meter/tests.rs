use super::*;
use crate::error::MeterError;
use crate::exit_codes;
use crate::modbus::TransportError;
use crate::modbus::mock::{Call, MockTransport};
use std::time::Duration;

const PI_WORDS: [u16; 2] = [0x4049, 0x0FDB];

fn client(transport: MockTransport, max_attempts: u32, delay: Duration) -> RegisterClient<MockTransport> {
    let policy = RetryPolicy {
        max_attempts,
        inter_attempt_delay: delay,
        ..RetryPolicy::default()
    };
    RegisterClient::new(transport, 1, policy)
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn test_decode_float_pi() {
    let value = decode_float(&PI_WORDS).unwrap();
    assert_eq!(value.to_bits(), 0x4049_0FDB);
    assert!((value - std::f32::consts::PI).abs() < 1e-6);
}

#[test]
fn test_decode_float_needs_two_words() {
    assert_eq!(decode_float(&[0x4049]), None);
    assert_eq!(decode_float(&[0x4049, 0x0FDB, 0x0000]), None);
}

#[test]
fn test_bcd_to_num_spans_registers() {
    assert_eq!(bcd_to_num(&[0x1234]), Some(1234));
    assert_eq!(bcd_to_num(&[0x0012, 0x3456]), Some(123456));
    assert_eq!(bcd_to_num(&[]), Some(0));
}

#[test]
fn test_bcd_to_num_rejects_overflow() {
    assert_eq!(
        bcd_to_num(&[0x1844, 0x6744, 0x0737, 0x0955, 0x1615]),
        Some(18_446_744_073_709_551_615)
    );
    assert_eq!(bcd_to_num(&[0x1844, 0x6744, 0x0737, 0x0955, 0x1616]), None);
    assert_eq!(bcd_to_num(&[0x9999; 6]), None);
}

// ============================================================================
// Register map
// ============================================================================

#[test]
fn test_measurement_catalogue() {
    assert_eq!(Measurement::ALL.len(), 14);
    assert_eq!(Measurement::ALL[0], Measurement::Voltage);
    assert_eq!(Measurement::Frequency.address(), 0x0030);
    assert_eq!(Measurement::TotalReactiveEnergy.address(), 0x050C);

    let mut addresses: Vec<u16> = Measurement::ALL.iter().map(|m| m.address()).collect();
    addresses.sort_unstable();
    addresses.dedup();
    assert_eq!(addresses.len(), 14);
}

#[test]
fn test_energies_scale_to_watt_hours() {
    assert!(Measurement::ImportActiveEnergy.is_energy());
    assert_eq!(Measurement::ImportActiveEnergy.scale(), 1000.0);
    assert_eq!(Measurement::ImportActiveEnergy.unit(), "Wh");
    assert!(!Measurement::Voltage.is_energy());
    assert_eq!(Measurement::Voltage.scale(), 1.0);
}

#[test]
fn test_iec_units() {
    assert_eq!(Measurement::PowerFactor.iec_unit(), "F");
    assert_eq!(Measurement::PhaseAngle.iec_unit(), "Dg");
    assert_eq!(Measurement::ReactivePower.iec_unit(), "VAR");
}

#[test]
fn test_config_register_flags() {
    assert_eq!(ConfigRegister::Kppa.address(), 0x5000);
    assert!(ConfigRegister::Password.requires_authorization());
    assert!(ConfigRegister::ResetHistory.requires_authorization());
    assert!(!ConfigRegister::BaudRate.requires_authorization());
    assert!(ConfigRegister::ParityStop.requires_restart());
    assert!(!ConfigRegister::DeviceId.requires_restart());
    assert_eq!(ConfigRegister::DeviceId.to_string(), "meter address (0x5005)");
}

#[test]
fn test_reset_kind_codes() {
    for kind in [ResetKind::MaxDemand, ResetKind::Monthly, ResetKind::Daily] {
        assert_eq!(ResetKind::from_code(kind.code()), Some(kind));
    }
    assert_eq!(ResetKind::from_code(1), None);
}

// ============================================================================
// Client setup
// ============================================================================

#[test]
fn test_new_configures_transport() {
    let policy = RetryPolicy {
        response_timeout: Duration::from_millis(500),
        byte_timeout: Some(Duration::from_millis(20)),
        ..RetryPolicy::default()
    };
    let client = RegisterClient::new(MockTransport::new(), 7, policy);

    assert_eq!(
        client.transport().calls(),
        vec![
            Call::SetSlave(7),
            Call::SetResponseTimeout(Duration::from_millis(500)),
            Call::SetByteTimeout(Some(Duration::from_millis(20))),
        ]
    );
    assert!(!client.is_authorized());
}

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 1);
    assert_eq!(policy.inter_attempt_delay, Duration::ZERO);
    assert_eq!(policy.response_timeout, Duration::from_millis(200));
    assert_eq!(policy.byte_timeout, None);
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_read_measurement_decodes_float() {
    let mut client = client(MockTransport::new().reply(&PI_WORDS), 1, Duration::ZERO);
    let value = client.read_measurement(Measurement::Voltage.address(), 2).unwrap();
    assert!((value - std::f32::consts::PI).abs() < 1e-6);
    assert_eq!(
        client.transport().exchanges()[0].0,
        Call::ReadInput { address: 0x0000, count: 2 }
    );
}

#[test]
fn test_read_config_uses_holding_bank() {
    let mut client = client(MockTransport::new().reply(&[0x0005]), 1, Duration::ZERO);
    assert_eq!(client.read_config(ConfigRegister::ScrollTime.address()).unwrap(), 5);
    assert_eq!(
        client.transport().exchanges()[0].0,
        Call::ReadHolding { address: 0x5018, count: 1 }
    );
}

#[test]
fn test_read_raw_and_bcd() {
    let mut client = client(
        MockTransport::new().reply(&[0x0001, 0x0002]).reply(&[0x0012, 0x3456]),
        1,
        Duration::ZERO,
    );
    let raw = RegisterRequest {
        encoding: Encoding::Raw16,
        ..RegisterRequest::measurement(0x0000)
    };
    assert_eq!(client.read(&raw).unwrap(), RegisterValue::Raw(vec![1, 2]));

    let bcd = RegisterRequest {
        encoding: Encoding::Bcd,
        ..RegisterRequest::measurement(0x0000)
    };
    assert_eq!(client.read(&bcd).unwrap(), RegisterValue::Bcd(123456));
}

#[test]
fn test_read_oversized_bcd_fails() {
    let mut client = client(MockTransport::new().reply(&[0x9999; 6]), 1, Duration::ZERO);
    let request = RegisterRequest {
        count: 6,
        encoding: Encoding::Bcd,
        ..RegisterRequest::measurement(0x0000)
    };

    let err = client.read(&request).unwrap_err();
    assert!(matches!(
        err,
        MeterError::Transport { source: TransportError::Frame(_), .. }
    ));
}

#[test]
fn test_read_retries_until_success() {
    let transport = MockTransport::new()
        .fail(TransportError::Timeout)
        .fail(TransportError::Timeout)
        .reply(&PI_WORDS);
    let mut client = client(transport, 3, Duration::ZERO);

    assert!(client.read_measurement(0x0000, 2).is_ok());
    assert_eq!(client.transport().exchanges().len(), 3);
}

#[test]
fn test_read_gives_up_after_max_attempts() {
    let delay = Duration::from_millis(20);
    let mut client = client(MockTransport::failing(), 3, delay);

    let err = client.read_measurement(0x0000, 2).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::TRANSPORT_FAILURE);
    match err {
        MeterError::Transport { attempts, source, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(source, TransportError::Timeout));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let exchanges = client.transport().exchanges();
    assert_eq!(exchanges.len(), 3);
    for pair in exchanges.windows(2) {
        assert!(pair[1].1.duration_since(pair[0].1) >= delay);
    }
}

#[test]
fn test_short_answer_counts_as_failed_attempt() {
    let transport = MockTransport::new().reply(&[0x4049]).reply(&PI_WORDS);
    let mut client = client(transport, 2, Duration::ZERO);

    assert!(client.read_measurement(0x0000, 2).is_ok());
    assert_eq!(client.transport().exchanges().len(), 2);
}

// ============================================================================
// Writes and authorization
// ============================================================================

#[test]
fn test_write_config_single_shot() {
    let mut client = client(MockTransport::failing(), 5, Duration::ZERO);

    let err = client.write_register(ConfigRegister::DeviceId, 2).unwrap_err();
    assert!(matches!(err, MeterError::Transport { attempts: 1, .. }));
    assert_eq!(client.transport().exchanges().len(), 1);
}

#[test]
fn test_write_reports_restart() {
    let mut client = client(MockTransport::new().ack().ack(), 1, Duration::ZERO);

    let outcome = client.write_register(ConfigRegister::ParityStop, 1).unwrap();
    assert!(outcome.restart_required);
    assert_eq!(outcome.address, 0x5007);

    let outcome = client.write_register(ConfigRegister::BaudRate, 2).unwrap();
    assert!(!outcome.restart_required);
    assert_eq!(
        client.transport().exchanges()[1].0,
        Call::Write { address: 0x5006, values: vec![2] }
    );
}

#[test]
fn test_protected_write_without_authorization_never_touches_bus() {
    let mut client = client(MockTransport::new().ack(), 1, Duration::ZERO);

    let err = client.write_register(ConfigRegister::Password, 1234).unwrap_err();
    assert!(matches!(err, MeterError::AuthorizationRequired(_)));
    assert_eq!(err.exit_code(), exit_codes::AUTHORIZATION_FAILURE);
    assert!(client.transport().exchanges().is_empty());
}

#[test]
fn test_authorize_then_protected_write() {
    let mut client = client(MockTransport::new().ack().ack(), 1, Duration::ZERO);

    client.authorize(0).unwrap();
    assert!(client.is_authorized());
    client.write_register(ConfigRegister::Password, 1234).unwrap();

    let calls: Vec<Call> = client.transport().exchanges().into_iter().map(|(c, _)| c).collect();
    assert_eq!(
        calls,
        vec![
            Call::Write { address: 0x5000, values: vec![0] },
            Call::Write { address: 0x5008, values: vec![1234] },
        ]
    );
}

#[test]
fn test_authorize_rejected() {
    let transport = MockTransport::new().fail(TransportError::Exception { code: 0x03 });
    let mut client = client(transport, 1, Duration::ZERO);

    let err = client.authorize(9999).unwrap_err();
    assert!(matches!(err, MeterError::AuthorizationRejected(_)));
    assert_eq!(err.exit_code(), exit_codes::AUTHORIZATION_FAILURE);
    assert!(!client.is_authorized());
}

#[test]
fn test_authorize_timeout_is_transport_failure() {
    let mut client = client(MockTransport::failing(), 1, Duration::ZERO);

    let err = client.authorize(0).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::TRANSPORT_FAILURE);
    assert!(!client.is_authorized());
}

#[test]
fn test_close_closes_transport() {
    let mut client = client(MockTransport::new().reply(&PI_WORDS), 1, Duration::ZERO);
    client.close();
    assert!(client.transport().is_closed());
    assert!(client.read_measurement(0x0000, 2).is_err());
}
