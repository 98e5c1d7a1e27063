//! Tests for the binary snapshot log parser
//!
//! Tests cover:
//! - Header parsing and snapshot counting
//! - Structural errors (magic, version, trailing bytes)
//! - Snapshot access and value decoding
//! - Sequence validation
//! - Connection spec decoding (IPv4 and IPv6)

#[path = "../common/mod.rs"]
mod common;

use common::offsets::*;
use common::synthetic::*;
use common::{test_schema, TEST_RECORD_LEN};
use snaplog_etl::parsers::snaplog::FIXED_HEADER_LEN;
use snaplog_etl::parsers::{DecodeError, SnapshotLog, ValidationWarning, ValueMap};

// ============================================
// Header Tests
// ============================================

#[test]
fn test_snapshot_count_matches_length() {
    for count in [0u32, 1, 2, 7, 50] {
        let data = standard_snaplog(count);
        let header_len = FIXED_HEADER_LEN + 38;
        let log = SnapshotLog::parse(data.clone()).expect("Valid log should parse");
        assert_eq!(log.snapshot_count(), count as usize);
        assert_eq!(
            log.snapshot_count(),
            (data.len() - header_len) / TEST_RECORD_LEN
        );
    }
}

#[test]
fn test_header_fields() {
    let builder = SnaplogBuilder {
        log_time: 1_600_000_000,
        field_count: 42,
        ..SnaplogBuilder::default()
    };
    let log = SnapshotLog::parse(builder.build()).unwrap();
    assert_eq!(log.format_version(), 1);
    assert_eq!(log.log_time(), 1_600_000_000);
    assert_eq!(log.field_count(), 42);
    assert_eq!(log.record_length(), TEST_RECORD_LEN);
    assert_eq!(log.header().connection_spec, FIXED_HEADER_LEN..FIXED_HEADER_LEN + 38);
    assert_eq!(log.header().header_length(), FIXED_HEADER_LEN + 38);
    assert_eq!(log.connection_spec(), conn_spec_v4([10, 0, 0, 1], 3010, [10, 0, 0, 2], 44160).as_slice());
}

#[test]
fn test_trailing_bytes_are_format_error() {
    let mut data = standard_snaplog(3);
    data.extend_from_slice(&[0u8; 5]);
    assert!(
        matches!(SnapshotLog::parse(data), Err(DecodeError::Format(_))),
        "Partial trailing record should be rejected"
    );
}

#[test]
fn test_bad_magic_and_version() {
    let mut data = standard_snaplog(1);
    data[0..4].copy_from_slice(b"MLVL");
    assert!(matches!(SnapshotLog::parse(data), Err(DecodeError::Format(_))));

    let builder = SnaplogBuilder {
        version: 2,
        ..SnaplogBuilder::default()
    };
    assert!(matches!(
        SnapshotLog::parse(builder.build()),
        Err(DecodeError::Format(_))
    ));
}

#[test]
fn test_truncated_header() {
    let data = standard_snaplog(1);
    for len in [0, 3, FIXED_HEADER_LEN - 1, FIXED_HEADER_LEN + 10] {
        assert!(
            SnapshotLog::parse(data[..len].to_vec()).is_err(),
            "{} bytes should not parse",
            len
        );
    }
}

// ============================================
// Snapshot Tests
// ============================================

#[test]
fn test_signed_field_decoding() {
    let record = RecordBuilder::new(TEST_RECORD_LEN, 0)
        .bytes_at(START_TIME_STAMP, &[0x01, 0x02, 0x03, 0x04])
        .bytes_at(START_TIME_USEC, &[0xFF, 0xFF, 0xFF, 0xFF])
        .build();
    let log = SnapshotLog::parse(SnaplogBuilder::default().record(record).build()).unwrap();

    let mut values = ValueMap::new();
    log.snapshot(0)
        .unwrap()
        .values(&test_schema(), &mut values)
        .unwrap();
    assert_eq!(values.get_int64(&["StartTimeStamp"]), Some(67305985));
    assert_eq!(values.get_int64(&["StartTimeUsec"]), Some(-1));
}

#[test]
fn test_standard_record_values() {
    let log = SnapshotLog::parse(standard_snaplog(4)).unwrap();
    let mut values = ValueMap::new();
    log.snapshot(3)
        .unwrap()
        .values(&test_schema(), &mut values)
        .unwrap();

    assert_eq!(values.get_int64(&["SegsOut"]), Some(300));
    assert_eq!(values.get_int64(&["CurCwnd"]), Some(14480));
    assert_eq!(values.get_string(&["LocalAddress"]), Some("192.168.0.1"));
    assert_eq!(values.get_string(&["RemAddress"]), Some("10.20.30.40"));
}

#[test]
fn test_snapshot_out_of_range() {
    let log = SnapshotLog::parse(standard_snaplog(2)).unwrap();
    assert!(matches!(
        log.snapshot(2),
        Err(DecodeError::Index { index: 2, count: 2 })
    ));

    let empty = SnapshotLog::parse(standard_snaplog(0)).unwrap();
    assert!(empty.snapshot(0).is_err(), "Empty log has no final snapshot");
}

#[test]
fn test_snapshots_iterator() {
    let log = SnapshotLog::parse(standard_snaplog(5)).unwrap();
    let sequences: Vec<u32> = log.snapshots().map(|s| s.sequence()).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
}

// ============================================
// Validation Tests
// ============================================

#[test]
fn test_validation_passes_monotonic() {
    let log = SnapshotLog::parse(standard_snaplog(10)).unwrap();
    assert!(log.validate_snapshots().is_ok());
}

#[test]
fn test_validation_flags_regression() {
    let data = SnaplogBuilder::default()
        .record(standard_record(10, 0))
        .record(standard_record(11, 0))
        .record(standard_record(2, 0))
        .build();
    let log = SnapshotLog::parse(data).unwrap();
    assert_eq!(
        log.validate_snapshots(),
        Err(ValidationWarning {
            index: 2,
            previous: 11,
            current: 2,
        })
    );
}

// ============================================
// Connection Spec Tests
// ============================================

#[test]
fn test_connection_spec_v4() {
    let log = SnapshotLog::parse(standard_snaplog(1)).unwrap();
    let mut spec = ValueMap::new();
    log.connection_spec_values(&mut spec).unwrap();

    assert_eq!(spec.get_string(&["local_ip"]), Some("10.0.0.1"));
    assert_eq!(spec.get_int64(&["local_port"]), Some(3010));
    assert_eq!(spec.get_string(&["remote_ip"]), Some("10.0.0.2"));
    assert_eq!(spec.get_int64(&["remote_port"]), Some(44160));
    assert_eq!(spec.get_int64(&["local_af"]), Some(0));
}

#[test]
fn test_connection_spec_v6() {
    let mut local = [0u8; 16];
    local[0] = 0x20;
    local[1] = 0x01;
    local[2] = 0x0d;
    local[3] = 0xb8;
    local[15] = 0x01;
    let mut remote = local;
    remote[15] = 0x02;

    let builder = SnaplogBuilder {
        conn_spec: conn_spec_v6(local, 3010, remote, 50000),
        ..SnaplogBuilder::default()
    };
    let log = SnapshotLog::parse(builder.build()).unwrap();
    let mut spec = ValueMap::new();
    log.connection_spec_values(&mut spec).unwrap();

    assert_eq!(spec.get_string(&["local_ip"]), Some("2001:db8::1"));
    assert_eq!(spec.get_string(&["remote_ip"]), Some("2001:db8::2"));
    assert_eq!(spec.get_int64(&["local_af"]), Some(1));
}

#[test]
fn test_connection_spec_unknown_address_type() {
    let mut conn_spec = conn_spec_v4(LOCAL_IP, 1, REMOTE_IP, 2);
    conn_spec[18] = 9;
    let builder = SnaplogBuilder {
        conn_spec,
        ..SnaplogBuilder::default()
    };
    let log = SnapshotLog::parse(builder.build()).unwrap();
    let mut spec = ValueMap::new();
    assert!(matches!(
        log.connection_spec_values(&mut spec),
        Err(DecodeError::Format(_))
    ));
}
