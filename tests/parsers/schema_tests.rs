//! Tests for the variable definition table
//!
//! Tests cover:
//! - The built-in table
//! - Marker line and line-level validation
//! - Legacy-tagged descriptors winning their output name
//! - Record length checks

#[path = "../common/mod.rs"]
mod common;

use common::offsets::*;
use common::synthetic::*;
use common::{TEST_RECORD_LEN, TEST_SCHEMA};
use snaplog_etl::parsers::codec::FieldType;
use snaplog_etl::parsers::{DecodeError, SnapshotLog, ValueMap, VariableSchema};
use snaplog_etl::settings::DEFAULT_SCHEMA;

// ============================================
// Built-in Table Tests
// ============================================

#[test]
fn test_builtin_table_parses() {
    let schema = VariableSchema::parse(DEFAULT_SCHEMA).expect("Built-in table should parse");
    assert!(schema.len() > 30, "Built-in table should define the common variables");

    let local = schema.find("LocalAddress").expect("LocalAddress should be defined");
    assert_eq!(local.field_type, FieldType::InetAddressIpv4);

    let start = schema.find("StartTimeStamp").expect("StartTimeStamp should be defined");
    assert_eq!(start.byte_offset, 4, "Variables start after the sequence counter");
}

#[test]
fn test_builtin_table_padding_not_projected() {
    let schema = VariableSchema::parse(DEFAULT_SCHEMA).unwrap();
    assert!(schema.projected().all(|d| d.field_type != FieldType::Pad));
    assert_eq!(schema.projected().count(), schema.len() - 1);
}

// ============================================
// Validation Tests
// ============================================

#[test]
fn test_missing_marker_fails() {
    let text = TEST_SCHEMA.replacen("/read", "", 1);
    assert!(
        matches!(VariableSchema::parse(&text), Err(DecodeError::Format(_))),
        "Schema without marker should fail"
    );
}

#[test]
fn test_width_mismatch_fails() {
    let err = VariableSchema::parse("/read\nfoo 1 0 1\n").unwrap_err();
    match err {
        DecodeError::Format(msg) => {
            assert!(msg.contains("INTEGER32"), "Message should name the type: {}", msg)
        }
        other => panic!("Expected format error, got {:?}", other),
    }
}

#[test]
fn test_one_bad_line_fails_everything() {
    let text = format!("{}NotANumber 3 x 4\n", TEST_SCHEMA);
    assert!(VariableSchema::parse(&text).is_err());
}

// ============================================
// Legacy Name Tests
// ============================================

#[test]
fn test_legacy_descriptor_window_wins() {
    let schema = VariableSchema::parse(TEST_SCHEMA).unwrap();
    let winner = schema.find("WinScaleRcvd").unwrap();
    assert_eq!(winner.byte_offset, WIN_SCALE_LEGACY);
    assert!(winner.is_legacy_tagged());
    assert!(schema.find("RcvWindScale").is_none(), "Canonical name should not be emitted");

    let log = SnapshotLog::parse(
        SnaplogBuilder::default()
            .record(standard_record(0, 1))
            .build(),
    )
    .unwrap();
    let mut values = ValueMap::new();
    log.snapshot(0).unwrap().values(&schema, &mut values).unwrap();
    assert_eq!(
        values.get_int64(&["WinScaleRcvd"]),
        Some(7),
        "Value should come from the legacy-tagged window"
    );
}

#[test]
fn test_legacy_descriptor_first_still_wins() {
    let text = "/read\n\
        RcvWindScale=WinScaleRcvd 0 32 4\n\
        WinScaleRcvd 0 28 4\n";
    let schema = VariableSchema::parse(text).unwrap();
    assert_eq!(schema.find("WinScaleRcvd").unwrap().byte_offset, WIN_SCALE_LEGACY);
}

// ============================================
// Record Length Tests
// ============================================

#[test]
fn test_record_length() {
    let schema = VariableSchema::parse(TEST_SCHEMA).unwrap();
    assert_eq!(schema.record_length(), TEST_RECORD_LEN);
    assert!(schema.check_record_length(TEST_RECORD_LEN).is_ok());
    assert!(matches!(
        schema.check_record_length(TEST_RECORD_LEN - 1),
        Err(DecodeError::Bounds { .. })
    ));
}

#[test]
fn test_schema_wider_than_log_records() {
    let schema = VariableSchema::parse(TEST_SCHEMA).unwrap();
    let mut builder = SnaplogBuilder {
        record_length: 16,
        ..SnaplogBuilder::default()
    };
    builder.records.push(RecordBuilder::new(16, 0).build());
    let log = SnapshotLog::parse(builder.build()).unwrap();

    let mut values = ValueMap::new();
    let err = log.snapshot(0).unwrap().values(&schema, &mut values).unwrap_err();
    assert!(matches!(err, DecodeError::Bounds { available: 16, .. }));
    assert!(values.is_empty(), "Nothing should be decoded from a short record");
}
