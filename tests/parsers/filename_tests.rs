//! Tests for the test file name grammar
//!
//! Tests cover:
//! - Compressed and uncompressed names, with and without a date directory
//! - Timestamp resolution
//! - The specific reason reported for malformed names

#[path = "../common/mod.rs"]
mod common;

use chrono::{Datelike, Timelike};
use common::test_file;
use snaplog_etl::parsers::filename::{logical_name, FilenameError, TestInfo};

// ============================================
// Valid Name Tests
// ============================================

#[test]
fn test_all_suffixes_share_timestamp() {
    let suffixes = [
        "c2s_snaplog.gz",
        "s2c_snaplog.gz",
        "meta",
        "c2s_ndttrace.gz",
        "cputime.gz",
    ];
    let infos: Vec<TestInfo> = suffixes
        .iter()
        .map(|suffix| TestInfo::parse(&test_file("13:45:13.590210", suffix)).unwrap())
        .collect();

    assert!(infos.iter().all(|info| info.time == infos[0].time));
    assert_eq!(infos[0].suffix, "c2s_snaplog");
    assert_eq!(infos[2].suffix, "meta");
    assert!(!infos[2].compressed);
    assert_eq!(infos[4].suffix, "cputime");
    assert_eq!(infos[0].address, "ndt-client.example.net:44160");
    assert_eq!(infos[0].date_dir, "2017/05/09/");
}

#[test]
fn test_timestamp_resolution() {
    let info = TestInfo::parse("20170509T23:59:58.000001Z_1.2.3.4:5.meta").unwrap();
    assert_eq!(info.timestamp.day(), 9);
    assert_eq!(info.timestamp.hour(), 23);
    assert_eq!(info.timestamp.second(), 58);
    assert_eq!(info.timestamp.nanosecond(), 1_000);
}

// ============================================
// Malformed Name Tests
// ============================================

#[test]
fn test_malformed_names() {
    assert!(matches!(
        TestInfo::parse("2017/05/09/ndt.meta"),
        Err(FilenameError::MissingDate(_))
    ));
    assert!(matches!(
        TestInfo::parse("20170509T1345Z_host.meta"),
        Err(FilenameError::MissingTime(_))
    ));
    assert!(matches!(
        TestInfo::parse("20170509T13:45:13.5Z_host"),
        Err(FilenameError::MissingSuffix(_))
    ));
}

#[test]
fn test_error_message_names_path() {
    let err = TestInfo::parse("bogus").unwrap_err();
    assert!(err.to_string().contains("bogus"));
    assert!(err.to_string().contains("yyyymmddT"));
}

#[test]
fn test_logical_name_strips_gz_only() {
    assert_eq!(logical_name("x.s2c_snaplog.gz"), "x.s2c_snaplog");
    assert_eq!(logical_name("x.s2c_snaplog.gzip"), "x.s2c_snaplog.gzip");
}
