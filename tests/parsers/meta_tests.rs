//! Tests for meta sidecar files

#[path = "../common/mod.rs"]
mod common;

use common::synthetic::meta_file;
use snaplog_etl::parsers::meta::{MetaRecord, AF_INET, AF_INET6};
use snaplog_etl::parsers::ValueMap;

#[test]
fn test_meta_projection() {
    let meta = MetaRecord::parse("t.meta", &meta_file("4.3.2.1", "fe80::1"));
    let mut spec = ValueMap::new();
    meta.populate_conn_spec(&mut spec);

    assert_eq!(spec.get_string(&["server_ip"]), Some("4.3.2.1"));
    assert_eq!(spec.get_int64(&["server_af"]), Some(AF_INET));
    assert_eq!(spec.get_string(&["client_ip"]), Some("fe80::1"));
    assert_eq!(spec.get_int64(&["client_af"]), Some(AF_INET6));
    assert_eq!(spec.get_string(&["client_os"]), Some("Linux"));
}

#[test]
fn test_meta_tolerates_noise() {
    let content = b"\n\n:no key\r\nserver hostname : host-a \r\n\xff\xfe garbage\n";
    let meta = MetaRecord::parse("t.meta", content);
    assert_eq!(meta.get("server hostname"), Some("host-a"));
    assert_eq!(meta.len(), 1);
}

#[test]
fn test_empty_meta_is_not_placeholder() {
    let meta = MetaRecord::parse("t.meta", b"");
    assert!(meta.is_empty());
    assert!(!meta.is_placeholder(), "A real but empty meta file still counts as meta");
}
