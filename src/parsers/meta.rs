//! `.meta` sidecar files
//!
//! Plain `key: value` lines written next to each test's snapshot logs:
//!
//! ```text
//! Date/Time: 20170509T13:45:13.590210000Z
//! server IP address: 192.168.0.1
//! client IP address: 10.0.0.7
//! server hostname: mlab1.lga03.measurement-lab.org
//! client OS name: Linux
//! ```

use std::collections::BTreeMap;
use std::net::IpAddr;

use super::types::ValueSink;

/// Linux address family constants, as stored in the warehouse
pub const AF_INET: i64 = 2;
pub const AF_INET6: i64 = 10;

/// Meta keys copied into the row's connection spec: (meta key, field)
const PROJECTED_FIELDS: [(&str, &str); 5] = [
    ("server hostname", "server_hostname"),
    ("client hostname", "client_hostname"),
    ("server kernel version", "server_kernel_version"),
    ("client OS name", "client_os"),
    ("client_browser name", "client_browser"),
];

/// Address keys and the `_ip` / `_af` fields they fill
const ADDRESS_FIELDS: [(&str, &str, &str); 2] = [
    ("server IP address", "server_ip", "server_af"),
    ("client IP address", "client_ip", "client_af"),
];

/// Decoded meta file for one test
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaRecord {
    /// Name of the meta file; empty for a placeholder
    pub test_name: String,
    fields: BTreeMap<String, String>,
}

impl MetaRecord {
    /// Parse meta file contents. Lines without a `:` are skipped.
    pub fn parse(test_name: &str, content: &[u8]) -> Self {
        let text = String::from_utf8_lossy(content);
        let fields = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        Self {
            test_name: test_name.to_string(),
            fields,
        }
    }

    /// Stand-in used when a test's meta file never arrived
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_placeholder(&self) -> bool {
        self.test_name.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `Date/Time` line, if present
    pub fn date_time(&self) -> Option<&str> {
        self.get("Date/Time")
    }

    /// Write the meta-derived connection spec fields into `sink`.
    /// A placeholder writes nothing.
    pub fn populate_conn_spec(&self, sink: &mut dyn ValueSink) {
        if self.is_placeholder() {
            return;
        }

        for (key, ip_field, af_field) in ADDRESS_FIELDS {
            let Some(value) = self.get(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            sink.set_string(ip_field, value.to_string());
            match value.parse::<IpAddr>() {
                Ok(IpAddr::V4(_)) => sink.set_int64(af_field, AF_INET),
                Ok(IpAddr::V6(_)) => sink.set_int64(af_field, AF_INET6),
                Err(_) => {}
            }
        }

        for (key, field) in PROJECTED_FIELDS {
            if let Some(value) = self.get(key).filter(|v| !v.is_empty()) {
                sink.set_string(field, value.to_string());
            }
        }
    }
}
