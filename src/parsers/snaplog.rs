//! Binary snapshot log (`*_snaplog`) parser
//!
//! Layout (all integers little-endian):
//! - Header: "W100" magic, format version (u16), connection spec length
//!   (u16), log time (i64 epoch seconds), field count (u32), record length
//!   (u32)
//! - Connection spec blob (local/remote port and address)
//! - Fixed-size snapshot records, each starting with a u32 sequence counter

use std::ops::Range;

use super::codec::{self, FieldType};
use super::error::{DecodeError, ValidationWarning};
use super::schema::VariableSchema;
use super::types::ValueSink;

/// Magic bytes for snapshot logs
pub const MAGIC: &[u8; 4] = b"W100";
/// Only header layout understood by this parser
pub const SUPPORTED_VERSION: u16 = 1;
/// Header bytes before the connection spec blob
pub const FIXED_HEADER_LEN: usize = 24;
/// Every record starts with a u32 sequence counter
pub const RECORD_PREFIX_LEN: usize = 4;
/// Bytes of the connection spec blob that are decoded
pub const CONNECTION_SPEC_LEN: usize = 38;

/// Connection spec blob layout: (name, type, offset)
const CONNECTION_SPEC_FIELDS: [(&str, FieldType, usize); 4] = [
    ("local_port", FieldType::InetPortNumber, 0),
    ("local_ip", FieldType::InetAddress, 2),
    ("remote_port", FieldType::InetPortNumber, 19),
    ("remote_ip", FieldType::InetAddress, 21),
];

/// Parsed snapshot log header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHeader {
    pub format_version: u16,
    pub log_time: i64,
    pub field_count: u32,
    pub record_length: usize,
    /// Position of the connection spec blob in the log bytes
    pub connection_spec: Range<usize>,
}

impl LogHeader {
    /// Parse the header at the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(DecodeError::format(format!(
                "snaplog of {} bytes is shorter than its {} byte header",
                data.len(),
                FIXED_HEADER_LEN
            )));
        }
        if &data[0..4] != MAGIC {
            return Err(DecodeError::format("missing snaplog header magic"));
        }

        let format_version = u16::from_le_bytes([data[4], data[5]]);
        if format_version != SUPPORTED_VERSION {
            return Err(DecodeError::format(format!(
                "unsupported snaplog version {}",
                format_version
            )));
        }
        let spec_len = u16::from_le_bytes([data[6], data[7]]) as usize;
        let log_time = i64::from_le_bytes([
            data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
        ]);
        let field_count = u32::from_le_bytes([data[16], data[17], data[18], data[19]]);
        let record_length = u32::from_le_bytes([data[20], data[21], data[22], data[23]]) as usize;

        if record_length < RECORD_PREFIX_LEN {
            return Err(DecodeError::format(format!(
                "record length {} is shorter than the {} byte record prefix",
                record_length, RECORD_PREFIX_LEN
            )));
        }

        let connection_spec = FIXED_HEADER_LEN..FIXED_HEADER_LEN + spec_len;
        if connection_spec.end > data.len() {
            return Err(DecodeError::format(format!(
                "connection spec of {} bytes runs past the end of the log",
                spec_len
            )));
        }

        Ok(Self {
            format_version,
            log_time,
            field_count,
            record_length,
            connection_spec,
        })
    }

    /// Total header bytes, connection spec included
    pub fn header_length(&self) -> usize {
        self.connection_spec.end
    }
}

/// A snapshot log: owns the raw bytes, hands out bounds-checked snapshots
#[derive(Clone, Debug)]
pub struct SnapshotLog {
    data: Vec<u8>,
    header: LogHeader,
    snapshot_count: usize,
}

impl SnapshotLog {
    /// Parse the header and size the record area.
    ///
    /// The bytes after the header must be a whole number of records.
    pub fn parse(data: Vec<u8>) -> Result<Self, DecodeError> {
        let header = LogHeader::parse(&data)?;
        let body = data.len() - header.header_length();
        if body % header.record_length != 0 {
            return Err(DecodeError::format(format!(
                "{} record bytes is not a multiple of record length {}",
                body, header.record_length
            )));
        }
        let snapshot_count = body / header.record_length;

        Ok(Self {
            data,
            header,
            snapshot_count,
        })
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshot_count
    }

    pub fn field_count(&self) -> u32 {
        self.header.field_count
    }

    pub fn record_length(&self) -> usize {
        self.header.record_length
    }

    pub fn log_time(&self) -> i64 {
        self.header.log_time
    }

    pub fn format_version(&self) -> u16 {
        self.header.format_version
    }

    /// Raw connection spec blob
    pub fn connection_spec(&self) -> &[u8] {
        &self.data[self.header.connection_spec.clone()]
    }

    /// Snapshot `index`, where `0 <= index < snapshot_count()`
    pub fn snapshot(&self, index: usize) -> Result<Snapshot<'_>, DecodeError> {
        if index >= self.snapshot_count {
            return Err(DecodeError::Index {
                index,
                count: self.snapshot_count,
            });
        }
        let start = self.header.header_length() + index * self.header.record_length;
        let bytes = &self.data[start..start + self.header.record_length];
        Ok(Snapshot { index, bytes })
    }

    pub fn snapshots(&self) -> impl Iterator<Item = Snapshot<'_>> + '_ {
        let start = self.header.header_length();
        self.data[start..]
            .chunks_exact(self.header.record_length)
            .enumerate()
            .map(|(index, bytes)| Snapshot { index, bytes })
    }

    /// Check that sequence counters never go backwards.
    /// Reports the first violation.
    pub fn validate_snapshots(&self) -> Result<(), ValidationWarning> {
        let mut previous: Option<u32> = None;
        for snapshot in self.snapshots() {
            let current = snapshot.sequence();
            if let Some(prev) = previous {
                if current < prev {
                    return Err(ValidationWarning {
                        index: snapshot.index(),
                        previous: prev,
                        current,
                    });
                }
            }
            previous = Some(current);
        }
        Ok(())
    }

    /// Decode the header's connection spec: local/remote ports and
    /// addresses, plus `local_af` (0 = IPv4, 1 = IPv6).
    pub fn connection_spec_values(&self, sink: &mut dyn ValueSink) -> Result<(), DecodeError> {
        let blob = self.connection_spec();
        for (name, field_type, offset) in CONNECTION_SPEC_FIELDS {
            let window = codec::slice(name, blob, offset, field_type.byte_size())?;
            field_type.decode(name, window, sink)?;
            if name == "local_ip" {
                let af = if codec::inet_address(name, window)?.is_ipv4() {
                    0
                } else {
                    1
                };
                sink.set_int64("local_af", af);
            }
        }
        Ok(())
    }
}

/// View of one fixed-size record inside a [`SnapshotLog`]
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    index: usize,
    bytes: &'a [u8],
}

impl<'a> Snapshot<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Sequence counter from the record prefix
    pub fn sequence(&self) -> u32 {
        u32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// Decode every projected schema field into `sink`
    pub fn values(&self, schema: &VariableSchema, sink: &mut dyn ValueSink) -> Result<(), DecodeError> {
        schema.check_record_length(self.bytes.len())?;
        for desc in schema.projected() {
            desc.decode(self.bytes, sink)?;
        }
        Ok(())
    }
}
