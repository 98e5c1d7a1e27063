//! Variable definition table for snapshot records
//!
//! The table is plain text:
//!
//! ```text
//! /read
//! # name            type  offset  length
//! StartTimeStamp    0     4       4
//! LocalAddress      2     12      4
//! RcvWindScale=WinScaleRcvd 0 180 4
//! ```
//!
//! A name written `canonical=legacy` is emitted under the legacy name and
//! wins over an untagged descriptor that produces the same output name.

use std::collections::HashMap;

use super::codec::{self, FieldType};
use super::error::DecodeError;
use super::types::ValueSink;

/// Token the first non-empty line of a schema must start with
pub const SCHEMA_MARKER: &str = "/read";

/// Location and type of one variable inside a snapshot record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub legacy_name: Option<String>,
}

impl FieldDescriptor {
    /// Parse one `name typeCode byteOffset byteLength` line
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [name, type_code, offset, length] = tokens[..] else {
            return Err(DecodeError::format(format!(
                "expected 4 fields, got {}: {:?}",
                tokens.len(),
                line
            )));
        };

        let code: u8 = type_code
            .parse()
            .map_err(|_| DecodeError::format(format!("bad type code {:?}", type_code)))?;
        let field_type = FieldType::from_code(code)
            .ok_or_else(|| DecodeError::format(format!("unknown type code {}", code)))?;
        let byte_offset: usize = offset
            .parse()
            .map_err(|_| DecodeError::format(format!("bad offset {:?}", offset)))?;
        let byte_length: usize = length
            .parse()
            .map_err(|_| DecodeError::format(format!("bad length {:?}", length)))?;

        if byte_length != field_type.byte_size() {
            return Err(DecodeError::format(format!(
                "{}: {} is {} bytes wide, declared {}",
                name,
                field_type.as_ref(),
                field_type.byte_size(),
                byte_length
            )));
        }

        let (name, legacy_name) = match name.split_once('=') {
            Some((canonical, legacy)) if !canonical.is_empty() && !legacy.is_empty() => {
                (canonical.to_string(), Some(legacy.to_string()))
            }
            Some(_) => {
                return Err(DecodeError::format(format!("bad legacy tag {:?}", name)));
            }
            None => (name.to_string(), None),
        };

        Ok(Self {
            name,
            field_type,
            byte_offset,
            byte_length,
            legacy_name,
        })
    }

    /// Name the value is written under
    pub fn effective_name(&self) -> &str {
        self.legacy_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_legacy_tagged(&self) -> bool {
        self.legacy_name.is_some()
    }

    /// One past the last byte this descriptor reads
    pub fn end(&self) -> usize {
        self.byte_offset.saturating_add(self.byte_length)
    }

    /// Decode this descriptor's window out of `record`
    pub fn decode(&self, record: &[u8], sink: &mut dyn ValueSink) -> Result<(), DecodeError> {
        let name = self.effective_name();
        let window = codec::slice(name, record, self.byte_offset, self.byte_length)?;
        self.field_type.decode(name, window, sink)
    }
}

/// Ordered, immutable set of field descriptors.
///
/// Parsed once and shared by every decode in the process.
#[derive(Clone, Debug)]
pub struct VariableSchema {
    descriptors: Vec<FieldDescriptor>,
    /// Indices of the descriptor that wins each output name, in schema order
    projection: Vec<usize>,
    record_length: usize,
}

impl VariableSchema {
    /// Parse a schema table. Any bad line fails the whole parse.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        match lines.next() {
            Some((_, first)) if first.split_whitespace().next() == Some(SCHEMA_MARKER) => {}
            Some((n, first)) => {
                return Err(DecodeError::format(format!(
                    "line {}: expected {} marker, found {:?}",
                    n, SCHEMA_MARKER, first
                )));
            }
            None => return Err(DecodeError::format("empty schema")),
        }

        let descriptors = lines
            .filter(|(_, line)| !line.starts_with('#'))
            .map(|(n, line)| {
                FieldDescriptor::parse(line).map_err(|e| match e {
                    DecodeError::Format(msg) => DecodeError::Format(format!("line {}: {}", n, msg)),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_descriptors(descriptors))
    }

    pub fn from_descriptors(descriptors: Vec<FieldDescriptor>) -> Self {
        let mut winners: HashMap<&str, usize> = HashMap::new();
        for (idx, desc) in descriptors.iter().enumerate() {
            if desc.field_type == FieldType::Pad {
                continue;
            }
            let name = desc.effective_name();
            match winners.get(name) {
                Some(&current)
                    if descriptors[current].is_legacy_tagged() && !desc.is_legacy_tagged() => {}
                _ => {
                    winners.insert(name, idx);
                }
            }
        }
        let mut projection: Vec<usize> = winners.into_values().collect();
        projection.sort_unstable();

        let record_length = descriptors.iter().map(FieldDescriptor::end).max().unwrap_or(0);

        Self {
            descriptors,
            projection,
            record_length,
        }
    }

    /// All descriptors, in schema order
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors actually decoded: one per output name, padding excluded
    pub fn projected(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.projection.iter().map(|&idx| &self.descriptors[idx])
    }

    pub fn find(&self, output_name: &str) -> Option<&FieldDescriptor> {
        self.projected().find(|d| d.effective_name() == output_name)
    }

    /// Smallest record length every descriptor fits in
    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Fail if any descriptor falls outside a record of `available` bytes
    pub fn check_record_length(&self, available: usize) -> Result<(), DecodeError> {
        match self.descriptors.iter().find(|d| d.end() > available) {
            Some(desc) => Err(DecodeError::Bounds {
                field: desc.effective_name().to_string(),
                offset: desc.byte_offset,
                end: desc.end(),
                available,
            }),
            None => Ok(()),
        }
    }
}
