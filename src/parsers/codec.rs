//! Per-type decoding of snapshot variables
//!
//! Type codes follow the web100 variable table. All integers are
//! little-endian; unsigned types never produce negative values.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use strum::AsRefStr;

use super::error::DecodeError;
use super::types::ValueSink;

/// Address type byte carried in the last byte of an INET_ADDRESS window
const ADDRESS_TYPE_IPV4: u8 = 1;
const ADDRESS_TYPE_IPV6: u8 = 2;

/// Snapshot variable types
#[derive(AsRefStr, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum FieldType {
    Integer = 0,
    Integer32 = 1,
    InetAddressIpv4 = 2,
    Counter32 = 3,
    Gauge32 = 4,
    Unsigned32 = 5,
    TimeTicks = 6,
    Counter64 = 7,
    InetPortNumber = 8,
    InetAddress = 9,
    InetAddressIpv6 = 10,
    Str32 = 11,
    Octet = 12,
    /// Zero-width padding marker
    Pad = 13,
}

impl FieldType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Integer),
            1 => Some(Self::Integer32),
            2 => Some(Self::InetAddressIpv4),
            3 => Some(Self::Counter32),
            4 => Some(Self::Gauge32),
            5 => Some(Self::Unsigned32),
            6 => Some(Self::TimeTicks),
            7 => Some(Self::Counter64),
            8 => Some(Self::InetPortNumber),
            9 => Some(Self::InetAddress),
            10 => Some(Self::InetAddressIpv6),
            11 => Some(Self::Str32),
            12 => Some(Self::Octet),
            13 => Some(Self::Pad),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Number of bytes a value of this type occupies in a record
    pub fn byte_size(self) -> usize {
        match self {
            Self::Pad => 0,
            Self::Octet => 1,
            Self::InetPortNumber => 2,
            Self::Integer
            | Self::Integer32
            | Self::InetAddressIpv4
            | Self::Counter32
            | Self::Gauge32
            | Self::Unsigned32
            | Self::TimeTicks => 4,
            Self::Counter64 => 8,
            Self::InetAddress | Self::InetAddressIpv6 => 17,
            Self::Str32 => 32,
        }
    }

    /// Decode `window` and write the result into `sink` under `name`.
    ///
    /// `window` must hold at least `byte_size()` bytes; extra bytes are
    /// ignored. Padding writes nothing.
    pub fn decode(
        self,
        name: &str,
        window: &[u8],
        sink: &mut dyn ValueSink,
    ) -> Result<(), DecodeError> {
        match self {
            Self::Pad => {}
            Self::Integer | Self::Integer32 => {
                let v = i32::from_le_bytes(fixed(name, window)?);
                sink.set_int64(name, v as i64);
            }
            Self::Counter32 | Self::Gauge32 | Self::Unsigned32 | Self::TimeTicks => {
                let v = u32::from_le_bytes(fixed(name, window)?);
                sink.set_int64(name, v as i64);
            }
            Self::Counter64 => {
                let v = u64::from_le_bytes(fixed(name, window)?);
                sink.set_int64(name, i64::try_from(v).unwrap_or(i64::MAX));
            }
            Self::InetPortNumber => {
                let v = u16::from_le_bytes(fixed(name, window)?);
                sink.set_int64(name, v as i64);
            }
            Self::InetAddressIpv4 => {
                let octets: [u8; 4] = fixed(name, window)?;
                sink.set_string(name, Ipv4Addr::from(octets).to_string());
            }
            Self::InetAddress => {
                let addr = inet_address(name, window)?;
                sink.set_string(name, addr.to_string());
            }
            Self::InetAddressIpv6 => {
                let octets: [u8; 16] = fixed(name, window)?;
                sink.set_string(name, Ipv6Addr::from(octets).to_string());
            }
            Self::Str32 => {
                let bytes = slice(name, window, 0, 32)?;
                sink.set_string(name, ascii_string(bytes));
            }
            Self::Octet => {
                let [b] = fixed::<1>(name, window)?;
                sink.set_bool(name, b != 0);
            }
        }
        Ok(())
    }
}

/// Bounds-checked `[offset, offset + len)` slice of `data`
pub(crate) fn slice<'a>(
    name: &str,
    data: &'a [u8],
    offset: usize,
    len: usize,
) -> Result<&'a [u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| DecodeError::Bounds {
            field: name.to_string(),
            offset,
            end: offset.saturating_add(len),
            available: data.len(),
        })
}

/// First `N` bytes of `window` as an array
fn fixed<const N: usize>(name: &str, window: &[u8]) -> Result<[u8; N], DecodeError> {
    let bytes = slice(name, window, 0, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Decode a 17-byte INET_ADDRESS window: 16 address bytes and a type byte
pub(crate) fn inet_address(name: &str, window: &[u8]) -> Result<IpAddr, DecodeError> {
    let bytes: [u8; 17] = fixed(name, window)?;
    match bytes[16] {
        ADDRESS_TYPE_IPV4 => Ok(IpAddr::V4(Ipv4Addr::new(
            bytes[0], bytes[1], bytes[2], bytes[3],
        ))),
        ADDRESS_TYPE_IPV6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[..16]);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(DecodeError::format(format!(
            "field {}: unknown address type {}",
            name, other
        ))),
    }
}

/// ASCII text up to the first NUL, trailing padding removed
fn ascii_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
        .trim_end()
        .to_string()
}
