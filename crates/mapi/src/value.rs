//! Decoded MAPI property values.
//!
//! The decoders here are shared by the MSG substg/inline paths and the PST
//! block parser; both feed them raw little-endian bytes and the recognized
//! base type.

use crate::{
    bytes::ByteWindow, filetime::FileTime, guid::Guid, prop_type::PropertyType, MapiError,
    MapiResult,
};

#[derive(Clone, PartialEq, Debug)]
pub enum PropertyValue {
    Int16(i16),
    Int32(i32),
    Float32(f32),
    Float64(f64),
    /// A 64-bit integer scaled by 10 000.
    Currency(i64),
    AppTime(f64),
    Error(u32),
    Boolean(bool),
    Object(Vec<u8>),
    Int64(i64),
    String8(String),
    Unicode(String),
    Time(FileTime),
    Guid(Guid),
    Binary(Vec<u8>),
    /// One entry per multi-value index, ordered by index.
    Multiple(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Decodes a fixed-size type from the 8-byte value field of an inline
    /// property record.
    pub fn decode_fixed(prop_type: PropertyType, value: &[u8; 8]) -> MapiResult<Self> {
        let win = ByteWindow::new(value);
        Ok(match prop_type {
            PropertyType::Integer16 => Self::Int16(win.read_i16_le(0)?),
            PropertyType::Integer32 => Self::Int32(win.read_i32_le(0)?),
            PropertyType::Floating32 => Self::Float32(win.read_f32_le(0)?),
            PropertyType::Floating64 => Self::Float64(win.read_f64_le(0)?),
            PropertyType::Currency => Self::Currency(win.read_i64_le(0)?),
            PropertyType::FloatingTime => Self::AppTime(win.read_f64_le(0)?),
            PropertyType::ErrorCode => Self::Error(win.read_u32_le(0)?),
            PropertyType::Boolean => Self::Boolean(win.read_u16_le(0)? != 0),
            PropertyType::Integer64 => Self::Int64(win.read_i64_le(0)?),
            PropertyType::Time => Self::Time(win.read_filetime(0)?),
            PropertyType::Object
            | PropertyType::String8
            | PropertyType::Unicode
            | PropertyType::Guid
            | PropertyType::Binary => {
                return Err(MapiError::NotFixedSize(prop_type as u16));
            }
        })
    }

    /// Decodes any base type from a standalone byte buffer (a substg stream
    /// or a referenced PST heap range).
    pub fn decode_buffer(prop_type: PropertyType, data: &[u8]) -> MapiResult<Self> {
        if let Some(size) = prop_type.fixed_size() {
            if data.len() < size {
                return Err(MapiError::TruncatedValue(prop_type, data.len()));
            }
        }

        let win = ByteWindow::new(data);
        Ok(match prop_type {
            PropertyType::Integer16 => Self::Int16(win.read_i16_le(0)?),
            PropertyType::Integer32 => Self::Int32(win.read_i32_le(0)?),
            PropertyType::Floating32 => Self::Float32(win.read_f32_le(0)?),
            PropertyType::Floating64 => Self::Float64(win.read_f64_le(0)?),
            PropertyType::Currency => Self::Currency(win.read_i64_le(0)?),
            PropertyType::FloatingTime => Self::AppTime(win.read_f64_le(0)?),
            PropertyType::ErrorCode => Self::Error(win.read_u32_le(0)?),
            PropertyType::Boolean => Self::Boolean(win.read_u16_le(0)? != 0),
            PropertyType::Integer64 => Self::Int64(win.read_i64_le(0)?),
            PropertyType::Time => Self::Time(win.read_filetime(0)?),
            PropertyType::Guid => Self::Guid(win.read_guid(0)?),
            PropertyType::Object => Self::Object(data.to_vec()),
            PropertyType::Binary => Self::Binary(data.to_vec()),
            PropertyType::String8 => Self::String8(decode_string8(data)),
            PropertyType::Unicode => Self::Unicode(decode_unicode(data)),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String8(s) | Self::Unicode(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) | Self::Object(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int16(v) => Some(i32::from(*v)),
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) | Self::Currency(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_filetime(&self) -> Option<FileTime> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// Trailing NULs are stripped after decoding; no code-page transcoding is
/// attempted, undecodable bytes become U+FFFD.
fn decode_string8(data: &[u8]) -> String {
    let end = data
        .iter()
        .rposition(|&b| b != 0)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn decode_unicode(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let decoded = String::from_utf16_lossy(&units);
    decoded.trim_end_matches('\0').to_owned()
}
