#![doc = include_str!("../README.md")]

use thiserror::Error;

pub mod bytes;
pub mod filetime;
pub mod guid;
pub mod key;
pub mod prop_type;
pub mod registry;
pub mod value;
pub mod warning;

pub use bytes::ByteWindow;
pub use filetime::FileTime;
pub use guid::Guid;
pub use key::{KeyCode, MapiKey, PropertySet};
pub use prop_type::PropertyType;
pub use value::PropertyValue;
pub use warning::{Severity, Warning, WarningCode};

#[derive(Error, Debug)]
pub enum MapiError {
    #[error("Read of {len} bytes at offset 0x{offset:X} past end of {available}-byte window")]
    OutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },
    #[error("Unknown property type: 0x{0:04X}")]
    UnknownPropertyType(u16),
    #[error("Not a fixed-size property type: 0x{0:04X}")]
    NotFixedSize(u16),
    #[error("Truncated {0:?} value: {1} bytes")]
    TruncatedValue(PropertyType, usize),
    #[error("Invalid GUID string: {0:?}")]
    InvalidGuidString(String),
}

pub type MapiResult<T> = Result<T, MapiError>;
