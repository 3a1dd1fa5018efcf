use std::io::Read;

use crate::err::Result;
use crate::utils::RecordReader;

/// Last version without an explicit event count. These files are a bare stream of ids.
pub const LAST_LEGACY_VERSION: i16 = 224;

/// Versions strictly inside this range wrote population ids as 32-bit integers.
const WIDE_ID_VERSIONS: std::ops::Range<i16> = 1491..1494;

/// Layout generation, selected once from the leading version field.
///
/// The version is a signed short, so values from `0x8000` up are negative and legacy.
/// Every value maps onto one of the layouts; unknown versions fall into the closest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// A repeating sequence of `i32` population ids terminated by the end of the stream.
    Legacy { raw: i16 },
    /// Event table, binary population table and an optional embedded XML document.
    Structured { raw: i16, id_width: IdWidth },
}

impl FormatVersion {
    pub fn from_raw(raw: i16) -> Self {
        if raw <= LAST_LEGACY_VERSION {
            FormatVersion::Legacy { raw }
        } else {
            FormatVersion::Structured {
                raw,
                id_width: IdWidth::for_version(raw),
            }
        }
    }

    pub fn raw(&self) -> i16 {
        match *self {
            FormatVersion::Legacy { raw } | FormatVersion::Structured { raw, .. } => raw,
        }
    }
}

/// Width of the id field of a binary population record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdWidth {
    /// Signed 16-bit, sign-extended.
    Short,
    Int,
}

impl IdWidth {
    pub fn for_version(version: i16) -> Self {
        if WIDE_ID_VERSIONS.contains(&version) {
            IdWidth::Int
        } else {
            IdWidth::Short
        }
    }

    pub fn read_id<R: Read>(self, reader: &mut RecordReader<R>) -> Result<i32> {
        match self {
            IdWidth::Short => Ok(i32::from(reader.read_i16_named("population id")?)),
            IdWidth::Int => reader.read_i32_named("population id"),
        }
    }
}
