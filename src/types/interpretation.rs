//! This module defines the canonical, type-safe representation of the element
//! types a dimension can store, and the patch-level compression tag.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PointCloudError;

/// The stored element type of one dimension.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interpretation {
    #[serde(rename = "int8_t")]
    Int8,
    #[serde(rename = "uint8_t")]
    UInt8,
    #[serde(rename = "int16_t")]
    Int16,
    #[serde(rename = "uint16_t")]
    UInt16,
    #[serde(rename = "int32_t")]
    Int32,
    #[serde(rename = "uint32_t")]
    UInt32,
    #[serde(rename = "int64_t")]
    Int64,
    #[serde(rename = "uint64_t")]
    UInt64,
    #[serde(rename = "double")]
    Float64,
    #[serde(rename = "float")]
    Float32,
}

impl Interpretation {
    /// Width of one stored element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Returns `true` if the data type is a signed integer.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Parses an interpretation token from a schema document.
    ///
    /// Tokens are disambiguated by their first letter and the first digit of the
    /// width, so "int32_t", "Int32" and "int32" all resolve to `Int32`, and any
    /// token starting with 'd' is a double, any token starting with 'f' a float.
    pub fn from_token(token: &str) -> Result<Self, PointCloudError> {
        let bytes = token.trim().as_bytes();
        let unknown = || {
            PointCloudError::SchemaParseError(format!("unknown interpretation \"{}\"", token))
        };
        match bytes.first().map(|b| b.to_ascii_lowercase()) {
            Some(b'i') => match bytes.get(3) {
                Some(b'8') => Ok(Self::Int8),
                Some(b'1') => Ok(Self::Int16),
                Some(b'3') => Ok(Self::Int32),
                Some(b'6') => Ok(Self::Int64),
                _ => Err(unknown()),
            },
            Some(b'u') => match bytes.get(4) {
                Some(b'8') => Ok(Self::UInt8),
                Some(b'1') => Ok(Self::UInt16),
                Some(b'3') => Ok(Self::UInt32),
                Some(b'6') => Ok(Self::UInt64),
                _ => Err(unknown()),
            },
            Some(b'd') => Ok(Self::Float64),
            Some(b'f') => Ok(Self::Float32),
            _ => Err(unknown()),
        }
    }

    /// Canonical token, as written back into JSON renderings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8_t",
            Self::UInt8 => "uint8_t",
            Self::Int16 => "int16_t",
            Self::UInt16 => "uint16_t",
            Self::Int32 => "int32_t",
            Self::UInt32 => "uint32_t",
            Self::Int64 => "int64_t",
            Self::UInt64 => "uint64_t",
            Self::Float64 => "double",
            Self::Float32 => "float",
        }
    }

    /// Reads one stored element from `bytes` (native byte order) as a raw double,
    /// before any scale/offset is applied.
    pub fn read_f64(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::Int8 => bytes[0] as i8 as f64,
            Self::UInt8 => bytes[0] as f64,
            Self::Int16 => bytemuck::pod_read_unaligned::<i16>(&bytes[..2]) as f64,
            Self::UInt16 => bytemuck::pod_read_unaligned::<u16>(&bytes[..2]) as f64,
            Self::Int32 => bytemuck::pod_read_unaligned::<i32>(&bytes[..4]) as f64,
            Self::UInt32 => bytemuck::pod_read_unaligned::<u32>(&bytes[..4]) as f64,
            Self::Int64 => bytemuck::pod_read_unaligned::<i64>(&bytes[..8]) as f64,
            Self::UInt64 => bytemuck::pod_read_unaligned::<u64>(&bytes[..8]) as f64,
            Self::Float32 => bytemuck::pod_read_unaligned::<f32>(&bytes[..4]) as f64,
            Self::Float64 => bytemuck::pod_read_unaligned::<f64>(&bytes[..8]),
        }
    }

    /// Writes a raw double into `bytes` as this element type.
    ///
    /// Integer targets are rounded to the nearest value and clamped into the
    /// representable range; NaN stores as zero.
    pub fn write_f64(&self, value: f64, bytes: &mut [u8]) {
        use num_traits::ToPrimitive;

        fn clamp<T: num_traits::Bounded + ToPrimitive + num_traits::NumCast>(v: f64) -> T {
            if v.is_nan() {
                return num_traits::cast(0u8).unwrap_or_else(T::min_value);
            }
            let lo = T::min_value().to_f64().unwrap_or(f64::MIN);
            let hi = T::max_value().to_f64().unwrap_or(f64::MAX);
            let r = v.round();
            if r <= lo {
                T::min_value()
            } else if r >= hi {
                T::max_value()
            } else {
                num_traits::cast(r).unwrap_or_else(T::max_value)
            }
        }

        let size = self.size();
        let out = &mut bytes[..size];
        match self {
            Self::Int8 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<i8>(value))),
            Self::UInt8 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<u8>(value))),
            Self::Int16 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<i16>(value))),
            Self::UInt16 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<u16>(value))),
            Self::Int32 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<i32>(value))),
            Self::UInt32 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<u32>(value))),
            Self::Int64 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<i64>(value))),
            Self::UInt64 => out.copy_from_slice(bytemuck::bytes_of(&clamp::<u64>(value))),
            Self::Float32 => out.copy_from_slice(bytemuck::bytes_of(&(value as f32))),
            Self::Float64 => out.copy_from_slice(bytemuck::bytes_of(&value)),
        }
    }
}

/// Provides the canonical string representation for an `Interpretation`.
impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The representation a patch is held in.
///
/// Discriminants match the wire representation tag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Row-major, uncompressed.
    #[default]
    None = 0,
    /// The externally defined opaque scheme ("ght" in schema documents).
    Opaque = 1,
    /// One independently encoded buffer per dimension.
    Dimensional = 2,
}

impl Compression {
    /// Parses the schema document's compression metadata value.
    /// Unknown values fall back to `None`.
    pub fn from_metadata(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("dimensional") {
            Self::Dimensional
        } else if value.eq_ignore_ascii_case("ght") || value.eq_ignore_ascii_case("opaque") {
            Self::Opaque
        } else {
            Self::None
        }
    }

    pub fn from_tag(tag: u32) -> Result<Self, PointCloudError> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Opaque),
            2 => Ok(Self::Dimensional),
            other => Err(PointCloudError::UnknownRepresentation(other)),
        }
    }

    pub fn tag(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Opaque => "opaque",
            Self::Dimensional => "dimensional",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
