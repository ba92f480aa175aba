//! Defines the byte-order handling and the low-level readers/writers shared by the
//! patch, point and column wire formats.
//!
//! Every serialized value starts with a one byte endianness flag. Writers emit the
//! requested byte order (the machine order unless told otherwise) and readers
//! convert every multi-byte integer when the flag differs from the machine.

use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

use crate::error::PointCloudError;
use crate::types::Compression;

//==================================================================================
// I. Endianness
//==================================================================================

/// Byte order flag carried at offset 0 of every serialized patch and point.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    /// XDR, flag value 0.
    Big = 0,
    /// NDR, flag value 1.
    Little = 1,
}

impl Endian {
    /// The byte order of the running machine.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub fn from_flag(flag: u8) -> Result<Self, PointCloudError> {
        match flag {
            0 => Ok(Endian::Big),
            1 => Ok(Endian::Little),
            other => Err(PointCloudError::CorruptWireData(format!(
                "invalid endianness flag {}",
                other
            ))),
        }
    }

    pub fn flag(&self) -> u8 {
        *self as u8
    }

    /// True when values in this order must be byte-swapped to be read natively.
    pub fn is_foreign(&self) -> bool {
        *self != Endian::native()
    }
}

//==================================================================================
// II. Writer / Reader
//==================================================================================

/// Appends integers to a byte buffer in a fixed byte order.
pub(crate) struct WireWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl WireWriter {
    pub fn with_capacity(endian: Endian, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        match self.endian {
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes the common 9 byte patch header.
    pub fn write_patch_header(&mut self, pcid: u32, representation: Compression) {
        self.write_u8(self.endian.flag());
        self.write_u32(pcid);
        self.write_u32(representation.tag());
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads integers from a byte slice in a fixed byte order, failing with
/// `CorruptWireData` on truncation.
pub(crate) struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
    endian: Endian,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn read_u8(&mut self) -> Result<u8, PointCloudError> {
        let mut buf = [0u8; 1];
        self.cursor.read_exact(&mut buf).map_err(truncated)?;
        Ok(buf[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, PointCloudError> {
        let mut buf = [0u8; 4];
        self.cursor.read_exact(&mut buf).map_err(truncated)?;
        Ok(match self.endian {
            Endian::Big => u32::from_be_bytes(buf),
            Endian::Little => u32::from_le_bytes(buf),
        })
    }

    /// Borrows the next `len` bytes without copying.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], PointCloudError> {
        let start = self.position();
        let bytes: &'a [u8] = self.cursor.get_ref();
        let end = start
            .checked_add(len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                PointCloudError::CorruptWireData(format!(
                    "needed {} bytes at offset {}, only {} available",
                    len,
                    start,
                    bytes.len().saturating_sub(start)
                ))
            })?;
        self.cursor.set_position(end as u64);
        Ok(&bytes[start..end])
    }

    /// Borrows everything that has not been read yet.
    pub fn remaining(&mut self) -> &'a [u8] {
        let bytes: &'a [u8] = self.cursor.get_ref();
        let start = self.position().min(bytes.len());
        self.cursor.set_position(bytes.len() as u64);
        &bytes[start..]
    }
}

fn truncated(err: std::io::Error) -> PointCloudError {
    PointCloudError::CorruptWireData(format!("truncated buffer: {}", err))
}

//==================================================================================
// III. Patch Header
//==================================================================================

/// Size of the header shared by every serialized patch.
pub const PATCH_HEADER_SIZE: usize = 1 + 4 + 4;

/// The decoded common patch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub endian: Endian,
    pub pcid: u32,
    pub representation: Compression,
}

/// Reads the common header and returns a reader positioned at the payload.
pub(crate) fn read_patch_header(
    bytes: &[u8],
) -> Result<(WireHeader, WireReader<'_>), PointCloudError> {
    if bytes.is_empty() {
        return Err(PointCloudError::CorruptWireData(
            "zero length wire buffer".to_string(),
        ));
    }
    if bytes.len() < PATCH_HEADER_SIZE {
        return Err(PointCloudError::CorruptWireData(format!(
            "wire buffer too small for a patch header. Minimum size: {}, got: {}",
            PATCH_HEADER_SIZE,
            bytes.len()
        )));
    }
    let endian = Endian::from_flag(bytes[0])?;
    let mut reader = WireReader::new(bytes, endian);
    reader.read_u8()?;
    let pcid = reader.read_u32()?;
    let representation = Compression::from_tag(reader.read_u32()?)?;
    Ok((
        WireHeader {
            endian,
            pcid,
            representation,
        },
        reader,
    ))
}

/// Peeks at the schema id of a serialized patch or point without decoding it.
pub fn peek_pcid(bytes: &[u8]) -> Result<u32, PointCloudError> {
    if bytes.len() < 5 {
        return Err(PointCloudError::CorruptWireData(format!(
            "wire buffer too small to hold a schema id: {} bytes",
            bytes.len()
        )));
    }
    let endian = Endian::from_flag(bytes[0])?;
    let mut reader = WireReader::new(&bytes[1..], endian);
    reader.read_u32()
}
