//! The per-dimension column buffer used by dimensional patches.
//!
//! A `ColumnBuffer` holds the values of one dimension for every point of a patch,
//! either as raw machine-order elements or as one of the compressed payloads
//! produced by the kernels. Compressed buffers are immutable: the only way to
//! change the mode is `encode` from raw or `decode` back to raw.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PointCloudError;
use crate::kernels::{deflate, rle, sigbits};
use crate::types::Interpretation;
use crate::utils::swap_elements_in_place;
use crate::wire::{Endian, WireReader, WireWriter};

//==================================================================================
// I. Compression Modes
//==================================================================================

/// Compression mode of a single column. The discriminant is the wire tag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCompression {
    #[default]
    None = 0,
    Rle = 1,
    Sigbits = 2,
    Deflate = 3,
}

impl ColumnCompression {
    pub fn from_tag(tag: u8) -> Result<Self, PointCloudError> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Rle),
            2 => Ok(Self::Sigbits),
            3 => Ok(Self::Deflate),
            other => Err(PointCloudError::UnknownCompressionScheme(other as u32)),
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rle => "rle",
            Self::Sigbits => "sigbits",
            Self::Deflate => "zlib",
        }
    }
}

impl fmt::Display for ColumnCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//==================================================================================
// II. ColumnBuffer
//==================================================================================

/// Minimum, maximum and mean of the raw stored values of a column.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBuffer {
    interpretation: Interpretation,
    npoints: usize,
    compression: ColumnCompression,
    bytes: Vec<u8>,
}

impl ColumnBuffer {
    /// Wraps raw machine-order elements. The length must be a whole number of elements.
    pub fn from_raw(interpretation: Interpretation, bytes: Vec<u8>) -> Result<Self, PointCloudError> {
        let size = interpretation.size();
        if bytes.len() % size != 0 {
            return Err(PointCloudError::InconsistentInput(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                interpretation
            )));
        }
        Ok(Self {
            interpretation,
            npoints: bytes.len() / size,
            compression: ColumnCompression::None,
            bytes,
        })
    }

    /// Gathers one dimension out of a row-major buffer.
    pub(crate) fn gather(
        interpretation: Interpretation,
        rows: &[u8],
        row_size: usize,
        byteoffset: usize,
    ) -> Self {
        let size = interpretation.size();
        let npoints = if row_size == 0 { 0 } else { rows.len() / row_size };
        let mut bytes = Vec::with_capacity(npoints * size);
        for row in rows.chunks_exact(row_size.max(1)).take(npoints) {
            bytes.extend_from_slice(&row[byteoffset..byteoffset + size]);
        }
        Self {
            interpretation,
            npoints,
            compression: ColumnCompression::None,
            bytes,
        }
    }

    /// Scatters a raw column back into a row-major buffer.
    pub(crate) fn scatter(&self, rows: &mut [u8], row_size: usize, byteoffset: usize) {
        let size = self.element_size();
        for (row, value) in rows
            .chunks_exact_mut(row_size)
            .zip(self.bytes.chunks_exact(size))
        {
            row[byteoffset..byteoffset + size].copy_from_slice(value);
        }
    }

    pub fn interpretation(&self) -> Interpretation {
        self.interpretation
    }

    pub fn npoints(&self) -> usize {
        self.npoints
    }

    pub fn compression(&self) -> ColumnCompression {
        self.compression
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn element_size(&self) -> usize {
        self.interpretation.size()
    }

    fn require_raw(&self, operation: &str) -> Result<(), PointCloudError> {
        if self.compression != ColumnCompression::None {
            return Err(PointCloudError::UnsupportedConversion(format!(
                "{} needs an uncompressed column, found {}",
                operation, self.compression
            )));
        }
        Ok(())
    }

    /// Number of maximal runs of bitwise-equal elements.
    pub fn run_count(&self) -> Result<usize, PointCloudError> {
        self.require_raw("run_count")?;
        Ok(rle::run_count(&self.bytes, self.element_size()))
    }

    /// Number of leading bits shared by every element.
    pub fn sigbits_count(&self) -> Result<u32, PointCloudError> {
        self.require_raw("sigbits_count")?;
        sigbits::common_bit_count(&self.bytes, self.element_size())
    }

    /// Compresses a raw column into `mode`. `deflate_level` is only used by deflate.
    pub fn encode(
        &self,
        mode: ColumnCompression,
        deflate_level: u32,
    ) -> Result<ColumnBuffer, PointCloudError> {
        self.require_raw("encode")?;
        let size = self.element_size();
        let bytes = match mode {
            ColumnCompression::None => self.bytes.clone(),
            ColumnCompression::Rle => {
                let mut out = Vec::new();
                rle::encode(&self.bytes, size, &mut out);
                out
            }
            ColumnCompression::Sigbits => {
                let mut out = Vec::new();
                sigbits::encode(&self.bytes, size, &mut out)?;
                out
            }
            ColumnCompression::Deflate => deflate::encode(&self.bytes, deflate_level)?,
        };
        Ok(ColumnBuffer {
            interpretation: self.interpretation,
            npoints: self.npoints,
            compression: mode,
            bytes,
        })
    }

    /// Returns the raw form of this column. Raw columns are copied.
    pub fn decode(&self) -> Result<ColumnBuffer, PointCloudError> {
        let size = self.element_size();
        let bytes = match self.compression {
            ColumnCompression::None => self.bytes.clone(),
            ColumnCompression::Rle => {
                let mut out = Vec::new();
                rle::decode(&self.bytes, size, self.npoints, &mut out)?;
                out
            }
            ColumnCompression::Sigbits => {
                let mut out = Vec::new();
                sigbits::decode(&self.bytes, size, self.npoints, &mut out)?;
                out
            }
            ColumnCompression::Deflate => {
                deflate::decode(&self.bytes, self.npoints.saturating_mul(size))?
            }
        };
        Ok(ColumnBuffer {
            interpretation: self.interpretation,
            npoints: self.npoints,
            compression: ColumnCompression::None,
            bytes,
        })
    }

    /// Minimum, maximum and mean of the stored values, `None` for an empty column.
    pub fn minmax(&self) -> Result<Option<ColumnSummary>, PointCloudError> {
        if self.npoints == 0 {
            return Ok(None);
        }
        let raw = self.decode()?;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        for element in raw.bytes.chunks_exact(raw.element_size()) {
            let value = raw.interpretation.read_f64(element);
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }
        Ok(Some(ColumnSummary {
            min,
            max,
            avg: sum / raw.npoints as f64,
        }))
    }

    /// Reverses the byte order of every element-valued field of the payload.
    ///
    /// Deflate payloads are inflated, swapped and compressed again at `deflate_level`.
    pub fn flip_endian(&mut self, deflate_level: u32) -> Result<(), PointCloudError> {
        let size = self.element_size();
        match self.compression {
            ColumnCompression::None => swap_elements_in_place(&mut self.bytes, size),
            ColumnCompression::Rle => rle::flip_endian(&mut self.bytes, size),
            ColumnCompression::Sigbits => sigbits::flip_endian(&mut self.bytes, size),
            ColumnCompression::Deflate => {
                let mut inflated = deflate::decode(&self.bytes, self.npoints.saturating_mul(size))?;
                swap_elements_in_place(&mut inflated, size);
                self.bytes = deflate::encode(&inflated, deflate_level)?;
            }
        }
        Ok(())
    }

    //==============================================================================
    // Wire
    //==============================================================================

    /// `u8 compression, u32 payload size, payload`.
    pub fn serialized_size(&self) -> usize {
        1 + 4 + self.bytes.len()
    }

    pub(crate) fn write_to(
        &self,
        writer: &mut WireWriter,
        deflate_level: u32,
    ) -> Result<(), PointCloudError> {
        let flipped;
        let column = if writer.endian().is_foreign() && self.element_size() > 1 {
            let mut copy = self.clone();
            copy.flip_endian(deflate_level)?;
            flipped = copy;
            &flipped
        } else {
            self
        };
        writer.write_u8(column.compression.tag());
        writer.write_u32(column.bytes.len() as u32);
        writer.write_bytes(&column.bytes);
        Ok(())
    }

    pub(crate) fn read_from(
        reader: &mut WireReader<'_>,
        interpretation: Interpretation,
        npoints: usize,
        deflate_level: u32,
    ) -> Result<Self, PointCloudError> {
        let compression = ColumnCompression::from_tag(reader.read_u8()?)?;
        let len = reader.read_u32()? as usize;
        let payload = reader.read_slice(len)?;

        if compression == ColumnCompression::None
            && Some(len) != npoints.checked_mul(interpretation.size())
        {
            return Err(PointCloudError::CorruptWireData(format!(
                "raw {} column holds {} bytes, not {} elements",
                interpretation, len, npoints
            )));
        }

        let mut column = ColumnBuffer {
            interpretation,
            npoints,
            compression,
            bytes: payload.to_vec(),
        };
        if reader.endian().is_foreign() && interpretation.size() > 1 {
            column.flip_endian(deflate_level)?;
        }
        Ok(column)
    }

    /// Serializes this column on its own in the given byte order.
    pub fn serialize(&self, endian: Endian, deflate_level: u32) -> Result<Vec<u8>, PointCloudError> {
        let mut writer = WireWriter::with_capacity(endian, self.serialized_size());
        self.write_to(&mut writer, deflate_level)?;
        Ok(writer.into_inner())
    }

    /// Reads a column serialized with `serialize`, returning it and the bytes consumed.
    pub fn deserialize(
        bytes: &[u8],
        endian: Endian,
        interpretation: Interpretation,
        npoints: usize,
        deflate_level: u32,
    ) -> Result<(Self, usize), PointCloudError> {
        let mut reader = WireReader::new(bytes, endian);
        let column = Self::read_from(&mut reader, interpretation, npoints, deflate_level)?;
        Ok((column, reader.position()))
    }
}

//==================================================================================
// III. Unit Tests
//==================================================================================
