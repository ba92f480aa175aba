// In: src/config.rs

//! The single source of truth for all pointcloud engine configuration.
//!
//! `EngineConfig` is created once at the application boundary (for example from a
//! JSON document) and shared read-only through `Arc<EngineConfig>`. The
//! `EngineContext` bundles it with the optional opaque-representation codec and is
//! the explicit context handed to every conversion entry point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::PointCloudError;
use crate::patch::ZstdOpaqueCodec;
use crate::traits::OpaqueCodec;
use crate::wire::Endian;

//==================================================================================
// I. The Unified EngineConfig
//==================================================================================

/// Tunables for statistics sampling, column compression and serialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Dimensional statistics stop accumulating once this many points were sampled.
    #[serde(default = "default_sample_threshold")]
    pub sample_threshold: u64,

    /// zlib level used by the deflate column mode (0-9).
    #[serde(default = "default_deflate_level")]
    pub deflate_level: u32,

    /// zstd level used by the bundled opaque codec.
    #[serde(default = "default_opaque_zstd_level")]
    pub opaque_zstd_level: i32,

    /// Byte order written by serialization when no explicit order is requested.
    #[serde(default = "Endian::native")]
    pub default_endian: Endian,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_threshold: default_sample_threshold(),
            deflate_level: default_deflate_level(),
            opaque_zstd_level: default_opaque_zstd_level(),
            default_endian: Endian::native(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PointCloudError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        if config.deflate_level > 9 {
            return Err(PointCloudError::InconsistentInput(format!(
                "deflate_level must be between 0 and 9, got {}",
                config.deflate_level
            )));
        }
        Ok(config)
    }
}

fn default_sample_threshold() -> u64 {
    10_000
}

fn default_deflate_level() -> u32 {
    6
}

fn default_opaque_zstd_level() -> i32 {
    3
}

//==================================================================================
// II. EngineContext
//==================================================================================

/// Explicit context passed to conversion, merge and serialization entry points.
///
/// Without an opaque codec every conversion to or from the opaque representation
/// fails with `UnsupportedConversion`.
#[derive(Clone, Default)]
pub struct EngineContext {
    pub config: Arc<EngineConfig>,
    pub opaque: Option<Arc<dyn OpaqueCodec>>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            opaque: None,
        }
    }

    pub fn with_opaque_codec(mut self, codec: Arc<dyn OpaqueCodec>) -> Self {
        self.opaque = Some(codec);
        self
    }

    /// Registers the bundled zstd codec at the configured level.
    pub fn with_bundled_opaque_codec(self) -> Self {
        let codec = ZstdOpaqueCodec::new(self.config.opaque_zstd_level);
        self.with_opaque_codec(Arc::new(codec))
    }

    /// Returns the opaque codec or the error every opaque conversion reports.
    pub(crate) fn opaque_codec(&self) -> Result<&dyn OpaqueCodec, PointCloudError> {
        self.opaque.as_deref().ok_or_else(|| {
            PointCloudError::UnsupportedConversion(
                "no opaque codec is registered in the engine context".to_string(),
            )
        })
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("opaque", &self.opaque.as_ref().map(|c| c.name()))
            .finish()
    }
}
