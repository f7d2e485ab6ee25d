//! `PerunDB` configuration.
//!
//! Layers, highest priority first:
//!
//! 1. Environment variables (`PERUNDB_*`, `__` separates sections)
//! 2. Configuration file (`perundb.toml`)
//! 3. Built-in defaults
//!
//! The config carries the encoder-selection knobs and the HNSW
//! construction defaults; both convert directly into the runtime types.

use crate::encoding::EncoderConfig;
use crate::error::{Error, Result};
use crate::index::hnsw::HnswParams;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Encoder-selection thresholds (see the encoding module).
    pub encoding: EncoderConfig,
    /// HNSW construction defaults.
    pub index: HnswParams,
}

impl EngineConfig {
    /// Loads `perundb.toml` from the working directory, if present,
    /// layered with `PERUNDB_*` environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unparsable sources or out-of-range
    /// values.
    pub fn load() -> Result<Self> {
        Self::load_from("perundb.toml")
    }

    /// Loads configuration from an explicit file path (missing files fall
    /// back to defaults; the environment still applies).
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::load`].
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PERUNDB_").split("__"))
            .extract()
            .map_err(|e| {
                Error::invalid_argument(format!("configuration failed to parse: {e}"))
                    .op("config::load")
                    .path(path.as_ref())
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every knob against its documented range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let ratio = |name: &str, v: f64| -> Result<()> {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::invalid_argument(format!(
                    "{name} must be within [0, 1], got {v}"
                ))
                .op("config::validate"));
            }
            Ok(())
        };
        ratio("encoding.rle_threshold", self.encoding.rle_threshold)?;
        ratio("encoding.rle_early_threshold", self.encoding.rle_early_threshold)?;
        ratio("encoding.dictionary_threshold", self.encoding.dictionary_threshold)?;

        if !(1..=9).contains(&self.encoding.compression_level) {
            return Err(Error::invalid_argument(format!(
                "encoding.compression_level must be within [1, 9], got {}",
                self.encoding.compression_level
            ))
            .op("config::validate"));
        }
        if !(1..=64).contains(&self.encoding.bit_packing_max_bit_width) {
            return Err(Error::invalid_argument(format!(
                "encoding.bit_packing_max_bit_width must be within [1, 64], got {}",
                self.encoding.bit_packing_max_bit_width
            ))
            .op("config::validate"));
        }
        if self.encoding.bss_entropy_threshold < 0.0 || self.encoding.bss_entropy_threshold > 8.0 {
            return Err(Error::invalid_argument(format!(
                "encoding.bss_entropy_threshold must be within [0, 8], got {}",
                self.encoding.bss_entropy_threshold
            ))
            .op("config::validate"));
        }
        if self.index.m < 2 || self.index.m > 128 {
            return Err(Error::invalid_argument(format!(
                "index.m must be within [2, 128], got {}",
                self.index.m
            ))
            .op("config::validate"));
        }
        if self.index.ef_construction == 0 {
            return Err(
                Error::invalid_argument("index.ef_construction must be positive")
                    .op("config::validate"),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.encoding.bit_packing_max_bit_width, 16);
        assert_eq!(config.index.m, 16);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perundb.toml");
        std::fs::write(
            &path,
            r#"
[encoding]
compression_level = 7
rle_threshold = 0.4

[index]
m = 32
ef_construction = 300
metric = "cosine"
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.encoding.compression_level, 7);
        assert!((config.encoding.rle_threshold - 0.4).abs() < 1e-9);
        // Unset keys keep their defaults.
        assert!((config.encoding.dictionary_threshold - 0.5).abs() < 1e-9);
        assert_eq!(config.index.m, 32);
        assert_eq!(config.index.ef_construction, 300);
        assert_eq!(config.index.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perundb.toml");
        std::fs::write(&path, "[encoding]\ncompression_level = 22\n").unwrap();
        let err = EngineConfig::load_from(&path).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut config = EngineConfig::default();
        config.encoding.rle_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
