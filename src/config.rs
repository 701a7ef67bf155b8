//! Engine configuration with defaults and TOML loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, Result},
    types::{DATABASE_ENTRY, DATABASE_ENTRY_21, MEDIA_MANIFEST_ENTRY},
};

/// Reader and writer settings.
///
/// ```toml
/// [reader]
/// placeholder_prefix = "field_"
///
/// [writer]
/// min_package_bytes = 512
/// compression = "stored"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Package reading.
    pub reader: ReaderConfig,
    /// Package writing.
    pub writer: WriterConfig,
}

/// Settings for [`crate::package::PackageReader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Embedded database entry names, most preferred first.
    pub database_entries: Vec<String>,
    /// Name of the media manifest entry.
    pub manifest_entry: String,
    /// Prefix of invented names for blob positions past the declared fields.
    pub placeholder_prefix: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            database_entries: vec![DATABASE_ENTRY_21.to_string(), DATABASE_ENTRY.to_string()],
            manifest_entry: MEDIA_MANIFEST_ENTRY.to_string(),
            placeholder_prefix: "field_".to_string(),
        }
    }
}

/// Settings for [`crate::package::PackageWriter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Smallest output size accepted by post-write verification.
    pub min_package_bytes: u64,
    /// Embed available files referenced from template text (e.g. a silence track).
    pub embed_template_media: bool,
    /// Archive entry compression.
    pub compression: Compression,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            min_package_bytes: 512,
            embed_template_media: true,
            compression: Compression::Deflated,
        }
    }
}

/// Archive entry compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Deflate.
    Deflated,
    /// No compression.
    Stored,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Self::Deflated => zip::CompressionMethod::Deflated,
            Self::Stored => zip::CompressionMethod::Stored,
        }
    }
}

impl EngineConfig {
    /// Parses TOML; omitted keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [writer]
            compression = "stored"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.writer.compression, Compression::Stored);
        assert_eq!(cfg.writer.min_package_bytes, 512);
        assert_eq!(cfg.reader, ReaderConfig::default());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn rejects_unknown_compression() {
        let err = EngineConfig::from_toml_str("[writer]\ncompression = \"lzma\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
