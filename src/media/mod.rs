//! Media tokens, media sources, manifest, and the audio cache handle.

/// Content-addressed audio cache.
pub mod cache;
/// Archive-internal storage key to filename index.
pub mod manifest;
/// Reconciliation of referenced media against available media.
pub mod resolver;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use hashbrown::HashMap;
use regex::Regex;

use crate::error::{EngineError, Result};

pub use cache::MediaCache;
pub use manifest::MediaManifest;
pub use resolver::{MediaResolution, resolve};

static SOUND_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[sound:([^\]]+)\]").expect("static regex"));

/// Logical filenames referenced by `[sound:…]` tokens in `text`.
pub fn referenced_files(text: &str) -> impl Iterator<Item = &str> {
    SOUND_TOKEN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Wraps a filename in the media token syntax.
pub fn sound_token(filename: &str) -> String {
    format!("[sound:{filename}]")
}

/// Where the bytes of one available media file come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Bytes already in memory.
    Bytes(Vec<u8>),
    /// File on disk, read when the package is assembled.
    Path(PathBuf),
}

impl MediaSource {
    /// Loads the bytes of this source.
    pub fn load(&self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Path(path) => std::fs::read(path).map_err(|e| EngineError::io(path, e)),
        }
    }
}

impl From<Vec<u8>> for MediaSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<PathBuf> for MediaSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

/// Available media keyed by logical filename.
pub type MediaSet = HashMap<String, MediaSource>;

/// Collects every regular file in `dir` as available media, keyed by file name.
pub fn media_set_from_dir(dir: &Path) -> Result<MediaSet> {
    let mut out = MediaSet::new();
    let entries = std::fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            out.insert(name.to_string(), MediaSource::Path(path.clone()));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_tokens_in_text() {
        let text = "x [sound:a.mp3] y[sound:b c.mp3][sound:]";
        let found: Vec<_> = referenced_files(text).collect();
        assert_eq!(found, vec!["a.mp3", "b c.mp3"]);
        assert_eq!(sound_token("a.mp3"), "[sound:a.mp3]");
    }
}
