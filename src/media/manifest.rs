use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Archive-internal index from integer storage keys to logical filenames.
///
/// Serialized as a JSON object with stringified keys: `{"0": "a.mp3"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaManifest {
    entries: BTreeMap<String, String>,
}

impl MediaManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns consecutive storage keys, starting at 0, to `filenames`.
    pub fn assign<'a>(filenames: impl IntoIterator<Item = &'a str>) -> Self {
        let entries = filenames
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (idx.to_string(), name.to_string()))
            .collect();
        Self { entries }
    }

    /// Parses a manifest entry.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serializes the manifest entry.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Logical filename stored under `key`.
    pub fn filename(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// `(storage key, filename)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the manifest lists no media.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
