use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Explicit handle to a directory-backed, content-addressed audio cache.
///
/// Audio-producing collaborators receive this handle instead of reaching a
/// process-wide cache. Reads and writes are check-then-write with no locking;
/// one writing process per directory is assumed.
#[derive(Debug, Clone)]
pub struct MediaCache {
    dir: PathBuf,
}

/// Cache occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Total bytes stored.
    pub bytes: u64,
}

impl MediaCache {
    /// Opens (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Directory backing this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for synthesized speech of `text` with a voice and rate.
    pub fn key_for(text: &str, voice: &str, speaking_rate: f32) -> String {
        let content = format!("{text}_{voice}_{speaking_rate}");
        hex(&Sha256::digest(content.as_bytes()))
    }

    /// True when `key` has cached bytes.
    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).is_file()
    }

    /// Cached bytes for `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::io(path, e)),
        }
    }

    /// Stores `bytes` under `key`, replacing any previous entry.
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        tmp.write_all(bytes).map_err(|e| EngineError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| EngineError::io(&path, e.error))?;
        debug!(key = &key[..key.len().min(12)], bytes = bytes.len(), "cached media");
        Ok(())
    }

    /// Counts entries and bytes.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        let entries = fs::read_dir(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&self.dir, e))?;
            let meta = entry.metadata().map_err(|e| EngineError::io(entry.path(), e))?;
            if meta.is_file() && entry.path().extension().is_some_and(|e| e == "bin") {
                stats.entries += 1;
                stats.bytes += meta.len();
            }
        }
        Ok(stats)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }
}

/// Content-hash filename for synthesized audio of `text` in `language`.
///
/// Twelve hex digits of SHA-256, so regenerated audio for unchanged text
/// keeps its filename and its `[sound:…]` reference.
pub fn media_filename_for(text: &str, language: &str, ext: &str) -> String {
    let digest = Sha256::digest(format!("{text}_{language}").as_bytes());
    format!("{}.{ext}", &hex(&digest)[..12])
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = MediaCache::open(tmp.path().join("tts")).unwrap();
        let key = MediaCache::key_for("Der Hund bellt.", "de-DE-Wavenet-B", 1.0);
        assert!(!cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap(), None);

        cache.put(&key, b"ID3audio").unwrap();
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().as_deref(), Some(&b"ID3audio"[..]));
        assert_eq!(cache.stats().unwrap(), CacheStats { entries: 1, bytes: 8 });
    }

    #[test]
    fn keys_depend_on_voice_and_rate() {
        let a = MediaCache::key_for("Hund", "v1", 1.0);
        assert_ne!(a, MediaCache::key_for("Hund", "v2", 1.0));
        assert_ne!(a, MediaCache::key_for("Hund", "v1", 0.8));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn filenames_are_short_content_hashes() {
        let name = media_filename_for("Hund", "de", "mp3");
        assert_eq!(name.len(), 16);
        assert!(name.ends_with(".mp3"));
        assert_eq!(name, media_filename_for("Hund", "de", "mp3"));
        assert_ne!(name, media_filename_for("Hund", "pl", "mp3"));
    }
}
