//! Package archive reading and writing.
//!
//! A package is a zip archive holding one embedded SQLite collection
//! (`collection.anki2` / `collection.anki21`), a JSON `media` manifest, and
//! media blobs stored under their integer manifest keys.

/// `col` row JSON documents: note types, decks, deck config, collection conf.
pub mod collection;
/// Archive to canonical records.
pub mod reader;
/// Canonical records to archive.
pub mod writer;

use std::time::{SystemTime, UNIX_EPOCH};

pub use reader::{CardInfo, LoadedPackage, PackageReader};
pub use writer::{DeckSpec, PackageWriter};

pub(crate) const SCHEMA: &str = include_str!("schema.sql");

/// Schema version written to `col.ver`.
pub const SCHEMA_VERSION: i64 = 11;

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
