//! Read and write flashcard packages (`.apkg`) through one canonical record
//! model.
//!
//! Two historical field-naming generations are normalized on read; a
//! record's progress key survives every read/write cycle so study history
//! keeps matching after a re-import.
//!
//! # Examples
//!
//! Re-export a legacy package under the four-subdeck note type:
//! ```no_run
//! use std::path::Path;
//!
//! use apkgio::{
//!     package::{DeckSpec, PackageReader, PackageWriter},
//!     templates::{TemplateRegistry, registry::FOUR_SUBDECKS},
//! };
//!
//! let reader = PackageReader::default();
//! let pkg = reader.read(Path::new("legacy.apkg")).expect("read");
//! assert!(!pkg.report.is_partial());
//! let media = reader.read_media(Path::new("legacy.apkg")).expect("media");
//!
//! let registry = TemplateRegistry::builtin();
//! let note_type = registry.get(FOUR_SUBDECKS).expect("built-in");
//! let deck = DeckSpec { id: 2_059_400_110, name: "German B1".into() };
//! let report = PackageWriter::default()
//!     .write(pkg.records.iter(), note_type, &deck, &media, Path::new("german.apkg"))
//!     .expect("write");
//! assert_eq!(report.cards_written, pkg.records.len() * 4);
//! ```
//!
//! Round-trip through a spreadsheet:
//! ```no_run
//! use std::path::Path;
//!
//! use apkgio::tabular;
//!
//! let export = tabular::export_contribution_package(Path::new("german.apkg"), Path::new("out"))
//!     .expect("export");
//! let (records, report) = tabular::read_csv(&export.csv_path).expect("csv");
//! assert_eq!(records.len(), report.records_loaded);
//! ```
#![deny(missing_docs)]

/// Packed field blob codec and derived note columns.
pub mod codec;
/// Reader and writer settings.
pub mod config;
/// Fatal error type.
pub mod error;
/// Media tokens, resolution, manifest, and cache.
pub mod media;
/// Package reading and writing.
pub mod package;
/// Canonical record model and field-level patches.
pub mod record;
/// Recoverable issues and operation reports.
pub mod report;
/// Naming generations and normalization.
pub mod schema;
/// Indexed record collection.
pub mod store;
/// Spreadsheet row bridge.
pub mod tabular;
/// Note types, templates, and the built-in registry.
pub mod templates;
/// Shared primitive types and constants.
pub mod types;

pub use error::{EngineError, Result};
pub use record::{CanonicalRecord, Field};
