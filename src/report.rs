//! Recoverable conditions and per-operation statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    schema::SchemaGeneration,
    types::{ModelId, NoteId},
};

/// A recoverable condition observed during a read, write, or row import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Issue {
    /// Neither naming generation's markers were found; fields were passed through.
    SchemaAmbiguous {
        /// Note type whose field names matched no generation.
        model_id: ModelId,
    },
    /// One note or row could not be reconstructed and was skipped.
    RowParseFailure {
        /// Zero-based row position in the source.
        row: usize,
        /// Note id when it could be read.
        note_id: Option<NoteId>,
        /// Why the row was rejected.
        reason: String,
    },
    /// A referenced media file was not available and was not embedded.
    MediaUnresolved {
        /// Logical filename from the `[sound:…]` token.
        filename: String,
    },
    /// A record carried a progress key already used by an earlier record in
    /// the same export; it received a synthesized key instead.
    DuplicateProgressKey {
        /// Note that gave up the duplicate key.
        note_id: NoteId,
        /// The key kept by the earlier note.
        key: String,
    },
    /// Two freshly synthesized progress keys collided and one was rehashed.
    ProgressKeyCollision {
        /// Note that received the rehashed key.
        note_id: NoteId,
    },
}

/// Outcome statistics of [`crate::package::reader::PackageReader::read`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadReport {
    /// Rows in the notes table.
    pub expected_notes: usize,
    /// Records successfully reconstructed.
    pub loaded_notes: usize,
    /// Generation detected for each note type.
    pub generations: BTreeMap<ModelId, SchemaGeneration>,
    /// Recoverable conditions, in the order they were seen.
    pub issues: Vec<Issue>,
}

impl ReadReport {
    /// True when fewer notes were loaded than the package holds.
    pub fn is_partial(&self) -> bool {
        self.loaded_notes < self.expected_notes
    }

    /// Number of skipped rows.
    pub fn row_failures(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, Issue::RowParseFailure { .. }))
            .count()
    }
}

/// Outcome statistics of [`crate::package::writer::PackageWriter::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Notes written.
    pub notes_written: usize,
    /// Cards written (notes times templates).
    pub cards_written: usize,
    /// Records whose progress key was synthesized during this write.
    pub progress_keys_synthesized: usize,
    /// Records that received a freshly allocated note id.
    pub note_ids_assigned: usize,
    /// Logical media filenames embedded in the archive.
    pub media_embedded: BTreeSet<String>,
    /// Size of the produced package in bytes.
    pub package_bytes: u64,
    /// Recoverable conditions.
    pub issues: Vec<Issue>,
}

impl WriteReport {
    /// Referenced media that could not be embedded.
    pub fn media_missing(&self) -> BTreeSet<&str> {
        self.issues
            .iter()
            .filter_map(|i| match i {
                Issue::MediaUnresolved { filename } => Some(filename.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Outcome statistics of a tabular import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowReport {
    /// Rows offered.
    pub rows_seen: usize,
    /// Records produced.
    pub records_loaded: usize,
    /// Recoverable conditions.
    pub issues: Vec<Issue>,
}

impl RowReport {
    /// True when at least one row was skipped.
    pub fn is_partial(&self) -> bool {
        self.records_loaded < self.rows_seen
    }
}
