use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use hashbrown::HashMap;
use rusqlite::{Connection, OpenFlags, Row};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::{
    codec,
    config::ReaderConfig,
    error::{EngineError, Result},
    media::{MediaManifest, MediaSet, MediaSource},
    record::CanonicalRecord,
    report::{Issue, ReadReport},
    schema::{Normalizer, SchemaGeneration},
    store::RecordSet,
    templates::NoteTypeDefinition,
    types::{CardId, DATABASE_ENTRY_21B, DeckId, ModelId, NoteId},
};

use super::collection;

/// One row of the cards table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardInfo {
    /// Card id.
    pub card_id: CardId,
    /// Owning note.
    pub note_id: NoteId,
    /// Deck the card is filed in.
    pub deck_id: DeckId,
    /// Template ordinal.
    pub ord: usize,
}

/// Everything recovered from one package.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    /// Package file stem.
    pub name: String,
    /// Successfully reconstructed records, in note id order.
    pub records: RecordSet,
    /// Note types declared by the collection.
    pub note_types: Vec<NoteTypeDefinition>,
    /// Card table.
    pub cards: Vec<CardInfo>,
    /// Deck id to full deck name.
    pub decks: BTreeMap<DeckId, String>,
    /// Parsed media manifest.
    pub manifest: MediaManifest,
    /// Archive entries other than the database and the manifest.
    pub archive_entries: Vec<String>,
    /// Logical names of media physically present in the archive.
    pub media_files: BTreeSet<String>,
    /// Counts and recoverable conditions.
    pub report: ReadReport,
}

impl LoadedPackage {
    /// Note type with model id `id`.
    pub fn note_type(&self, id: ModelId) -> Option<&NoteTypeDefinition> {
        self.note_types.iter().find(|nt| nt.id == id)
    }

    /// Cards filed in deck `id`.
    pub fn cards_in_deck(&self, id: DeckId) -> impl Iterator<Item = &CardInfo> {
        self.cards.iter().filter(move |c| c.deck_id == id)
    }

    /// Id of the deck with full name `name`.
    pub fn deck_id(&self, name: &str) -> Option<DeckId> {
        self.decks.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
    }
}

/// Reads packages into canonical records.
#[derive(Debug, Clone, Default)]
pub struct PackageReader {
    config: ReaderConfig,
}

/// Per note type state shared by all its notes.
struct NoteKind {
    fields: Vec<String>,
    normalizer: Normalizer,
}

struct RawNote {
    id: NoteId,
    guid: String,
    mid: ModelId,
    flds: String,
}

impl PackageReader {
    /// Creates a reader with explicit settings.
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Reads the package at `path`.
    ///
    /// A missing or corrupt archive or database aborts the read. A note
    /// that cannot be reconstructed is skipped and reported; compare
    /// `report.loaded_notes` with `report.expected_notes` to detect a
    /// partial read.
    pub fn read(&self, path: &Path) -> Result<LoadedPackage> {
        let mut archive = open_archive(path)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        let entry = self.database_entry(path, &names)?;
        info!(path = %path.display(), entry = %entry, "opening package");

        let manifest = self.read_manifest(path, &mut archive, &names);
        let archive_entries: Vec<String> = names
            .iter()
            .filter(|n| !self.is_reserved(n))
            .cloned()
            .collect();
        let media_files = manifest
            .entries()
            .filter(|(key, _)| archive_entries.iter().any(|n| n == key))
            .map(|(_, name)| name.to_string())
            .collect();

        // Dropped last: the connection below must close before the directory goes.
        let scratch = TempDir::new().map_err(|e| EngineError::io(std::env::temp_dir(), e))?;
        let db_path = scratch.path().join("collection.db");
        extract_entry(path, &mut archive, &entry, &db_path)?;

        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| EngineError::database(path, e))?;
        let db = |e: rusqlite::Error| EngineError::database(path, e);

        let (models_json, decks_json): (String, String) = conn
            .query_row("SELECT models, decks FROM col LIMIT 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(db)?;
        let decks = collection::parse_decks(&decks_json)?;
        let note_types = collection::parse_models(&models_json, &decks)?;

        let mut report = ReadReport::default();
        let mut kinds: HashMap<ModelId, NoteKind> = HashMap::new();
        for nt in &note_types {
            let generation = nt.generation();
            info!(model_id = nt.id, name = %nt.name, ?generation, "detected field naming");
            if generation == SchemaGeneration::Unknown {
                warn!(model_id = nt.id, "no naming generation matched, passing fields through");
                report.issues.push(Issue::SchemaAmbiguous { model_id: nt.id });
            }
            report.generations.insert(nt.id, generation);
            kinds.insert(
                nt.id,
                NoteKind {
                    fields: nt.fields.clone(),
                    normalizer: Normalizer::with_generation(generation),
                },
            );
        }

        let cards = load_cards(&conn).map_err(db)?;
        let expected: i64 = conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
            .map_err(db)?;
        report.expected_notes = expected.max(0) as usize;

        let mut records = RecordSet::new();
        let mut stmt = conn
            .prepare("SELECT id, guid, mid, flds FROM notes ORDER BY id")
            .map_err(db)?;
        let mut rows = stmt.query([]).map_err(db)?;
        let mut row_idx = 0;
        while let Some(row) = rows.next().map_err(db)? {
            let idx = row_idx;
            row_idx += 1;

            let raw = match raw_note(row) {
                Ok(raw) => raw,
                Err(err) => {
                    let note_id = row.get::<_, NoteId>(0).ok();
                    warn!(row = idx, ?note_id, error = %err, "skipping unreadable note");
                    report.issues.push(Issue::RowParseFailure {
                        row: idx,
                        note_id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let kind = kinds.entry(raw.mid).or_insert_with(|| {
                warn!(model_id = raw.mid, "note refers to an undeclared note type");
                report.issues.push(Issue::SchemaAmbiguous { model_id: raw.mid });
                report.generations.insert(raw.mid, SchemaGeneration::Unknown);
                NoteKind {
                    fields: Vec::new(),
                    normalizer: Normalizer::with_generation(SchemaGeneration::Unknown),
                }
            });
            let rec = self.reconstruct(kind, raw);
            let note_id = rec.note_id;
            if let Err(err) = records.insert(rec) {
                warn!(row = idx, note_id, ?err, "skipping conflicting note");
                report.issues.push(Issue::RowParseFailure {
                    row: idx,
                    note_id: Some(note_id),
                    reason: format!("{err:?}"),
                });
            }
        }
        drop(rows);
        drop(stmt);
        drop(conn);

        report.loaded_notes = records.len();
        if report.is_partial() {
            warn!(
                expected = report.expected_notes,
                loaded = report.loaded_notes,
                "package read partially"
            );
        }
        info!(
            path = %path.display(),
            notes = report.loaded_notes,
            cards = cards.len(),
            media = manifest.len(),
            "package read"
        );

        Ok(LoadedPackage {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            records,
            note_types,
            cards,
            decks,
            manifest,
            archive_entries,
            media_files,
            report,
        })
    }

    /// Media bytes of the package at `path`, keyed by logical filename.
    ///
    /// Manifest entries whose blob is absent from the archive are skipped.
    pub fn read_media(&self, path: &Path) -> Result<MediaSet> {
        let mut archive = open_archive(path)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        let manifest = self.read_manifest(path, &mut archive, &names);

        let mut out = MediaSet::new();
        for (key, name) in manifest.entries() {
            let mut file = match archive.by_name(key) {
                Ok(file) => file,
                Err(zip::result::ZipError::FileNotFound) => {
                    debug!(key, filename = name, "manifest entry without blob");
                    continue;
                }
                Err(e) => return Err(EngineError::unreadable(path, e.to_string())),
            };
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)
                .map_err(|e| EngineError::unreadable(path, format!("media entry {key}: {e}")))?;
            out.insert(name.to_string(), MediaSource::Bytes(bytes));
        }
        Ok(out)
    }

    fn database_entry(&self, path: &Path, names: &[String]) -> Result<String> {
        if let Some(found) = self
            .config
            .database_entries
            .iter()
            .find(|candidate| names.contains(candidate))
        {
            return Ok(found.clone());
        }
        if names.iter().any(|n| n == DATABASE_ENTRY_21B) {
            return Err(EngineError::unreadable(
                path,
                "only a compressed collection.anki21b is present; that format is not supported",
            ));
        }
        Err(EngineError::unreadable(path, "no embedded collection database"))
    }

    fn is_reserved(&self, name: &str) -> bool {
        name == self.config.manifest_entry
            || name == DATABASE_ENTRY_21B
            || self.config.database_entries.iter().any(|d| d == name)
    }

    fn read_manifest(
        &self,
        path: &Path,
        archive: &mut ZipArchive<File>,
        names: &[String],
    ) -> MediaManifest {
        if !names.contains(&self.config.manifest_entry) {
            return MediaManifest::new();
        }
        let parsed = archive
            .by_name(&self.config.manifest_entry)
            .map_err(EngineError::from)
            .and_then(|mut file| {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)
                    .map_err(|e| EngineError::io(path, e))?;
                MediaManifest::from_json(&bytes)
            });
        parsed.unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "ignoring unreadable media manifest");
            MediaManifest::new()
        })
    }

    fn reconstruct(&self, kind: &NoteKind, raw: RawNote) -> CanonicalRecord {
        let values = codec::split(&raw.flds);
        let fields: HashMap<String, String> = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = kind
                    .fields
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("{}{i}", self.config.placeholder_prefix));
                (name, value.to_string())
            })
            .collect();
        if values.len() > kind.fields.len() && !kind.fields.is_empty() {
            debug!(
                note_id = raw.id,
                declared = kind.fields.len(),
                found = values.len(),
                "note has more values than declared fields"
            );
        }

        let mut rec = kind.normalizer.normalize(raw.id, raw.mid, &fields);
        if !raw.guid.is_empty() {
            rec.progress_key = raw.guid;
        }
        rec
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| EngineError::io(path, e))?;
    ZipArchive::new(file).map_err(|e| EngineError::unreadable(path, e.to_string()))
}

fn extract_entry(
    path: &Path,
    archive: &mut ZipArchive<File>,
    entry: &str,
    to: &Path,
) -> Result<()> {
    let mut src = archive
        .by_name(entry)
        .map_err(|e| EngineError::unreadable(path, format!("{entry}: {e}")))?;
    let mut dst = File::create(to).map_err(|e| EngineError::io(to, e))?;
    std::io::copy(&mut src, &mut dst)
        .map_err(|e| EngineError::unreadable(path, format!("{entry}: {e}")))?;
    Ok(())
}

fn raw_note(row: &Row<'_>) -> rusqlite::Result<RawNote> {
    Ok(RawNote {
        id: row.get(0)?,
        guid: row.get(1)?,
        mid: row.get(2)?,
        flds: row.get(3)?,
    })
}

fn load_cards(conn: &Connection) -> rusqlite::Result<Vec<CardInfo>> {
    let mut stmt = conn.prepare("SELECT id, nid, did, ord FROM cards ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(CardInfo {
            card_id: row.get(0)?,
            note_id: row.get(1)?,
            deck_id: row.get(2)?,
            ord: row.get::<_, i64>(3)?.max(0) as usize,
        })
    })?;
    rows.collect()
}
