use std::fs;
use std::io::Write;
use std::path::Path;

use hashbrown::HashSet;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::{
    codec,
    config::WriterConfig,
    error::{EngineError, Result},
    media::{MediaManifest, MediaSet, resolve},
    record::CanonicalRecord,
    report::{Issue, WriteReport},
    templates::NoteTypeDefinition,
    types::{DATABASE_ENTRY, DeckId, MEDIA_MANIFEST_ENTRY, NoteId},
};

use super::{SCHEMA, SCHEMA_VERSION, collection, now_millis};

/// Parent deck of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSpec {
    /// Deck id, stable across exports of the same deck.
    pub id: DeckId,
    /// Deck name; subdecks are filed as `name::child`.
    pub name: String,
}

/// Writes canonical records into a package.
#[derive(Debug, Clone, Default)]
pub struct PackageWriter {
    config: WriterConfig,
}

/// A record with its output identity settled.
struct PlannedNote<'a> {
    id: NoteId,
    guid: String,
    rec: &'a CanonicalRecord,
}

impl PackageWriter {
    /// Creates a writer with explicit settings.
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    /// Writes `records` under `note_type` into a new package at `out`.
    ///
    /// Records keep their note id when it is positive and unique, and their
    /// progress key when they carry one; missing keys are derived from
    /// source content. Only referenced media present in `media` is embedded.
    /// The package is assembled next to `out` and moved into place, then
    /// checked for existence and plausible size.
    pub fn write<'a>(
        &self,
        records: impl IntoIterator<Item = &'a CanonicalRecord>,
        note_type: &NoteTypeDefinition,
        deck: &DeckSpec,
        media: &MediaSet,
        out: &Path,
    ) -> Result<WriteReport> {
        note_type.validate()?;
        let records: Vec<&CanonicalRecord> = records.into_iter().collect();
        let mut report = WriteReport::default();
        let now = now_millis();

        let notes = plan_notes(&records, note_type, now, &mut report);

        let mut resolution = resolve(records.iter().copied(), media);
        if self.config.embed_template_media {
            for text in note_type.template_text() {
                resolution.extend_from_text(text, media);
            }
        }
        report
            .issues
            .extend(resolution.missing.iter().map(|filename| Issue::MediaUnresolved {
                filename: filename.clone(),
            }));
        let manifest = MediaManifest::assign(resolution.embed.keys().map(String::as_str));

        let scratch = TempDir::new().map_err(|e| EngineError::io(std::env::temp_dir(), e))?;
        let db_path = scratch.path().join(DATABASE_ENTRY);
        report.cards_written = build_collection(&db_path, &notes, note_type, deck, now)?;
        report.notes_written = notes.len();
        let db_bytes = fs::read(&db_path).map_err(|e| EngineError::io(&db_path, e))?;

        let dir = match out.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| EngineError::io(&dir, e))?;
        {
            let options =
                SimpleFileOptions::default().compression_method(self.config.compression.method());
            let mut zip = ZipWriter::new(tmp.as_file_mut());
            zip.start_file(DATABASE_ENTRY, options)?;
            zip.write_all(&db_bytes).map_err(|e| EngineError::io(out, e))?;

            // Keys follow the order `MediaManifest::assign` numbered the files in.
            for (key, (name, src)) in resolution.embed.iter().enumerate() {
                zip.start_file(key.to_string(), options)?;
                zip.write_all(&src.load()?).map_err(|e| EngineError::io(out, e))?;
                debug!(key, filename = %name, "embedded media");
            }

            zip.start_file(MEDIA_MANIFEST_ENTRY, options)?;
            zip.write_all(&manifest.to_json()?)
                .map_err(|e| EngineError::io(out, e))?;
            zip.finish()?;
        }
        tmp.persist(out).map_err(|e| EngineError::io(out, e.error))?;

        report.package_bytes = self.verify(out)?;
        report.media_embedded = resolution.embed.into_keys().collect();
        info!(
            path = %out.display(),
            notes = report.notes_written,
            cards = report.cards_written,
            media = report.media_embedded.len(),
            missing_media = resolution.missing.len(),
            bytes = report.package_bytes,
            "wrote package"
        );
        Ok(report)
    }

    /// Checks the produced file; removes it when implausible.
    fn verify(&self, out: &Path) -> Result<u64> {
        let fail = |reason: String| {
            let _ = fs::remove_file(out);
            EngineError::WriteVerification {
                path: out.to_path_buf(),
                reason,
            }
        };
        let len = fs::metadata(out)
            .map_err(|e| fail(format!("output missing: {e}")))?
            .len();
        if len <= self.config.min_package_bytes {
            return Err(fail(format!(
                "{len} bytes, expected more than {}",
                self.config.min_package_bytes
            )));
        }
        Ok(len)
    }
}

/// Settles note ids and progress keys for every record.
fn plan_notes<'a>(
    records: &[&'a CanonicalRecord],
    note_type: &NoteTypeDefinition,
    now: i64,
    report: &mut WriteReport,
) -> Vec<PlannedNote<'a>> {
    let mut used_ids: HashSet<NoteId> = HashSet::new();
    let reuse: Vec<bool> = records
        .iter()
        .map(|r| r.note_id > 0 && used_ids.insert(r.note_id))
        .collect();
    let mut next_id = now.max(used_ids.iter().copied().max().unwrap_or(0) + 1);

    let mut used_keys: HashSet<String> = records
        .iter()
        .filter(|r| !r.progress_key.is_empty())
        .map(|r| r.progress_key.clone())
        .collect();

    let mut carried: HashSet<&str> = HashSet::new();
    let mut notes = Vec::with_capacity(records.len());
    for (rec, keep_id) in records.iter().copied().zip(reuse) {
        let id = if keep_id {
            rec.note_id
        } else {
            while used_ids.contains(&next_id) {
                next_id += 1;
            }
            used_ids.insert(next_id);
            report.note_ids_assigned += 1;
            next_id
        };

        let guid = if rec.progress_key.is_empty() {
            report.progress_keys_synthesized += 1;
            synthesize_key(rec, note_type, id, &mut used_keys, report)
        } else if !carried.insert(rec.progress_key.as_str()) {
            warn!(
                note_id = id,
                key = %rec.progress_key,
                "progress key already carried by an earlier note, synthesizing"
            );
            report.issues.push(Issue::DuplicateProgressKey {
                note_id: id,
                key: rec.progress_key.clone(),
            });
            report.progress_keys_synthesized += 1;
            synthesize_key(rec, note_type, id, &mut used_keys, report)
        } else {
            rec.progress_key.clone()
        };
        notes.push(PlannedNote { id, guid, rec });
    }
    notes
}

/// Content-derived key, rehashed with a counter until it is unused.
fn synthesize_key(
    rec: &CanonicalRecord,
    note_type: &NoteTypeDefinition,
    note_id: NoteId,
    used: &mut HashSet<String>,
    report: &mut WriteReport,
) -> String {
    let parts = [
        rec.full_source.as_str(),
        rec.base_source.as_str(),
        rec.original_order.as_str(),
    ];
    let mut key = codec::guid_for(note_type.id, &parts);
    let mut attempt = 0u32;
    while used.contains(&key) {
        attempt += 1;
        let salt = attempt.to_string();
        key = codec::guid_for(note_type.id, &[parts[0], parts[1], parts[2], salt.as_str()]);
    }
    if attempt > 0 {
        warn!(note_id, attempts = attempt, "synthesized progress key collided, rehashed");
        report.issues.push(Issue::ProgressKeyCollision { note_id });
    }
    used.insert(key.clone());
    key
}

/// Creates the collection database and returns the number of cards.
fn build_collection(
    db_path: &Path,
    notes: &[PlannedNote<'_>],
    note_type: &NoteTypeDefinition,
    deck: &DeckSpec,
    now: i64,
) -> Result<usize> {
    let db = |e: rusqlite::Error| EngineError::database(db_path, e);
    let secs = now / 1000;

    let mut conn = Connection::open(db_path).map_err(db)?;
    conn.execute_batch(SCHEMA).map_err(db)?;
    let tx = conn.transaction().map_err(db)?;

    tx.execute(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
         VALUES (1, ?1, ?2, ?2, ?3, 0, 0, 0, ?4, ?5, ?6, ?7, '{}')",
        params![
            secs,
            now,
            SCHEMA_VERSION,
            collection::conf_json(note_type.id),
            collection::models_json(note_type, deck.id, secs)?,
            collection::decks_json(deck, &note_type.routes(), secs)?,
            collection::dconf_json(),
        ],
    )
    .map_err(db)?;

    let mut cards = 0usize;
    {
        let mut insert_note = tx
            .prepare(
                "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
                 VALUES (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
            )
            .map_err(db)?;
        let mut insert_card = tx
            .prepare(
                "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor,
                                    reps, lapses, left, odue, odid, flags, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, -1, 0, 0, ?6, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            )
            .map_err(db)?;

        let mut card_id = now;
        for (pos, note) in notes.iter().enumerate() {
            let values = note_type.field_values(note.rec);
            let first = values.first().copied().unwrap_or("");
            let sort = values.get(note_type.sort_field).copied().unwrap_or(first);
            insert_note
                .execute(params![
                    note.id,
                    note.guid,
                    note_type.id,
                    secs,
                    codec::join(&values),
                    codec::strip_html(sort),
                    codec::field_checksum(first),
                ])
                .map_err(db)?;

            for (ord, tmpl) in note_type.templates.iter().enumerate() {
                let did = tmpl.deck.as_ref().map_or(deck.id, |r| r.id);
                insert_card
                    .execute(params![card_id, note.id, did, ord as i64, secs, pos as i64 + 1])
                    .map_err(db)?;
                card_id += 1;
                cards += 1;
            }
        }
    }
    tx.commit().map_err(db)?;
    conn.close().map_err(|(_, e)| db(e))?;
    Ok(cards)
}
