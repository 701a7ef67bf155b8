//! Flat row form of canonical records, for hand-edited spreadsheets.
//!
//! A row has one column per identifier and one per canonical field, keyed
//! by the current-generation wire name. Reading is forgiving: cells may be
//! numbers or nulls, identifiers default to zero, and a row that cannot be
//! converted is skipped and reported.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{EngineError, Result},
    package::PackageReader,
    record::{CanonicalRecord, Field},
    report::{Issue, ReadReport, RowReport},
};

/// Column holding the note id.
pub const NOTE_ID_COLUMN: &str = "note_id";
/// Column holding the note-type id.
pub const MODEL_ID_COLUMN: &str = "model_id";
/// File name of the table inside a contribution directory.
pub const CONTRIBUTION_CSV: &str = "cards.csv";
/// Media directory name inside a contribution directory.
pub const CONTRIBUTION_MEDIA_DIR: &str = "media";

/// One cell as it arrives from a spreadsheet or JSON source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Empty or null cell.
    Null,
    /// Boolean cell.
    Bool(bool),
    /// Integer cell.
    Integer(i64),
    /// Floating point cell.
    Float(f64),
    /// Text cell.
    Text(String),
}

impl Cell {
    /// Text content; null and NaN become empty, integral floats lose `.0`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) if f.is_nan() => String::new(),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (*f as i64).to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Numeric identifier; absent or blank is zero, `"12.0"` is 12.
    pub fn to_id(&self) -> std::result::Result<i64, String> {
        match self {
            Self::Null => Ok(0),
            Self::Integer(i) => Ok(*i),
            Self::Float(f) => float_id(*f).ok_or_else(|| format!("{f} is not an identifier")),
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0);
                }
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_id))
                    .ok_or_else(|| format!("{s:?} is not an identifier"))
            }
            Self::Bool(b) => Err(format!("{b} is not an identifier")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

fn float_id(f: f64) -> Option<i64> {
    if f.is_nan() {
        return Some(0);
    }
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}

/// Column name to cell.
pub type Row = BTreeMap<String, Cell>;

/// Column names in file order: identifiers, then every canonical field.
pub fn header() -> Vec<&'static str> {
    [NOTE_ID_COLUMN, MODEL_ID_COLUMN]
        .into_iter()
        .chain(Field::all().iter().map(|f| f.name()))
        .collect()
}

/// Flattens records into rows of text cells.
pub fn to_rows<'a>(records: impl IntoIterator<Item = &'a CanonicalRecord>) -> Vec<Row> {
    records
        .into_iter()
        .map(|rec| {
            let mut row = Row::new();
            row.insert(NOTE_ID_COLUMN.into(), Cell::Text(rec.note_id.to_string()));
            row.insert(MODEL_ID_COLUMN.into(), Cell::Text(rec.model_id.to_string()));
            for field in Field::all() {
                row.insert(field.name().into(), rec.get(*field).into());
            }
            row
        })
        .collect()
}

/// Rebuilds records from rows, skipping rows whose identifiers do not parse.
pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> (Vec<CanonicalRecord>, RowReport) {
    let mut report = RowReport::default();
    let records = convert(rows.into_iter().enumerate(), &mut report);
    (records, report)
}

fn convert(
    rows: impl Iterator<Item = (usize, Row)>,
    report: &mut RowReport,
) -> Vec<CanonicalRecord> {
    let mut out = Vec::new();
    for (idx, row) in rows {
        report.rows_seen += 1;
        let id = |col: &str| row.get(col).map_or(Ok(0), Cell::to_id);
        let (note_id, model_id) = match (id(NOTE_ID_COLUMN), id(MODEL_ID_COLUMN)) {
            (Ok(n), Ok(m)) => (n, m),
            (Err(reason), _) | (_, Err(reason)) => {
                warn!(row = idx, reason = %reason, "skipping row");
                report.issues.push(Issue::RowParseFailure {
                    row: idx,
                    note_id: None,
                    reason,
                });
                continue;
            }
        };

        let mut rec = CanonicalRecord::new(note_id, model_id);
        for field in Field::all() {
            if let Some(cell) = row.get(field.name()) {
                rec.set(*field, cell.to_text());
            }
        }
        out.push(rec);
    }
    report.records_loaded = out.len();
    out
}

/// Writes records as CSV with the canonical header.
pub fn write_csv<'a>(
    records: impl IntoIterator<Item = &'a CanonicalRecord>,
    path: &Path,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(header())?;
    for rec in records {
        let ids = [rec.note_id.to_string(), rec.model_id.to_string()];
        wtr.write_record(
            ids.iter()
                .map(String::as_str)
                .chain(Field::all().iter().map(|f| rec.get(*f))),
        )?;
    }
    wtr.flush().map_err(|e| EngineError::io(path, e))
}

/// Reads a CSV written by [`write_csv`] or edited by hand.
///
/// Columns are matched by header name; unknown columns are ignored and
/// missing ones read as empty. Lines the CSV parser rejects are skipped.
pub fn read_csv(path: &Path) -> Result<(Vec<CanonicalRecord>, RowReport)> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut report = RowReport::default();
    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        match result {
            Ok(line) => {
                let row: Row = headers
                    .iter()
                    .zip(line.iter())
                    .map(|(h, v)| (h.clone(), Cell::from(v)))
                    .collect();
                rows.push((idx, row));
            }
            Err(err) => {
                warn!(row = idx, error = %err, "skipping malformed CSV line");
                report.rows_seen += 1;
                report.issues.push(Issue::RowParseFailure {
                    row: idx,
                    note_id: None,
                    reason: err.to_string(),
                });
            }
        }
    }
    let records = convert(rows.into_iter(), &mut report);
    Ok((records, report))
}

/// Files produced by [`export_contribution_package`].
#[derive(Debug, Clone)]
pub struct ContributionExport {
    /// The written table.
    pub csv_path: PathBuf,
    /// Directory holding the media files.
    pub media_dir: PathBuf,
    /// Number of media files written.
    pub media_written: usize,
    /// Report of the underlying package read.
    pub read_report: ReadReport,
}

/// Unpacks a package into `out_dir` as `cards.csv` plus a `media/` directory.
pub fn export_contribution_package(apkg: &Path, out_dir: &Path) -> Result<ContributionExport> {
    let reader = PackageReader::default();
    let pkg = reader.read(apkg)?;
    let media = reader.read_media(apkg)?;

    let media_dir = out_dir.join(CONTRIBUTION_MEDIA_DIR);
    fs::create_dir_all(&media_dir).map_err(|e| EngineError::io(&media_dir, e))?;

    let mut names: Vec<&String> = media.keys().collect();
    names.sort();
    let mut media_written = 0;
    for name in names {
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name.as_str()) {
            warn!(filename = %name, "skipping media with a path-like name");
            continue;
        }
        let dest = media_dir.join(name);
        let bytes = media[name].load()?;
        fs::write(&dest, bytes).map_err(|e| EngineError::io(&dest, e))?;
        media_written += 1;
    }

    let csv_path = out_dir.join(CONTRIBUTION_CSV);
    write_csv(pkg.records.iter(), &csv_path)?;
    info!(
        package = %apkg.display(),
        out = %out_dir.display(),
        notes = pkg.records.len(),
        media = media_written,
        "exported contribution package"
    );

    Ok(ContributionExport {
        csv_path,
        media_dir,
        media_written,
        read_report: pkg.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_floats_and_blanks() {
        assert_eq!(Cell::Text("12.0".into()).to_id(), Ok(12));
        assert_eq!(Cell::Text("  ".into()).to_id(), Ok(0));
        assert_eq!(Cell::Null.to_id(), Ok(0));
        assert_eq!(Cell::Float(7.0).to_id(), Ok(7));
        assert!(Cell::Text("abc".into()).to_id().is_err());
        assert!(Cell::Float(1.5).to_id().is_err());
    }

    #[test]
    fn cells_coerce_to_text() {
        assert_eq!(Cell::Null.to_text(), "");
        assert_eq!(Cell::Integer(3).to_text(), "3");
        assert_eq!(Cell::Float(3.0).to_text(), "3");
        assert_eq!(Cell::Float(f64::NAN).to_text(), "");
        assert_eq!(Cell::Bool(true).to_text(), "true");
    }

    #[test]
    fn untagged_cells_from_json() {
        let row: Row = serde_json::from_str(
            r#"{"note_id": 5.0, "model_id": null, "base_source": "Hund", "frequency_rank": 12}"#,
        )
        .unwrap();
        let (records, report) = from_rows([row]);
        assert_eq!(report.records_loaded, 1);
        assert_eq!(records[0].note_id, 5);
        assert_eq!(records[0].model_id, 0);
        assert_eq!(records[0].base_source, "Hund");
        assert_eq!(records[0].frequency_rank, "12");
    }

    #[test]
    fn bad_identifier_skips_only_that_row() {
        let mut bad = Row::new();
        bad.insert(NOTE_ID_COLUMN.into(), Cell::Text("n/a".into()));
        let mut good = Row::new();
        good.insert("full_source".into(), Cell::Text("die Katze".into()));

        let (records, report) = from_rows([bad, good]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].note_id, 0);
        assert!(report.is_partial());
        assert!(matches!(
            report.issues[0],
            Issue::RowParseFailure { row: 0, .. }
        ));
    }
}
