use apkgio::{
    media::{MediaSet, MediaSource},
    package::{DeckSpec, PackageWriter},
    record::CanonicalRecord,
    report::Issue,
    tabular,
    templates::{TemplateRegistry, registry::BIDIRECTIONAL},
};
use tempfile::TempDir;

fn sample(note_id: i64, word: &str) -> CanonicalRecord {
    let mut rec = CanonicalRecord::new(note_id, 1_607_392_321);
    rec.progress_key = format!("key-{note_id}");
    rec.frequency_rank = format!("{note_id:04}");
    rec.full_source = format!("der {word}");
    rec.base_source = word.to_string();
    rec.base_target = "dog".into();
    rec.examples[0].source = "Er sagte: \"Hund, komm!\"\nDann lief er.".into();
    rec.examples[0].target = "He said: \"Dog, come!\"\nThen he ran.".into();
    rec
}

#[test]
fn csv_preserves_quotes_commas_and_newlines() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("cards.csv");
    let records = vec![sample(1, "Hund"), sample(2, "Hund, der")];

    tabular::write_csv(&records, &path).expect("write csv");
    let (back, report) = tabular::read_csv(&path).expect("read csv");

    assert_eq!(report.rows_seen, 2);
    assert!(report.issues.is_empty());
    assert_eq!(back, records);
}

#[test]
fn hand_edited_csv_is_read_forgivingly() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("edited.csv");
    std::fs::write(
        &path,
        "note_id,model_id,full_source,base_target,comment\n\
         12.0,,die Katze,cat,ignored column\n\
         oops,3,das Haus,house,\n\
         ,,der Baum,tree,\n",
    )
    .expect("write");

    let (records, report) = tabular::read_csv(&path).expect("read csv");
    assert_eq!(report.rows_seen, 3);
    assert_eq!(report.records_loaded, 2);
    assert!(matches!(
        &report.issues[..],
        [Issue::RowParseFailure { row: 1, note_id: None, .. }]
    ));

    assert_eq!(records[0].note_id, 12);
    assert_eq!(records[0].model_id, 0);
    assert_eq!(records[0].full_source, "die Katze");
    assert_eq!(records[0].base_target, "cat");
    assert_eq!(records[0].examples[3].source, "");
    assert_eq!(records[1].note_id, 0);
    assert_eq!(records[1].full_source, "der Baum");
}

#[test]
fn header_lists_identifiers_then_every_field() {
    let header = tabular::header();
    assert_eq!(&header[..3], ["note_id", "model_id", "original_guid"]);
    assert_eq!(header.len(), 50);
    assert!(header.contains(&"s9_target_audio"));
}

#[test]
fn contribution_export_writes_table_and_media() {
    let tmp = TempDir::new().expect("tmp");
    let registry = TemplateRegistry::builtin();
    let nt = registry.get(BIDIRECTIONAL).expect("bidirectional");

    let mut rec = sample(5, "Hund");
    rec.base_audio = "[sound:hund.mp3]".into();
    let media: MediaSet = [("hund.mp3".to_string(), MediaSource::Bytes(b"ID3".to_vec()))]
        .into_iter()
        .collect();
    let apkg = tmp.path().join("deck.apkg");
    PackageWriter::default()
        .write(
            [&rec],
            nt,
            &DeckSpec {
                id: 9,
                name: "Deck".into(),
            },
            &media,
            &apkg,
        )
        .expect("write package");

    let out = tmp.path().join("contrib");
    let export = tabular::export_contribution_package(&apkg, &out).expect("export");
    assert_eq!(export.csv_path, out.join("cards.csv"));
    assert_eq!(export.media_written, 1);
    assert_eq!(
        std::fs::read(export.media_dir.join("hund.mp3")).expect("media file"),
        b"ID3"
    );

    let (records, report) = tabular::read_csv(&export.csv_path).expect("read csv");
    assert!(!report.is_partial());
    assert_eq!(records, vec![rec]);
}
