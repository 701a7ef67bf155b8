use std::collections::BTreeSet;
use std::path::Path;

use apkgio::{
    config::WriterConfig,
    media::{self, MediaCache, MediaSet, MediaSource, cache::media_filename_for},
    package::{DeckSpec, PackageReader, PackageWriter},
    record::CanonicalRecord,
    report::Issue,
    templates::{TemplateRegistry, registry::FOUR_SUBDECKS},
};
use tempfile::TempDir;

const SILENCE: &str = "_1-minute-of-silence.mp3";

fn deck() -> DeckSpec {
    DeckSpec {
        id: 77,
        name: "Media".into(),
    }
}

fn available(names: &[&str]) -> MediaSet {
    names
        .iter()
        .map(|n| (n.to_string(), MediaSource::Bytes(format!("bytes of {n}").into_bytes())))
        .collect()
}

fn record_with_audio(id: i64, base_audio: &str) -> CanonicalRecord {
    let mut rec = CanonicalRecord::new(id, 0);
    rec.full_source = format!("Wort {id}");
    rec.base_source = format!("Wort{id}");
    rec.base_audio = base_audio.to_string();
    rec
}

fn write(records: &[CanonicalRecord], media: &MediaSet, out: &Path, config: WriterConfig) -> apkgio::report::WriteReport {
    let registry = TemplateRegistry::builtin();
    let nt = registry.get(FOUR_SUBDECKS).expect("four-subdecks");
    PackageWriter::new(config)
        .write(records.iter(), nt, &deck(), media, out)
        .expect("write")
}

#[test]
fn only_referenced_available_media_is_embedded() {
    let tmp = TempDir::new().expect("tmp");
    let records = vec![record_with_audio(1, "[sound:a1b2c3d4e5f6.mp3]")];
    let media = available(&["a1b2c3d4e5f6.mp3", "unused1.mp3", "unused2.mp3"]);
    let out = tmp.path().join("one.apkg");

    let report = write(&records, &media, &out, WriterConfig::default());
    assert_eq!(report.media_embedded.len(), 1);
    assert!(report.issues.is_empty());

    let reader = PackageReader::default();
    let pkg = reader.read(&out).expect("read");
    assert_eq!(pkg.manifest.len(), 1);
    assert_eq!(pkg.archive_entries, vec!["0"]);
    let extracted = reader.read_media(&out).expect("media");
    assert_eq!(
        extracted.get("a1b2c3d4e5f6.mp3"),
        Some(&MediaSource::Bytes(b"bytes of a1b2c3d4e5f6.mp3".to_vec()))
    );
}

#[test]
fn missing_media_is_reported_not_fatal() {
    let tmp = TempDir::new().expect("tmp");
    let records = vec![
        record_with_audio(1, "[sound:present.mp3]"),
        record_with_audio(2, "[sound:absent.mp3]"),
    ];
    let out = tmp.path().join("partial.apkg");

    let report = write(&records, &available(&["present.mp3"]), &out, WriterConfig::default());
    assert_eq!(report.notes_written, 2);
    assert_eq!(report.media_missing(), BTreeSet::from(["absent.mp3"]));
    assert!(report.issues.contains(&Issue::MediaUnresolved {
        filename: "absent.mp3".into()
    }));
    assert_eq!(
        PackageReader::default().read(&out).expect("read").media_files,
        BTreeSet::from(["present.mp3".to_string()])
    );
}

#[test]
fn template_media_follows_config() {
    let tmp = TempDir::new().expect("tmp");
    let records = vec![record_with_audio(1, "")];
    let media = available(&[SILENCE]);

    let with = write(&records, &media, &tmp.path().join("with.apkg"), WriterConfig::default());
    assert!(with.media_embedded.contains(SILENCE));

    let without = write(
        &records,
        &media,
        &tmp.path().join("without.apkg"),
        WriterConfig {
            embed_template_media: false,
            ..WriterConfig::default()
        },
    );
    assert!(without.media_embedded.is_empty());
}

#[test]
fn many_files_keep_manifest_keys_aligned() {
    let tmp = TempDir::new().expect("tmp");
    let names: Vec<String> = (0..12).map(|i| format!("clip{i:02}.mp3")).collect();
    let records: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, n)| record_with_audio(i as i64 + 1, &media::sound_token(n)))
        .collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let out = tmp.path().join("many.apkg");
    write(&records, &available(&refs), &out, WriterConfig::default());

    let extracted = PackageReader::default().read_media(&out).expect("media");
    assert_eq!(extracted.len(), 12);
    for name in &names {
        assert_eq!(
            extracted.get(name),
            Some(&MediaSource::Bytes(format!("bytes of {name}").into_bytes())),
            "{name}"
        );
    }
}

#[test]
fn media_dir_and_cache_feed_the_writer() {
    let tmp = TempDir::new().expect("tmp");
    let cache = MediaCache::open(tmp.path().join("cache")).expect("cache");
    let text = "Der Hund bellt.";
    let key = MediaCache::key_for(text, "de-DE-Standard-A", 1.0);
    cache.put(&key, b"synthesized").expect("put");

    let filename = media_filename_for(text, "de", "mp3");
    let media_dir = tmp.path().join("media");
    std::fs::create_dir_all(&media_dir).expect("media dir");
    let bytes = cache.get(&key).expect("get").expect("cached");
    std::fs::write(media_dir.join(&filename), bytes).expect("write media");

    let mut rec = record_with_audio(1, "");
    rec.examples[0].source = text.into();
    rec.examples[0].source_audio = media::sound_token(&filename);

    let available = media::media_set_from_dir(&media_dir).expect("scan");
    let report = write(&[rec], &available, &tmp.path().join("tts.apkg"), WriterConfig::default());
    assert_eq!(report.media_embedded, BTreeSet::from([filename]));
}
