use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::record::CanonicalRecord;

use super::{MediaSet, MediaSource, referenced_files};

/// Result of reconciling referenced media against available media.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaResolution {
    /// Files to embed, keyed by logical filename.
    pub embed: BTreeMap<String, MediaSource>,
    /// Referenced files with no available bytes.
    pub missing: BTreeSet<String>,
}

impl MediaResolution {
    /// Adds files referenced outside records (e.g. in templates) when available.
    ///
    /// Unavailable template-level references are ignored, not reported.
    pub fn extend_from_text(&mut self, text: &str, available: &MediaSet) {
        for name in referenced_files(text) {
            if let Some(src) = available.get(name) {
                self.embed.entry(name.to_string()).or_insert_with(|| src.clone());
            }
        }
    }
}

/// Computes the exact media set to embed for `records`.
///
/// Only media-capable fields are scanned. The output never contains a
/// filename absent from `available`, contains no unreferenced file, and does
/// not depend on record or map iteration order.
pub fn resolve<'a>(
    records: impl IntoIterator<Item = &'a CanonicalRecord>,
    available: &MediaSet,
) -> MediaResolution {
    let mut referenced = BTreeSet::new();
    for rec in records {
        for (_, value) in rec.media_fields() {
            referenced.extend(referenced_files(value).map(str::to_string));
        }
    }

    let mut out = MediaResolution::default();
    for name in referenced {
        match available.get(&name) {
            Some(src) => {
                out.embed.insert(name, src.clone());
            }
            None => {
                warn!(filename = %name, "referenced media not available");
                out.missing.insert(name);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> MediaSource {
        MediaSource::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn keeps_only_referenced_and_available() {
        let mut rec = CanonicalRecord::new(1, 1);
        rec.base_audio = "[sound:audio1.mp3]".into();
        rec.examples[0].target_audio = "[sound:audio2.mp3]".into();
        rec.full_source = "[sound:not_media_field.mp3]".into();

        let available: MediaSet = [
            ("audio1.mp3".to_string(), bytes("1")),
            ("unused.mp3".to_string(), bytes("u")),
            ("not_media_field.mp3".to_string(), bytes("n")),
        ]
        .into_iter()
        .collect();

        let res = resolve([&rec], &available);
        assert_eq!(res.embed.keys().collect::<Vec<_>>(), vec!["audio1.mp3"]);
        assert_eq!(res.missing.iter().collect::<Vec<_>>(), vec!["audio2.mp3"]);
    }

    #[test]
    fn template_text_only_adds_available_files() {
        let available: MediaSet = [("_silence.mp3".to_string(), bytes("s"))].into_iter().collect();
        let mut res = MediaResolution::default();
        res.extend_from_text("[sound:_silence.mp3][sound:_gone.mp3]", &available);
        assert_eq!(res.embed.len(), 1);
        assert!(res.missing.is_empty());
    }
}
