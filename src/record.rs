//! Canonical record, field set, and sparse field-level patches.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{EXAMPLE_SLOTS, ModelId, NoteId};

/// One numbered example sentence with its translation and audio slots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExampleSentence {
    /// Sentence in the source language.
    pub source: String,
    /// Sentence translated to the target language.
    pub target: String,
    /// Media token for the source sentence.
    pub source_audio: String,
    /// Media token for the translated sentence.
    pub target_audio: String,
}

/// Generation-independent representation of one learnable unit.
///
/// Every text field defaults to the empty string; the model never
/// distinguishes "empty" from "absent".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Note identifier.
    pub note_id: NoteId,
    /// Note-type identifier.
    pub model_id: ModelId,
    /// Opaque key the consuming application matches notes on across imports.
    pub progress_key: String,
    /// Zero-padded frequency rank for browser ordering.
    pub frequency_rank: String,
    /// Original insertion-order marker.
    pub original_order: String,
    /// Full source phrase.
    pub full_source: String,
    /// Source base form.
    pub base_source: String,
    /// Base translation.
    pub base_target: String,
    /// Grammatical article.
    pub article: String,
    /// Plural form.
    pub plural: String,
    /// Pronunciation text.
    pub audio_text: String,
    /// Media token for the full source phrase.
    pub full_source_audio: String,
    /// Media token for the source base form.
    pub base_audio: String,
    /// Media token for the base translation.
    pub base_target_audio: String,
    /// Example sentences, slot 1 at index 0.
    pub examples: [ExampleSentence; EXAMPLE_SLOTS],
}

impl CanonicalRecord {
    /// Creates an empty record carrying only its numeric identifiers.
    pub fn new(note_id: NoteId, model_id: ModelId) -> Self {
        Self {
            note_id,
            model_id,
            ..Self::default()
        }
    }

    /// Returns the value of `field`.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::ProgressKey => &self.progress_key,
            Field::FrequencyRank => &self.frequency_rank,
            Field::OriginalOrder => &self.original_order,
            Field::FullSource => &self.full_source,
            Field::BaseSource => &self.base_source,
            Field::BaseTarget => &self.base_target,
            Field::Article => &self.article,
            Field::Plural => &self.plural,
            Field::AudioText => &self.audio_text,
            Field::FullSourceAudio => &self.full_source_audio,
            Field::BaseAudio => &self.base_audio,
            Field::BaseTargetAudio => &self.base_target_audio,
            Field::ExampleSource(n) => &self.examples[slot_index(n)].source,
            Field::ExampleTarget(n) => &self.examples[slot_index(n)].target,
            Field::ExampleAudio(n) => &self.examples[slot_index(n)].source_audio,
            Field::ExampleTargetAudio(n) => &self.examples[slot_index(n)].target_audio,
        }
    }

    /// Returns a mutable handle to the value of `field`.
    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::ProgressKey => &mut self.progress_key,
            Field::FrequencyRank => &mut self.frequency_rank,
            Field::OriginalOrder => &mut self.original_order,
            Field::FullSource => &mut self.full_source,
            Field::BaseSource => &mut self.base_source,
            Field::BaseTarget => &mut self.base_target,
            Field::Article => &mut self.article,
            Field::Plural => &mut self.plural,
            Field::AudioText => &mut self.audio_text,
            Field::FullSourceAudio => &mut self.full_source_audio,
            Field::BaseAudio => &mut self.base_audio,
            Field::BaseTargetAudio => &mut self.base_target_audio,
            Field::ExampleSource(n) => &mut self.examples[slot_index(n)].source,
            Field::ExampleTarget(n) => &mut self.examples[slot_index(n)].target,
            Field::ExampleAudio(n) => &mut self.examples[slot_index(n)].source_audio,
            Field::ExampleTargetAudio(n) => &mut self.examples[slot_index(n)].target_audio,
        }
    }

    /// Overwrites `field` with `value`.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.get_mut(field) = value.into();
    }

    /// Iterates the media-capable fields with their current values.
    pub fn media_fields(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        Field::all()
            .iter()
            .copied()
            .filter(|f| f.is_media())
            .map(move |f| (f, self.get(f)))
    }
}

/// Canonical text field of a [`CanonicalRecord`].
///
/// Example slots are 1-based (`1..=9`). Accessors panic on a slot outside
/// that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// `original_guid`
    ProgressKey,
    /// `frequency_rank`
    FrequencyRank,
    /// `original_order`
    OriginalOrder,
    /// `full_source`
    FullSource,
    /// `base_source`
    BaseSource,
    /// `base_target`
    BaseTarget,
    /// `artikel_d`
    Article,
    /// `plural_d`
    Plural,
    /// `audio_text_d`
    AudioText,
    /// `sN_source`
    ExampleSource(u8),
    /// `sN_target`
    ExampleTarget(u8),
    /// `full_source_audio`
    FullSourceAudio,
    /// `base_audio`
    BaseAudio,
    /// `sN_audio`
    ExampleAudio(u8),
    /// `base_target_audio`
    BaseTargetAudio,
    /// `sN_target_audio`
    ExampleTargetAudio(u8),
}

static FIELDS: LazyLock<Vec<(Field, String)>> = LazyLock::new(|| {
    let mut out = vec![
        (Field::ProgressKey, "original_guid".to_string()),
        (Field::FrequencyRank, "frequency_rank".to_string()),
        (Field::OriginalOrder, "original_order".to_string()),
        (Field::FullSource, "full_source".to_string()),
        (Field::BaseSource, "base_source".to_string()),
        (Field::BaseTarget, "base_target".to_string()),
        (Field::Article, "artikel_d".to_string()),
        (Field::Plural, "plural_d".to_string()),
        (Field::AudioText, "audio_text_d".to_string()),
    ];
    for n in 1..=EXAMPLE_SLOTS as u8 {
        out.push((Field::ExampleSource(n), format!("s{n}_source")));
        out.push((Field::ExampleTarget(n), format!("s{n}_target")));
    }
    out.push((Field::FullSourceAudio, "full_source_audio".to_string()));
    out.push((Field::BaseAudio, "base_audio".to_string()));
    for n in 1..=EXAMPLE_SLOTS as u8 {
        out.push((Field::ExampleAudio(n), format!("s{n}_audio")));
    }
    out.push((Field::BaseTargetAudio, "base_target_audio".to_string()));
    for n in 1..=EXAMPLE_SLOTS as u8 {
        out.push((Field::ExampleTargetAudio(n), format!("s{n}_target_audio")));
    }
    out
});

static FIELD_LIST: LazyLock<Vec<Field>> = LazyLock::new(|| FIELDS.iter().map(|(f, _)| *f).collect());

static BY_NAME: LazyLock<HashMap<&'static str, Field>> =
    LazyLock::new(|| FIELDS.iter().map(|(f, name)| (name.as_str(), *f)).collect());

impl Field {
    /// All canonical fields in canonical column order.
    pub fn all() -> &'static [Field] {
        &FIELD_LIST
    }

    /// Canonical (current-generation) wire name.
    pub fn name(self) -> &'static str {
        &FIELDS[self.position()].1
    }

    /// Looks up a field by its canonical wire name.
    pub fn from_name(name: &str) -> Option<Field> {
        BY_NAME.get(name).copied()
    }

    /// True for fields that hold a media token.
    pub fn is_media(self) -> bool {
        matches!(
            self,
            Field::FullSourceAudio
                | Field::BaseAudio
                | Field::BaseTargetAudio
                | Field::ExampleAudio(_)
                | Field::ExampleTargetAudio(_)
        )
    }

    /// True for source-language content, which external transforms never rewrite.
    pub fn is_source_content(self) -> bool {
        matches!(
            self,
            Field::FullSource
                | Field::BaseSource
                | Field::Article
                | Field::Plural
                | Field::AudioText
                | Field::ExampleSource(_)
        )
    }

    fn position(self) -> usize {
        match self {
            Field::ProgressKey => 0,
            Field::FrequencyRank => 1,
            Field::OriginalOrder => 2,
            Field::FullSource => 3,
            Field::BaseSource => 4,
            Field::BaseTarget => 5,
            Field::Article => 6,
            Field::Plural => 7,
            Field::AudioText => 8,
            Field::ExampleSource(n) => 9 + 2 * slot_index(n),
            Field::ExampleTarget(n) => 10 + 2 * slot_index(n),
            Field::FullSourceAudio => 27,
            Field::BaseAudio => 28,
            Field::ExampleAudio(n) => 29 + slot_index(n),
            Field::BaseTargetAudio => 38,
            Field::ExampleTargetAudio(n) => 39 + slot_index(n),
        }
    }
}

fn slot_index(n: u8) -> usize {
    let n = usize::from(n);
    assert!(
        (1..=EXAMPLE_SLOTS).contains(&n),
        "example slot {n} outside 1..={EXAMPLE_SLOTS}"
    );
    n - 1
}

/// Sparse patch where each entry overwrites one record field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordPatch {
    fields: BTreeMap<Field, String>,
}

impl RecordPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an overwrite of `field` with `value`.
    pub fn set(mut self, field: Field, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields touched by this patch with their new values.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Returns true when the patch writes `field`.
    pub fn touches(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Captures an inverse patch for all fields present in `self`.
    pub fn capture_inverse_for(&self, rec: &CanonicalRecord) -> Self {
        Self {
            fields: self
                .fields
                .keys()
                .map(|f| (*f, rec.get(*f).to_string()))
                .collect(),
        }
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut CanonicalRecord) {
        for (field, value) in &self.fields {
            rec.set(*field, value.clone());
        }
    }
}
