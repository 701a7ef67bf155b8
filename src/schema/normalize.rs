use hashbrown::HashMap;

use crate::{
    record::CanonicalRecord,
    types::{ModelId, NoteId},
};

use super::SchemaGeneration;

/// Maps raw field-name/value maps of one note type onto canonical records.
///
/// The generation is resolved once, from the note type's declared field
/// order, and reused for every note of that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    generation: SchemaGeneration,
}

impl Normalizer {
    /// Builds a normalizer for a note type with the given field order.
    pub fn for_fields<'a>(field_order: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            generation: SchemaGeneration::detect(field_order),
        }
    }

    /// Builds a normalizer for an already known generation.
    pub fn with_generation(generation: SchemaGeneration) -> Self {
        Self { generation }
    }

    /// Generation this normalizer maps from.
    pub fn generation(&self) -> SchemaGeneration {
        self.generation
    }

    /// Produces one canonical record. Never fails: unmapped or missing
    /// fields stay empty.
    pub fn normalize(
        &self,
        note_id: NoteId,
        model_id: ModelId,
        raw: &HashMap<String, String>,
    ) -> CanonicalRecord {
        let mut rec = CanonicalRecord::new(note_id, model_id);
        for (name, value) in raw {
            if let Some(field) = self.generation.field_for(name) {
                rec.set(field, value.as_str());
            }
        }
        rec
    }

    /// Inverse of [`normalize`](Self::normalize) for one declared field name.
    pub fn value_for<'r>(&self, rec: &'r CanonicalRecord, name: &str) -> &'r str {
        self.generation
            .field_for(name)
            .map(|f| rec.get(f))
            .unwrap_or("")
    }
}
