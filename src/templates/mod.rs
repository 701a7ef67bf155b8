//! Note-type definitions, card templates, and subdeck routing.

/// Built-in note types.
pub mod registry;
/// Minimal card template renderer.
pub mod render;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    error::{EngineError, Result},
    record::CanonicalRecord,
    schema::{Normalizer, SchemaGeneration},
    types::{DeckId, ModelId},
};

pub use registry::TemplateRegistry;

/// Destination subdeck for the cards of one template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeckRoute {
    /// Subdeck id, stable across exports.
    pub id: DeckId,
    /// Subdeck name below the parent deck.
    pub name: String,
}

/// One front/back render rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Template name.
    pub name: String,
    /// Question side.
    pub front: String,
    /// Answer side.
    pub back: String,
    /// Subdeck override; `None` keeps cards in the parent deck.
    pub deck: Option<DeckRoute>,
}

/// Ordered fields, templates, and style of one note type.
///
/// Field order is the positional encoding of the packed field blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTypeDefinition {
    /// Model id; constant for a deck family.
    pub id: ModelId,
    /// Display name.
    pub name: String,
    /// Field names in blob order.
    pub fields: Vec<String>,
    /// Card templates in ordinal order.
    pub templates: Vec<TemplateDefinition>,
    /// Shared style text.
    pub css: String,
    /// Index of the field used for browser sorting.
    pub sort_field: usize,
}

/// Rendered sides of one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPreview {
    /// Rendered question.
    pub front: String,
    /// Rendered answer, with `{{FrontSide}}` expanded.
    pub back: String,
}

impl NoteTypeDefinition {
    /// Naming generation of this note type's fields.
    pub fn generation(&self) -> SchemaGeneration {
        SchemaGeneration::detect(self.fields.iter().map(String::as_str))
    }

    /// Checks field names and template references.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| EngineError::InvalidNoteType {
            name: self.name.clone(),
            reason,
        };

        if self.fields.is_empty() {
            return Err(invalid("no fields".into()));
        }
        let mut seen = HashSet::new();
        for name in &self.fields {
            if name.trim().is_empty() {
                return Err(invalid("empty field name".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("duplicate field {name:?}")));
            }
        }
        if self.sort_field >= self.fields.len() {
            return Err(invalid(format!("sort field {} out of range", self.sort_field)));
        }
        if self.templates.is_empty() {
            return Err(invalid("no templates".into()));
        }
        for tmpl in &self.templates {
            for side in [&tmpl.front, &tmpl.back] {
                if let Some(unknown) = render::referenced_fields(side)
                    .into_iter()
                    .find(|f| !seen.contains(f.as_str()))
                {
                    return Err(invalid(format!(
                        "template {:?} refers to unknown field {unknown:?}",
                        tmpl.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Field values of `rec` in declared order.
    pub fn field_values<'r>(&self, rec: &'r CanonicalRecord) -> Vec<&'r str> {
        let norm = Normalizer::with_generation(self.generation());
        self.fields.iter().map(|name| norm.value_for(rec, name)).collect()
    }

    /// Packed field blob of `rec` under this note type.
    pub fn encode(&self, rec: &CanonicalRecord) -> String {
        codec::join(&self.field_values(rec))
    }

    /// Distinct subdeck routes, in template order.
    pub fn routes(&self) -> Vec<&DeckRoute> {
        let mut out: Vec<&DeckRoute> = Vec::new();
        for route in self.templates.iter().filter_map(|t| t.deck.as_ref()) {
            if !out.iter().any(|r| r.id == route.id) {
                out.push(route);
            }
        }
        out
    }

    /// Renders template `ord` for `rec`.
    pub fn preview(&self, ord: usize, rec: &CanonicalRecord) -> Option<CardPreview> {
        let tmpl = self.templates.get(ord)?;
        let values: HashMap<&str, &str> = self
            .fields
            .iter()
            .map(String::as_str)
            .zip(self.field_values(rec))
            .collect();
        let front = render::render(&tmpl.front, &values);
        let back = {
            let mut with_front = values.clone();
            with_front.insert(render::FRONT_SIDE, &front);
            render::render(&tmpl.back, &with_front)
        };
        Some(CardPreview { front, back })
    }

    /// Front, back, and style text, for template-level media scanning.
    pub fn template_text(&self) -> impl Iterator<Item = &str> {
        self.templates
            .iter()
            .flat_map(|t| [t.front.as_str(), t.back.as_str()])
            .chain(std::iter::once(self.css.as_str()))
    }
}
