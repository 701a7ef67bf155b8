//! Field-naming generations and the mapping onto canonical fields.

/// Raw field map to canonical record conversion.
pub mod normalize;

use std::sync::LazyLock;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::record::Field;

pub use normalize::Normalizer;

/// Historical field-naming scheme of a note type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaGeneration {
    /// Original deck naming: `full_d`, `base_e`, `s1`, `s1e`, `s1a`, ...
    Legacy,
    /// Translated deck naming: `full_source`, `base_target`, `s1_source`, ...
    Current,
    /// No generation's markers found; same-named fields map straight through.
    Unknown,
}

const LEGACY_MARKERS: [&str; 3] = ["full_d", "base_d", "base_e"];
const CURRENT_MARKERS: [&str; 3] = ["full_source", "base_source", "base_target"];

static LEGACY_BY_NAME: LazyLock<HashMap<String, Field>> = LazyLock::new(|| {
    Field::all()
        .iter()
        .map(|f| (SchemaGeneration::Legacy.wire_name(*f), *f))
        .collect()
});

impl SchemaGeneration {
    /// Classifies a note type from its field names.
    ///
    /// Any legacy marker selects [`Legacy`](Self::Legacy); current markers
    /// alone select [`Current`](Self::Current); otherwise [`Unknown`](Self::Unknown).
    pub fn detect<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut legacy = false;
        let mut current = false;
        for name in names {
            legacy |= LEGACY_MARKERS.contains(&name);
            current |= CURRENT_MARKERS.contains(&name);
        }
        match (legacy, current) {
            (true, _) => Self::Legacy,
            (false, true) => Self::Current,
            (false, false) => Self::Unknown,
        }
    }

    /// Name this generation stores `field` under.
    pub fn wire_name(self, field: Field) -> String {
        match self {
            Self::Current | Self::Unknown => field.name().to_string(),
            Self::Legacy => match field {
                Field::FullSource => "full_d".to_string(),
                Field::BaseSource => "base_d".to_string(),
                Field::BaseTarget => "base_e".to_string(),
                Field::BaseAudio => "base_a".to_string(),
                Field::ExampleSource(n) => format!("s{n}"),
                Field::ExampleTarget(n) => format!("s{n}e"),
                Field::ExampleAudio(n) => format!("s{n}a"),
                other => other.name().to_string(),
            },
        }
    }

    /// Canonical field stored under `name` in this generation, if any.
    pub fn field_for(self, name: &str) -> Option<Field> {
        match self {
            Self::Current | Self::Unknown => Field::from_name(name),
            Self::Legacy => LEGACY_BY_NAME.get(name).copied(),
        }
    }
}
