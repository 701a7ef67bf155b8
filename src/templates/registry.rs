use crate::{
    error::Result,
    record::Field,
    schema::SchemaGeneration,
    types::{DeckId, EXAMPLE_SLOTS, ModelId},
};

use super::{DeckRoute, NoteTypeDefinition, TemplateDefinition};

/// Key of the four-mode note type with one subdeck per study mode.
pub const FOUR_SUBDECKS: &str = "four-subdecks";
/// Key of the two-template note type without subdeck routing.
pub const BIDIRECTIONAL: &str = "bidirectional";
/// Key of the two-template note type using legacy field names.
pub const LEGACY_BIDIRECTIONAL: &str = "legacy-bidirectional";

/// Model id of [`FOUR_SUBDECKS`].
pub const FOUR_SUBDECKS_MODEL_ID: ModelId = 1_607_392_319;
/// Model id of [`BIDIRECTIONAL`].
pub const BIDIRECTIONAL_MODEL_ID: ModelId = 1_607_392_321;
/// Model id of [`LEGACY_BIDIRECTIONAL`].
pub const LEGACY_MODEL_ID: ModelId = 1_607_392_320;

/// Recognition subdeck (source to target).
pub const DECK_ID_RECOGNITION: DeckId = 1_754_301_712_001;
/// Production subdeck (target to source).
pub const DECK_ID_PRODUCTION: DeckId = 1_754_301_712_002;
/// Listening subdeck (audio to text).
pub const DECK_ID_LISTENING: DeckId = 1_754_301_712_003;
/// Sentence production subdeck (target sentence to source sentence).
pub const DECK_ID_SENTENCE_PRODUCTION: DeckId = 1_754_301_712_004;

const SILENCE: &str = r#"<div style="display:none">[sound:_1-minute-of-silence.mp3]</div>"#;

const CSS: &str = r#".card {
    font-family: Arial, sans-serif;
    font-size: 20px;
    text-align: center;
}
.source-word { font-size: 28px; font-weight: bold; margin-bottom: 10px; }
.target-word { font-size: 24px; font-weight: bold; color: #007aff; }
.grammar { font-size: 16px; color: #888; }
.example-pair { margin-bottom: 15px; }
.source-sentence { font-size: 18px; margin-bottom: 5px; }
.target-sentence { font-size: 18px; color: #666; font-style: italic; }
.instructions { font-size: 16px; color: #888; margin-bottom: 10px; }
"#;

/// Fixed set of note types an export run picks from.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    entries: Vec<(String, NoteTypeDefinition)>,
}

impl TemplateRegistry {
    /// Registry holding the built-in note types.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                (FOUR_SUBDECKS.to_string(), four_subdecks()),
                (BIDIRECTIONAL.to_string(), bidirectional()),
                (LEGACY_BIDIRECTIONAL.to_string(), legacy_bidirectional()),
            ],
        }
    }

    /// Adds or replaces a note type after validating it.
    pub fn register(&mut self, key: impl Into<String>, def: NoteTypeDefinition) -> Result<()> {
        def.validate()?;
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = def,
            None => self.entries.push((key, def)),
        }
        Ok(())
    }

    /// Note type registered under `key`.
    pub fn get(&self, key: &str) -> Option<&NoteTypeDefinition> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    /// Note type registered with model id `id`.
    pub fn by_model_id(&self, id: ModelId) -> Option<&NoteTypeDefinition> {
        self.entries.iter().map(|(_, d)| d).find(|d| d.id == id)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Field order shared by the current-generation built-ins.
fn current_fields() -> Vec<String> {
    let mut fields = vec![
        Field::FrequencyRank,
        Field::FullSource,
        Field::BaseTarget,
        Field::BaseSource,
        Field::Article,
        Field::Plural,
        Field::AudioText,
    ];
    for n in 1..=EXAMPLE_SLOTS as u8 {
        fields.push(Field::ExampleSource(n));
        fields.push(Field::ExampleTarget(n));
    }
    fields.push(Field::OriginalOrder);
    fields.push(Field::FullSourceAudio);
    fields.push(Field::BaseAudio);
    fields.extend((1..=EXAMPLE_SLOTS as u8).map(Field::ExampleAudio));
    fields.push(Field::BaseTargetAudio);
    fields.extend((1..=EXAMPLE_SLOTS as u8).map(Field::ExampleTargetAudio));
    fields.into_iter().map(|f| f.name().to_string()).collect()
}

fn example_pairs(from: u8) -> String {
    (from..=EXAMPLE_SLOTS as u8)
        .map(|n| {
            format!(
                "{{{{#s{n}_source}}}}\n<div class=\"example-pair\">\n    \
                 <div class=\"source-sentence\">{{{{s{n}_source}}}} {{{{s{n}_audio}}}}</div>\n    \
                 <div class=\"target-sentence\">{{{{s{n}_target}}}} {{{{s{n}_target_audio}}}}</div>\n\
                 </div>\n{{{{/s{n}_source}}}}\n"
            )
        })
        .collect()
}

fn recognition_template(deck: Option<DeckRoute>) -> TemplateDefinition {
    TemplateDefinition {
        name: "Recognition".into(),
        front: "<div class=\"source-word\">{{full_source}} {{full_source_audio}}</div>\n\
                {{#s1_source}}<div class=\"source-sentence\">{{s1_source}} {{s1_audio}}</div>{{/s1_source}}\n"
            .into(),
        back: format!(
            "{SILENCE}\n<div class=\"source-word\">{{{{full_source}}}}</div>\n\
             <div class=\"grammar\">{{{{artikel_d}}}} {{{{plural_d}}}}</div>\n\
             <div class=\"target-word\">{{{{base_target}}}} {{{{base_target_audio}}}}</div>\n<hr>\n{}",
            example_pairs(1)
        ),
        deck,
    }
}

fn production_template(deck: Option<DeckRoute>) -> TemplateDefinition {
    TemplateDefinition {
        name: "Production".into(),
        front: "<div class=\"target-word\">{{base_target}} {{base_target_audio}}</div>\n\
                {{#s1_target}}<div class=\"target-sentence\">{{s1_target}}</div>{{/s1_target}}\n"
            .into(),
        back: format!(
            "<div class=\"source-word\">{{{{full_source}}}} {{{{full_source_audio}}}}</div>\n{SILENCE}\n\
             <div class=\"target-word\">{{{{base_target}}}}</div>\n<hr>\n\
             {{{{#s1_source}}}}<div class=\"source-sentence\">{{{{s1_source}}}} {{{{s1_audio}}}}</div>{{{{/s1_source}}}}\n"
        ),
        deck,
    }
}

fn four_subdecks() -> NoteTypeDefinition {
    let route = |id, name: &str| {
        Some(DeckRoute {
            id,
            name: name.to_string(),
        })
    };
    NoteTypeDefinition {
        id: FOUR_SUBDECKS_MODEL_ID,
        name: "Vocabulary (four study modes)".into(),
        fields: current_fields(),
        templates: vec![
            recognition_template(route(DECK_ID_RECOGNITION, "01 Recognition")),
            production_template(route(DECK_ID_PRODUCTION, "02 Production")),
            TemplateDefinition {
                name: "Listening".into(),
                front: "<div class=\"instructions\">Listen and identify the word</div>\n\
                        {{full_source_audio}} {{base_audio}}\n"
                    .into(),
                back: "<div class=\"source-word\">{{full_source}}</div>\n\
                       <div class=\"target-word\">{{base_target}} {{base_target_audio}}</div>\n"
                    .into(),
                deck: route(DECK_ID_LISTENING, "03 Listening"),
            },
            TemplateDefinition {
                name: "Sentence Production".into(),
                front: "<div class=\"instructions\">Translate the sentence</div>\n\
                        <div class=\"target-sentence\">{{s1_target}} {{s1_target_audio}}</div>\n"
                    .into(),
                back: "<div class=\"target-sentence\">{{s1_target}}</div>\n<hr>\n\
                       <div class=\"source-sentence\">{{s1_source}} {{s1_audio}}</div>\n"
                    .into(),
                deck: route(DECK_ID_SENTENCE_PRODUCTION, "04 Sentence Production"),
            },
        ],
        css: CSS.to_string(),
        sort_field: 0,
    }
}

fn bidirectional() -> NoteTypeDefinition {
    NoteTypeDefinition {
        id: BIDIRECTIONAL_MODEL_ID,
        name: "Vocabulary (both directions)".into(),
        fields: current_fields(),
        templates: vec![recognition_template(None), production_template(None)],
        css: CSS.to_string(),
        sort_field: 0,
    }
}

fn legacy_bidirectional() -> NoteTypeDefinition {
    let legacy = |f: Field| SchemaGeneration::Legacy.wire_name(f);
    let mut fields: Vec<String> = [
        Field::FullSource,
        Field::BaseTarget,
        Field::BaseSource,
        Field::Article,
        Field::Plural,
        Field::AudioText,
    ]
    .into_iter()
    .map(legacy)
    .collect();
    for n in 1..=EXAMPLE_SLOTS as u8 {
        fields.push(legacy(Field::ExampleSource(n)));
        fields.push(legacy(Field::ExampleTarget(n)));
    }
    fields.push(legacy(Field::OriginalOrder));
    fields.push(legacy(Field::BaseAudio));
    fields.extend((1..=EXAMPLE_SLOTS as u8).map(|n| legacy(Field::ExampleAudio(n))));

    NoteTypeDefinition {
        id: LEGACY_MODEL_ID,
        name: "Vocabulary (legacy)".into(),
        fields,
        templates: vec![
            TemplateDefinition {
                name: "Source to Target".into(),
                front: "<div class=\"source-word\">{{full_d}}</div><br>{{base_a}}".into(),
                back: "{{FrontSide}}\n<hr id=\"answer\">\n<div class=\"target-word\">{{base_e}}</div>\n\
                       {{#s1}}<br><div class=\"source-sentence\">{{s1}}</div>{{/s1}}\n\
                       {{#s1e}}<div class=\"target-sentence\">{{s1e}}</div>{{/s1e}}\n"
                    .into(),
                deck: None,
            },
            TemplateDefinition {
                name: "Target to Source".into(),
                front: "<div class=\"target-word\">{{base_e}}</div>".into(),
                back: "{{FrontSide}}\n<hr id=\"answer\">\n<div class=\"source-word\">{{full_d}}</div>\n{{base_a}}\n"
                    .into(),
                deck: None,
            },
        ],
        css: CSS.to_string(),
        sort_field: 0,
    }
}
