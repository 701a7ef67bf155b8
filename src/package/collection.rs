use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::Result,
    templates::{DeckRoute, NoteTypeDefinition, TemplateDefinition, render},
    types::{DEFAULT_DECK_CONF_ID, DEFAULT_DECK_ID, DeckId, ModelId},
};

use super::writer::DeckSpec;

const LATEX_PRE: &str = "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n";
const LATEX_POST: &str = "\\end{document}";

/// One entry of `col.models`.
///
/// Reading is lenient: missing keys take defaults and unknown keys are
/// ignored. The id is taken from the map key, not the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ModelJson {
    #[serde(skip_deserializing)]
    id: ModelId,
    name: String,
    #[serde(rename = "type")]
    kind: i64,
    #[serde(rename = "mod")]
    modified: i64,
    usn: i64,
    sortf: usize,
    did: Option<DeckId>,
    tmpls: Vec<TemplateJson>,
    flds: Vec<FieldJson>,
    css: String,
    #[serde(rename = "latexPre")]
    latex_pre: String,
    #[serde(rename = "latexPost")]
    latex_post: String,
    tags: Vec<Value>,
    vers: Vec<Value>,
    req: Vec<Value>,
}

/// One card template of a [`ModelJson`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct TemplateJson {
    name: String,
    ord: usize,
    qfmt: String,
    afmt: String,
    did: Option<DeckId>,
    bqfmt: String,
    bafmt: String,
}

/// One field of a [`ModelJson`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct FieldJson {
    name: String,
    ord: usize,
    sticky: bool,
    rtl: bool,
    font: String,
    size: u32,
    media: Vec<Value>,
}

impl Default for FieldJson {
    fn default() -> Self {
        Self {
            name: String::new(),
            ord: 0,
            sticky: false,
            rtl: false,
            font: "Arial".into(),
            size: 20,
            media: Vec::new(),
        }
    }
}

/// One entry of `col.decks`, as written.
#[derive(Debug, Clone, Serialize)]
struct DeckJson<'a> {
    id: DeckId,
    name: &'a str,
    #[serde(rename = "mod")]
    modified: i64,
    usn: i64,
    #[serde(rename = "lrnToday")]
    lrn_today: [i64; 2],
    #[serde(rename = "revToday")]
    rev_today: [i64; 2],
    #[serde(rename = "newToday")]
    new_today: [i64; 2],
    #[serde(rename = "timeToday")]
    time_today: [i64; 2],
    collapsed: bool,
    #[serde(rename = "browserCollapsed")]
    browser_collapsed: bool,
    desc: &'a str,
    #[serde(rename = "dyn")]
    dynamic: i64,
    conf: i64,
    #[serde(rename = "extendNew")]
    extend_new: i64,
    #[serde(rename = "extendRev")]
    extend_rev: i64,
}

impl<'a> DeckJson<'a> {
    fn new(id: DeckId, name: &'a str, modified: i64) -> Self {
        Self {
            id,
            name,
            modified,
            usn: -1,
            lrn_today: [0, 0],
            rev_today: [0, 0],
            new_today: [0, 0],
            time_today: [0, 0],
            collapsed: false,
            browser_collapsed: false,
            desc: "",
            dynamic: 0,
            conf: DEFAULT_DECK_CONF_ID,
            extend_new: 10,
            extend_rev: 50,
        }
    }
}

/// Only the parts of a deck entry the reader needs.
#[derive(Debug, Deserialize)]
struct DeckEntry {
    #[serde(default)]
    id: Option<DeckId>,
    #[serde(default)]
    name: String,
}

impl ModelJson {
    /// Builds the stored form of `nt` with cards defaulting to `deck_id`.
    fn from_definition(nt: &NoteTypeDefinition, deck_id: DeckId, modified: i64) -> Self {
        let tmpls = nt
            .templates
            .iter()
            .enumerate()
            .map(|(ord, t)| TemplateJson {
                name: t.name.clone(),
                ord,
                qfmt: t.front.clone(),
                afmt: t.back.clone(),
                did: t.deck.as_ref().map(|r| r.id),
                ..TemplateJson::default()
            })
            .collect();
        let flds = nt
            .fields
            .iter()
            .enumerate()
            .map(|(ord, name)| FieldJson {
                name: name.clone(),
                ord,
                ..FieldJson::default()
            })
            .collect();

        Self {
            id: nt.id,
            name: nt.name.clone(),
            kind: 0,
            modified,
            usn: -1,
            sortf: nt.sort_field,
            did: Some(deck_id),
            tmpls,
            flds,
            css: nt.css.clone(),
            latex_pre: LATEX_PRE.into(),
            latex_post: LATEX_POST.into(),
            tags: Vec::new(),
            vers: Vec::new(),
            req: requirements(nt),
        }
    }

    /// Converts back to a definition, resolving template deck overrides
    /// against the collection's deck names.
    fn into_definition(mut self, decks: &BTreeMap<DeckId, String>) -> NoteTypeDefinition {
        self.flds.sort_by_key(|f| f.ord);
        self.tmpls.sort_by_key(|t| t.ord);
        let fields: Vec<String> = self.flds.into_iter().map(|f| f.name).collect();
        let sort_field = self.sortf.min(fields.len().saturating_sub(1));

        // Subdecks are named below the model's own deck when it is known.
        let parent = self.did.and_then(|did| decks.get(&did));
        let templates = self
            .tmpls
            .into_iter()
            .map(|t| {
                let deck = t.did.and_then(|did| {
                    decks.get(&did).map(|full| {
                        let below_parent = parent
                            .and_then(|p| full.strip_prefix(p.as_str()))
                            .and_then(|rest| rest.strip_prefix("::"));
                        let name = below_parent
                            .or_else(|| full.split_once("::").map(|(_, child)| child))
                            .unwrap_or(full);
                        DeckRoute {
                            id: did,
                            name: name.to_string(),
                        }
                    })
                });
                TemplateDefinition {
                    name: t.name,
                    front: t.qfmt,
                    back: t.afmt,
                    deck,
                }
            })
            .collect();

        NoteTypeDefinition {
            id: self.id,
            name: self.name,
            fields,
            templates,
            css: self.css,
            sort_field,
        }
    }
}

/// Card generation requirements: each template needs any of the fields its
/// front refers to.
fn requirements(nt: &NoteTypeDefinition) -> Vec<Value> {
    nt.templates
        .iter()
        .enumerate()
        .map(|(ord, t)| {
            let referenced = render::referenced_fields(&t.front);
            let idx: Vec<usize> = nt
                .fields
                .iter()
                .enumerate()
                .filter(|(_, name)| referenced.contains(name.as_str()))
                .map(|(i, _)| i)
                .collect();
            json!([ord, "any", idx])
        })
        .collect()
}

/// Serializes `col.models` holding the single note type `nt`.
pub fn models_json(nt: &NoteTypeDefinition, deck_id: DeckId, modified: i64) -> Result<String> {
    let mut map = BTreeMap::new();
    map.insert(nt.id.to_string(), ModelJson::from_definition(nt, deck_id, modified));
    Ok(serde_json::to_string(&map)?)
}

/// Serializes `col.decks`: the default deck, the parent deck, and one
/// `Parent::Child` subdeck per route.
pub fn decks_json(deck: &DeckSpec, routes: &[&DeckRoute], modified: i64) -> Result<String> {
    let full_names: Vec<(DeckId, String)> = routes
        .iter()
        .map(|r| (r.id, format!("{}::{}", deck.name, r.name)))
        .collect();

    let mut map = BTreeMap::new();
    map.insert(
        DEFAULT_DECK_ID.to_string(),
        DeckJson::new(DEFAULT_DECK_ID, "Default", modified),
    );
    map.insert(deck.id.to_string(), DeckJson::new(deck.id, &deck.name, modified));
    for (id, name) in &full_names {
        map.insert(id.to_string(), DeckJson::new(*id, name, modified));
    }
    Ok(serde_json::to_string(&map)?)
}

/// Serializes `col.dconf` with the default deck options group.
pub fn dconf_json() -> String {
    json!({
        (DEFAULT_DECK_CONF_ID.to_string()): {
            "id": DEFAULT_DECK_CONF_ID,
            "name": "Default",
            "mod": 0,
            "usn": 0,
            "maxTaken": 60,
            "autoplay": true,
            "timer": 0,
            "replayq": true,
            "dyn": false,
            "new": {
                "bury": true,
                "delays": [1.0, 10.0],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true
            },
            "lapse": {
                "delays": [10.0],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0.0
            },
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1.0,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100
            }
        }
    })
    .to_string()
}

/// Serializes `col.conf`.
pub fn conf_json(model_id: ModelId) -> String {
    json!({
        "activeDecks": [DEFAULT_DECK_ID],
        "curDeck": DEFAULT_DECK_ID,
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "curModel": model_id.to_string(),
        "nextPos": 1,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true
    })
    .to_string()
}

/// Parses `col.decks` into an id to full-name map.
pub fn parse_decks(json: &str) -> Result<BTreeMap<DeckId, String>> {
    let raw: BTreeMap<String, DeckEntry> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, deck)| {
            let id = deck.id.or_else(|| key.parse().ok())?;
            Some((id, deck.name))
        })
        .collect())
}

/// Parses `col.models`. Entries whose key is not an integer are skipped.
pub fn parse_models(json: &str, decks: &BTreeMap<DeckId, String>) -> Result<Vec<NoteTypeDefinition>> {
    let raw: BTreeMap<String, ModelJson> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, mut model)| {
            model.id = key.parse().ok()?;
            Some(model.into_definition(decks))
        })
        .collect())
}
