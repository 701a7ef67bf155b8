use std::collections::BTreeSet;
use std::sync::LazyLock;

use hashbrown::HashMap;
use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("static regex"));

/// Placeholder the back side uses to include the rendered front.
pub const FRONT_SIDE: &str = "FrontSide";

/// Names the consuming application fills in itself; never declared as fields.
pub const SPECIAL_FIELDS: [&str; 7] = [FRONT_SIDE, "Tags", "Type", "Deck", "Subdeck", "Card", "CardFlag"];

enum Tag<'a> {
    Open { field: &'a str, inverted: bool },
    Close,
    Value { field: &'a str },
}

fn parse_tag(raw: &str) -> Option<Tag<'_>> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('#') {
        return Some(Tag::Open { field: rest.trim(), inverted: false });
    }
    if let Some(rest) = raw.strip_prefix('^') {
        return Some(Tag::Open { field: rest.trim(), inverted: true });
    }
    if raw.starts_with('/') {
        return Some(Tag::Close);
    }
    // `hint:s1_target`, `type:base_source`: the field is after the last filter.
    let field = raw.rsplit(':').next().unwrap_or(raw).trim();
    if field.is_empty() {
        return None;
    }
    Some(Tag::Value { field })
}

/// Renders a card template against field values.
///
/// Supports `{{field}}`, `{{filter:field}}` (filters are dropped),
/// `{{#field}}…{{/field}}` and `{{^field}}…{{/field}}`. A section counts as
/// present when its value is non-blank. Unknown fields render empty.
pub fn render(template: &str, values: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut visible: Vec<bool> = Vec::new();
    let shown = |stack: &[bool]| stack.iter().all(|v| *v);
    let mut last = 0;

    for caps in TAG.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        if shown(&visible) {
            out.push_str(&template[last..whole.start()]);
        }
        last = whole.end();

        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        match parse_tag(inner) {
            Some(Tag::Open { field, inverted }) => {
                let present = values.get(field).is_some_and(|v| !v.trim().is_empty());
                visible.push(present != inverted);
            }
            Some(Tag::Close) => {
                visible.pop();
            }
            Some(Tag::Value { field }) => {
                if shown(&visible) {
                    out.push_str(values.get(field).copied().unwrap_or(""));
                }
            }
            None => {}
        }
    }
    if shown(&visible) {
        out.push_str(&template[last..]);
    }
    out
}

/// Field names a template refers to, excluding [`SPECIAL_FIELDS`].
pub fn referenced_fields(template: &str) -> BTreeSet<String> {
    TAG.captures_iter(template)
        .filter_map(|c| c.get(1))
        .filter_map(|m| match parse_tag(m.as_str())? {
            Tag::Open { field, .. } | Tag::Value { field } => Some(field.to_string()),
            Tag::Close => None,
        })
        .filter(|f| !SPECIAL_FIELDS.contains(&f.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<'a>(pairs: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn substitutes_and_drops_filters() {
        let v = values(&[("base_source", "Hund"), ("s1_target", "Pies szczeka.")]);
        assert_eq!(render("<b>{{base_source}}</b> {{hint:s1_target}}", &v), "<b>Hund</b> Pies szczeka.");
        assert_eq!(render("{{missing}}!", &v), "!");
    }

    #[test]
    fn sections_follow_presence() {
        let v = values(&[("s1_source", "Satz"), ("s2_source", " ")]);
        let t = "{{#s1_source}}A{{#s2_source}}B{{/s2_source}}{{/s1_source}}{{^s2_source}}C{{/s2_source}}";
        assert_eq!(render(t, &v), "AC");
    }

    #[test]
    fn collects_references() {
        let refs = referenced_fields("{{FrontSide}}{{Tags}}{{#s1_source}}{{s1_audio}}{{/s1_source}}{{type:base_source}}");
        let refs: Vec<_> = refs.into_iter().collect();
        assert_eq!(refs, vec!["base_source", "s1_audio", "s1_source"]);
    }
}
