//! Shared primitive IDs and package format constants.

/// Note identifier (`notes.id`).
pub type NoteId = i64;
/// Note-type (model) identifier (`notes.mid`).
pub type ModelId = i64;
/// Deck identifier.
pub type DeckId = i64;
/// Card identifier (`cards.id`).
pub type CardId = i64;

/// Separator byte between field values in a packed field blob.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Database entry written into every package.
pub const DATABASE_ENTRY: &str = "collection.anki2";
/// Database entry used by newer exporters alongside the legacy one.
pub const DATABASE_ENTRY_21: &str = "collection.anki21";
/// Compressed database entry of the newest format; not readable here.
pub const DATABASE_ENTRY_21B: &str = "collection.anki21b";
/// Media manifest entry name.
pub const MEDIA_MANIFEST_ENTRY: &str = "media";

/// Id of the default deck every collection carries.
pub const DEFAULT_DECK_ID: DeckId = 1;
/// Id of the default deck configuration.
pub const DEFAULT_DECK_CONF_ID: i64 = 1;

/// Number of example sentence slots on a record.
pub const EXAMPLE_SLOTS: usize = 9;
