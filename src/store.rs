//! Ordered, indexed collection of canonical records.

use hashbrown::HashMap;

use crate::{
    record::{CanonicalRecord, Field, RecordPatch},
    types::NoteId,
};

/// Errors raised by [`RecordSet`] mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSetError {
    /// No record with this note id.
    MissingRecord(NoteId),
    /// A record with this note id is already present.
    AlreadyExists(NoteId),
    /// The patch would change a progress key that is already assigned.
    ProgressKeyLocked(NoteId),
    /// Another record already carries this progress key.
    DuplicateProgressKey(String),
}

/// Records in insertion order, indexed by note id and progress key.
///
/// This is the only mutation path the engine offers to external producers:
/// field-level [`RecordPatch`]es, which may never rewrite an assigned
/// progress key.
#[derive(Debug, Default, Clone)]
pub struct RecordSet {
    records: Vec<CanonicalRecord>,
    pos: HashMap<NoteId, usize>,
    by_key: HashMap<String, NoteId>,
}

impl RecordSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from records, rejecting duplicate note ids or keys.
    pub fn from_records(
        records: impl IntoIterator<Item = CanonicalRecord>,
    ) -> Result<Self, RecordSetError> {
        let mut set = Self::new();
        for rec in records {
            set.insert(rec)?;
        }
        Ok(set)
    }

    /// Appends a record.
    pub fn insert(&mut self, rec: CanonicalRecord) -> Result<(), RecordSetError> {
        if self.pos.contains_key(&rec.note_id) {
            return Err(RecordSetError::AlreadyExists(rec.note_id));
        }
        if !rec.progress_key.is_empty() && self.by_key.contains_key(&rec.progress_key) {
            return Err(RecordSetError::DuplicateProgressKey(rec.progress_key));
        }

        if !rec.progress_key.is_empty() {
            self.by_key.insert(rec.progress_key.clone(), rec.note_id);
        }
        self.pos.insert(rec.note_id, self.records.len());
        self.records.push(rec);
        Ok(())
    }

    /// Applies a field-level transform and returns the inverse patch.
    ///
    /// Setting a progress key on a record that has none is allowed; changing
    /// an assigned one is not.
    pub fn patch(&mut self, id: NoteId, patch: &RecordPatch) -> Result<RecordPatch, RecordSetError> {
        let idx = *self.pos.get(&id).ok_or(RecordSetError::MissingRecord(id))?;
        let old_key = self.records[idx].progress_key.clone();

        let mut new_key = None;
        for (field, value) in patch.fields() {
            if field == Field::ProgressKey && value != old_key {
                if !old_key.is_empty() {
                    return Err(RecordSetError::ProgressKeyLocked(id));
                }
                if self.by_key.contains_key(value) {
                    return Err(RecordSetError::DuplicateProgressKey(value.to_string()));
                }
                new_key = Some(value.to_string());
            }
        }

        let rec = &mut self.records[idx];
        let prev = patch.capture_inverse_for(rec);
        patch.apply_to(rec);

        if let Some(key) = new_key.filter(|k| !k.is_empty()) {
            self.by_key.insert(key, id);
        }
        Ok(prev)
    }

    /// Looks up a record by note id.
    pub fn get(&self, id: NoteId) -> Option<&CanonicalRecord> {
        self.pos.get(&id).map(|idx| &self.records[*idx])
    }

    /// Looks up a record by progress key.
    pub fn by_progress_key(&self, key: &str) -> Option<&CanonicalRecord> {
        self.by_key.get(key).and_then(|id| self.get(*id))
    }

    /// Records in insertion order.
    pub fn as_slice(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Iterates records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the set holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the set, returning records in insertion order.
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: NoteId, key: &str) -> CanonicalRecord {
        let mut r = CanonicalRecord::new(id, 1);
        r.progress_key = key.to_string();
        r
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut set = RecordSet::new();
        set.insert(rec(1, "k1")).unwrap();
        assert_eq!(set.insert(rec(1, "k2")), Err(RecordSetError::AlreadyExists(1)));
        assert_eq!(
            set.insert(rec(2, "k1")),
            Err(RecordSetError::DuplicateProgressKey("k1".into()))
        );
        set.insert(rec(3, "")).unwrap();
        set.insert(rec(4, "")).unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn assigned_progress_key_is_locked() {
        let mut set = RecordSet::from_records([rec(1, "k1"), rec(2, "")]).unwrap();
        let locked = RecordPatch::new().set(Field::ProgressKey, "other");
        assert_eq!(set.patch(1, &locked), Err(RecordSetError::ProgressKeyLocked(1)));

        let assign = RecordPatch::new().set(Field::ProgressKey, "k2");
        set.patch(2, &assign).unwrap();
        assert_eq!(set.by_progress_key("k2").map(|r| r.note_id), Some(2));
    }

    #[test]
    fn patch_returns_inverse_and_keeps_order() {
        let mut set = RecordSet::from_records([rec(5, "a"), rec(3, "b")]).unwrap();
        let patch = RecordPatch::new().set(Field::BaseTarget, "kot");
        let inverse = set.patch(3, &patch).unwrap();
        assert_eq!(set.get(3).unwrap().base_target, "kot");
        set.patch(3, &inverse).unwrap();
        assert_eq!(set.get(3).unwrap().base_target, "");
        let ids: Vec<_> = set.iter().map(|r| r.note_id).collect();
        assert_eq!(ids, vec![5, 3]);
        assert_eq!(set.patch(9, &patch), Err(RecordSetError::MissingRecord(9)));
    }
}
