//! Change notifications

use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Old and new value of a single key
///
/// An absent `new_value` is a deletion, an absent `old_value` means the key was unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl ChangeRecord {
    pub fn new(old_value: Option<Value>, new_value: Option<Value>) -> Self {
        ChangeRecord {
            old_value,
            new_value,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.new_value.is_none()
    }

    pub fn is_creation(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }
}

/// All key changes produced by one logical operation
///
/// Serializes as a plain `{ key: { oldValue, newValue } }` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeEvent {
    records: BTreeMap<String, ChangeRecord>,
}

impl ChangeEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, replacing any earlier record for the same key
    pub fn insert(&mut self, key: impl Into<String>, record: ChangeRecord) {
        self.records.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<&ChangeRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Touched keys, in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ChangeRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ChangeEvent {
    type Item = (&'a String, &'a ChangeRecord);
    type IntoIter = btree_map::Iter<'a, String, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<(String, ChangeRecord)> for ChangeEvent {
    fn from_iter<I: IntoIterator<Item = (String, ChangeRecord)>>(iter: I) -> Self {
        ChangeEvent {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape_omits_absent_sides() {
        let mut event = ChangeEvent::new();
        event.insert("a", ChangeRecord::new(Some(json!(1)), None));
        event.insert("b", ChangeRecord::new(None, Some(json!({"x": [1, 2]}))));

        let shape = serde_json::to_value(&event).unwrap();
        assert_eq!(
            shape,
            json!({
                "a": {"oldValue": 1},
                "b": {"newValue": {"x": [1, 2]}},
            })
        );
    }

    #[test]
    fn test_stored_null_is_not_absent() {
        let record = ChangeRecord::new(Some(json!(null)), Some(json!(true)));
        let shape = serde_json::to_value(&record).unwrap();
        assert_eq!(shape, json!({"oldValue": null, "newValue": true}));
    }

    #[test]
    fn test_record_kinds() {
        assert!(ChangeRecord::new(Some(json!(1)), None).is_deletion());
        assert!(ChangeRecord::new(None, Some(json!(1))).is_creation());
        assert!(!ChangeRecord::new(Some(json!(1)), Some(json!(2))).is_creation());
    }

    #[test]
    fn test_keys_are_sorted() {
        let event: ChangeEvent = ["b", "c", "a"]
            .into_iter()
            .map(|k| (k.to_string(), ChangeRecord::new(None, Some(json!(k)))))
            .collect();

        assert_eq!(event.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(event.len(), 3);
    }
}
