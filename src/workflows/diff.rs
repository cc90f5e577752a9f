//! Positional diffing of tagged entry lists
//!
//! Entries are compared by list position, not by name: moving an assistant
//! within the document is indistinguishable from replacing every assistant
//! after the move point.

use crate::workflows::schema::Tagged;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Field-level diff of two flat objects.
///
/// Keys whose value changed or that only exist in `new` carry the new value;
/// keys that only exist in `old` map to `null`; equal keys are omitted.
pub fn compare_dicts(old: &Map<String, Value>, new: &Map<String, Value>) -> Map<String, Value> {
    let mut changes = Map::new();

    for (key, value) in new {
        if old.get(key) != Some(value) {
            changes.insert(key.clone(), value.clone());
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            changes.insert(key.clone(), Value::Null);
        }
    }

    changes
}

/// Classification of one position of a positional diff
#[derive(Debug, Clone, PartialEq)]
pub enum EntryChange<'a, T> {
    /// Same tag, no field differences
    Unchanged { old: &'a Tagged<T>, new: &'a Tagged<T> },
    /// Same tag, the projected fields differ
    Update {
        old: &'a Tagged<T>,
        new: &'a Tagged<T>,
        changes: Map<String, Value>,
    },
    /// Tags differ: the old entry is torn down and the new one built
    Replace { old: &'a Tagged<T>, new: &'a Tagged<T> },
    Delete { old: &'a Tagged<T> },
    Create { new: &'a Tagged<T> },
}

impl<T> EntryChange<'_, T> {
    pub fn kind(&self) -> &'static str {
        match self {
            EntryChange::Unchanged { .. } => "unchanged",
            EntryChange::Update { .. } => "update",
            EntryChange::Replace { .. } => "replace",
            EntryChange::Delete { .. } => "delete",
            EntryChange::Create { .. } => "create",
        }
    }
}

/// Compare two entry lists position by position.
///
/// The shorter list is padded with empty slots. Same-tag pairs are compared
/// through `project`, which maps an entry onto the flat object whose fields
/// are persisted.
pub fn diff_entries<'a, T, F>(
    old: &'a [Tagged<T>],
    new: &'a [Tagged<T>],
    project: F,
) -> Vec<EntryChange<'a, T>>
where
    F: Fn(&Tagged<T>) -> Map<String, Value>,
{
    let len = old.len().max(new.len());

    (0..len)
        .map(|i| match (old.get(i), new.get(i)) {
            (Some(old), Some(new)) if old.tag == new.tag => {
                let changes = compare_dicts(&project(old), &project(new));
                if changes.is_empty() {
                    EntryChange::Unchanged { old, new }
                } else {
                    EntryChange::Update { old, new, changes }
                }
            }
            (Some(old), Some(new)) => EntryChange::Replace { old, new },
            (Some(old), None) => EntryChange::Delete { old },
            (None, Some(new)) => EntryChange::Create { new },
            (None, None) => unreachable!("index is below the longer length"),
        })
        .collect()
}

/// URLs to remove and add, each in first-appearance order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlDiff {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl UrlDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Set difference of two URL lists; order does not matter
pub fn diff_urls(old: &[String], new: &[String]) -> UrlDiff {
    let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let removed = old
        .iter()
        .filter(|url| !new_set.contains(url.as_str()) && seen.insert(url.as_str()))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let added = new
        .iter()
        .filter(|url| !old_set.contains(url.as_str()) && seen.insert(url.as_str()))
        .cloned()
        .collect();

    UrlDiff { removed, added }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn entry(tag: &str, value: Value) -> Tagged<Value> {
        Tagged::new(tag, value)
    }

    fn project(entry: &Tagged<Value>) -> Map<String, Value> {
        obj(entry.spec.clone())
    }

    #[test]
    fn test_compare_dicts_returns_only_changed_field() {
        let old = obj(json!({"llm": "gpt-4", "prompt": "p1"}));
        let new = obj(json!({"llm": "gpt-4", "prompt": "p2"}));

        assert_eq!(compare_dicts(&old, &new), obj(json!({"prompt": "p2"})));
    }

    #[rstest]
    #[case::identical(json!({"a": 1}), json!({"a": 1}), json!({}))]
    #[case::added_key(json!({"a": 1}), json!({"a": 1, "b": 2}), json!({"b": 2}))]
    #[case::removed_key(json!({"a": 1, "b": 2}), json!({"a": 1}), json!({"b": null}))]
    #[case::nested_change(
        json!({"metadata": {"x": 1}}),
        json!({"metadata": {"x": 2}}),
        json!({"metadata": {"x": 2}})
    )]
    #[case::both_empty(json!({}), json!({}), json!({}))]
    fn test_compare_dicts_cases(#[case] old: Value, #[case] new: Value, #[case] expected: Value) {
        assert_eq!(compare_dicts(&obj(old), &obj(new)), obj(expected));
    }

    #[test]
    fn test_same_tag_same_fields_is_unchanged() {
        let old = vec![entry("superagent", json!({"name": "a", "prompt": "p"}))];
        let new = old.clone();

        let changes = diff_entries(&old, &new, project);
        assert!(matches!(changes[..], [EntryChange::Unchanged { .. }]));
    }

    #[test]
    fn test_same_tag_changed_fields_is_update() {
        let old = vec![entry("superagent", json!({"name": "a", "prompt": "p1"}))];
        let new = vec![entry("superagent", json!({"name": "a", "prompt": "p2"}))];

        let changes = diff_entries(&old, &new, project);
        match &changes[..] {
            [EntryChange::Update { changes, .. }] => {
                assert_eq!(changes, &obj(json!({"prompt": "p2"})));
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_change_at_same_position_is_replace() {
        let old = vec![entry("superagent", json!({"name": "a"}))];
        let new = vec![entry("llm", json!({"name": "a"}))];

        let changes = diff_entries(&old, &new, project);
        assert!(matches!(changes[..], [EntryChange::Replace { .. }]));
    }

    #[test]
    fn test_longer_lists_pad_with_create_and_delete() {
        let one = vec![entry("superagent", json!({"name": "a"}))];
        let two = vec![
            entry("superagent", json!({"name": "a"})),
            entry("superagent", json!({"name": "b"})),
        ];

        let grow = diff_entries(&one, &two, project);
        assert_eq!(
            grow.iter().map(EntryChange::kind).collect::<Vec<_>>(),
            ["unchanged", "create"]
        );

        let shrink = diff_entries(&two, &one, project);
        assert_eq!(
            shrink.iter().map(EntryChange::kind).collect::<Vec<_>>(),
            ["unchanged", "delete"]
        );
    }

    #[test]
    fn test_reorder_is_positional_not_by_name() {
        let old = vec![
            entry("superagent", json!({"name": "a"})),
            entry("superagent", json!({"name": "b"})),
        ];
        let new = vec![
            entry("superagent", json!({"name": "b"})),
            entry("superagent", json!({"name": "a"})),
        ];

        let changes = diff_entries(&old, &new, project);
        assert_eq!(
            changes.iter().map(EntryChange::kind).collect::<Vec<_>>(),
            ["update", "update"]
        );
    }

    #[test]
    fn test_empty_lists_produce_nothing() {
        let empty: Vec<Tagged<Value>> = Vec::new();
        assert!(diff_entries(&empty, &empty, project).is_empty());
    }

    #[test]
    fn test_diff_urls_is_a_set_difference() {
        let old = vec!["u1".to_string(), "u2".to_string()];
        let new = vec!["u2".to_string(), "u3".to_string()];

        let diff = diff_urls(&old, &new);
        assert_eq!(diff.removed, ["u1"]);
        assert_eq!(diff.added, ["u3"]);
    }

    #[test]
    fn test_diff_urls_ignores_order_and_duplicates() {
        let old = vec!["u1".to_string(), "u2".to_string()];
        let new = vec!["u2".to_string(), "u1".to_string(), "u1".to_string()];

        assert!(diff_urls(&old, &new).is_empty());
    }
}
