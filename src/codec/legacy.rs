//! The positional tuple format written by the old browser to-do page.
//!
//! Each item is a JSON array `[title, description, dueDate, priority]`.
//! Decoding is by position only, so the field order must never change.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde_json::Value;

use crate::model::collection::Collection;
use crate::model::item::{Item, ItemDraft, ItemKind};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One stored record: (title, description, dueDate, priority)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LegacyTuple {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: String,
}

impl LegacyTuple {
    fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.title.clone()),
            Value::String(self.description.clone()),
            Value::String(self.due_date.clone()),
            Value::String(self.priority.clone()),
        ])
    }

    /// Positional decode. Anything other than exactly four scalars is rejected.
    fn from_value(value: &Value) -> Option<LegacyTuple> {
        let fields = value.as_array()?;
        if fields.len() != 4 {
            return None;
        }
        Some(LegacyTuple {
            title: scalar(&fields[0])?,
            description: scalar(&fields[1])?,
            due_date: scalar(&fields[2])?,
            priority: scalar(&fields[3])?,
        })
    }

    /// Turn a record into a to-do draft. The description becomes the body
    /// under the record's title; a record without a description is a bare
    /// title, which becomes an untitled body. Returns `None` when both are
    /// blank.
    pub fn to_draft(&self) -> Option<ItemDraft> {
        let (title, body) = if self.description.trim().is_empty() {
            (None, self.title.trim())
        } else {
            (Some(self.title.clone()), self.description.as_str())
        };
        if body.is_empty() {
            return None;
        }
        let due = NaiveDate::parse_from_str(self.due_date.trim(), DATE_FORMAT).ok();
        let priority = self.priority.trim().parse().ok();
        Some(ItemDraft {
            title,
            body: body.to_string(),
            tag: None,
            pinned: false,
            kind: ItemKind::todo(priority, due),
        })
    }

    /// Inverse of [`to_draft`](Self::to_draft): an untitled item is written
    /// as a title with no description.
    pub fn from_item(item: &Item) -> LegacyTuple {
        let (title, description) = match &item.title {
            Some(title) => (title.clone(), item.body.clone()),
            None => (item.body.clone(), String::new()),
        };
        LegacyTuple {
            title,
            description,
            due_date: item
                .due()
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            priority: item.priority().map(|p| p.to_string()).unwrap_or_default(),
        }
    }
}

/// Strings pass through, numbers are stringified, null is empty.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Decoded legacy slot, before items are built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacySlot {
    /// A bare array: one unnamed collection
    Single(Vec<LegacyTuple>),
    /// An object mapping group name to its array
    Grouped(IndexMap<String, Vec<LegacyTuple>>),
}

fn decode_array(value: &Value) -> Option<Vec<LegacyTuple>> {
    value
        .as_array()?
        .iter()
        .map(LegacyTuple::from_value)
        .collect()
}

/// Recognize the legacy layout. Returns `None` if `value` is not one.
pub fn decode(value: &Value) -> Option<LegacySlot> {
    match value {
        Value::Array(_) => decode_array(value).map(LegacySlot::Single),
        Value::Object(map) => {
            let mut groups = IndexMap::new();
            for (name, records) in map {
                groups.insert(name.clone(), decode_array(records)?);
            }
            Some(LegacySlot::Grouped(groups))
        }
        _ => None,
    }
}

/// Encode a collection as a bare tuple array
pub fn encode_collection(collection: &Collection) -> Value {
    Value::Array(
        collection
            .items
            .values()
            .map(|item| LegacyTuple::from_item(item).to_value())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::collection::Scope;
    use crate::model::item::ItemId;
    use crate::ops::store;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn positional_decode() {
        let value = json!([["Taxes", "file 2024 return", "2025-04-15", "1"]]);
        let Some(LegacySlot::Single(records)) = decode(&value) else {
            panic!("expected a single legacy array");
        };
        let draft = records[0].to_draft().unwrap();
        assert_eq!(draft.title.as_deref(), Some("Taxes"));
        assert_eq!(draft.body, "file 2024 return");
        assert_eq!(
            draft.kind,
            ItemKind::todo(Some(1), NaiveDate::from_ymd_opt(2025, 4, 15))
        );
    }

    #[test]
    fn numeric_priority_and_null_fields_are_accepted() {
        let value = json!([["Call mom", null, null, 2]]);
        let Some(LegacySlot::Single(records)) = decode(&value) else {
            panic!("expected a single legacy array");
        };
        assert_eq!(records[0].priority, "2");
        let draft = records[0].to_draft().unwrap();
        assert_eq!(draft.body, "Call mom");
        assert_eq!(draft.kind, ItemKind::todo(Some(2), None));
    }

    #[test]
    fn bare_title_survives_migration_and_export() {
        let value = json!([["Milk", "", "", ""], ["Taxes", "File the return", "2025-04-15", "1"]]);
        let Some(LegacySlot::Single(records)) = decode(&value) else {
            panic!("expected a single legacy array");
        };
        let milk = records[0].to_draft().unwrap();
        assert_eq!(milk.title, None);
        assert_eq!(milk.body, "Milk");

        let mut c = Collection::new(Scope::Group("default".into()));
        for (n, record) in records.iter().enumerate() {
            let id = ItemId::new(format!("T-{:03}", n + 1));
            store::add(&mut c, Item::from_draft(id, record.to_draft().unwrap(), Utc::now())).unwrap();
        }
        assert_eq!(encode_collection(&c), value);
    }

    #[test]
    fn wrong_arity_is_not_legacy() {
        assert!(decode(&json!([["only", "three", "fields"]])).is_none());
        assert!(decode(&json!({"home": [["a", "b", "c", "d", "e"]]})).is_none());
        assert!(decode(&json!("text")).is_none());
    }

    #[test]
    fn grouped_layout() {
        let value = json!({"home": [["Dishes", "", "", ""]], "work": []});
        let Some(LegacySlot::Grouped(groups)) = decode(&value) else {
            panic!("expected grouped legacy layout");
        };
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["home", "work"]);
        assert_eq!(groups["home"][0].title, "Dishes");
    }

    #[test]
    fn encode_then_decode_reproduces_tuples() {
        let mut c = Collection::new(Scope::Group("chores".into()));
        let mut with_fields = ItemDraft::todo("water plants").with_title("Plants");
        with_fields.kind = ItemKind::todo(Some(3), NaiveDate::from_ymd_opt(2025, 7, 1));
        let drafts = [with_fields, ItemDraft::todo("no extras"), ItemDraft::note("a note")];
        for (n, draft) in drafts.into_iter().enumerate() {
            let id = ItemId::new(format!("T-{:03}", n + 1));
            store::add(&mut c, Item::from_draft(id, draft, Utc::now())).unwrap();
        }

        let encoded = encode_collection(&c);
        let Some(LegacySlot::Single(records)) = decode(&encoded) else {
            panic!("encoded output should decode");
        };
        let expected: Vec<_> = c.items.values().map(LegacyTuple::from_item).collect();
        assert_eq!(records, expected);

        // and rebuilding items from them yields the same tuples again
        let rebuilt: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(n, r)| {
                let id = ItemId::new(format!("T-{:03}", n + 1));
                LegacyTuple::from_item(&Item::from_draft(id, r.to_draft().unwrap(), Utc::now()))
            })
            .collect();
        assert_eq!(rebuilt, expected);
    }
}
