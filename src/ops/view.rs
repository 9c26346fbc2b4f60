use std::cmp::Reverse;

use serde::Serialize;

use crate::model::collection::Collection;
use crate::model::item::Item;

/// Which lifecycle states a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewScope {
    /// Everything not archived (the dashboard)
    #[default]
    Active,
    /// Only archived items (the vault)
    Archived,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub scope: ViewScope,
    /// Re-sort the displayed list by ascending priority
    pub by_priority: bool,
}

/// Counts shown alongside a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewSummary {
    pub active: usize,
    pub pinned: usize,
    pub archived: usize,
}

/// Derive the display list for a collection.
///
/// Items match when `filter_text` occurs case-insensitively in the title,
/// body or tag. Whitespace inside a filter counts; an all-whitespace filter
/// matches everything. Pinned items come first; within each partition newer items
/// precede older ones, and equal timestamps keep insertion order.
pub fn project<'a>(
    collection: &'a Collection,
    filter_text: &str,
    options: &ViewOptions,
) -> Vec<&'a Item> {
    let needle = if filter_text.trim().is_empty() {
        String::new()
    } else {
        filter_text.to_lowercase()
    };
    let mut items: Vec<&Item> = collection
        .items
        .values()
        .filter(|item| in_scope(item, options.scope))
        .filter(|item| matches_filter(item, &needle))
        .collect();

    items.sort_by_key(|item| (!item.pinned, Reverse(item.created_at)));

    if options.by_priority {
        sort_by_priority(&mut items);
    }
    items
}

fn in_scope(item: &Item, scope: ViewScope) -> bool {
    match scope {
        ViewScope::Active => !item.archived,
        ViewScope::Archived => item.archived,
        ViewScope::All => true,
    }
}

/// `needle` must already be lowercased. An empty needle matches everything.
pub fn matches_filter(item: &Item, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let hit = |text: &str| text.to_lowercase().contains(needle);
    item.title.as_deref().is_some_and(hit) || hit(&item.body) || hit(&item.tag)
}

/// Stable ascending sort of an already-displayed list by priority. Items
/// without a priority keep their relative order at the end.
pub fn sort_by_priority(items: &mut [&Item]) {
    items.sort_by_key(|item| match item.priority() {
        Some(p) => (0, p),
        None => (1, 0),
    });
}

pub fn summarize(collection: &Collection) -> ViewSummary {
    let mut summary = ViewSummary::default();
    for item in collection.items.values() {
        if item.archived {
            summary.archived += 1;
        } else {
            summary.active += 1;
            if item.pinned {
                summary.pinned += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::collection::Scope;
    use crate::model::item::{ItemDraft, ItemId, ItemKind};
    use crate::ops::store;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 8, 30, 0).unwrap()
    }

    fn sample() -> Collection {
        let mut c = Collection::new(Scope::Owner("ana".into()));
        let entries = [
            ("N-001", Some("Groceries"), "Buy milk", "home", 3, false),
            ("N-002", None, "Call the plumber", "", 5, false),
            ("N-003", Some("Standup"), "notes from monday", "work", 1, true),
            ("N-004", None, "Old receipts", "Finance", 2, false),
        ];
        for (id, title, body, tag, day, pinned) in entries {
            let mut draft = ItemDraft::note(body).with_tag(tag);
            draft.title = title.map(str::to_string);
            draft.pinned = pinned;
            store::add(&mut c, Item::from_draft(ItemId::from(id), draft, at(day))).unwrap();
        }
        store::archive(&mut c, &ItemId::from("N-004")).unwrap();
        c
    }

    fn ids(items: &[&Item]) -> Vec<String> {
        items.iter().map(|i| i.id.to_string()).collect()
    }

    #[test]
    fn pinned_first_then_newest() {
        let c = sample();
        let view = project(&c, "", &ViewOptions::default());
        assert_eq!(ids(&view), vec!["N-003", "N-002", "N-001"]);
    }

    #[test]
    fn filter_is_case_insensitive_over_title_body_tag() {
        let c = sample();
        let opts = ViewOptions::default();
        assert_eq!(ids(&project(&c, "MILK", &opts)), vec!["N-001"]);
        assert_eq!(ids(&project(&c, "groc", &opts)), vec!["N-001"]);
        assert_eq!(ids(&project(&c, "Work", &opts)), vec!["N-003"]);
        assert_eq!(ids(&project(&c, "general", &opts)), vec!["N-002"]);
        assert!(project(&c, "nothing like this", &opts).is_empty());
    }

    #[test]
    fn filter_whitespace_is_significant() {
        let c = sample();
        let opts = ViewOptions::default();
        assert!(project(&c, "milk ", &opts).is_empty());
        assert_eq!(ids(&project(&c, "call ", &opts)), vec!["N-002"]);
        assert_eq!(ids(&project(&c, "the plumber", &opts)), vec!["N-002"]);
        assert_eq!(project(&c, " \t ", &opts).len(), 3);
    }

    #[test]
    fn projection_is_never_larger_than_collection() {
        let c = sample();
        for text in ["", "a", "e", "zzz", "  "] {
            for scope in [ViewScope::Active, ViewScope::Archived, ViewScope::All] {
                let opts = ViewOptions {
                    scope,
                    by_priority: false,
                };
                assert!(project(&c, text, &opts).len() <= store::list(&c).len());
            }
        }
    }

    #[test]
    fn archived_scope_shows_only_vault() {
        let c = sample();
        let opts = ViewOptions {
            scope: ViewScope::Archived,
            ..Default::default()
        };
        assert_eq!(ids(&project(&c, "", &opts)), vec!["N-004"]);
        let all = ViewOptions {
            scope: ViewScope::All,
            ..Default::default()
        };
        assert_eq!(project(&c, "", &all).len(), 4);
    }

    #[test]
    fn pinning_old_item_moves_it_above_unpinned() {
        let mut c = sample();
        store::toggle_pin(&mut c, &ItemId::from("N-001")).unwrap();
        let view = project(&c, "", &ViewOptions::default());
        // N-003 (day 1) and N-001 (day 3) are pinned; newest pinned first
        assert_eq!(ids(&view), vec!["N-001", "N-003", "N-002"]);
        let first_unpinned = view.iter().position(|i| !i.pinned).unwrap();
        assert!(view[first_unpinned..].iter().all(|i| !i.pinned));
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let mut c = Collection::new(Scope::Group("g".into()));
        for id in ["N-001", "N-002", "N-003"] {
            store::add(
                &mut c,
                Item::from_draft(ItemId::from(id), ItemDraft::note("same"), at(4)),
            )
            .unwrap();
        }
        let view = project(&c, "", &ViewOptions::default());
        assert_eq!(ids(&view), vec!["N-001", "N-002", "N-003"]);
    }

    #[test]
    fn priority_sort_is_on_demand_and_stable() {
        let mut c = Collection::new(Scope::Group("chores".into()));
        let tasks = [("T-001", Some(3), 1), ("T-002", None, 2), ("T-003", Some(1), 3), ("T-004", Some(3), 4)];
        for (id, priority, day) in tasks {
            let mut draft = ItemDraft::todo("task");
            draft.kind = ItemKind::todo(priority, None);
            store::add(&mut c, Item::from_draft(ItemId::from(id), draft, at(day))).unwrap();
        }

        let default_view = project(&c, "", &ViewOptions::default());
        assert_eq!(ids(&default_view), vec!["T-004", "T-003", "T-002", "T-001"]);

        let opts = ViewOptions {
            by_priority: true,
            ..Default::default()
        };
        let view = project(&c, "", &opts);
        assert_eq!(ids(&view), vec!["T-003", "T-004", "T-001", "T-002"]);

        // the collection itself is untouched
        let stored: Vec<_> = store::list(&c).iter().map(|i| i.id.to_string()).collect();
        assert_eq!(stored, vec!["T-001", "T-002", "T-003", "T-004"]);
    }

    #[test]
    fn summary_counts() {
        let c = sample();
        assert_eq!(
            summarize(&c),
            ViewSummary {
                active: 3,
                pinned: 1,
                archived: 1
            }
        );
    }
}
