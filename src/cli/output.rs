use serde::Serialize;

use crate::model::config::Density;
use crate::model::item::{Item, ItemKind, Lifecycle};
use crate::ops::view::ViewSummary;
use crate::util::unicode::{display_width, truncate_to_width};

/// Listing width when the terminal does not say
const DEFAULT_WIDTH: usize = 80;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    pub tag: String,
    pub kind: &'static str,
    pub state: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ListJson {
    pub scope: String,
    pub summary: ViewSummary,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct CountJson {
    pub count: usize,
}

pub fn item_to_json(item: &Item) -> ItemJson {
    ItemJson {
        id: item.id.to_string(),
        title: item.title.clone(),
        body: item.body.clone(),
        tag: item.tag.clone(),
        kind: match item.kind {
            ItemKind::Note => "note",
            ItemKind::Todo { .. } => "todo",
        },
        state: item.lifecycle(),
        priority: item.priority(),
        due: item.due().map(|d| d.to_string()),
        created_at: item
            .created_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Terminal width from `COLUMNS`, else 80
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .filter(|&w| w >= 20)
        .unwrap_or(DEFAULT_WIDTH)
}

fn marker(item: &Item) -> &'static str {
    match item.lifecycle() {
        Lifecycle::Pinned => "[*]",
        Lifecycle::Active => "[ ]",
        Lifecycle::Archived => "[a]",
    }
}

fn todo_suffix(item: &Item) -> String {
    let mut out = String::new();
    if let Some(p) = item.priority() {
        out.push_str(&format!(" !{}", p));
    }
    if let Some(d) = item.due() {
        out.push_str(&format!(" due {}", d));
    }
    out
}

fn tag_label(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{}", tag)
    }
}

/// One listing entry. Compact is a single line; comfortable adds a body
/// preview under titled items.
pub fn format_item_entry(item: &Item, density: Density, width: usize) -> Vec<String> {
    let tail = format!("  {}{}", tag_label(&item.tag), todo_suffix(item));
    let head = format!("{} {} ", marker(item), item.id);
    let room = width.saturating_sub(display_width(&head) + display_width(&tail));
    let first = format!(
        "{}{}{}",
        head,
        truncate_to_width(item.heading(), room.max(8)),
        tail
    );

    let mut lines = vec![first];
    if density == Density::Comfortable
        && item.title.is_some()
        && let Some(preview) = item.body.lines().find(|l| !l.trim().is_empty())
    {
        lines.push(format!(
            "      {}",
            truncate_to_width(preview.trim(), width.saturating_sub(6).max(8))
        ));
    }
    lines
}

pub fn format_listing_header(scope: &str, summary: &ViewSummary) -> String {
    format!(
        "== {} == {} active ({} pinned), {} archived",
        scope, summary.active, summary.pinned, summary.archived
    )
}

pub fn format_listing(
    scope: &str,
    summary: &ViewSummary,
    items: &[&Item],
    density: Density,
    width: usize,
) -> Vec<String> {
    let mut lines = vec![format_listing_header(scope, summary)];
    if items.is_empty() {
        lines.push("  (nothing here)".to_string());
        return lines;
    }
    for (i, item) in items.iter().enumerate() {
        if density == Density::Comfortable && i > 0 {
            lines.push(String::new());
        }
        lines.extend(format_item_entry(item, density, width));
    }
    lines
}

pub fn format_item_detail(item: &Item) -> Vec<String> {
    let mut lines = vec![format!("{} {} {}", marker(item), item.id, item.heading())];
    lines.push(format!("kind: {}", item.kind.noun()));
    lines.push(format!("tag: {}", tag_label(&item.tag)));
    if let Some(p) = item.priority() {
        lines.push(format!("priority: {}", p));
    }
    if let Some(d) = item.due() {
        lines.push(format!("due: {}", d));
    }
    lines.push(format!(
        "created: {}",
        item.created_at.format("%Y-%m-%d %H:%M UTC")
    ));
    lines.push(String::new());
    lines.extend(item.body.lines().map(|l| l.to_string()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{ItemDraft, ItemId};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn items() -> Vec<Item> {
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap();
        let mut pinned = Item::from_draft(
            ItemId::from("N-001"),
            ItemDraft::note("Buy milk\nand eggs").with_title("Groceries"),
            at(9),
        );
        pinned.pinned = true;
        let mut todo = ItemDraft::todo("File the 2024 return before the deadline").with_tag("admin");
        todo.kind = ItemKind::todo(Some(1), NaiveDate::from_ymd_opt(2025, 4, 15));
        let todo = Item::from_draft(ItemId::from("T-002"), todo, at(10));
        vec![pinned, todo]
    }

    fn render(density: Density, width: usize) -> String {
        let items = items();
        let refs: Vec<&Item> = items.iter().collect();
        let summary = ViewSummary {
            active: 2,
            pinned: 1,
            archived: 0,
        };
        format_listing("default", &summary, &refs, density, width).join("\n")
    }

    #[test]
    fn comfortable_listing() {
        insta::assert_snapshot!(render(Density::Comfortable, 80), @r"
        == default == 2 active (1 pinned), 0 archived
        [*] N-001 Groceries  #general
              Buy milk

        [ ] T-002 File the 2024 return before the deadline  #admin !1 due 2025-04-15
        ");
    }

    #[test]
    fn compact_listing_truncates() {
        insta::assert_snapshot!(render(Density::Compact, 50), @r"
        == default == 2 active (1 pinned), 0 archived
        [*] N-001 Groceries  #general
        [ ] T-002 File the 2024…  #admin !1 due 2025-04-15
        ");
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(item_to_json(&items()[1])).unwrap();
        assert_eq!(json["kind"], "todo");
        assert_eq!(json["state"], "active");
        assert_eq!(json["due"], "2025-04-15");
        assert_eq!(json["created_at"], "2025-06-01T10:00:00Z");
        assert!(json.get("title").is_none());
    }
}
