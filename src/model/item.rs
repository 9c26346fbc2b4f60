use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Tag given to items created without one
pub const DEFAULT_TAG: &str = "general";

/// Opaque item identifier. Remote ids come from the server verbatim; local
/// ids look like `N-007`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing sequence number of a local id (`N-007` → 7)
    pub fn sequence(&self) -> Option<u32> {
        let (_, num) = self.0.rsplit_once('-')?;
        num.parse().ok()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

/// What sort of item this is. To-dos carry their own scheduling fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Note,
    Todo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due: Option<NaiveDate>,
    },
}

impl ItemKind {
    pub fn todo(priority: Option<u32>, due: Option<NaiveDate>) -> Self {
        ItemKind::Todo { priority, due }
    }

    pub fn is_todo(&self) -> bool {
        matches!(self, ItemKind::Todo { .. })
    }

    /// Noun used in user-facing messages
    pub fn noun(&self) -> &'static str {
        match self {
            ItemKind::Note => "note",
            ItemKind::Todo { .. } => "task",
        }
    }
}

/// Where an item sits in its lifecycle. Deleted items are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Pinned,
    Active,
    Archived,
}

/// User input for a new item, before the persistence layer assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: Option<String>,
    pub body: String,
    pub tag: Option<String>,
    pub pinned: bool,
    pub kind: ItemKind,
}

impl ItemDraft {
    pub fn note(body: impl Into<String>) -> Self {
        ItemDraft {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn todo(body: impl Into<String>) -> Self {
        ItemDraft {
            body: body.into(),
            kind: ItemKind::todo(None, None),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Partial update. `None` leaves a field alone; for the clearable fields
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub title: Option<Option<String>>,
    pub body: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<Option<u32>>,
    pub due: Option<Option<NaiveDate>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }

    /// Whether the patch changes fields that only to-dos have
    pub fn touches_todo_fields(&self) -> bool {
        self.priority.is_some() || self.due.is_some()
    }
}

/// A note or to-do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    pub tag: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Build an item from a draft. All field defaulting happens here.
    pub fn from_draft(id: ItemId, draft: ItemDraft, created_at: DateTime<Utc>) -> Self {
        Item {
            id,
            title: normalize_title(draft.title),
            body: draft.body.trim_end().to_string(),
            tag: normalize_tag(draft.tag.as_deref()),
            pinned: draft.pinned,
            archived: false,
            kind: draft.kind,
            created_at,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.archived {
            Lifecycle::Archived
        } else if self.pinned {
            Lifecycle::Pinned
        } else {
            Lifecycle::Active
        }
    }

    pub fn is_todo(&self) -> bool {
        self.kind.is_todo()
    }

    pub fn priority(&self) -> Option<u32> {
        match self.kind {
            ItemKind::Todo { priority, .. } => priority,
            ItemKind::Note => None,
        }
    }

    pub fn due(&self) -> Option<NaiveDate> {
        match self.kind {
            ItemKind::Todo { due, .. } => due,
            ItemKind::Note => None,
        }
    }

    /// Title if present, otherwise the first line of the body
    pub fn heading(&self) -> &str {
        match &self.title {
            Some(t) => t,
            None => self.body.lines().next().unwrap_or(""),
        }
    }

    /// Apply an already-validated patch
    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        if let Some(title) = &patch.title {
            self.title = normalize_title(title.clone());
        }
        if let Some(body) = &patch.body {
            self.body = body.trim_end().to_string();
        }
        if let Some(tag) = &patch.tag {
            self.tag = normalize_tag(Some(tag));
        }
        if let ItemKind::Todo { priority, due } = &mut self.kind {
            if let Some(p) = patch.priority {
                *priority = p;
            }
            if let Some(d) = patch.due {
                *due = d;
            }
        }
    }
}

/// Blank titles become absent
pub fn normalize_title(title: Option<String>) -> Option<String> {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Blank tags fall back to [`DEFAULT_TAG`]; anything else is kept as typed
pub fn normalize_tag(tag: Option<&str>) -> String {
    match tag {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => DEFAULT_TAG.to_string(),
    }
}
