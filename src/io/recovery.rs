//! Recovery log: data nk could not store, or removed on purpose, is kept
//! here so it can be copied back by hand.
//!
//! The log is JSON Lines (`recovery.jsonl`), one entry per line, oldest
//! first. Appends never rewrite earlier lines except when the file grows
//! past [`MAX_LOG_SIZE`], at which point entries older than
//! [`RETAIN_DAYS`] are dropped.

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::model::item::Item;

const LOG_FILE: &str = "recovery.jsonl";
const MAX_LOG_SIZE: u64 = 1024 * 1024;
pub const RETAIN_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryCategory {
    /// Slot contents that could not be decoded
    Corrupt,
    /// A payload whose save failed
    Write,
    /// An item removed permanently
    Delete,
}

impl RecoveryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryCategory::Corrupt => "corrupt",
            RecoveryCategory::Write => "write",
            RecoveryCategory::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: IndexMap::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Human-readable block for `nk recovery`
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} [{}] {}\n",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category.as_str(),
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("  {}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push('\n');
            for line in self.body.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

pub fn recovery_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_FILE)
}

/// Write `content` to `path` through a temp file in the same directory and
/// a rename, so readers never observe a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append an entry. A failure here is logged and swallowed; it never fails
/// the command that produced the entry.
pub fn log_recovery(data_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append(data_dir, &entry) {
        tracing::warn!(error = %e, category = entry.category.as_str(), "recovery log append failed");
    }
}

fn append(data_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(data_dir);
    if std::fs::metadata(&path).is_ok_and(|m| m.len() > MAX_LOG_SIZE) {
        trim_older_than(&path, Utc::now() - Duration::days(RETAIN_DAYS))?;
    }

    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(line.as_bytes())
}

fn trim_older_than(path: &Path, cutoff: DateTime<Utc>) -> io::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let mut kept = String::with_capacity(content.len());
    let mut dropped = 0;
    for line in content.lines() {
        match serde_json::from_str::<RecoveryEntry>(line) {
            Ok(entry) if entry.timestamp < cutoff => dropped += 1,
            // Unparseable lines are kept; they may still be worth reading
            _ => {
                kept.push_str(line);
                kept.push('\n');
            }
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "recovery log trimmed");
        atomic_write(path, kept.as_bytes())?;
    }
    Ok(())
}

/// Record an item removed by `delete`, `purge` or a group deletion
pub fn log_item_deletion(data_dir: &Path, group: &str, item: &Item) {
    let body = serde_json::to_string_pretty(item).unwrap_or_else(|_| item.body.clone());
    log_recovery(
        data_dir,
        RecoveryEntry::new(
            RecoveryCategory::Delete,
            format!("{} {} deleted", item.kind.noun(), item.id),
        )
        .field("group", group)
        .body(body),
    );
}

/// Preserve undecodable slot contents before they are replaced
pub fn log_corrupt_slot(data_dir: &Path, slot: &Path, reason: &str, raw: &str) {
    log_recovery(
        data_dir,
        RecoveryEntry::new(RecoveryCategory::Corrupt, "unreadable slot reset to empty")
            .field("slot", slot.display().to_string())
            .field("reason", reason)
            .body(raw),
    );
}

/// Preserve a payload that could not be written
pub fn log_failed_write(data_dir: &Path, slot: &Path, reason: &str, payload: &str) {
    log_recovery(
        data_dir,
        RecoveryEntry::new(RecoveryCategory::Write, "slot write failed")
            .field("slot", slot.display().to_string())
            .field("reason", reason)
            .body(payload),
    );
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries newest first, at most `limit` of them. Lines that do not parse
/// are skipped.
pub fn read_recovery_entries(data_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(file) = std::fs::File::open(recovery_log_path(data_dir)) else {
        return Vec::new();
    };
    let mut entries: Vec<RecoveryEntry> = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect();
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}
