use serde::{Deserialize, Serialize};

use super::item::ItemKind;

/// Configuration from notekeep.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub workspace: WorkspaceInfo,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Server origin, e.g. `http://localhost:3001`. `/api` is appended.
    #[serde(default)]
    pub base_url: String,
    /// Cookie header sent with every request (overridden by NOTEKEEP_SESSION)
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: String::new(),
            session_cookie: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Name reported as the current user in local mode
    #[serde(default)]
    pub owner: Option<String>,
    /// Group used when a command is not given `--group`
    #[serde(default = "default_group")]
    pub default_group: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            owner: None,
            default_group: default_group(),
        }
    }
}

pub fn default_group() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_note_prefix")]
    pub note_prefix: String,
    #[serde(default = "default_todo_prefix")]
    pub todo_prefix: String,
}

impl Default for IdConfig {
    fn default() -> Self {
        IdConfig {
            note_prefix: default_note_prefix(),
            todo_prefix: default_todo_prefix(),
        }
    }
}

impl IdConfig {
    pub fn prefix_for(&self, kind: &ItemKind) -> &str {
        match kind {
            ItemKind::Note => &self.note_prefix,
            ItemKind::Todo { .. } => &self.todo_prefix,
        }
    }
}

fn default_note_prefix() -> String {
    "N".to_string()
}

fn default_todo_prefix() -> String {
    "T".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    #[default]
    Comfortable,
    Compact,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub density: Density,
    /// Pause before a delete is sent, so the pending state is visible.
    /// Zero disables it.
    #[serde(default)]
    pub delete_delay_ms: u64,
}
