use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::data_dir::{self, CONFIG_FILE, DATA_DIR_NAME};
use crate::io::recovery::atomic_write;

const CONFIG_TEMPLATE: &str = r##"[workspace]
name = ""

[backend]
# "local" keeps everything in .notekeep/store.json
# "remote" talks to a notes server at [remote] base_url
mode = "local"

[remote]
base_url = ""
# Cookie header for the server session (NOTEKEEP_SESSION overrides it)
# session_cookie = "connect.sid=..."
timeout_secs = 10

[local]
# Reported by `nk whoami`; local commands need one
owner = ""
default_group = "default"

# --- ID Prefixes ---
# Local ids look like N-001 for notes and T-001 for to-dos.
#
# [ids]
# note_prefix = "N"
# todo_prefix = "T"

[ui]
density = "comfortable"   # or "compact"
# Pause before a delete is sent, in milliseconds
delete_delay_ms = 0
"##;

/// Workspace name from a directory name: hyphens become spaces, words are
/// capitalized.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_owner() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "me".to_string())
}

/// Fill the template through toml_edit so values are quoted correctly and
/// the comments survive.
fn render_config(
    name: &str,
    owner: &str,
    remote: Option<&str>,
) -> Result<String, toml_edit::TomlError> {
    let mut doc: toml_edit::DocumentMut = CONFIG_TEMPLATE.parse()?;
    doc["workspace"]["name"] = toml_edit::value(name);
    doc["local"]["owner"] = toml_edit::value(owner);
    if let Some(url) = remote {
        doc["backend"]["mode"] = toml_edit::value("remote");
        doc["remote"]["base_url"] = toml_edit::value(url);
    }
    Ok(doc.to_string())
}

pub fn cmd_init(args: InitArgs, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let dir = root.join(DATA_DIR_NAME);
    if dir.join(CONFIG_FILE).exists() && !args.force {
        return Err("notekeep workspace already exists in ./.notekeep/ (use --force)".into());
    }

    if let Some(parent) = root.parent()
        && let Ok(outer) = data_dir::discover_data_dir(parent)
    {
        eprintln!("Note: enclosing workspace found at {}/", outer.display());
        eprintln!("Creating a separate one in ./{}/", DATA_DIR_NAME);
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Notes".to_string())
    });
    let owner = args.owner.unwrap_or_else(default_owner);
    let config = render_config(&name, &owner, args.remote.as_deref())?;

    fs::create_dir_all(&dir)?;
    atomic_write(&dir.join(CONFIG_FILE), config.as_bytes())?;
    tracing::info!(root = %root.display(), "workspace initialized");

    println!("Initialized notekeep workspace: {}", name);
    match args.remote {
        Some(url) => println!("  backend: remote ({})", url),
        None => println!("  backend: local (owner {})", owner),
    }
    Ok(())
}
