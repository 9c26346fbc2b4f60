use std::fs;
use std::path::Path;

use crate::io::data_dir::{CONFIG_FILE, DataDirError};
use crate::io::recovery::atomic_write;
use crate::model::config::Config;

/// Read the config both parsed and as a toml_edit document, so it can be
/// edited without losing comments or layout.
pub fn read_config(data_dir: &Path) -> Result<(Config, toml_edit::DocumentMut), DataDirError> {
    let config_path = data_dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&config_path).map_err(|source| DataDirError::Read {
        path: config_path.clone(),
        source,
    })?;
    let config: Config = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

pub fn write_config(data_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), DataDirError> {
    atomic_write(&data_dir.join(CONFIG_FILE), doc.to_string().as_bytes())?;
    Ok(())
}

/// Set `[local] default_group`
pub fn set_default_group(doc: &mut toml_edit::DocumentMut, group: &str) {
    if !doc.contains_key("local") {
        doc["local"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["local"]["default_group"] = toml_edit::value(group);
}
