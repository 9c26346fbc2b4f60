use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

/// Directory holding config, slot, lock and recovery log
pub const DATA_DIR_NAME: &str = ".notekeep";
pub const CONFIG_FILE: &str = "notekeep.toml";
pub const SLOT_FILE: &str = "store.json";

/// Error type for locating and reading the data directory
#[derive(Debug, thiserror::Error)]
pub enum DataDirError {
    #[error("not a notekeep workspace: no .notekeep/ directory found (run `nk init`)")]
    NotInitialized,
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse notekeep.toml: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("could not edit notekeep.toml: {0}")]
    ConfigEdit(#[from] toml_edit::TomlError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opened workspace: its root, its data directory and parsed config
#[derive(Debug, Clone)]
pub struct DataDir {
    pub root: PathBuf,
    pub dir: PathBuf,
    pub config: Config,
}

/// Walk up from `start` looking for `.notekeep/notekeep.toml`.
pub fn discover_data_dir(start: &Path) -> Result<PathBuf, DataDirError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(DATA_DIR_NAME).join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(DataDirError::NotInitialized);
        }
    }
}

impl DataDir {
    /// Open the workspace rooted at `root`
    pub fn open(root: &Path) -> Result<Self, DataDirError> {
        let dir = root.join(DATA_DIR_NAME);
        let config_path = dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&config_path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => DataDirError::NotInitialized,
            _ => DataDirError::Read {
                path: config_path.clone(),
                source,
            },
        })?;
        let config: Config = toml::from_str(&text)?;
        tracing::debug!(root = %root.display(), "opened workspace");
        Ok(DataDir {
            root: root.to_path_buf(),
            dir,
            config,
        })
    }

    /// Discover from `start` and open
    pub fn discover(start: &Path) -> Result<Self, DataDirError> {
        DataDir::open(&discover_data_dir(start)?)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn slot_path(&self) -> PathBuf {
        self.dir.join(SLOT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init(root: &Path) {
        let dir = root.join(DATA_DIR_NAME);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), "[workspace]\nname = \"t\"\n").unwrap();
    }

    #[test]
    fn discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        init(tmp.path());
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(discover_data_dir(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn bare_directory_is_not_enough() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(DATA_DIR_NAME)).unwrap();
        assert!(matches!(
            discover_data_dir(tmp.path()),
            Err(DataDirError::NotInitialized)
        ));
    }

    #[test]
    fn open_reads_config_and_paths() {
        let tmp = TempDir::new().unwrap();
        init(tmp.path());
        let data = DataDir::open(tmp.path()).unwrap();
        assert_eq!(data.config.workspace.name, "t");
        assert_eq!(data.slot_path(), tmp.path().join(".notekeep/store.json"));
    }
}
