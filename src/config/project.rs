// Project directory layout

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "machine-config";
const SCRIPTS_DIR: &str = "machine-scripts";
const LOGS_DIR: &str = "~logs";

pub const LOG_FILENAME: &str = "prefbak.log";

/// Locations of the per-machine config files, hook scripts and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(SCRIPTS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Create the logs directory if needed and return the log file path.
    pub fn ensure_log_file(&self) -> io::Result<PathBuf> {
        let dir = self.logs_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir.join(LOG_FILENAME))
    }

    /// Resolve a config file argument.
    ///
    /// An existing path is used as given; anything else is looked up in the
    /// `machine-config` directory.
    pub fn resolve_config(&self, name: &Path) -> PathBuf {
        if name.is_file() { name.to_path_buf() } else { self.config_dir().join(name) }
    }

    pub fn script_path(&self, script_name: &str) -> PathBuf {
        self.scripts_dir().join(script_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new("/opt/prefbak");
        assert_eq!(layout.config_dir(), PathBuf::from("/opt/prefbak/machine-config"));
        assert_eq!(layout.scripts_dir(), PathBuf::from("/opt/prefbak/machine-scripts"));
        assert_eq!(layout.logs_dir(), PathBuf::from("/opt/prefbak/~logs"));
        assert_eq!(layout.script_path("init.sh"), PathBuf::from("/opt/prefbak/machine-scripts/init.sh"));
    }

    #[test]
    fn test_resolve_config_prefers_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("laptop.json");
        fs::write(&file, "{}").unwrap();

        let layout = ProjectLayout::new(dir.path().join("project"));
        assert_eq!(layout.resolve_config(&file), file);
        assert_eq!(
            layout.resolve_config(Path::new("desktop.json")),
            dir.path().join("project").join("machine-config").join("desktop.json")
        );
    }

    #[test]
    fn test_ensure_log_file_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());

        let log = layout.ensure_log_file().unwrap();
        assert!(layout.logs_dir().is_dir());
        assert_eq!(log, dir.path().join("~logs").join("prefbak.log"));
    }
}
