//! Hook script execution.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Config, Platform, ProjectLayout};

use super::error::{BackupError, BackupResult};
use super::run_command;

/// Runs init/post hook scripts from the project scripts directory.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    scripts_dir: PathBuf,
    platform: Platform,
    powershell: PathBuf,
}

impl ScriptRunner {
    pub fn new(layout: &ProjectLayout, config: &Config) -> Self {
        Self {
            scripts_dir: layout.scripts_dir(),
            platform: config.platform,
            powershell: config.global.powershell(),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Command that runs `script` on this platform.
    pub fn command_for(&self, script: &Path) -> Command {
        if self.platform.is_windows() {
            let mut cmd = Command::new(&self.powershell);
            cmd.arg(script);
            cmd
        } else {
            Command::new(script)
        }
    }

    pub fn run(&self, script_name: &str) -> BackupResult<()> {
        let script = self.scripts_dir.join(script_name);
        if !script.is_file() {
            return Err(BackupError::ScriptNotFound(script));
        }

        tracing::info!("Starting script: '{}'", script.display());
        run_command(&mut self.command_for(&script))?;
        tracing::info!("Script execution complete");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, ManifestConfig};
    use std::ffi::OsStr;

    fn config(platform: Platform) -> Config {
        Config {
            global: GlobalConfig {
                destination_root_dir: PathBuf::from("/backups"),
                powershell_filepath: None,
                rsync_filepath: None,
                init_script: None,
                post_script: None,
            },
            manifest: ManifestConfig::default(),
            rules: Vec::new(),
            platform,
        }
    }

    #[test]
    fn test_windows_scripts_run_through_powershell() {
        let layout = ProjectLayout::new("/p");
        let runner = ScriptRunner::new(&layout, &config(Platform::Windows));

        let cmd = runner.command_for(Path::new("/p/machine-scripts/init.ps1"));
        assert!(cmd.get_program().to_string_lossy().ends_with("powershell.exe"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, vec![OsStr::new("/p/machine-scripts/init.ps1")]);
    }

    #[test]
    fn test_unix_scripts_run_directly() {
        let layout = ProjectLayout::new("/p");
        let runner = ScriptRunner::new(&layout, &config(Platform::Unix));

        let cmd = runner.command_for(Path::new("/p/machine-scripts/init.sh"));
        assert_eq!(cmd.get_program(), OsStr::new("/p/machine-scripts/init.sh"));
        assert_eq!(cmd.get_args().count(), 0);
    }

    #[test]
    fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let runner = ScriptRunner::new(&layout, &config(Platform::Unix));

        let result = runner.run("missing.sh");
        assert!(matches!(result, Err(BackupError::ScriptNotFound(_))));
    }
}
