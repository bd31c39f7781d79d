//! Backup operations for a single rule file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Local};

use crate::config::{Config, Operation};
use crate::manifest::{ArchiveTool, EquivalenceChecker, SevenZip};

use super::error::{BackupError, BackupResult};
use super::run_command;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H_%M_%S";

/// What a backup step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Mirrored { destination: PathBuf },
    ArchiveCreated { archive: PathBuf },
    /// The newest existing archive already matches the source.
    ArchiveUnchanged { archive: PathBuf },
}

/// File name suffix for archives produced by `operation`.
pub fn archive_extension(operation: Operation) -> Option<&'static str> {
    match operation {
        Operation::Rsync => None,
        Operation::Tar => Some(".tar"),
        Operation::SevenZip => Some(".archive.7z"),
    }
}

/// `[<timestamp>] <basename><extension>`.
pub fn archive_file_name(basename: &str, extension: &str, timestamp: DateTime<Local>) -> String {
    format!("[{}] {}{}", timestamp.format(TIMESTAMP_FORMAT), basename, extension)
}

/// The newest archive in `dir` for `basename`, judged by its timestamped name.
pub fn latest_archive(dir: &Path, basename: &str, extension: &str) -> BackupResult<Option<PathBuf>> {
    let suffix = format!("] {}{}", basename, extension);
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BackupError::io(dir, e)),
    };

    let mut latest: Option<String> = None;
    for entry in read_dir {
        let entry = entry.map_err(|e| BackupError::io(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('[') && name.ends_with(&suffix) && latest.as_ref().is_none_or(|l| name > *l)
        {
            latest = Some(name);
        }
    }

    Ok(latest.map(|name| dir.join(name)))
}

/// Rule destination directory, created when missing.
pub fn destination_dir(root: &Path, rule_name: &str, sub_dir: Option<&str>) -> BackupResult<PathBuf> {
    let mut dir = root.join(rule_name);
    if let Some(sub) = sub_dir.filter(|s| !s.is_empty()) {
        dir = dir.join(sub);
    }

    if !dir.exists() {
        tracing::info!("Creating destination directory: '{}'", dir.display());
        fs::create_dir_all(&dir).map_err(|e| BackupError::io(&dir, e))?;
    }

    Ok(dir)
}

/// Performs rsync mirrors and archive creation.
pub struct OperationDispatcher<T: ArchiveTool> {
    rsync: PathBuf,
    tar: PathBuf,
    seven_zip: PathBuf,
    checker: EquivalenceChecker<T>,
}

impl OperationDispatcher<SevenZip> {
    pub fn from_config(config: &Config) -> Self {
        let checker = EquivalenceChecker::seven_zip(
            &config.manifest.seven_zip_filepath,
            config.manifest.hash_algorithm,
        );
        Self::new(config, checker)
    }
}

impl<T: ArchiveTool> OperationDispatcher<T> {
    pub fn new(config: &Config, checker: EquivalenceChecker<T>) -> Self {
        Self {
            rsync: config.global.rsync(),
            tar: config.manifest.tar_filepath.clone(),
            seven_zip: config.manifest.seven_zip_filepath.clone(),
            checker,
        }
    }

    pub fn checker(&self) -> &EquivalenceChecker<T> {
        &self.checker
    }

    pub fn perform(&self, source: &Path, dest_dir: &Path, operation: Operation) -> BackupResult<StepOutcome> {
        self.perform_at(source, dest_dir, operation, Local::now())
    }

    pub fn perform_at(
        &self,
        source: &Path,
        dest_dir: &Path,
        operation: Operation,
        timestamp: DateTime<Local>,
    ) -> BackupResult<StepOutcome> {
        if !source.exists() {
            return Err(BackupError::SourceNotFound(source.to_path_buf()));
        }

        match operation {
            Operation::Rsync => self.mirror(source, dest_dir),
            Operation::Tar | Operation::SevenZip => {
                self.archive(source, dest_dir, operation, timestamp)
            }
        }
    }

    fn mirror(&self, source: &Path, dest_dir: &Path) -> BackupResult<StepOutcome> {
        tracing::info!("Performing rsync to destination dir: '{}'", dest_dir.display());

        let mut cmd = Command::new(&self.rsync);
        cmd.args(["-aP", "--delete-after"]).arg(source).arg(dest_dir);
        run_command(&mut cmd)?;

        Ok(StepOutcome::Mirrored { destination: dest_dir.to_path_buf() })
    }

    fn archive(
        &self,
        source: &Path,
        dest_dir: &Path,
        operation: Operation,
        timestamp: DateTime<Local>,
    ) -> BackupResult<StepOutcome> {
        let basename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BackupError::SourceNotFound(source.to_path_buf()))?;
        let extension = archive_extension(operation).unwrap_or_default();

        if let Some(existing) = latest_archive(dest_dir, &basename, extension)? {
            tracing::info!("Comparing source against existing archive: '{}'", existing.display());
            if self.checker.archive_is_current(source, &existing) {
                tracing::info!("Source unchanged since last archive, skipping: '{}'", existing.display());
                return Ok(StepOutcome::ArchiveUnchanged { archive: existing });
            }
        }

        let archive = dest_dir.join(archive_file_name(&basename, extension, timestamp));

        let mut cmd = match operation {
            Operation::Tar => {
                tracing::info!("Creating TAR archive: '{}'", archive.display());
                let parent = source.parent().unwrap_or_else(|| Path::new("."));
                let mut cmd = Command::new(&self.tar);
                // `-h` archives link targets, matching the path manifest walk.
                cmd.arg("-chf").arg(&archive).arg("-C").arg(parent).arg(&basename);
                cmd
            }
            _ => {
                tracing::info!("Creating 7z archive: '{}'", archive.display());
                let mut cmd = Command::new(&self.seven_zip);
                cmd.args(["a", "-y", "--"]).arg(&archive).arg(source);
                cmd
            }
        };
        run_command(&mut cmd)?;

        Ok(StepOutcome::ArchiveCreated { archive })
    }
}
