//! Backup configuration.
//!
//! A machine's config file declares the destination root, optional global
//! hook scripts, the manifest settings and the backup rules. Values can be
//! overridden with `PREFBAK_*` environment variables, using `__` between
//! nested keys (e.g. `PREFBAK_GLOBAL__DESTINATION_ROOT_DIR`).

mod project;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::HashAlgorithm;

pub use project::ProjectLayout;

pub const DEFAULT_POWERSHELL_FILEPATH: &str =
    r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe";
pub const DEFAULT_RSYNC_FILEPATH: &str = "rsync";
pub const DEFAULT_TAR_FILEPATH: &str = "tar";
pub const DEFAULT_SEVEN_ZIP_FILEPATH: &str = "7z";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Host platform, captured once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) { Platform::Windows } else { Platform::Unix }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// How a rule file is backed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Mirror the source into the destination directory.
    #[serde(rename = "rsync")]
    Rsync,
    /// Timestamped tar archive of the source.
    #[serde(rename = "tar")]
    Tar,
    /// Timestamped 7z archive of the source, skipped when the newest one is current.
    #[serde(rename = "7z")]
    SevenZip,
}

impl Operation {
    pub fn produces_archive(&self) -> bool {
        !matches!(self, Operation::Rsync)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Rsync => write!(f, "rsync"),
            Operation::Tar => write!(f, "tar"),
            Operation::SevenZip => write!(f, "7z"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(skip)]
    pub platform: Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub destination_root_dir: PathBuf,
    #[serde(default)]
    pub powershell_filepath: Option<PathBuf>,
    #[serde(default)]
    pub rsync_filepath: Option<PathBuf>,
    #[serde(default)]
    pub init_script: Option<String>,
    #[serde(default)]
    pub post_script: Option<String>,
}

impl GlobalConfig {
    pub fn powershell(&self) -> PathBuf {
        self.powershell_filepath
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_POWERSHELL_FILEPATH))
    }

    pub fn rsync(&self) -> PathBuf {
        self.rsync_filepath.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_RSYNC_FILEPATH))
    }
}

/// Settings for archive equivalence checks and archive tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    #[serde(default = "default_seven_zip")]
    pub seven_zip_filepath: PathBuf,
    #[serde(default = "default_tar")]
    pub tar_filepath: PathBuf,
}

fn default_seven_zip() -> PathBuf {
    PathBuf::from(DEFAULT_SEVEN_ZIP_FILEPATH)
}

fn default_tar() -> PathBuf {
    PathBuf::from(DEFAULT_TAR_FILEPATH)
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            seven_zip_filepath: default_seven_zip(),
            tar_filepath: default_tar(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub init_script: Option<String>,
    #[serde(default)]
    pub post_script: Option<String>,
    #[serde(default)]
    pub files: Vec<RuleFileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFileConfig {
    pub source_path: PathBuf,
    #[serde(default)]
    pub destination_sub_dir: Option<String>,
    pub operation: Operation,
}

impl Config {
    /// Load and validate a config file, layering `PREFBAK_*` overrides on top.
    ///
    /// The file format follows the extension (`.json` or `.toml`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        tracing::info!("Loading prefbak config file: {}", path.display());

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("PREFBAK").prefix_separator("_").separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.destination_root_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("global.destination_root_dir is required".into()));
        }

        if self.platform.is_windows() && self.global.rsync_filepath.is_none() {
            return Err(ConfigError::Invalid("global.rsync_filepath is required on Windows".into()));
        }

        let mut names = HashSet::new();
        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::Invalid("rule name is required".into()));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate rule name: {}", rule.name)));
            }
            if rule.files.is_empty() {
                return Err(ConfigError::Invalid(format!("rule '{}' has no files", rule.name)));
            }

            for file in &rule.files {
                if file.source_path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "rule '{}' has a file without source_path",
                        rule.name
                    )));
                }
                if self.platform.is_windows() && file.operation == Operation::Tar {
                    return Err(ConfigError::Invalid(format!(
                        "rule '{}': tar operation is not supported on Windows",
                        rule.name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn rule(&self, name: &str) -> Option<&RuleConfig> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
