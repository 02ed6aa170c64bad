//! Client profile and home directory layout.
//!
//! A home directory holds everything a client keeps between invocations:
//!
//! ```text
//! <home>/catalog.json   persisted catalog
//! <home>/config.toml    client profile
//! <home>/HEAD           active branch
//! ```

use crate::catalog::MAIN_BRANCH;
use crate::runner::DEFAULT_AUTHOR;
use crate::utils::is_valid_ref_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the home directory.
pub const HOME_ENV: &str = "LAKEFLOW_HOME";

/// Environment variable overriding the profile author.
pub const AUTHOR_ENV: &str = "LAKEFLOW_AUTHOR";

/// Home directory used when neither a flag nor [`HOME_ENV`] is set.
pub const DEFAULT_HOME: &str = ".lakeflow";

/// Errors reading or writing client state.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A file could not be read or written.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        message: String,
    },

    /// `config.toml` is malformed.
    #[error("Malformed client config: {0}")]
    Parse(String),

    /// The profile could not be serialized.
    #[error("Could not serialize client config: {0}")]
    Serialize(String),

    /// `HEAD` names something that cannot be a branch.
    #[error("Invalid branch name '{0}' in HEAD")]
    InvalidHead(String),
}

fn io_error(path: &Path, err: &std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// The `config.toml` profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Author recorded on commits.
    #[serde(default = "default_author")]
    pub author: String,
    /// Branch used when there is no `HEAD`.
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn default_branch() -> String {
    MAIN_BRANCH.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            default_branch: default_branch(),
        }
    }
}

impl ClientConfig {
    /// Parses profile text; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies [`AUTHOR_ENV`] if it is set and non-empty.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Ok(author) = std::env::var(AUTHOR_ENV) {
            if !author.trim().is_empty() {
                self.author = author;
            }
        }
        self
    }
}

/// A client home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home {
    root: PathBuf,
}

impl Home {
    /// Uses `root` as the home directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Picks the home directory: `flag`, then [`HOME_ENV`], then
    /// [`DEFAULT_HOME`].
    #[must_use]
    pub fn locate(flag: Option<PathBuf>) -> Self {
        let root = flag
            .or_else(|| std::env::var_os(HOME_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME));
        Self::new(root)
    }

    /// The directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the catalog is persisted.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    /// Where the profile lives.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    /// Reads the profile, or the defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns an I/O or parse error.
    pub fn config(&self) -> Result<ClientConfig, ConfigError> {
        let path = self.config_path();
        match fs::read_to_string(&path) {
            Ok(text) => ClientConfig::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
            Err(e) => Err(io_error(&path, &e)),
        }
    }

    /// Writes the profile.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn save_config(&self, config: &ClientConfig) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        self.write(&self.config_path(), &text)
    }

    /// The active branch: the `HEAD` file if present, otherwise the
    /// profile's default branch.
    ///
    /// # Errors
    ///
    /// Returns an error if `HEAD` cannot be read or names an invalid branch.
    pub fn current_branch(&self) -> Result<String, ConfigError> {
        let path = self.head_path();
        match fs::read_to_string(&path) {
            Ok(text) => {
                let branch = text.trim();
                if is_valid_ref_name(branch) {
                    Ok(branch.to_string())
                } else {
                    Err(ConfigError::InvalidHead(branch.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self.config()?.default_branch),
            Err(e) => Err(io_error(&path, &e)),
        }
    }

    /// Makes `branch` the active branch.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a failed write.
    pub fn set_current_branch(&self, branch: &str) -> Result<(), ConfigError> {
        if !is_valid_ref_name(branch) {
            return Err(ConfigError::InvalidHead(branch.to_string()));
        }
        self.write(&self.head_path(), &format!("{branch}\n"))
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, &e))?;
        fs::write(path, text).map_err(|e| io_error(path, &e))
    }
}
