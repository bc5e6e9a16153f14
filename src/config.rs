//! Library configuration, persisted as TOML.
//!
//! The file lives in the OS config directory:
//! - Windows: %APPDATA%\tune-ledger\config.toml
//! - macOS: ~/Library/Application Support/tune-ledger/config.toml
//! - Linux: ~/.config/tune-ledger/config.toml
//!
//! The file is human-readable and editable. It is loaded at startup; the
//! scanner writes `last_scan_at` back after each finished scan.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extensions indexed when the config does not list any.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac"];

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library roots and scan settings
    pub library: LibraryConfig,

    /// Online metadata providers
    pub providers: ProviderConfig,

    /// Database location
    pub database: DatabaseConfig,
}

/// Library management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library scan roots
    pub paths: Vec<PathBuf>,

    /// File extensions to index (lower-case, without the dot)
    pub supported_extensions: Vec<String>,

    /// Whether to watch the roots for file changes
    pub watch_for_changes: bool,

    /// When the last scan finished
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            watch_for_changes: true,
            last_scan_at: None,
        }
    }
}

impl LibraryConfig {
    /// Check a path against the extension allow-list (case-insensitive).
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.supported_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

/// Online provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Per-provider switch; providers not listed are enabled
    pub enabled: BTreeMap<String, bool>,

    /// Per-provider credential (API key or token)
    pub credentials: BTreeMap<String, String>,

    /// Timeout for each provider call, in seconds
    pub timeout_secs: u64,

    /// Maximum number of candidates returned by a search
    pub top_k: usize,

    /// Provider whose candidates receive the authority boost
    pub authoritative: String,

    /// Persist deduplicated candidates to the cache table
    pub cache_results: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: BTreeMap::new(),
            credentials: BTreeMap::new(),
            timeout_secs: 8,
            top_k: 10,
            authoritative: "lrclib".to_string(),
            cache_results: true,
        }
    }
}

impl ProviderConfig {
    /// Whether the named provider is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(true)
    }

    /// Credential for the named provider, if configured and non-empty.
    pub fn credential(&self, name: &str) -> Option<&str> {
        self.credentials
            .get(name)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the data directory
    pub path: Option<PathBuf>,
}

// ============================================================================
// Config File Operations
// ============================================================================

/// `tune-ledger` under the OS config directory.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tune-ledger"))
}

/// Default location of `config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load the config from [`config_path`], falling back to defaults.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!(target: "config", "No config directory on this platform, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load the config at `path`. A missing, unreadable or malformed file
/// yields the defaults; the problem is logged.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!(target: "config", path = %path.display(), "No config file, using defaults");
        return Config::default();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| toml::from_str::<Config>(&contents).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => {
            tracing::info!(target: "config", path = %path.display(), "Loaded config");
            config
        }
        Err(error) => {
            tracing::error!(target: "config", path = %path.display(), %error, "Unusable config file, using defaults");
            Config::default()
        }
    }
}

/// Save configuration to a specific file.
///
/// Creates the parent directory if needed and writes atomically
/// (temp file, then rename).
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!(target: "config", path = %path.display(), "Saved config");
    Ok(())
}

/// Save to [`config_path`].
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

// ============================================================================
// Shared Handle
// ============================================================================

/// Config shared between the facade and the scanner.
///
/// Reads take a snapshot; the only write the core performs is recording
/// the last scan time, which is persisted immediately when a file backs
/// the handle.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
    path: Option<PathBuf>,
}

impl SharedConfig {
    /// Wrap a config backed by a file.
    pub fn new(config: Config, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path.into()),
        }
    }

    /// Wrap a config that is never written to disk.
    pub fn in_memory(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Current config.
    pub fn snapshot(&self) -> Config {
        self.inner.read().clone()
    }

    /// Library section only.
    pub fn library(&self) -> LibraryConfig {
        self.inner.read().library.clone()
    }

    /// Record a finished scan and persist it.
    pub fn record_scan_finished(&self, at: DateTime<Utc>) -> Result<(), ConfigError> {
        let config = {
            let mut guard = self.inner.write();
            guard.library.last_scan_at = Some(at);
            guard.clone()
        };
        match &self.path {
            Some(path) => save_to(&config, path),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
