//! Library-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while the
//! CLI uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum returned by the library facade
//! - Module-specific errors ([`ExtractionError`], [`ProviderError`],
//!   [`WatchError`], [`ConfigError`]) for detailed handling
//!
//! Several module errors never reach [`Error`] in practice: extraction
//! failures are recovered by the scanner's filename fallback and provider
//! failures are folded into an empty search outcome.
//!
//! [`ExtractionError`]: crate::metadata::ExtractionError
//! [`ProviderError`]: crate::enrichment::ProviderError
//! [`WatchError`]: crate::scanner::WatchError
//! [`ConfigError`]: crate::config::ConfigError

use std::path::PathBuf;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding or decoding of a stored payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tag reading failed and no fallback applied
    #[error(transparent)]
    Extraction(#[from] crate::metadata::ExtractionError),

    /// Tag writing error
    #[error("Tag write error for {path}: {message}")]
    TagWrite { path: PathBuf, message: String },

    /// A scan was requested while another is running
    #[error("A library scan is already in progress")]
    ScanInProgress,

    /// Named plugin is not registered
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// Entity lookup by id failed
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watch(#[from] crate::scanner::WatchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a tag write error.
    pub fn tag_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TagWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether this error is a conflict the caller can retry later.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ScanInProgress)
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
