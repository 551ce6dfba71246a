//! Error types for use-cdn
//!
//! All modules use `UseCdnResult<T>` as their return type.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for use-cdn operations
pub type UseCdnResult<T> = Result<T, UseCdnError>;

/// All errors that can occur in use-cdn
#[derive(Error, Debug)]
pub enum UseCdnError {
    // Lifecycle errors
    #[error("{0} has not been initialized")]
    Uninitialized(&'static str),

    // Cache errors
    #[error(
        "cannot read {meta}; we're assuming that {root} is not a use-cdn directory: \
         move the data somewhere else or delete it"
    )]
    CacheUnreadable { meta: PathBuf, root: PathBuf },

    #[error("the version number stored in {meta} ({found}) is greater than the version we support ({supported})")]
    UnsupportedCacheVersion {
        meta: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("the use-cdn data in {root} is not up to date (found version {found}, expected {expected})")]
    CacheOutdated {
        root: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("set called with tag {tag} for package {package}, which is not allowed")]
    TagNotAllowed { package: String, tag: String },

    #[error("cache entry not found: {0}")]
    CacheEntryMissing(PathBuf),

    // Resolution errors
    #[error("{package}@{version_or_tag} {detail}")]
    Resolution {
        package: String,
        version_or_tag: String,
        detail: String,
    },

    #[error("unsupported cdn: {0}")]
    UnsupportedCdn(String),

    #[error("unsupported resolver: {0}")]
    UnsupportedResolver(String),

    #[error(
        "you may not use a session name as a resolver name ({0}); to specify the resolver \
         native to a session, use \"native\""
    )]
    ResolverNameCollision(String),

    // Network errors
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("{0}")]
    OverrideInvalid(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // An error observed by more than one caller of the same in-flight operation
    #[error(transparent)]
    Shared(Arc<UseCdnError>),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UseCdnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a resolution error for `package@version_or_tag`
    pub fn resolution(
        package: impl Into<String>,
        version_or_tag: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            package: package.into(),
            version_or_tag: version_or_tag.into(),
            detail: detail.into(),
        }
    }

    /// Recover an owned error from a shared one when no other holder remains
    pub fn from_shared(err: Arc<UseCdnError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Self::Shared)
    }

    /// The underlying error, looking through `Shared` wrappers
    pub fn root(&self) -> &UseCdnError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::CacheUnreadable { .. } | Self::UnsupportedCacheVersion { .. } => {
                Some("Move or delete the cache directory, then run again")
            }
            Self::CacheOutdated { .. } | Self::CacheEntryMissing(_) => Some("Run: use-cdn resolve"),
            Self::UnsupportedCdn(_) => Some("Supported CDNs: unpkg, cdnjs"),
            Self::UnsupportedResolver(_) => {
                Some("Supported resolvers: npm, null, or \"native\" for the CDN's own")
            }
            Self::ConfigNotFound(_) => Some("Create use-cdn.toml or pass --config"),
            _ => None,
        }
    }
}
