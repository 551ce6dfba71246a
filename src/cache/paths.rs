//! On-disk cache layout
//!
//! Pure path computation shared by the writable and read-only caches:
//!
//! ```text
//! <root>/meta                                  {"version": <int>}
//! <root>/cache/<package>/<version>/<file...>   content
//! <root>/cache/<package>/<tag>                 symlink -> <version>
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema version this build reads and writes
pub const CURRENT_VERSION: u32 = 1;

/// Default cache root, relative to the working directory
pub const DEFAULT_ROOT: &str = ".use-cdn";

/// Contents of `<root>/meta`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub version: u32,
}

impl CacheMeta {
    pub fn current() -> Self {
        Self {
            version: CURRENT_VERSION,
        }
    }
}

/// Whether `version_or_tag` is a tag rather than a concrete version.
///
/// Anything whose first character is not an ASCII digit is a tag, including
/// the empty string.
pub fn is_tag(version_or_tag: &str) -> bool {
    !version_or_tag
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

/// Check that `value` names exactly one directory: not empty, not `.` or
/// `..`, and free of separators and NUL.
pub fn check_segment(what: &str, value: &str) -> Result<(), String> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if bad {
        Err(format!("invalid {} {:?}", what, value))
    } else {
        Ok(())
    }
}

/// Path computation rooted at one cache directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    root: PathBuf,
}

impl CachePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data root (`<root>`)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/meta`
    pub fn meta_path(&self) -> PathBuf {
        self.root.join("meta")
    }

    /// `<root>/cache`
    pub fn cache_base(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Directory of one version (or tag link) of a package
    pub fn package_path(&self, package: &str, version_or_tag: &str) -> PathBuf {
        self.cache_base().join(package).join(version_or_tag)
    }

    /// Location of `file` inside one version of a package
    pub fn file_path(&self, package: &str, version_or_tag: &str, file: &str) -> PathBuf {
        self.package_path(package, version_or_tag).join(file)
    }
}
