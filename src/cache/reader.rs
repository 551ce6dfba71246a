//! Read-only, synchronous view of the cache
//!
//! For consumers that cannot run async code and only need to enumerate files
//! a previous `resolve` already put in the cache.

use crate::cache::paths::{check_segment, is_tag, CacheMeta, CachePaths, CURRENT_VERSION};
use crate::error::{UseCdnError, UseCdnResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read-only cache handle, validated at construction
#[derive(Debug, Clone)]
pub struct CacheReader {
    paths: CachePaths,
}

impl CacheReader {
    /// Open the cache at `root`, failing if its metadata is missing,
    /// unparsable or from a different schema version.
    pub fn open(root: impl Into<PathBuf>) -> UseCdnResult<Self> {
        let paths = CachePaths::new(root);
        let meta_path = paths.meta_path();
        let unreadable = || UseCdnError::CacheUnreadable {
            meta: meta_path.clone(),
            root: paths.root().to_path_buf(),
        };

        let content = fs::read_to_string(&meta_path).map_err(|_| unreadable())?;
        let meta: CacheMeta = serde_json::from_str(&content).map_err(|_| unreadable())?;

        if meta.version != CURRENT_VERSION {
            return Err(UseCdnError::CacheOutdated {
                root: paths.root().to_path_buf(),
                found: meta.version,
                expected: CURRENT_VERSION,
            });
        }

        Ok(Self { paths })
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Path of a cached file. Unlike the writable cache, a miss is an error.
    pub fn get_path(&self, package: &str, version_or_tag: &str, file: &str) -> UseCdnResult<PathBuf> {
        let file_path = self.paths.file_path(package, version_or_tag, file);
        if fs::metadata(&file_path).is_ok() {
            Ok(file_path)
        } else {
            Err(UseCdnError::CacheEntryMissing(file_path))
        }
    }

    /// Version a tag was last resolved to.
    ///
    /// A concrete version has a real directory rather than a link, and is
    /// returned unchanged. So is a version with no directory under this
    /// name, since its content may be stored under another package name.
    pub fn resolve_to_version(&self, package: &str, version_or_tag: &str) -> UseCdnResult<String> {
        check_segment("version or tag", version_or_tag)
            .map_err(|detail| UseCdnError::resolution(package, version_or_tag, detail))?;
        let package_path = self.paths.package_path(package, version_or_tag);
        match fs::read_link(&package_path) {
            Ok(target) => Ok(target.to_string_lossy().into_owned()),
            // EINVAL: the path exists but is not a link
            Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(version_or_tag.to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound && !is_tag(version_or_tag) => {
                Ok(version_or_tag.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(UseCdnError::CacheEntryMissing(package_path))
            }
            Err(e) => Err(UseCdnError::io(
                format!("reading link {}", package_path.display()),
                e,
            )),
        }
    }

    /// Names of all cached packages, sorted. Scoped packages are reported as
    /// `@scope/name`.
    pub fn packages(&self) -> UseCdnResult<Vec<String>> {
        let base = self.paths.cache_base();
        let mut names = Vec::new();
        for entry in list_dirs(&base)? {
            if entry.starts_with('@') {
                for inner in list_dirs(&base.join(&entry))? {
                    names.push(format!("{}/{}", entry, inner));
                }
            } else {
                names.push(entry);
            }
        }
        names.sort();
        Ok(names)
    }
}

fn list_dirs(dir: &Path) -> UseCdnResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(UseCdnError::io(format!("reading {}", dir.display()), e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| UseCdnError::io(format!("reading {}", dir.display()), e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
