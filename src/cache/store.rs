//! Writable, asynchronous cache
//!
//! Used while resolving. Content is only ever stored under concrete versions;
//! tags exist as symlinks next to the version directories they point at.
//!
//! Caveats:
//! - Concurrent writers from separate processes are not supported.
//! - Concurrent `set` calls from one process are fine.
//! - Concurrent `link` calls from one process are fine as long as they target
//!   different `(package, tag)` pairs. Same-pair calls are last-writer-wins.

use crate::cache::paths::{check_segment, is_tag, CacheMeta, CachePaths, CURRENT_VERSION};
use crate::error::{UseCdnError, UseCdnResult};
use std::cmp::Ordering as VersionOrdering;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Read-write cache rooted at one data directory
#[derive(Debug)]
pub struct CacheStore {
    paths: CachePaths,
    initialized: AtomicBool,
}

impl CacheStore {
    /// Create a store for `root`. Nothing touches the disk until [`init`](Self::init).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: CachePaths::new(root),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Create the cache, or validate an existing one.
    ///
    /// An existing cache with an older schema is deleted and recreated. A
    /// newer schema is an error: we never downgrade.
    pub async fn init(&self) -> UseCdnResult<()> {
        let root = self.paths.root();
        let exists = fs::try_exists(root)
            .await
            .map_err(|e| UseCdnError::io(format!("checking {}", root.display()), e))?;

        if !exists {
            self.create().await?;
        } else {
            let meta = self.read_meta().await?;
            match meta.version.cmp(&CURRENT_VERSION) {
                VersionOrdering::Less => {
                    info!(
                        "Cache at {} has version {}, rebuilding",
                        root.display(),
                        meta.version
                    );
                    fs::remove_dir_all(root).await.map_err(|e| {
                        UseCdnError::io(format!("removing stale cache {}", root.display()), e)
                    })?;
                    self.create().await?;
                }
                VersionOrdering::Greater => {
                    return Err(UseCdnError::UnsupportedCacheVersion {
                        meta: self.paths.meta_path(),
                        found: meta.version,
                        supported: CURRENT_VERSION,
                    });
                }
                VersionOrdering::Equal => {}
            }
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn read_meta(&self) -> UseCdnResult<CacheMeta> {
        let meta_path = self.paths.meta_path();
        let unreadable = || UseCdnError::CacheUnreadable {
            meta: meta_path.clone(),
            root: self.paths.root().to_path_buf(),
        };

        let content = fs::read_to_string(&meta_path)
            .await
            .map_err(|_| unreadable())?;
        serde_json::from_str(&content).map_err(|_| unreadable())
    }

    async fn create(&self) -> UseCdnResult<()> {
        let base = self.paths.cache_base();
        fs::create_dir_all(&base)
            .await
            .map_err(|e| UseCdnError::io(format!("creating {}", base.display()), e))?;

        let meta_path = self.paths.meta_path();
        let content = serde_json::to_string_pretty(&CacheMeta::current())?;
        fs::write(&meta_path, content)
            .await
            .map_err(|e| UseCdnError::io(format!("writing {}", meta_path.display()), e))?;

        info!("Created cache at {}", self.paths.root().display());
        Ok(())
    }

    fn ensure_initialized(&self) -> UseCdnResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(UseCdnError::Uninitialized("the cache"))
        }
    }

    /// Store `content` as `file` of `package@version` and return its path.
    ///
    /// `version` must be a concrete version, never a tag.
    pub async fn set(
        &self,
        package: &str,
        version: &str,
        file: &str,
        content: &[u8],
    ) -> UseCdnResult<PathBuf> {
        self.ensure_initialized()?;
        if is_tag(version) {
            return Err(UseCdnError::TagNotAllowed {
                package: package.to_string(),
                tag: version.to_string(),
            });
        }
        check_key(package, "version", version)?;

        let file_path = self.paths.file_path(package, version, file);
        let parent = parent_of(&file_path)?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| UseCdnError::io(format!("creating {}", parent.display()), e))?;

        // Written beside the target and renamed into place so a crash never
        // leaves a truncated entry behind.
        let staging = staging_path(parent, &file_path);
        if let Err(e) = write_then_rename(&staging, &file_path, content).await {
            let _ = fs::remove_file(&staging).await;
            return Err(UseCdnError::io(
                format!("writing {}", file_path.display()),
                e,
            ));
        }

        debug!("Stored {}", file_path.display());
        Ok(file_path)
    }

    /// Path of a cached file, or `None` if it is not in the cache.
    pub async fn get_path(
        &self,
        package: &str,
        version_or_tag: &str,
        file: &str,
    ) -> UseCdnResult<Option<PathBuf>> {
        self.ensure_initialized()?;
        check_key(package, "version or tag", version_or_tag)?;
        let file_path = self.paths.file_path(package, version_or_tag, file);
        match fs::metadata(&file_path).await {
            Ok(_) => Ok(Some(file_path)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(UseCdnError::io(
                format!("checking {}", file_path.display()),
                e,
            )),
        }
    }

    /// Record that `tag` of `package` resolves to `version`.
    ///
    /// Any previous link for the same tag is replaced.
    pub async fn link(&self, package: &str, version: &str, tag: &str) -> UseCdnResult<()> {
        self.ensure_initialized()?;
        check_key(package, "version", version)?;
        check_key(package, "tag", tag)?;
        let tag_path = self.paths.package_path(package, tag);
        let parent = parent_of(&tag_path)?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| UseCdnError::io(format!("creating {}", parent.display()), e))?;

        // rename() cannot replace a directory, only a link.
        if let Ok(meta) = fs::symlink_metadata(&tag_path).await {
            if meta.is_dir() {
                fs::remove_dir_all(&tag_path).await.map_err(|e| {
                    UseCdnError::io(format!("removing {}", tag_path.display()), e)
                })?;
            }
        }

        let staging = staging_path(parent, &tag_path);
        if let Err(e) = link_then_rename(version, &staging, &tag_path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(UseCdnError::io(
                format!("linking {} to {}", tag_path.display(), version),
                e,
            ));
        }

        debug!("Linked {}@{} -> {}", package, tag, version);
        Ok(())
    }

    /// Target of the link recorded for `package@tag`, if any
    pub async fn read_link(&self, package: &str, tag: &str) -> UseCdnResult<Option<String>> {
        self.ensure_initialized()?;
        check_key(package, "tag", tag)?;
        let tag_path = self.paths.package_path(package, tag);
        match fs::read_link(&tag_path).await {
            Ok(target) => Ok(Some(target.to_string_lossy().into_owned())),
            // EINVAL: a real directory, not a link
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidInput) => {
                Ok(None)
            }
            Err(e) => Err(UseCdnError::io(
                format!("reading link {}", tag_path.display()),
                e,
            )),
        }
    }
}

/// Versions and tags become directory names, so each must be one segment.
/// Values coming back from a registry or CDN are not trusted.
fn check_key(package: &str, what: &str, value: &str) -> UseCdnResult<()> {
    check_segment(what, value).map_err(|detail| {
        UseCdnError::resolution(
            package,
            value,
            format!("cannot be stored in the cache: {}", detail),
        )
    })
}

fn parent_of(path: &Path) -> UseCdnResult<&Path> {
    path.parent()
        .ok_or_else(|| UseCdnError::Internal(format!("{} has no parent", path.display())))
}

fn staging_path(parent: &Path, target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

async fn write_then_rename(staging: &Path, target: &Path, content: &[u8]) -> io::Result<()> {
    fs::write(staging, content).await?;
    fs::rename(staging, target).await
}

async fn link_then_rename(version: &str, staging: &Path, target: &Path) -> io::Result<()> {
    symlink_dir(version, staging).await?;
    fs::rename(staging, target).await
}

#[cfg(unix)]
async fn symlink_dir(target: &str, link: &Path) -> io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(windows)]
async fn symlink_dir(target: &str, link: &Path) -> io::Result<()> {
    fs::symlink_dir(target, link).await
}
