//! CDN sessions
//!
//! A session binds one CDN (base URL and layout) to a version resolver and
//! the shared cache, and turns `(package, version_or_tag, file)` into a
//! local path, downloading on a cache miss.

pub mod cdn;

pub use cdn::{Cdn, DEFAULT_CDN};

use crate::cache::CacheStore;
use crate::config::FileSpec;
use crate::error::{UseCdnError, UseCdnResult};
use crate::network::{normalize_base, Transport};
use crate::resolver::VersionResolver;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub struct CdnSession {
    cdn: Cdn,
    base: String,
    resolver: Arc<VersionResolver>,
    cache: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
}

impl CdnSession {
    /// Create a session. `url` overrides the CDN's public base URL.
    pub fn new(
        cdn: Cdn,
        url: Option<&str>,
        resolver: Arc<VersionResolver>,
        cache: Arc<CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            cdn,
            base: normalize_base(url.unwrap_or(cdn.default_url())),
            resolver,
            cache,
            transport,
        }
    }

    pub fn cdn(&self) -> Cdn {
        self.cdn
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn resolver(&self) -> &Arc<VersionResolver> {
        &self.resolver
    }

    pub fn package_url(&self, package: &str, version: &str) -> String {
        self.cdn.package_url(&self.base, package, version)
    }

    pub fn file_url(&self, package: &str, version: &str, file: &str) -> String {
        format!("{}/{}", self.package_url(package, version), file)
    }

    /// Local path of `file` of `package` at `version_or_tag`.
    ///
    /// The version is resolved under `resolve_as` when given (for packages
    /// the CDN and the resolver know by different names), while content is
    /// stored under `package`. Nothing is written if the download fails.
    pub async fn resolve(
        &self,
        package: &str,
        resolve_as: Option<&str>,
        version_or_tag: &str,
        file: &FileSpec,
    ) -> UseCdnResult<PathBuf> {
        let version = self
            .resolver
            .resolve_to_version(resolve_as.unwrap_or(package), version_or_tag)
            .await?;
        let file = file
            .for_version(&version)
            .map_err(|detail| UseCdnError::resolution(package, &version, detail))?;

        if let Some(path) = self.cache.get_path(package, &version, &file).await? {
            debug!("Cache hit for {}@{}/{}", package, version, file);
            return Ok(path);
        }

        let url = self.file_url(package, &version, &file);
        info!("Downloading {}", url);
        let content = self.transport.get_bytes(&url).await?;
        self.cache.set(package, &version, &file, &content).await
    }
}
