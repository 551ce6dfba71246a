//! Version resolution
//!
//! A [`VersionFetcher`] turns a version-or-tag into a concrete version by
//! asking some upstream. [`VersionResolver`] wraps a fetcher with the
//! behavior every resolver shares:
//!
//! - concurrent requests for the same `(package, version_or_tag)` share one
//!   in-flight fetch and its result
//! - failures are not remembered, so a later call retries
//! - when the concrete version differs from the input, a tag link is written
//!   to the cache so offline readers can find it
//!
//! # Resolvers
//!
//! | Name | Fetcher | Source |
//! |------|---------|--------|
//! | `npm` | [`RegistryFetcher`] | npm registry document |
//! | `null` | [`PassthroughFetcher`] | none, input returned as-is |
//! | native to `unpkg` | [`RedirectFetcher`] | CDN redirect `Location` |

pub mod passthrough;
pub mod range;
pub mod redirect;
pub mod registry;

pub use passthrough::PassthroughFetcher;
pub use redirect::RedirectFetcher;
pub use registry::{RegistryFetcher, NPM_REGISTRY_URL};

use crate::cache::CacheStore;
use crate::error::{UseCdnError, UseCdnResult};
use crate::network::Transport;
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Resolver used when none is configured and the CDN has no native one
pub const DEFAULT_RESOLVER: &str = "npm";

/// Configuration value selecting a CDN's own resolver
pub const NATIVE_RESOLVER: &str = "native";

/// Upstream lookup of a concrete version
#[async_trait]
pub trait VersionFetcher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Resolve `version_or_tag` for `package`. No caching or linking.
    async fn fetch_version(&self, package: &str, version_or_tag: &str) -> UseCdnResult<String>;
}

/// Resolver implementations that can be built by name or by CDN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    Registry,
    Redirect,
    Passthrough,
}

impl ResolverKind {
    /// Look up a resolver selectable by name in configuration.
    ///
    /// [`ResolverKind::Redirect`] has no name: it is only reachable as the
    /// native resolver of a CDN.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "npm" => Some(Self::Registry),
            "null" => Some(Self::Passthrough),
            _ => None,
        }
    }

    pub fn default_url(self) -> Option<&'static str> {
        match self {
            Self::Registry => Some(NPM_REGISTRY_URL),
            Self::Redirect => Some(crate::session::cdn::UNPKG_URL),
            Self::Passthrough => None,
        }
    }

    pub fn build(self, url: Option<&str>, transport: Arc<dyn Transport>) -> Arc<dyn VersionFetcher> {
        let url = url.or(self.default_url()).unwrap_or_default();
        match self {
            Self::Registry => Arc::new(RegistryFetcher::new(url, transport)),
            Self::Redirect => Arc::new(RedirectFetcher::new(url, transport)),
            Self::Passthrough => Arc::new(PassthroughFetcher),
        }
    }
}

type PendingVersion = Shared<BoxFuture<'static, Result<String, Arc<UseCdnError>>>>;

/// A fetcher plus in-flight deduplication and tag linking
pub struct VersionResolver {
    name: String,
    fetcher: Arc<dyn VersionFetcher>,
    cache: Arc<CacheStore>,
    pending: Mutex<HashMap<(String, String), PendingVersion>>,
}

impl VersionResolver {
    pub fn new(name: impl Into<String>, fetcher: Arc<dyn VersionFetcher>, cache: Arc<CacheStore>) -> Self {
        Self {
            name: name.into(),
            fetcher,
            cache,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Name this resolver was registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve to a concrete version, linking `version_or_tag` to it in the
    /// cache when they differ.
    ///
    /// Successful results are kept for the lifetime of the resolver.
    pub async fn resolve_to_version(&self, package: &str, version_or_tag: &str) -> UseCdnResult<String> {
        let key = (package.to_string(), version_or_tag.to_string());
        let pending = lock(&self.pending)
            .entry(key.clone())
            .or_insert_with(|| self.start(package, version_or_tag))
            .clone();

        match pending.clone().await {
            Ok(version) => Ok(version),
            Err(err) => {
                {
                    let mut map = lock(&self.pending);
                    if map.get(&key).is_some_and(|entry| entry.ptr_eq(&pending)) {
                        map.remove(&key);
                    }
                }
                drop(pending);
                Err(UseCdnError::from_shared(err))
            }
        }
    }

    fn start(&self, package: &str, version_or_tag: &str) -> PendingVersion {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let package = package.to_string();
        let version_or_tag = version_or_tag.to_string();
        debug!(
            "Resolving {}@{} with {}",
            package,
            version_or_tag,
            fetcher.name()
        );

        async move {
            let version = fetcher.fetch_version(&package, &version_or_tag).await?;
            if version != version_or_tag {
                cache.link(&package, &version, &version_or_tag).await?;
            }
            debug!("Resolved {}@{} to {}", package, version_or_tag, version);
            Ok(version)
        }
        .map_err(Arc::new)
        .boxed()
        .shared()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counts calls and resolves every tag to a fixed version
    struct CountingFetcher {
        version: &'static str,
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl CountingFetcher {
        fn new(version: &'static str) -> Self {
            Self {
                version,
                calls: AtomicUsize::new(0),
                fail_first: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VersionFetcher for CountingFetcher {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_version(&self, package: &str, version_or_tag: &str) -> UseCdnResult<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && call == 0 {
                return Err(UseCdnError::resolution(package, version_or_tag, "failed once"));
            }
            Ok(self.version.to_string())
        }
    }

    async fn ready_cache() -> (Arc<CacheStore>, TempDir) {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(CacheStore::new(temp.path().join(".use-cdn")));
        cache.init().await.unwrap();
        (cache, temp)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let (cache, _temp) = ready_cache().await;
        let fetcher = Arc::new(CountingFetcher::new("1.0.0"));
        let resolver = VersionResolver::new("test", fetcher.clone(), cache);

        let (a, b, c) = tokio::join!(
            resolver.resolve_to_version("foo", "latest"),
            resolver.resolve_to_version("foo", "latest"),
            resolver.resolve_to_version("foo", "latest"),
        );
        assert_eq!(a.unwrap(), "1.0.0");
        assert_eq!(b.unwrap(), "1.0.0");
        assert_eq!(c.unwrap(), "1.0.0");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn success_is_remembered() {
        let (cache, _temp) = ready_cache().await;
        let fetcher = Arc::new(CountingFetcher::new("1.0.0"));
        let resolver = VersionResolver::new("test", fetcher.clone(), cache);

        resolver.resolve_to_version("foo", "latest").await.unwrap();
        resolver.resolve_to_version("foo", "latest").await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        resolver.resolve_to_version("foo", "next").await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn failure_is_retried() {
        let (cache, _temp) = ready_cache().await;
        let fetcher = Arc::new(CountingFetcher {
            fail_first: true,
            ..CountingFetcher::new("1.0.0")
        });
        let resolver = VersionResolver::new("test", fetcher.clone(), cache);

        let err = resolver.resolve_to_version("foo", "latest").await.unwrap_err();
        assert!(matches!(err, UseCdnError::Resolution { .. }));
        assert_eq!(resolver.resolve_to_version("foo", "latest").await.unwrap(), "1.0.0");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn failure_reaches_every_joined_caller() {
        let (cache, _temp) = ready_cache().await;
        let fetcher = Arc::new(CountingFetcher {
            fail_first: true,
            ..CountingFetcher::new("1.0.0")
        });
        let resolver = VersionResolver::new("test", fetcher.clone(), cache);

        let (a, b) = tokio::join!(
            resolver.resolve_to_version("foo", "latest"),
            resolver.resolve_to_version("foo", "latest"),
        );
        // Joined callers may each see the error behind a `Shared` wrapper
        for result in [a, b] {
            let err = result.unwrap_err();
            assert!(matches!(err.root(), UseCdnError::Resolution { .. }));
            assert!(err.to_string().contains("failed once"));
        }
        assert_eq!(fetcher.calls(), 1);

        assert_eq!(resolver.resolve_to_version("foo", "latest").await.unwrap(), "1.0.0");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn tag_is_linked() {
        let (cache, _temp) = ready_cache().await;
        let resolver = VersionResolver::new(
            "test",
            Arc::new(CountingFetcher::new("1.0.0")),
            cache.clone(),
        );

        resolver.resolve_to_version("foo", "latest").await.unwrap();
        assert_eq!(
            cache.read_link("foo", "latest").await.unwrap(),
            Some("1.0.0".to_string())
        );
    }

    #[tokio::test]
    async fn version_resolving_to_itself_is_not_linked() {
        let (cache, _temp) = ready_cache().await;
        let resolver = VersionResolver::new(
            "test",
            Arc::new(CountingFetcher::new("1.0.0")),
            cache.clone(),
        );

        resolver.resolve_to_version("foo", "1.0.0").await.unwrap();
        assert!(!cache.paths().package_path("foo", "1.0.0").exists());
    }

    #[tokio::test]
    async fn link_requires_initialized_cache() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(CacheStore::new(temp.path().join(".use-cdn")));
        let resolver = VersionResolver::new("test", Arc::new(CountingFetcher::new("1.0.0")), cache);

        let err = resolver.resolve_to_version("foo", "latest").await.unwrap_err();
        assert!(matches!(err, UseCdnError::Uninitialized(_)));
    }

    #[test]
    fn kinds_by_name() {
        assert_eq!(ResolverKind::from_name("npm"), Some(ResolverKind::Registry));
        assert_eq!(ResolverKind::from_name("null"), Some(ResolverKind::Passthrough));
        assert_eq!(ResolverKind::from_name("unpkg"), None);
        assert_eq!(ResolverKind::from_name(NATIVE_RESOLVER), None);
    }

    #[tokio::test]
    async fn built_registry_uses_given_url() {
        let (cache, _temp) = ready_cache().await;
        let transport = Arc::new(MockTransport::new().body(
            "https://mirror.test/foo",
            r#"{"name":"foo","dist-tags":{"latest":"2.0.0"},"versions":{"2.0.0":{}}}"#,
        ));
        let fetcher = ResolverKind::Registry.build(Some("https://mirror.test"), transport.clone());
        let resolver = VersionResolver::new("npm", fetcher, cache);

        assert_eq!(resolver.resolve_to_version("foo", "latest").await.unwrap(), "2.0.0");
        assert_eq!(transport.calls("https://mirror.test/foo"), 1);
    }
}
