//! Top-level resolution of a whole configuration
//!
//! The [`Orchestrator`] owns the cache, creates one [`CdnSession`] per CDN and
//! one [`VersionResolver`] per resolver name on first use, and fans out every
//! configured file concurrently. [`resolved_files`] is its read-only,
//! synchronous counterpart for consumers that only list what a previous run
//! fetched.

use crate::cache::{CacheReader, CacheStore};
use crate::config::{Config, Overrides};
use crate::error::{UseCdnError, UseCdnResult};
use crate::network::{HttpTransport, Transport};
use crate::resolver::{ResolverKind, VersionResolver, DEFAULT_RESOLVER, NATIVE_RESOLVER};
use crate::session::{Cdn, CdnSession, DEFAULT_CDN};
use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

pub struct Orchestrator {
    config: Config,
    overrides: Overrides,
    cache: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
    sessions: Mutex<HashMap<Cdn, Arc<CdnSession>>>,
    resolvers: Mutex<HashMap<String, Arc<VersionResolver>>>,
}

impl Orchestrator {
    /// Create an orchestrator over the real network, caching under the
    /// configured directory. Nothing touches the disk until [`init`](Self::init).
    pub fn new(config: Config) -> Self {
        let cache = Arc::new(CacheStore::new(config.cache_root()));
        let transport = Arc::new(HttpTransport::new(config.timeout()));
        Self {
            config,
            overrides: Overrides::default(),
            cache,
            transport,
            sessions: Mutex::new(HashMap::new()),
            resolvers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_cache_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache = Arc::new(CacheStore::new(root));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Prepare the cache. Must complete before any other operation.
    pub async fn init(&self) -> UseCdnResult<()> {
        self.cache.init().await
    }

    fn ensure_initialized(&self) -> UseCdnResult<()> {
        if self.cache.is_initialized() {
            Ok(())
        } else {
            Err(UseCdnError::Uninitialized("use-cdn"))
        }
    }

    /// Session for `cdn`, or the default CDN when `None`. Sessions are
    /// created on first request and shared afterwards.
    pub fn session(&self, cdn: Option<&str>) -> UseCdnResult<Arc<CdnSession>> {
        self.ensure_initialized()?;
        let name = cdn
            .or(self.config.cdn.as_deref())
            .unwrap_or(DEFAULT_CDN);
        let kind = Cdn::from_name(name).ok_or_else(|| UseCdnError::UnsupportedCdn(name.to_string()))?;

        if let Some(session) = lock(&self.sessions).get(&kind) {
            return Ok(Arc::clone(session));
        }

        let settings = self.config.cdns.get(name).cloned().unwrap_or_default();
        let resolver = match settings.resolver.as_deref() {
            None if kind.native_resolver().is_some() => self.version_resolver(Some(name))?,
            None => self.version_resolver(None)?,
            Some(NATIVE_RESOLVER) => self.native_resolver(kind)?,
            Some(other) if Cdn::from_name(other).is_some() => {
                return Err(UseCdnError::ResolverNameCollision(other.to_string()));
            }
            Some(other) => self.version_resolver(Some(other))?,
        };

        let session = Arc::new(CdnSession::new(
            kind,
            settings.url.as_deref(),
            resolver,
            Arc::clone(&self.cache),
            Arc::clone(&self.transport),
        ));
        debug!(
            "Created {} session at {} with resolver {}",
            session.cdn(),
            session.base(),
            session.resolver().name()
        );
        Ok(Arc::clone(lock(&self.sessions).entry(kind).or_insert(session)))
    }

    /// Resolver registered as `name`, or the default resolver when `None`.
    ///
    /// Named resolvers come first; a CDN name selects that CDN's native
    /// resolver.
    pub fn version_resolver(&self, name: Option<&str>) -> UseCdnResult<Arc<VersionResolver>> {
        self.ensure_initialized()?;
        let name = name.unwrap_or(DEFAULT_RESOLVER);

        if let Some(resolver) = lock(&self.resolvers).get(name) {
            return Ok(Arc::clone(resolver));
        }

        let fetcher = if let Some(kind) = ResolverKind::from_name(name) {
            let url = self.config.resolvers.get(name).and_then(|r| r.url.as_deref());
            kind.build(url, Arc::clone(&self.transport))
        } else if let Some(cdn) = Cdn::from_name(name) {
            let kind = cdn.native_resolver().ok_or_else(|| {
                UseCdnError::UnsupportedResolver(format!("{} has no native resolver", name))
            })?;
            let url = self
                .config
                .cdns
                .get(name)
                .and_then(|c| c.url.as_deref())
                .unwrap_or(cdn.default_url());
            kind.build(Some(url), Arc::clone(&self.transport))
        } else {
            return Err(UseCdnError::UnsupportedResolver(name.to_string()));
        };

        let resolver = Arc::new(VersionResolver::new(name, fetcher, Arc::clone(&self.cache)));
        Ok(Arc::clone(
            lock(&self.resolvers)
                .entry(name.to_string())
                .or_insert(resolver),
        ))
    }

    fn native_resolver(&self, cdn: Cdn) -> UseCdnResult<Arc<VersionResolver>> {
        if cdn.native_resolver().is_none() {
            return Err(UseCdnError::UnsupportedResolver(format!(
                "{} has no native resolver",
                cdn
            )));
        }
        self.version_resolver(Some(cdn.name()))
    }

    /// Resolve every configured file, returning local paths in
    /// configuration order.
    ///
    /// All files are fetched concurrently. The first failure is returned;
    /// fetches already started run to completion in the background.
    pub async fn resolve(&self) -> UseCdnResult<Vec<PathBuf>> {
        self.ensure_initialized()?;

        let mut tasks = Vec::with_capacity(self.config.file_count());
        for spec in &self.config.packages {
            let session = self.session(spec.cdn.as_deref())?;
            let version = self.overrides.apply(&spec.package, &spec.version);
            if version != spec.version {
                info!("Overriding {} with version {}", spec.package, version);
            }

            for file in &spec.files {
                let session = Arc::clone(&session);
                let package = spec.package.clone();
                let resolve_as = spec.resolve_as.clone();
                let version = version.to_string();
                let file = file.clone();
                tasks.push(tokio::spawn(async move {
                    session
                        .resolve(&package, resolve_as.as_deref(), &version, &file)
                        .await
                }));
            }
        }

        try_join_all(tasks.into_iter().map(|task| async move {
            task.await
                .map_err(|e| UseCdnError::Internal(format!("resolution task failed: {}", e)))?
        }))
        .await
    }
}

/// Paths of every configured file, read from a cache populated by an earlier
/// [`Orchestrator::resolve`]. Performs no network access.
pub fn resolved_files(
    config: &Config,
    overrides: &Overrides,
    cache_root: impl AsRef<Path>,
) -> UseCdnResult<Vec<PathBuf>> {
    let reader = CacheReader::open(cache_root.as_ref())?;

    let mut files = Vec::with_capacity(config.file_count());
    for spec in &config.packages {
        let version_or_tag = overrides.apply(&spec.package, &spec.version);
        let lookup_as = spec.resolve_as.as_deref().unwrap_or(&spec.package);
        let version = reader.resolve_to_version(lookup_as, version_or_tag)?;

        for file in &spec.files {
            let file = file
                .for_version(&version)
                .map_err(|detail| UseCdnError::resolution(&spec.package, &version, detail))?;
            let path = reader.get_path(&spec.package, &version, &file)?;
            debug!("Adding file {}", path.display());
            files.push(path);
        }
    }
    Ok(files)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
