//! Resolution against the npm registry
//!
//! Fetches the abbreviated package document and picks a version from its
//! dist-tags and version list.

use crate::error::{UseCdnError, UseCdnResult};
use crate::network::{normalize_base, Transport};
use crate::resolver::range::{parse_version, NpmRange};
use crate::resolver::VersionFetcher;
use async_trait::async_trait;
use semver::Version;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Public npm registry
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org/";

/// Ask for the abbreviated document; full documents can be many megabytes
const MANIFEST_ACCEPT: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8, */*";

/// The parts of a registry document needed for version selection
#[derive(Debug, Deserialize)]
pub struct PackageDocument {
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, IgnoredAny>,
}

impl PackageDocument {
    /// Pick the version `wanted` designates, or explain why none does.
    ///
    /// `wanted` may be empty (meaning `latest`), a dist-tag, an exact version
    /// or an npm range. For ranges, `latest` wins when it satisfies the range,
    /// otherwise the highest matching version.
    pub fn select(&self, wanted: &str) -> Result<String, String> {
        let wanted = wanted.trim();
        let wanted = if wanted.is_empty() { "latest" } else { wanted };

        if let Some(target) = self.dist_tags.get(wanted) {
            return if self.versions.contains_key(target) {
                Ok(target.clone())
            } else {
                Err(format!("has dist-tag {} pointing at unknown version {}", wanted, target))
            };
        }

        if let Some(exact) = parse_version(wanted) {
            return self
                .versions
                .keys()
                .find(|v| Version::parse(v).is_ok_and(|v| v == exact))
                .cloned()
                .ok_or_else(|| "no matching version".to_string());
        }

        let range = NpmRange::parse(wanted)
            .ok_or_else(|| format!("is not a valid version, range or dist-tag of {}", self.name))?;

        let latest = self
            .dist_tags
            .get("latest")
            .filter(|v| self.versions.contains_key(*v))
            .and_then(|v| Version::parse(v).ok().map(|parsed| (v, parsed)));
        if let Some((latest, parsed)) = latest {
            if range.matches(&parsed) {
                return Ok(latest.clone());
            }
        }

        self.versions
            .keys()
            .filter_map(|v| Version::parse(v).ok().map(|parsed| (v, parsed)))
            .filter(|(_, parsed)| range.matches(parsed))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(v, _)| v.clone())
            .ok_or_else(|| "no matching version".to_string())
    }
}

/// Resolves versions and tags by asking an npm-compatible registry
pub struct RegistryFetcher {
    base: String,
    transport: Arc<dyn Transport>,
}

impl RegistryFetcher {
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base: normalize_base(url),
            transport,
        }
    }

    /// Document URL; the scope separator is escaped as the registry expects
    pub fn document_url(&self, package: &str) -> String {
        if package.starts_with('@') {
            format!("{}{}", self.base, package.replacen('/', "%2f", 1))
        } else {
            format!("{}{}", self.base, package)
        }
    }
}

#[async_trait]
impl VersionFetcher for RegistryFetcher {
    fn name(&self) -> &'static str {
        "npm"
    }

    async fn fetch_version(&self, package: &str, version_or_tag: &str) -> UseCdnResult<String> {
        let url = self.document_url(package);
        debug!("Fetching package document {}", url);

        let body = self.transport.get_text(&url, MANIFEST_ACCEPT).await?;
        let document: PackageDocument = serde_json::from_str(&body).map_err(|e| {
            UseCdnError::resolution(
                package,
                version_or_tag,
                format!("has an unreadable registry document: {}", e),
            )
        })?;

        if document.name != package {
            return Err(UseCdnError::resolution(
                package,
                version_or_tag,
                format!("resolves to a different package: {}", document.name),
            ));
        }

        document
            .select(version_or_tag)
            .map_err(|detail| UseCdnError::resolution(package, version_or_tag, detail))
    }
}
