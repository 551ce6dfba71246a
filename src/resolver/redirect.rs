//! Resolution by following a CDN's own redirect
//!
//! unpkg answers `GET /pkg@range` with a redirect to `/pkg@x.y.z/...`; the
//! concrete version is read off the `Location` header.

use crate::error::{UseCdnError, UseCdnResult};
use crate::network::{normalize_base, RedirectProbe, Transport};
use crate::resolver::VersionFetcher;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use ureq::http::Uri;

pub struct RedirectFetcher {
    base: String,
    transport: Arc<dyn Transport>,
}

impl RedirectFetcher {
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base: normalize_base(url),
            transport,
        }
    }
}

#[async_trait]
impl VersionFetcher for RedirectFetcher {
    fn name(&self) -> &'static str {
        "redirect"
    }

    async fn fetch_version(&self, package: &str, version_or_tag: &str) -> UseCdnResult<String> {
        let url = format!("{}{}@{}", self.base, package, version_or_tag);
        debug!("Resolving {} by redirect", url);

        match self.transport.get_redirect(&url).await? {
            RedirectProbe::Redirect(location) => {
                version_from_location(package, version_or_tag, &location)
            }
            RedirectProbe::NotRedirect(status) => Err(UseCdnError::resolution(
                package,
                version_or_tag,
                format!("did not redirect (status {})", status),
            )),
        }
    }
}

/// Extract the version from a redirect target such as `/pkg@1.2.3/index.js`.
///
/// The location may be a bare path or an absolute URL. Scoped packages take
/// two path segments. The version is what follows the last `@` that does not
/// start the segment.
pub fn version_from_location(
    package: &str,
    version_or_tag: &str,
    location: &str,
) -> UseCdnResult<String> {
    let path = if location.starts_with('/') {
        location.to_string()
    } else {
        let uri: Uri = location.parse().map_err(|e| {
            UseCdnError::resolution(
                package,
                version_or_tag,
                format!("redirects to an unparsable location {}: {}", location, e),
            )
        })?;
        uri.path().to_string()
    };

    let trimmed = path.strip_prefix('/').unwrap_or(&path);
    let mut segments = trimmed.split('/');
    let first = segments.next().unwrap_or_default();
    let segment = match segments.next() {
        Some(second) if first.starts_with('@') => format!("{}/{}", first, second),
        _ => first.to_string(),
    };

    let (name, version) = match segment.rfind('@') {
        Some(at) if at > 0 => (&segment[..at], &segment[at + 1..]),
        _ => (segment.as_str(), ""),
    };

    if version.is_empty() {
        return Err(UseCdnError::resolution(
            package,
            version_or_tag,
            format!("resolves to something without a version: {}", location),
        ));
    }
    if name != package {
        return Err(UseCdnError::resolution(
            package,
            version_or_tag,
            format!("resolves to a different package: {}", location),
        ));
    }

    Ok(version.to_string())
}
