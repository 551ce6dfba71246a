//! HTTP transport for CDNs and registries
//!
//! Sessions and resolvers talk to the network through [`Transport`] so the
//! protocol logic can be exercised without sockets. [`HttpTransport`] is the
//! real implementation on top of `ureq`; its blocking calls run on tokio's
//! blocking pool.

use crate::error::{UseCdnError, UseCdnResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::http::header::LOCATION;
use ureq::Agent;

/// Default timeout for a whole request, connect to last byte
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on any single response body (registry manifests can be large)
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Outcome of a request made without following redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectProbe {
    /// A 3xx response with the raw `Location` header value
    Redirect(String),
    /// Any other response, by status code
    NotRedirect(u16),
}

/// Network operations needed by sessions and resolvers
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a body, following redirects. Non-2xx statuses are errors.
    async fn get_bytes(&self, url: &str) -> UseCdnResult<Vec<u8>>;

    /// Fetch a UTF-8 body with the given `Accept` header.
    async fn get_text(&self, url: &str, accept: &str) -> UseCdnResult<String>;

    /// Issue a request without following redirects.
    async fn get_redirect(&self, url: &str) -> UseCdnResult<RedirectProbe>;
}

/// `ureq`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    follow: Agent,
    no_follow: Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let follow = Agent::new_with_config(
            Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(Some(timeout))
                .build(),
        );
        let no_follow = Agent::new_with_config(
            Agent::config_builder()
                .http_status_as_error(false)
                .max_redirects(0)
                .max_redirects_will_error(false)
                .timeout_global(Some(timeout))
                .build(),
        );
        Self { follow, no_follow }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

/// Ensure a base URL ends with `/` so paths can be appended directly
pub fn normalize_base(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

fn network_error(url: &str, err: ureq::Error) -> UseCdnError {
    UseCdnError::Network {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

/// Run a blocking HTTP exchange off the async executor
async fn run_blocking<T, F>(f: F) -> UseCdnResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> UseCdnResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| UseCdnError::Internal(format!("HTTP task failed: {}", e)))?
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_bytes(&self, url: &str) -> UseCdnResult<Vec<u8>> {
        let agent = self.follow.clone();
        let url = url.to_string();
        run_blocking(move || {
            let mut response = agent
                .get(url.as_str())
                .call()
                .map_err(|e| network_error(&url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(UseCdnError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            let body = response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_vec()
                .map_err(|e| network_error(&url, e))?;
            debug!("Received {} bytes from {}", body.len(), url);
            Ok(body)
        })
        .await
    }

    async fn get_text(&self, url: &str, accept: &str) -> UseCdnResult<String> {
        let agent = self.follow.clone();
        let url = url.to_string();
        let accept = accept.to_string();
        run_blocking(move || {
            let mut response = agent
                .get(url.as_str())
                .header("Accept", accept.as_str())
                .call()
                .map_err(|e| network_error(&url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(UseCdnError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_string()
                .map_err(|e| network_error(&url, e))
        })
        .await
    }

    async fn get_redirect(&self, url: &str) -> UseCdnResult<RedirectProbe> {
        let agent = self.no_follow.clone();
        let url = url.to_string();
        run_blocking(move || {
            let response = agent
                .get(url.as_str())
                .call()
                .map_err(|e| network_error(&url, e))?;

            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok());

            match location {
                Some(location) if status.is_redirection() => {
                    Ok(RedirectProbe::Redirect(location.to_string()))
                }
                _ => Ok(RedirectProbe::NotRedirect(status.as_u16())),
            }
        })
        .await
    }
}
