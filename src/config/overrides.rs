//! Per-run version overrides
//!
//! `USE_CDN_OVERRIDES="jquery@3.3.1 bootstrap@4"` replaces the configured
//! version of the named packages without editing the configuration file.

use crate::cache::check_segment;
use crate::error::{UseCdnError, UseCdnResult};
use std::collections::HashMap;
use std::str::FromStr;

/// Environment variable read by [`Overrides::from_env`]
pub const OVERRIDES_ENV: &str = "USE_CDN_OVERRIDES";

/// Package name to replacement version-or-tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    versions: HashMap<String, String>,
}

impl Overrides {
    /// Parse whitespace-separated `package@version` entries
    pub fn parse(spec: &str) -> UseCdnResult<Self> {
        let mut versions = HashMap::new();
        for part in spec.split_whitespace() {
            let (package, version) = split_override(part)?;
            versions.insert(package.to_string(), version.to_string());
        }
        Ok(Self { versions })
    }

    /// Read overrides from `USE_CDN_OVERRIDES`; unset means none
    pub fn from_env() -> UseCdnResult<Self> {
        match std::env::var(OVERRIDES_ENV) {
            Ok(spec) => Self::parse(&spec),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn with(mut self, package: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(package.into(), version.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, package: &str) -> Option<&str> {
        self.versions.get(package).map(String::as_str)
    }

    /// The version to use for `package`: the override if any, else `configured`
    pub fn apply<'a>(&'a self, package: &str, configured: &'a str) -> &'a str {
        self.get(package).unwrap_or(configured)
    }
}

impl FromStr for Overrides {
    type Err = UseCdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split `name@version`, where a scoped name keeps its leading `@`
fn split_override(part: &str) -> UseCdnResult<(&str, &str)> {
    let (scope_at, rest) = match part.strip_prefix('@') {
        Some(rest) => ("@", rest),
        None => ("", part),
    };
    let mut pieces = rest.split('@');
    let name = pieces.next().unwrap_or_default();
    let version = pieces.next();
    if pieces.next().is_some() {
        return Err(UseCdnError::OverrideInvalid(format!(
            "malformed override: {}",
            part
        )));
    }

    match version {
        Some(version) if !name.is_empty() && !version.is_empty() => {
            check_segment("version", version).map_err(|reason| {
                UseCdnError::OverrideInvalid(format!("malformed override {}: {}", part, reason))
            })?;
            Ok((&part[..scope_at.len() + name.len()], version))
        }
        Some(_) => Err(UseCdnError::OverrideInvalid(format!(
            "malformed override: {}",
            part
        ))),
        None => Err(UseCdnError::OverrideInvalid(format!(
            "package {} overridden without a version specification",
            part
        ))),
    }
}
