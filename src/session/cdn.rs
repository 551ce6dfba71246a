//! Supported CDNs and their URL layouts

use crate::resolver::ResolverKind;
use std::fmt;

pub const UNPKG_URL: &str = "https://unpkg.com/";
pub const CDNJS_URL: &str = "https://cdnjs.cloudflare.com/";

/// CDN used when neither the package nor the configuration names one
pub const DEFAULT_CDN: &str = "unpkg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cdn {
    Unpkg,
    Cdnjs,
}

impl Cdn {
    pub const ALL: [Cdn; 2] = [Cdn::Unpkg, Cdn::Cdnjs];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cdn| cdn.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unpkg => "unpkg",
            Self::Cdnjs => "cdnjs",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Self::Unpkg => UNPKG_URL,
            Self::Cdnjs => CDNJS_URL,
        }
    }

    /// Resolver the CDN itself provides, if any
    pub fn native_resolver(self) -> Option<ResolverKind> {
        match self {
            Self::Unpkg => Some(ResolverKind::Redirect),
            Self::Cdnjs => None,
        }
    }

    /// URL of a package's root at a concrete version. `base` ends with `/`.
    pub fn package_url(self, base: &str, package: &str, version: &str) -> String {
        match self {
            Self::Unpkg => format!("{}{}@{}", base, package, version),
            Self::Cdnjs => format!("{}ajax/libs/{}/{}", base, package, version),
        }
    }
}

impl fmt::Display for Cdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
