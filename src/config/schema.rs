//! Configuration schema for use-cdn

use crate::cache::paths::check_segment;
use crate::cache::DEFAULT_ROOT;
use crate::network::DEFAULT_TIMEOUT_SECS;
use crate::resolver::range::{parse_version, NpmRange};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Placeholder substituted by template file entries
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// CDN for packages that do not name one
    pub cdn: Option<String>,

    /// Cache directory, relative to the working directory
    pub cache_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Per-CDN settings, keyed by CDN name
    pub cdns: HashMap<String, CdnConfig>,

    /// Per-resolver settings, keyed by resolver name
    pub resolvers: HashMap<String, ResolverConfig>,

    /// Packages to resolve
    pub packages: Vec<PackageSpec>,
}

/// Settings for one CDN
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CdnConfig {
    /// Base URL replacing the CDN's public one
    pub url: Option<String>,

    /// Resolver name, or "native" for the CDN's own
    pub resolver: Option<String>,
}

/// Settings for one named resolver
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Base URL replacing the resolver's default upstream
    pub url: Option<String>,
}

/// One package to fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    pub package: String,

    #[serde(default)]
    pub cdn: Option<String>,

    /// Name to resolve versions under, when the resolver knows the package
    /// by a different name than the CDN
    #[serde(default, alias = "resolveAs")]
    pub resolve_as: Option<String>,

    pub version: String,

    pub files: Vec<FileSpec>,
}

impl PackageSpec {
    pub fn new(package: impl Into<String>, version: impl Into<String>, files: Vec<FileSpec>) -> Self {
        Self {
            package: package.into(),
            cdn: None,
            resolve_as: None,
            version: version.into(),
            files,
        }
    }

    pub fn with_cdn(mut self, cdn: impl Into<String>) -> Self {
        self.cdn = Some(cdn.into());
        self
    }

    pub fn with_resolve_as(mut self, name: impl Into<String>) -> Self {
        self.resolve_as = Some(name.into());
        self
    }
}

/// A file of a package, possibly depending on the resolved version
#[derive(Clone)]
pub enum FileSpec {
    /// A fixed path
    Literal(String),
    /// A path with `{version}` substituted
    Template(String),
    /// The path of the first matching range, else `default`
    ByVersion {
        default: String,
        when: Vec<VersionedPath>,
    },
    /// Computed by the embedding program
    Computed(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

/// A path used for versions within `range`
#[derive(Debug, Clone)]
pub struct VersionedPath {
    pub range: String,
    matcher: NpmRange,
    pub path: String,
}

impl VersionedPath {
    pub fn new(range: impl Into<String>, path: impl Into<String>) -> Result<Self, String> {
        let range = range.into();
        let matcher =
            NpmRange::parse(&range).ok_or_else(|| format!("invalid version range {:?}", range))?;
        Ok(Self {
            range,
            matcher,
            path: path.into(),
        })
    }
}

impl FileSpec {
    pub fn computed(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// The path of this file for a concrete version
    pub fn for_version(&self, version: &str) -> Result<String, String> {
        let path = match self {
            Self::Literal(path) => path.clone(),
            Self::Template(template) => template.replace(VERSION_PLACEHOLDER, version),
            Self::ByVersion { default, when } => {
                let parsed = parse_version(version);
                when.iter()
                    .find(|entry| parsed.as_ref().is_some_and(|v| entry.matcher.matches(v)))
                    .map(|entry| entry.path.clone())
                    .unwrap_or_else(|| default.clone())
            }
            Self::Computed(f) => f(version),
        };
        validate_file_path(&path)?;
        Ok(path)
    }

    /// Check the parts known before resolution
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Literal(path) => validate_file_path(path),
            Self::Template(template) => {
                if !template.contains(VERSION_PLACEHOLDER) {
                    return Err(format!(
                        "file template {:?} does not contain {}",
                        template, VERSION_PLACEHOLDER
                    ));
                }
                validate_file_path(template)
            }
            Self::ByVersion { default, when } => {
                validate_file_path(default)?;
                when.iter().try_for_each(|entry| validate_file_path(&entry.path))
            }
            Self::Computed(_) => Ok(()),
        }
    }
}

impl From<&str> for FileSpec {
    fn from(path: &str) -> Self {
        Self::Literal(path.to_string())
    }
}

impl From<String> for FileSpec {
    fn from(path: String) -> Self {
        Self::Literal(path)
    }
}

impl fmt::Debug for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(path) => f.debug_tuple("Literal").field(path).finish(),
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Self::ByVersion { default, when } => f
                .debug_struct("ByVersion")
                .field("default", default)
                .field("when", when)
                .finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// File entry as written in a configuration file
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFileSpec {
    Literal(String),
    Template {
        template: String,
    },
    ByVersion {
        default: String,
        #[serde(default)]
        when: Vec<RawVersionedPath>,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersionedPath {
    range: String,
    path: String,
}

impl<'de> Deserialize<'de> for FileSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawFileSpec::deserialize(deserializer)? {
            RawFileSpec::Literal(path) => Ok(Self::Literal(path)),
            RawFileSpec::Template { template } => Ok(Self::Template(template)),
            RawFileSpec::ByVersion { default, when } => {
                let when = when
                    .into_iter()
                    .map(|raw| VersionedPath::new(raw.range, raw.path))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(D::Error::custom)?;
                Ok(Self::ByVersion { default, when })
            }
        }
    }
}

impl Config {
    /// A configuration holding only a package list
    pub fn from_packages(packages: Vec<PackageSpec>) -> Self {
        Self {
            packages,
            ..Self::default()
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Number of files across all packages
    pub fn file_count(&self) -> usize {
        self.packages.iter().map(|p| p.files.len()).sum()
    }

    /// Reject names and paths that could escape the cache directory
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be greater than zero".to_string());
        }

        for spec in &self.packages {
            validate_package_name(&spec.package)?;
            if let Some(name) = &spec.resolve_as {
                validate_package_name(name)?;
            }
            if spec.version.trim().is_empty() {
                return Err(format!("package {} has an empty version", spec.package));
            }
            check_segment("version", &spec.version)?;
            if spec.files.is_empty() {
                return Err(format!("package {} lists no files", spec.package));
            }
            for file in &spec.files {
                file.validate()
                    .map_err(|reason| format!("package {}: {}", spec.package, reason))?;
            }
        }
        Ok(())
    }
}

fn validate_package_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("package name is empty".to_string());
    }
    match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, rest)) if !scope.is_empty() && !rest.is_empty() => {
                check_segment("package name", scope)?;
                check_segment("package name", rest)
            }
            _ => Err(format!("scoped package name {:?} must be @scope/name", name)),
        },
        None => check_segment("package name", name),
    }
}

/// A relative path inside a package
pub fn validate_file_path(path: &str) -> Result<(), String> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains(['\\', '\0'])
        || path.split('/').any(|part| part == "..");
    if bad {
        Err(format!("invalid file path {:?}", path))
    } else {
        Ok(())
    }
}
