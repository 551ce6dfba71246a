//! use-cdn - fetch front-end assets from public CDNs into a local cache
//!
//! A configuration lists packages, a version or tag for each, and the files
//! wanted from them. [`orchestrator::Orchestrator`] resolves tags and ranges
//! to concrete versions, downloads each missing file once and returns local
//! paths. [`orchestrator::resolved_files`] lists the same paths later without
//! touching the network.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod resolver;
pub mod session;
pub mod ui;

pub use config::{Config, FileSpec, Overrides, PackageSpec};
pub use error::{UseCdnError, UseCdnResult};
pub use orchestrator::{resolved_files, Orchestrator};
