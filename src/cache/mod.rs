//! Durable on-disk cache of package files
//!
//! Files are keyed by `(package, version, path)` and never change once
//! written. Tags are recorded as symlinks to the version they resolved to.
//!
//! # Variants
//!
//! | Type | I/O | Access | Used by |
//! |------|-----|--------|---------|
//! | [`CacheStore`] | async | read-write | resolution |
//! | [`CacheReader`] | sync | read-only | file listing |
//!
//! Both share the layout in [`paths`].

pub mod paths;
pub mod reader;
pub mod store;

pub use paths::{check_segment, is_tag, CacheMeta, CachePaths, CURRENT_VERSION, DEFAULT_ROOT};
pub use reader::CacheReader;
pub use store::CacheStore;
