//! CLI command implementations

pub mod cache;
pub mod list;
pub mod resolve;

pub use cache::execute as cache;
pub use list::execute as list;
pub use resolve::execute as resolve;
