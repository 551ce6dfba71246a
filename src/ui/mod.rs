//! Terminal output for the `use-cdn` binary
//!
//! Status lines and spinners go to stderr so stdout carries only data
//! (paths, JSON). Spinners and colors are used only on an interactive
//! terminal; CI and pipes get plain `[OK]`-style lines.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, section, step_info, step_warn};
pub use progress::TaskSpinner;
