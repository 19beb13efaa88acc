//! Configuration for devswap
//!
//! Global settings live at `~/.config/devswap/config.toml`. Every value has a
//! built-in default, so a missing file is not an error.

mod error;
mod global;

pub use error::*;
pub use global::*;
