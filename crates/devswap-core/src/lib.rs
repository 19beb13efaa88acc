//! Core logic for devswap
//!
//! This crate provides:
//! - Derivation of a development container from an existing container
//! - The swap lifecycle: tear down, run the dev session, restore the original
//! - Session end detection (interrupt, container exit, attach exit)
//! - Source tree resolution and cloning of remote repositories

mod derive;
mod error;
mod signal;
mod source;
mod swap;

pub use derive::*;
pub use error::*;
pub use signal::*;
pub use source::*;
pub use swap::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
