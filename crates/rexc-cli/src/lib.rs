//! `rexc` - standalone binary
//!
//! Thin wrapper around [`cli::run_cli`], handling error display and exit
//! codes. All command logic lives in this library crate for testability.

pub mod cli;

pub use cli::run_cli;
