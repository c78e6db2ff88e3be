#![cfg_attr(docsrs, feature(doc_cfg))]

//! # rexc-base
//!
//! Pure structural atoms for the rexc pattern-compiler front end.
//!
//! This crate provides the foundational types shared by the scanner, parser,
//! AST, and emitter:
//!
//! - [`Arena`] — bump allocation for stable AST references
//! - [`Interner`]/[`Symbol`] — string interning for group names
//! - [`Span`] — source location tracking (code-point offsets)
//! - [`SpannedError`]/[`Result`] — errors with source positions
//!
//! # Design Principles
//!
//! This crate has **no knowledge of pattern syntax**. It provides only
//! generic, reusable infrastructure that `rexc-core` builds upon.

pub mod arena;
pub mod intern;
pub mod span;
pub mod error;

pub use arena::Arena;
pub use intern::{Interner, Symbol, SymbolEq};
pub use span::Span;
pub use error::{SpannedError, Result};
