//! Pattern-compilation front end: scanner, parser, AST, optimiser, first-set
//! analyser, and opcode emitter.
//!
//! The public entry point is [`compile::compile`], which takes a pattern
//! source and a set of [`context::CompileOptions`] and produces a
//! [`opcode::CompiledProgram`] or a [`error::CompileError`].

pub mod ast;
pub mod casefold;
pub mod compile;
pub mod context;
pub mod emit;
pub mod error;
pub mod flags;
pub mod opcode;
pub mod parser;
pub mod property;
pub mod scanner;

pub use compile::compile;
pub use context::CompileOptions;
pub use error::{CompileError, Result};
pub use flags::Flags;
pub use opcode::CompiledProgram;
