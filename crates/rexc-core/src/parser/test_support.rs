//! Shared test scaffolding: leaks a fresh arena/context/property-table per
//! call so parser submodule tests can get `'static` AST references without
//! threading lifetimes through every test function.

#![cfg(test)]

use rexc_base::Arena;

use crate::ast::Node;
use crate::casefold::AsciiCaseFold;
use crate::context::{CompileOptions, Context};
use crate::flags::Flags;
use crate::property::PropertyTable;

use super::{PResult, Parser};

pub(super) fn parse_with_flags(pattern: &str, flags: Flags) -> PResult<&'static Node<'static>> {
    let cps: Vec<u32> = pattern.chars().map(|c| c as u32).collect();
    let cps: &'static [u32] = Box::leak(cps.into_boxed_slice());
    let arena: &'static Arena<Node<'static>> = Box::leak(Box::new(Arena::new()));
    let props: &'static PropertyTable = Box::leak(Box::new(PropertyTable::new()));
    let fold: &'static AsciiCaseFold = Box::leak(Box::new(AsciiCaseFold));
    let opts: &'static CompileOptions = Box::leak(Box::new(CompileOptions::new(flags, props, fold, &[])));
    let ctx: &'static mut Context = Box::leak(Box::new(Context::new(opts)));
    let mut parser = Parser::new(cps, ctx, arena, flags);
    parser.parse_pattern()
}

pub(super) fn parse(pattern: &str) -> PResult<&'static Node<'static>> {
    parse_with_flags(pattern, Flags::NONE)
}
