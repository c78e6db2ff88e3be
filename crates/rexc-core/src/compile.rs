//! The top-level compiler entry point (§6.1): wires scan -> parse ->
//! optimise -> first-set -> emit into one `CompiledProgram`.
//!
//! Grounded on `logicaffeine_language/src/compile.rs`'s pipeline shape: a
//! handful of stage functions composed in one public entry point, each
//! wrapped in its own `tracing` span so a caller with a subscriber attached
//! can see per-pass timing without this crate taking a logging-backend
//! opinion of its own.

use rexc_base::Arena;

use crate::ast::optimise::{self, OptimiseCtx};
use crate::ast::{firstset, Node};
use crate::context::{CompileOptions, Context};
use crate::emit;
use crate::error::{CompileError, Result};
use crate::flags::Flags;
use crate::opcode::{CompiledProgram, GroupTable, Opcode};
use crate::parser::Parser;
use crate::scanner::PatternSource;

/// Compiles `pattern` under `options` into an opcode program (§6.1).
///
/// Old-behaviour positional global flags (`(?i)` etc. outside `NEW` mode)
/// can widen the active global flag set mid-parse; when that happens the
/// parser raises a restart signal and this driver re-parses from scratch
/// with the augmented flags (§4.2.1). Each restart can only ever turn bits
/// on in the 6-bit global mask, so the loop is bounded by
/// `Flags::GLOBAL_FLAG_COUNT` and that bound is never actually reached.
pub fn compile(pattern: PatternSource, options: &CompileOptions) -> Result<CompiledProgram> {
    let codepoints = pattern.to_codepoints();

    let mut flags = options.flags;
    for _ in 0..=Flags::GLOBAL_FLAG_COUNT {
        match try_compile(&codepoints, flags, options)? {
            Ok(program) => return Ok(program),
            Err(widened) => flags = widened,
        }
    }
    unreachable!("restart loop exceeded GLOBAL_FLAG_COUNT bound (§9 Open Question 2)")
}

/// One parse attempt at a fixed flag set. `Ok(Err(widened))` signals a
/// requested restart with a wider global flag set rather than a hard
/// failure, distinguishing it from `Err` (an ordinary [`CompileError`]).
fn try_compile(
    codepoints: &[u32],
    flags: Flags,
    options: &CompileOptions,
) -> Result<std::result::Result<CompiledProgram, Flags>> {
    let arena: Arena<Node> = Arena::new();
    let mut ctx = Context::new(options);

    let root = {
        let _span = tracing::debug_span!("parse").entered();
        let mut parser = Parser::new(codepoints, &mut ctx, &arena, flags);
        match parser.parse_pattern() {
            Ok(node) => node,
            Err(crate::parser::ParseSignal::Restart(widened)) => return Ok(Err(widened)),
            Err(crate::parser::ParseSignal::Error(e)) => return Err(e),
        }
    };

    let root = {
        let _span = tracing::debug_span!("optimise").entered();
        let optimise_ctx = OptimiseCtx { arena: &arena, casefold: options.casefold };
        optimise::optimise(root, &optimise_ctx)
    };

    let preamble = {
        let _span = tracing::debug_span!("firstset").entered();
        firstset::compile_firstset(root, &arena)
    };

    let mut code = Vec::new();
    {
        let _span = tracing::debug_span!("emit").entered();
        if let Some(preamble) = preamble {
            emit::emit(preamble, false, &ctx, &mut code)?;
        }
        emit::emit(root, false, &ctx, &mut code)?;
        code.push(Opcode::Success.code() as u32);
    }

    let groups = group_table(&ctx);
    let program = CompiledProgram {
        code,
        groups,
        vm_flags: flags.global().bits(),
        has_simple_start: root.has_simple_start(),
    };
    Ok(Ok(program))
}

/// Builds the published name -> number mapping, sorted by name for
/// deterministic output (§8 Determinism property).
fn group_table(ctx: &Context) -> GroupTable {
    let mut names: Vec<(String, u32)> = ctx
        .group_names()
        .map(|(sym, n)| (ctx.interner.resolve(sym).to_string(), n))
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    GroupTable { count: ctx.group_count(), names }
}
