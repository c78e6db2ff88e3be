//! Parenthesised forms (§4.2, §4.2.1, §4.2.4, §4.2.6): capture groups,
//! lookaround, atomic groups, flag subpatterns, conditionals, branch-reset,
//! comments, and the Python `(?P...)` extension prefix.
//!
//! Grounded on `_regex_core.py`'s `_parse_paren` dispatch: one `(?` lookahead
//! switch over the next one or two characters picks the production.

use std::collections::HashSet;

use rexc_base::Span;

use crate::ast::{FuzzyParams, GroupRef, Node};
use crate::error::CompileError;
use crate::flags::Flags;

use super::{ParseSignal, Parser, PResult};

pub(super) fn parse_group<'a>(p: &mut Parser<'_, 'a>) -> PResult<&'a Node<'a>> {
    let start = p.scanner.pos();
    p.scanner.bump(); // '('

    if !p.scanner.eat_char('?') {
        return parse_capturing(p, start, None);
    }

    match p.scanner.peek(0) {
        Some('#') => parse_comment(p, start),
        Some(':') => {
            p.scanner.bump();
            parse_scoped_flags_body(p, start, Flags::NONE, Flags::NONE)
        }
        Some('=') => {
            p.scanner.bump();
            parse_lookaround(p, start, false, true)
        }
        Some('!') => {
            p.scanner.bump();
            parse_lookaround(p, start, false, false)
        }
        Some('>') => {
            p.scanner.bump();
            parse_atomic(p, start)
        }
        Some('<') => parse_angle_bracket_form(p, start),
        Some('P') => parse_python_extension(p, start),
        Some('(') => parse_conditional(p, start),
        Some('|') => parse_branch_reset(p, start),
        Some('R') | Some('&') => reject_recursion(p, start),
        Some(c) if c.is_ascii_digit() => reject_recursion(p, start),
        _ => parse_flag_subpattern(p, start),
    }
}

fn expect_close(p: &mut Parser<'_, '_>, start: usize) -> PResult<()> {
    if p.scanner.eat_char(')') {
        Ok(())
    } else {
        Err(CompileError::MissingDelimiter { delimiter: ")", span: p.span_at(start) }.into())
    }
}

fn parse_comment<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    loop {
        match p.scanner.peek(0) {
            Some(')') => break,
            Some(_) => {
                p.scanner.bump();
            }
            None => return Err(CompileError::MissingDelimiter { delimiter: ")", span: p.span_at(start) }.into()),
        }
    }
    p.scanner.bump();
    Ok(p.alloc(Node::Sequence(&[])))
}

fn parse_lookaround<'a>(
    p: &mut Parser<'_, 'a>,
    start: usize,
    behind: bool,
    positive: bool,
) -> PResult<&'a Node<'a>> {
    let saved = p.flags;
    let body = p.parse_branch();
    p.flags = saved;
    let body = body?;
    expect_close(p, start)?;
    Ok(p.alloc(Node::LookAround { behind, positive, body }))
}

fn parse_atomic<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let saved = p.flags;
    let body = p.parse_branch();
    p.flags = saved;
    let body = body?;
    expect_close(p, start)?;
    Ok(p.alloc(Node::Atomic(body)))
}

/// Dispatches on `(?<`: lookbehind (`=`/`!`) vs named capture.
fn parse_angle_bracket_form<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump(); // '<'
    match p.scanner.peek(0) {
        Some('=') => {
            p.scanner.bump();
            parse_lookaround(p, start, true, true)
        }
        Some('!') => {
            p.scanner.bump();
            parse_lookaround(p, start, true, false)
        }
        _ => {
            let name = read_name(p, start, '>')?;
            parse_capturing(p, start, Some(name))
        }
    }
}

fn parse_python_extension<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump(); // 'P'
    match p.scanner.peek(0) {
        Some('<') => {
            p.scanner.bump();
            let name = read_name(p, start, '>')?;
            parse_capturing(p, start, Some(name))
        }
        Some('=') => {
            p.scanner.bump();
            let name = read_name(p, start, ')')?;
            let sym = p.ctx.interner.intern(&name);
            let n = p
                .ctx
                .group_by_name(sym)
                .ok_or_else(|| CompileError::UnknownGroup(p.span_at(start)))?;
            back_reference(p, n, start)
        }
        Some('>') | Some('&') => reject_recursion(p, start),
        _ => Err(CompileError::UnknownExtension(p.span_at(start)).into()),
    }
}

fn back_reference<'a>(p: &mut Parser<'_, 'a>, n: u32, start: usize) -> PResult<&'a Node<'a>> {
    if p.ctx.group_state(n) == Some(crate::context::GroupState::Open) {
        return Err(CompileError::OpenGroupBackref(p.span_at(start)).into());
    }
    let span = p.span_at(start);
    let ignorecase = p.flags.contains(Flags::IGNORECASE);
    Ok(p.alloc(if ignorecase {
        Node::RefGroupIgn { number: n, span }
    } else {
        Node::RefGroup { number: n, span }
    }))
}

/// Recursive subpattern calls (`(?R)`, `(?n)`, `(?&name)`, `(?P>name)`) have
/// no counterpart in the node catalogue or opcode set; the parser recognises
/// the syntax and rejects it rather than silently misparsing it as something
/// else.
fn reject_recursion<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    loop {
        match p.scanner.peek(0) {
            Some(')') => {
                p.scanner.bump();
                break;
            }
            Some(_) => {
                p.scanner.bump();
            }
            None => return Err(CompileError::MissingDelimiter { delimiter: ")", span: p.span_at(start) }.into()),
        }
    }
    Err(CompileError::UnknownExtension(p.span_at(start)).into())
}

/// Reads characters up to (and consuming) `close`, rejecting an empty or
/// unterminated name.
fn read_name(p: &mut Parser<'_, '_>, start: usize, close: char) -> PResult<String> {
    let mut name = String::new();
    loop {
        match p.scanner.peek(0) {
            Some(c) if c == close => break,
            Some(c) => {
                name.push(c);
                p.scanner.bump();
            }
            None => {
                let delimiter: &'static str = match close {
                    '>' => ">",
                    ')' => ")",
                    _ => unreachable!(),
                };
                return Err(CompileError::MissingDelimiter { delimiter, span: p.span_at(start) }.into());
            }
        }
    }
    p.scanner.bump();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CompileError::BadGroupName(p.span_at(start)).into());
    }
    Ok(name)
}

fn parse_capturing<'a>(p: &mut Parser<'_, 'a>, start: usize, name: Option<String>) -> PResult<&'a Node<'a>> {
    let number = p.ctx.new_group();
    if let Some(name) = name {
        let sym = p.ctx.interner.intern(&name);
        p.ctx
            .declare_group_name(sym, number)
            .map_err(|_| CompileError::DuplicateGroup(p.span_at(start)))?;
    }
    let saved = p.flags;
    let body = p.parse_branch();
    p.flags = saved;
    let body = body?;
    p.ctx.close_group(number);
    expect_close(p, start)?;
    let fuzzy = parse_fuzzy_clause(p)?;
    Ok(p.alloc(Node::Group { number, body, fuzzy: fuzzy.map(Box::new) }))
}

/// `(?(id-or-name)yes|no)`: the only place a `(` production nests a further
/// `(...)` group reference rather than a body.
fn parse_conditional<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump(); // '('
    let id = read_name(p, start, ')')?;
    let group = if let Ok(n) = id.parse::<u32>() {
        GroupRef::Number(n)
    } else {
        GroupRef::Name(p.ctx.interner.intern(&id))
    };
    let saved = p.flags;
    let yes = p.parse_sequence_for_group();
    p.flags = saved;
    let yes = yes?;
    let no = if p.scanner.eat_char('|') {
        let no = p.parse_sequence_for_group();
        p.flags = saved;
        Some(no?)
    } else {
        None
    };
    expect_close(p, start)?;
    Ok(p.alloc(Node::Conditional { group, yes, no, span: p.span_at(start) }))
}

/// `(?|seq|seq|...)`: branch-reset alternation (§4.2.4).
fn parse_branch_reset<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump(); // '|'
    let snapshot = p.ctx.snapshot();
    let mut max_count = p.ctx.group_count();
    let mut union_used: HashSet<u32> = p.ctx.used_groups().clone();
    let mut arms = Vec::new();

    let saved_flags = p.flags;
    loop {
        let prev_baseline = p.ctx.begin_branch_reset_arm();
        let arm = p.parse_sequence_for_group();
        p.ctx.end_branch_reset(prev_baseline);
        p.flags = saved_flags;
        let arm = arm?;
        arms.push(arm);

        max_count = max_count.max(p.ctx.group_count());
        union_used.extend(p.ctx.used_groups().iter().copied());

        if p.scanner.eat_char('|') {
            p.ctx.restore(&snapshot);
            continue;
        }
        break;
    }

    p.ctx.merge_branch_reset(max_count, union_used);
    expect_close(p, start)?;

    let node = if arms.len() == 1 {
        arms.into_iter().next().unwrap()
    } else {
        p.alloc(Node::Branch(p.arena.alloc_slice(arms)))
    };
    Ok(node)
}

/// `(?on-off)` / `(?on-off:body)` (§4.2.1).
fn parse_flag_subpattern<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let (on, off) = read_flag_letters(p, start)?;

    if off.intersects(Flags::GLOBAL_MASK) {
        return Err(CompileError::CantTurnFlagsOff(p.span_at(start)).into());
    }

    if p.scanner.eat_char(':') {
        return parse_scoped_flags_body(p, start, on, off);
    }

    expect_close(p, start)?;

    if on.intersects(Flags::GLOBAL_MASK) && !p.flags.contains(Flags::NEW) {
        // Old behaviour: a positional global-affecting flag restarts the
        // whole compile with the augmented global set (§4.2.1).
        return Err(ParseSignal::Restart(p.flags.global() | on.global()));
    }

    p.flags |= on;
    p.flags = p.flags & !off;
    Ok(p.alloc(Node::Sequence(&[])))
}

fn parse_scoped_flags_body<'a>(
    p: &mut Parser<'_, 'a>,
    start: usize,
    on: Flags,
    off: Flags,
) -> PResult<&'a Node<'a>> {
    let saved = p.flags;
    p.flags = (p.flags | on) & !off;
    let body = p.parse_branch();
    p.flags = saved;
    let body = body?;
    expect_close(p, start)?;
    Ok(body)
}

/// Reads the `on[-off]` flag-letter run up to `:` or `)`.
fn read_flag_letters(p: &mut Parser<'_, '_>, start: usize) -> PResult<(Flags, Flags)> {
    let mut on = Flags::NONE;
    let mut off = Flags::NONE;
    let mut reading_off = false;

    loop {
        match p.scanner.peek(0) {
            Some('-') if !reading_off => {
                reading_off = true;
                p.scanner.bump();
            }
            Some(':') | Some(')') => break,
            Some('V') => {
                // V0 / V1: alias for NEW off / on.
                p.scanner.bump();
                match p.scanner.peek(0) {
                    Some('0') => {
                        p.scanner.bump();
                        if reading_off { on |= Flags::NEW } else { off |= Flags::NEW }
                    }
                    Some('1') => {
                        p.scanner.bump();
                        if reading_off { off |= Flags::NEW } else { on |= Flags::NEW }
                    }
                    _ => return Err(CompileError::BadInlineFlags(p.span_at(start)).into()),
                }
            }
            Some(c) => match Flags::from_letter(c) {
                Some(flag) => {
                    p.scanner.bump();
                    if reading_off { off |= flag } else { on |= flag }
                }
                None => return Err(CompileError::BadInlineFlags(p.span_at(start)).into()),
            },
            None => return Err(CompileError::MissingDelimiter { delimiter: ")", span: p.span_at(start) }.into()),
        }
    }
    Ok((on, off))
}

/// Parses an optional `{...}` fuzzy-match clause suffixed to a just-closed
/// group (§4.2.6). Disambiguated from an ordinary `{m,n}` repeat bound by
/// the presence of `<`, which a repeat count never contains.
fn parse_fuzzy_clause<'a>(p: &mut Parser<'_, 'a>) -> PResult<Option<FuzzyParams>> {
    let start = p.scanner.pos();
    if p.scanner.peek(0) != Some('{') {
        return Ok(None);
    }
    let checkpoint = p.scanner.checkpoint();
    p.scanner.bump();
    let mut body = String::new();
    loop {
        match p.scanner.peek(0) {
            Some('}') => break,
            Some(c) => {
                body.push(c);
                p.scanner.bump();
            }
            None => {
                p.scanner.restore(checkpoint);
                return Ok(None);
            }
        }
    }
    if !body.contains('<') {
        p.scanner.restore(checkpoint);
        return Ok(None);
    }
    p.scanner.bump(); // '}'

    match parse_fuzzy_body(&body) {
        Some(params) => Ok(Some(params)),
        None => Err(CompileError::BadSet(p.span_at(start)).into()),
    }
}

/// Parses the inside of a fuzzy clause: `e<=n`, `i<=a,d<=b,s<=c,e<=t`,
/// `m<e<=n`, with an optional trailing `,ki+ld+ms<bound` cost-weight term.
fn parse_fuzzy_body(body: &str) -> Option<FuzzyParams> {
    let mut params = FuzzyParams {
        max_substitutions: None,
        max_insertions: None,
        max_deletions: None,
        max_errors: None,
        min_errors: None,
        cost_weights: None,
        best_match: false,
        enhanced_match: false,
    };

    for clause in body.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        if let Some(weights) = parse_cost_weights(clause) {
            params.cost_weights = Some(weights);
            continue;
        }
        parse_fuzzy_term(clause, &mut params)?;
    }
    Some(params)
}

fn parse_fuzzy_term(clause: &str, params: &mut FuzzyParams) -> Option<()> {
    // `m<e<=n`: an explicit minimum alongside the bound.
    if let Some((min_part, rest)) = clause.split_once('<') {
        if let Some(rest) = rest.strip_prefix('e') {
            let min: u32 = min_part.parse().ok()?;
            let max: u32 = rest.strip_prefix("<=")?.parse().ok()?;
            params.min_errors = Some(min);
            params.max_errors = Some(max);
            return Some(());
        }
    }

    let (letter, value) = clause.split_once("<=")?;
    let value: u32 = value.parse().ok()?;
    match letter {
        "i" => params.max_insertions = Some(value),
        "d" => params.max_deletions = Some(value),
        "s" => params.max_substitutions = Some(value),
        "e" => params.max_errors = Some(value),
        _ => return None,
    }
    Some(())
}

/// `ki+ld+ms<bound`: weighted cost bound on insertions/deletions/substitutions.
fn parse_cost_weights(clause: &str) -> Option<(u32, u32, u32, u32)> {
    let (lhs, bound) = clause.split_once('<')?;
    let bound: u32 = bound.parse().ok()?;
    let mut k = 1;
    let mut l = 1;
    let mut m = 1;
    for term in lhs.split('+') {
        let term = term.trim();
        let (weight, tag) = term.split_at(term.len() - 1);
        let weight: u32 = if weight.is_empty() { 1 } else { weight.parse().ok()? };
        match tag {
            "i" => k = weight,
            "d" => l = weight,
            "s" => m = weight,
            _ => return None,
        }
    }
    Some((k, l, m, bound))
}

impl<'c, 'a> Parser<'c, 'a> {
    /// Branch-production entry used by conditional/branch-reset bodies,
    /// which need a bare sequence-or-branch without `parse_pattern`'s
    /// trailing-input check.
    fn parse_sequence_for_group(&mut self) -> PResult<&'a Node<'a>> {
        self.parse_branch()
    }
}
