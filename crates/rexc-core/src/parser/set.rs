//! Character classes (§4.2.3): a four-level operator precedence tower over
//! set members, tightest-first: implicit union, `--` diff, `&&` intersection,
//! `~~` symmetric difference, explicit `||` union.
//!
//! Grounded on `_regex_core.py`'s `_parse_set`/`_parse_set_union` family,
//! expressed as one recursive-descent function per precedence level instead
//! of an operator-precedence loop, since the grammar is small and closed.

use rexc_base::Span;

use crate::ast::{Node, SetData, SetFlags};
use crate::casefold::CaseFold;
use crate::error::CompileError;
use crate::flags::Flags;

use super::{ParseSignal, Parser, PResult};

pub(super) fn parse_class<'a>(p: &mut Parser<'_, 'a>) -> PResult<&'a Node<'a>> {
    let start = p.scanner.pos();
    p.scanner.bump(); // '['
    let saved_ignore = p.scanner.set_ignore_space(false);
    let result = parse_class_body(p, start);
    p.scanner.set_ignore_space(saved_ignore);
    result
}

fn parse_class_body<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let negate = p.scanner.eat_char('^');
    let body = parse_union_explicit(p, start)?;
    if !p.scanner.eat_char(']') {
        return Err(CompileError::MissingDelimiter { delimiter: "]", span: p.span_at(start) }.into());
    }
    Ok(if negate { negate_set(p, body) } else { body })
}

/// Level 5 (loosest): explicit union `||`.
fn parse_union_explicit<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let mut node = parse_symdiff(p, start)?;
    while p.scanner.eat_str("||") {
        let rhs = parse_symdiff(p, start)?;
        node = combine(p, node, rhs, Node::SetUnion);
    }
    Ok(node)
}

/// Level 4: symmetric difference `~~`.
fn parse_symdiff<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let mut node = parse_inter(p, start)?;
    while p.scanner.eat_str("~~") {
        let rhs = parse_inter(p, start)?;
        node = combine(p, node, rhs, Node::SetSymDiff);
    }
    Ok(node)
}

/// Level 3: intersection `&&`.
fn parse_inter<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let mut node = parse_diff(p, start)?;
    while p.scanner.eat_str("&&") {
        let rhs = parse_diff(p, start)?;
        node = combine(p, node, rhs, Node::SetInter);
    }
    Ok(node)
}

/// Level 2: difference `--`.
fn parse_diff<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let mut node = parse_union_implicit(p, start)?;
    while p.scanner.eat_str("--") {
        let rhs = parse_union_implicit(p, start)?;
        node = combine(p, node, rhs, Node::SetDiff);
    }
    Ok(node)
}

fn combine<'a>(
    p: &Parser<'_, 'a>,
    lhs: &'a Node<'a>,
    rhs: &'a Node<'a>,
    ctor: fn(SetData<'a>) -> Node<'a>,
) -> &'a Node<'a> {
    let items = p.arena.alloc_slice([lhs, rhs]);
    p.alloc(ctor(SetData { items, flags: SetFlags { positive: true, zerowidth: false } }))
}

/// `true` at the cursor position of any of the four binary set operators;
/// used by [`parse_union_implicit`] to stop collecting members without
/// consuming the operator, leaving it for the matching precedence level.
fn at_set_operator(p: &Parser<'_, '_>) -> bool {
    p.scanner.matches_str("--")
        || p.scanner.matches_str("&&")
        || p.scanner.matches_str("~~")
        || p.scanner.matches_str("||")
}

/// Level 1 (tightest): juxtaposition. Always wraps in a `SetUnion`, even for
/// a single member, leaving singleton collapse to the optimiser (§4.4).
fn parse_union_implicit<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    let mut items: Vec<&'a Node<'a>> = Vec::new();
    loop {
        match p.scanner.peek(0) {
            None => {
                return Err(CompileError::MissingDelimiter { delimiter: "]", span: p.span_at(start) }.into())
            }
            Some(']') => break,
            _ if at_set_operator(p) => break,
            _ => parse_member(p, start, &mut items)?,
        }
    }
    Ok(p.alloc(Node::SetUnion(SetData {
        items: p.arena.alloc_slice(items),
        flags: SetFlags { positive: true, zerowidth: false },
    })))
}

/// Parses one member, resolving a trailing range suffix if present, and
/// pushes the resulting node(s) onto `items`.
fn parse_member<'a>(p: &mut Parser<'_, 'a>, start: usize, items: &mut Vec<&'a Node<'a>>) -> PResult<()> {
    let node = parse_single_member(p, start)?;
    maybe_range(p, start, node, items)
}

/// Parses exactly one set member with no range extension: a character
/// literal, an escape, a nested `[...]` class, or a POSIX `[:name:]` class.
///
/// Literal characters are always plain `Character` nodes here, never
/// `CharacterIgn` (unlike [`Parser::literal`] outside a class): case
/// expansion for set members is done eagerly by [`push_member`] once a
/// member's final shape (single character vs. range) is known, since there
/// is no `CharacterRangeIgn` counterpart to defer a range's expansion to.
fn parse_single_member<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    if let Some(node) = try_posix_class(p, start)? {
        return Ok(node);
    }
    if let Some(node) = try_nested_class(p)? {
        return Ok(node);
    }
    if p.scanner.peek(0) == Some('\\') {
        return super::escape::parse_escape(p, true);
    }
    match p.scanner.bump_raw() {
        Some(c) => Ok(p.alloc(Node::Character { value: c as u32, positive: true, zerowidth: false })),
        None => Err(CompileError::MissingDelimiter { delimiter: "]", span: p.span_at(start) }.into()),
    }
}

/// Applies §4.2.3's range rule: a hyphen after a literal starts a range
/// whose endpoint is the next member if it is a `Character`; otherwise the
/// hyphen and endpoint become their own literal members. Disambiguated from
/// the `--` diff operator by requiring exactly one hyphen.
fn maybe_range<'a>(
    p: &mut Parser<'_, 'a>,
    start: usize,
    first: &'a Node<'a>,
    items: &mut Vec<&'a Node<'a>>,
) -> PResult<()> {
    let extends = p.scanner.peek(0) == Some('-')
        && p.scanner.peek(1).is_some()
        && p.scanner.peek(1) != Some(']')
        && p.scanner.peek(1) != Some('-');
    if !extends {
        push_member(p, first, items);
        return Ok(());
    }
    let Node::Character { value: lo, positive: true, zerowidth: false } = first else {
        push_member(p, first, items);
        return Ok(());
    };
    let lo = *lo;

    p.scanner.bump_raw(); // '-'
    let endpoint = parse_single_member(p, start)?;
    match endpoint {
        Node::Character { value: hi, positive: true, zerowidth: false } => {
            let hi = *hi;
            if hi < lo {
                return Err(CompileError::BadCharacterRange(p.span_at(start)).into());
            }
            push_member(p, p.alloc(Node::CharacterRange { lo, hi, positive: true }), items);
        }
        _ => {
            push_member(p, first, items);
            push_member(p, p.alloc(Node::Character { value: '-' as u32, positive: true, zerowidth: false }), items);
            push_member(p, endpoint, items);
        }
    }
    Ok(())
}

/// Pushes `node` onto `items`, and under an active `IGNORECASE` scope, also
/// pushes its case-equivalent sibling(s) (§4.2.3): every other code point in
/// a single character's equivalence class, or the mirrored-case range for an
/// ASCII-letter `CharacterRange`. There is no `CharacterRangeIgn` node, so
/// this expansion happens here instead of being deferred to the optimiser.
fn push_member<'a>(p: &Parser<'_, 'a>, node: &'a Node<'a>, items: &mut Vec<&'a Node<'a>>) {
    items.push(node);
    if !p.flags.contains(Flags::IGNORECASE) {
        return;
    }
    match node {
        Node::Character { value, positive: true, zerowidth: false } => {
            if let Some(c) = char::from_u32(*value) {
                for eq in p.ctx.casefold.equivalents(c) {
                    if eq as u32 != *value {
                        items.push(p.alloc(Node::Character { value: eq as u32, positive: true, zerowidth: false }));
                    }
                }
            }
        }
        Node::CharacterRange { lo, hi, positive: true } => {
            if let (Some(mlo), Some(mhi)) = (mirror_ascii_case(*lo), mirror_ascii_case(*hi)) {
                if mlo <= mhi {
                    items.push(p.alloc(Node::CharacterRange { lo: mlo, hi: mhi, positive: true }));
                }
            }
        }
        _ => {}
    }
}

/// Mirrors an ASCII letter's case (`a` <-> `A`); `None` for anything else.
/// Used to extend a plain-ASCII range (`a-z`) with its cased counterpart
/// under `IGNORECASE` without attempting a full per-codepoint expansion.
fn mirror_ascii_case(cp: u32) -> Option<u32> {
    let c = char::from_u32(cp)?;
    if c.is_ascii_lowercase() {
        Some(c.to_ascii_uppercase() as u32)
    } else if c.is_ascii_uppercase() {
        Some(c.to_ascii_lowercase() as u32)
    } else {
        None
    }
}

/// `[:name:]` / `[:^name:]`, resolved as a binary property (§4.2.3, §4.3).
/// Rewinds and returns `None` on any mismatch, including an unrecognised
/// name, so the caller falls back to treating `[` as a literal.
fn try_posix_class<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<Option<&'a Node<'a>>> {
    if !p.scanner.matches_str("[:") {
        return Ok(None);
    }
    let checkpoint = p.scanner.checkpoint();
    p.scanner.bump_raw();
    p.scanner.bump_raw();
    let negate = p.scanner.eat_char('^');

    let mut name = String::new();
    loop {
        match p.scanner.peek(0) {
            Some(':') if p.scanner.peek(1) == Some(']') => break,
            Some(c) if c.is_ascii_alphabetic() => {
                name.push(c);
                p.scanner.bump_raw();
            }
            _ => {
                p.scanner.restore(checkpoint);
                return Ok(None);
            }
        }
    }
    p.scanner.bump_raw();
    p.scanner.bump_raw();

    match p.ctx.properties.resolve(None, &name, !negate, span_from(p, start)) {
        Ok((id, positive)) => Ok(Some(p.alloc(Node::Property { id, positive, zerowidth: false }))),
        Err(_) => {
            p.scanner.restore(checkpoint);
            Ok(None)
        }
    }
}

fn span_from(p: &Parser<'_, '_>, start: usize) -> Span {
    p.span_at(start)
}

/// A nested `[...]` class, parsed recursively; failure rewinds and the
/// caller falls back to a literal `[` (§4.2.3).
fn try_nested_class<'a>(p: &mut Parser<'_, 'a>) -> PResult<Option<&'a Node<'a>>> {
    if p.scanner.peek(0) != Some('[') {
        return Ok(None);
    }
    let checkpoint = p.scanner.checkpoint();
    let start = p.scanner.pos();
    p.scanner.bump_raw();
    match parse_class_body(p, start) {
        Ok(node) => Ok(Some(node)),
        Err(ParseSignal::Error(_)) => {
            p.scanner.restore(checkpoint);
            Ok(None)
        }
        Err(restart @ ParseSignal::Restart(_)) => Err(restart),
    }
}

fn negate_set<'a>(p: &Parser<'_, 'a>, node: &'a Node<'a>) -> &'a Node<'a> {
    let flipped = match node {
        Node::SetUnion(d) => Node::SetUnion(flip(d)),
        Node::SetInter(d) => Node::SetInter(flip(d)),
        Node::SetDiff(d) => Node::SetDiff(flip(d)),
        Node::SetSymDiff(d) => Node::SetSymDiff(flip(d)),
        _ => return node,
    };
    p.alloc(flipped)
}

fn flip<'a>(d: &SetData<'a>) -> SetData<'a> {
    SetData { items: d.items, flags: SetFlags { positive: !d.flags.positive, zerowidth: d.flags.zerowidth } }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse;
    use crate::ast::Node;

    #[test]
    fn simple_class_builds_set_union_of_characters() {
        let result = parse("[abc]").unwrap();
        assert!(matches!(result, Node::SetUnion(_)));
    }

    #[test]
    fn range_builds_character_range_member() {
        let result = parse("[a-z]").unwrap();
        match result {
            Node::SetUnion(d) => {
                assert_eq!(d.items.len(), 1);
                assert!(matches!(d.items[0], Node::CharacterRange { lo, hi, positive: true } if *lo == 'a' as u32 && *hi == 'z' as u32));
            }
            other => panic!("expected SetUnion, got {other:?}"),
        }
    }

    #[test]
    fn reversed_range_is_an_error() {
        use super::super::ParseSignal;
        use crate::error::CompileError;
        let err = parse("[z-a]");
        assert!(matches!(err, Err(ParseSignal::Error(CompileError::BadCharacterRange(_)))));
    }

    #[test]
    fn negated_class_flips_polarity() {
        let result = parse("[^a]").unwrap();
        match result {
            Node::SetUnion(d) => assert!(!d.flags.positive),
            other => panic!("expected SetUnion, got {other:?}"),
        }
    }

    #[test]
    fn intersection_builds_set_inter() {
        let result = parse("[a-z&&[^aeiou]]").unwrap();
        assert!(matches!(result, Node::SetInter(_)));
    }

    #[test]
    fn difference_builds_set_diff() {
        let result = parse("[a-z--aeiou]").unwrap();
        assert!(matches!(result, Node::SetDiff(_)));
    }

    #[test]
    fn symmetric_difference_builds_set_sym_diff() {
        let result = parse("[a-z~~a-m]").unwrap();
        assert!(matches!(result, Node::SetSymDiff(_)));
    }

    #[test]
    fn explicit_union_builds_set_union_of_subsets() {
        let result = parse("[a-c||x-z]").unwrap();
        assert!(matches!(result, Node::SetUnion(_)));
    }

    #[test]
    fn posix_class_resolves_to_property() {
        let result = parse("[[:alpha:]]").unwrap();
        match result {
            Node::SetUnion(d) => assert!(matches!(d.items[0], Node::Property { .. })),
            other => panic!("expected SetUnion wrapping a Property, got {other:?}"),
        }
    }

    #[test]
    fn unrecognised_posix_class_falls_back_to_literal() {
        let result = parse("[[:bogus:]]").unwrap();
        // Falls back to literal '[', ':', 'b', ... characters as set members.
        assert!(matches!(result, Node::SetUnion(_)));
    }

    #[test]
    fn hyphen_before_non_character_endpoint_is_literal() {
        let result = parse(r"[a-\d]").unwrap();
        match result {
            Node::SetUnion(d) => assert_eq!(d.items.len(), 3),
            other => panic!("expected three literal members, got {other:?}"),
        }
    }
}
