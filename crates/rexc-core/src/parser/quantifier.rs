//! Quantifier parsing (§4.2 table): `? * +`, bounded `{m,n}` forms, and the
//! lazy/possessive suffixes.

use rexc_base::Span;

use crate::ast::Node;
use crate::error::CompileError;
use crate::opcode::UNLIMITED;

use super::Parser;

/// `true` if the scanner is positioned at a character that can only ever
/// start a quantifier, used by `parse_item` to raise *nothing to repeat*
/// when no element precedes it.
pub(super) fn peek_is_quantifier_start(p: &mut Parser<'_, '_>) -> bool {
    p.scanner.skip_ignorable();
    match p.scanner.peek(0) {
        Some('?') | Some('*') | Some('+') => true,
        Some('{') => braces_look_like_repeat(p),
        _ => false,
    }
}

/// Peeks (without consuming) whether `{...}` at the cursor parses as a
/// bounded repeat rather than a literal `{}`/`{foo}` (§4.2: `{}` is a
/// literal, and any non-matching brace run is literal too).
fn braces_look_like_repeat(p: &mut Parser<'_, '_>) -> bool {
    let checkpoint = p.scanner.checkpoint();
    let result = parse_braces(p).is_ok();
    p.scanner.restore(checkpoint);
    result
}

/// Parses `(min, max)` out of a `{m}` / `{m,n}` / `{m,}` / `{,n}` form,
/// without side effects beyond consuming the scanner. Returns `Err` for
/// anything that isn't a well-formed bound (including the literal `{}`),
/// so callers can roll back and treat the brace as a literal character.
fn parse_braces(p: &mut Parser<'_, '_>) -> Result<(u32, u32), ()> {
    if !p.scanner.eat_char('{') {
        return Err(());
    }
    let min_digits = read_digits(p);
    let has_comma = p.scanner.eat_char(',');
    let max_digits = if has_comma { read_digits(p) } else { min_digits.clone() };
    if !p.scanner.eat_char('}') {
        return Err(());
    }
    if min_digits.is_none() && max_digits.is_none() {
        return Err(());
    }
    let min = min_digits.map_or(0, |s| s.parse::<u64>().unwrap_or(u64::MAX));
    let max = max_digits.map_or(UNLIMITED as u64, |s| s.parse::<u64>().unwrap_or(u64::MAX));
    Ok((min.min(u64::from(u32::MAX)) as u32, max.min(u64::from(u32::MAX)) as u32))
}

fn read_digits(p: &mut Parser<'_, '_>) -> Option<String> {
    let mut s = String::new();
    while let Some(c) = p.scanner.peek(0) {
        if c.is_ascii_digit() {
            s.push(c);
            p.scanner.bump();
        } else {
            break;
        }
    }
    if s.is_empty() { None } else { Some(s) }
}

/// Applies a trailing quantifier (if any) to `body`, validating bounds and
/// handling the lazy/possessive suffixes (§4.2 table).
pub(super) fn apply_quantifier<'a>(
    p: &mut Parser<'_, 'a>,
    body: &'a Node<'a>,
    start: usize,
) -> super::PResult<&'a Node<'a>> {
    p.scanner.skip_ignorable();
    let (min, max): (u32, u32) = match p.scanner.peek(0) {
        Some('?') => {
            p.scanner.bump();
            (0, 1)
        }
        Some('*') => {
            p.scanner.bump();
            (0, UNLIMITED)
        }
        Some('+') => {
            p.scanner.bump();
            (1, UNLIMITED)
        }
        Some('{') if braces_look_like_repeat(p) => {
            let (min, max) = parse_braces(p).expect("peeked as valid repeat");
            (min, max)
        }
        _ => return Ok(body),
    };

    let span = Span::new(start, p.scanner.pos());
    if min > max {
        return Err(CompileError::MinGreaterThanMax(span).into());
    }
    if min >= UNLIMITED || max > UNLIMITED {
        return Err(CompileError::RepeatCountTooBig(span).into());
    }
    if !body.can_repeat() {
        return Err(CompileError::NothingToRepeat(span).into());
    }

    let lazy = p.scanner.eat_char('?');
    let possessive = !lazy && p.scanner.eat_char('+');

    let repeat = if lazy {
        Node::LazyRepeat { body, min, max }
    } else {
        Node::GreedyRepeat { body, min, max }
    };
    let repeat = p.alloc(repeat);
    if possessive {
        Ok(p.alloc(Node::Atomic(repeat)))
    } else {
        Ok(repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse;
    use super::super::ParseSignal;
    use crate::ast::Node;
    use crate::error::CompileError;

    #[test]
    fn star_quantifier_builds_unbounded_greedy_repeat() {
        let result = parse("a*").unwrap();
        assert!(matches!(result, Node::GreedyRepeat { min: 0, max: crate::opcode::UNLIMITED, .. }));
    }

    #[test]
    fn bounded_repeat_parses_explicit_bounds() {
        let result = parse("a{2,5}").unwrap();
        assert!(matches!(result, Node::GreedyRepeat { min: 2, max: 5, .. }));
    }

    #[test]
    fn lazy_suffix_builds_lazy_repeat() {
        let result = parse("a*?").unwrap();
        assert!(matches!(result, Node::LazyRepeat { .. }));
    }

    #[test]
    fn possessive_suffix_wraps_in_atomic() {
        let result = parse("a++").unwrap();
        assert!(matches!(result, Node::Atomic(_)));
    }

    #[test]
    fn inverted_bounds_is_an_error() {
        let err = parse("a{5,2}");
        assert!(matches!(err, Err(ParseSignal::Error(CompileError::MinGreaterThanMax(_)))));
    }

    #[test]
    fn leading_quantifier_is_nothing_to_repeat() {
        let err = parse("*");
        assert!(matches!(err, Err(ParseSignal::Error(CompileError::NothingToRepeat(_)))));
    }

    #[test]
    fn empty_braces_are_literal() {
        let result = parse("a{}").unwrap();
        match result {
            Node::Sequence(items) => assert_eq!(items.len(), 4),
            other => panic!("expected literal sequence a{{}}, got {other:?}"),
        }
    }
}
