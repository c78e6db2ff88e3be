//! Escape parsing (§4.2.2): position escapes, character-class escapes,
//! literal-character escapes, numeric/hex/named escapes, `\p{}`/`\P{}`
//! properties, `\g<...>` group references, and `\X` grapheme clusters.

use crate::ast::Node;
use crate::error::CompileError;
use crate::flags::Flags;

use super::{ParseSignal, Parser, PResult};

/// Parses a `\...` escape. `in_set` is `true` inside a character class,
/// where position escapes and `\g<...>` are not recognised and numeric
/// escapes always read as octal (§4.2.2, §4.2.3).
pub(super) fn parse_escape<'a>(p: &mut Parser<'_, 'a>, in_set: bool) -> PResult<&'a Node<'a>> {
    let start = p.scanner.pos();
    if !p.scanner.eat_char('\\') {
        unreachable!("parse_escape called without a leading backslash");
    }
    let Some(c) = p.scanner.peek(0) else {
        return Err(CompileError::BadEscape(p.span_at(start)).into());
    };

    if !in_set {
        if let Some(node) = position_escape(p, c)? {
            return Ok(p.alloc(node));
        }
    }

    match c {
        'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
            p.scanner.bump();
            let lower = c.to_ascii_lowercase();
            let id = p.ctx.properties.class_escape(lower).expect("recognised class letter");
            Ok(p.alloc(Node::Property { id, positive: c.is_ascii_lowercase(), zerowidth: false }))
        }
        'p' | 'P' => parse_property_escape(p, c == 'P', start),
        'x' | 'u' | 'U' => parse_hex_escape(p, c, start),
        'N' => parse_named_character(p, start),
        'g' if !in_set => parse_group_ref(p, start),
        'X' if !in_set => {
            p.scanner.bump();
            let lazy_any = p.alloc(Node::LazyRepeat { body: p.alloc(Node::AnyAll), min: 1, max: crate::opcode::UNLIMITED });
            let boundary = p.alloc(Node::Boundary(true));
            Ok(p.alloc(Node::Sequence(p.arena.alloc_slice([lazy_any, boundary]))))
        }
        c if c.is_ascii_digit() => parse_numeric_escape(p, in_set, start),
        'a' | 'f' | 'n' | 'r' | 't' | 'v' => {
            p.scanner.bump();
            Ok(p.alloc(Node::Character { value: literal_control(c) as u32, positive: true, zerowidth: false }))
        }
        other => {
            p.scanner.bump();
            Ok(p.alloc(p.literal(other)))
        }
    }
}

fn literal_control(c: char) -> char {
    match c {
        'a' => '\x07',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        other => other,
    }
}

/// Step 1 of §4.2.2: position escapes, recognised outside character classes
/// only. Returns `None` when `c` isn't a position escape letter, leaving
/// the scanner untouched so the caller can try the next lookup step.
fn position_escape<'a>(p: &mut Parser<'_, 'a>, c: char) -> PResult<Option<Node<'a>>> {
    let node = match c {
        'A' => Node::StartOfString,
        'Z' => Node::EndOfString,
        'G' => Node::SearchAnchor,
        'b' => Node::DefaultBoundary(true),
        'B' => Node::DefaultBoundary(false),
        'm' if p.flags.contains(Flags::WORD) => Node::Boundary(true),
        'M' if p.flags.contains(Flags::WORD) => Node::Boundary(false),
        _ => return Ok(None),
    };
    p.scanner.bump();
    Ok(Some(node))
}

fn parse_property_escape<'a>(p: &mut Parser<'_, 'a>, negate_prefix: bool, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump();
    if !p.scanner.eat_char('{') {
        return Err(CompileError::MissingDelimiter { delimiter: "{", span: p.span_at(start) }.into());
    }
    let mut body = String::new();
    loop {
        match p.scanner.peek(0) {
            Some('}') => break,
            Some(c) => {
                body.push(c);
                p.scanner.bump();
            }
            None => return Err(CompileError::MissingDelimiter { delimiter: "}", span: p.span_at(start) }.into()),
        }
    }
    p.scanner.bump();

    let mut negate_body = false;
    let body = if let Some(stripped) = body.strip_prefix('^') {
        negate_body = true;
        stripped.to_string()
    } else {
        body
    };

    let (name, value) = match body.split_once(['=', ':']) {
        Some((name, value)) => (Some(name.trim().to_string()), value.trim().to_string()),
        None => (None, body.trim().to_string()),
    };

    let positive = !(negate_prefix ^ negate_body);
    let span = p.span_at(start);
    let (id, positive) = p
        .ctx
        .properties
        .resolve(name.as_deref(), &value, positive, span)
        .map_err(ParseSignal::Error)?;
    Ok(p.alloc(Node::Property { id, positive, zerowidth: false }))
}

fn parse_hex_escape<'a>(p: &mut Parser<'_, 'a>, kind: char, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump();
    let digits = match kind {
        'x' => 2,
        'u' => 4,
        'U' => 8,
        _ => unreachable!(),
    };
    let mut value: u32 = 0;
    for _ in 0..digits {
        match p.scanner.peek(0).and_then(|c| c.to_digit(16)) {
            Some(d) => {
                value = value * 16 + d;
                p.scanner.bump();
            }
            None => return Err(CompileError::BadHexEscape(p.span_at(start)).into()),
        }
    }
    Ok(p.alloc(p.literal(char::from_u32(value).unwrap_or('\u{FFFD}'))))
}

fn parse_named_character<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump();
    if !p.scanner.eat_char('{') {
        return Err(CompileError::MissingDelimiter { delimiter: "{", span: p.span_at(start) }.into());
    }
    let mut name = String::new();
    loop {
        match p.scanner.peek(0) {
            Some('}') => break,
            Some(c) => {
                name.push(c);
                p.scanner.bump();
            }
            None => return Err(CompileError::MissingDelimiter { delimiter: "}", span: p.span_at(start) }.into()),
        }
    }
    p.scanner.bump();
    match unicode_name_lookup(&name) {
        Some(value) => Ok(p.alloc(p.literal(value))),
        None => Err(CompileError::UndefinedCharacterName(p.span_at(start)).into()),
    }
}

/// Minimal built-in Unicode name table; the real database is an
/// out-of-scope external collaborator (§1).
fn unicode_name_lookup(name: &str) -> Option<char> {
    match name.to_ascii_uppercase().as_str() {
        "LATIN SMALL LETTER A" => Some('a'),
        "SPACE" => Some(' '),
        "LINE FEED" | "NEWLINE" => Some('\n'),
        "TAB" | "CHARACTER TABULATION" => Some('\t'),
        _ => None,
    }
}

fn parse_group_ref<'a>(p: &mut Parser<'_, 'a>, start: usize) -> PResult<&'a Node<'a>> {
    p.scanner.bump();
    if !p.scanner.eat_char('<') {
        return Ok(p.alloc(p.literal('g')));
    }
    let mut name = String::new();
    loop {
        match p.scanner.peek(0) {
            Some('>') => break,
            Some(c) => {
                name.push(c);
                p.scanner.bump();
            }
            None => return Err(CompileError::MissingDelimiter { delimiter: ">", span: p.span_at(start) }.into()),
        }
    }
    p.scanner.bump();

    let n = if let Ok(num) = name.parse::<u32>() {
        num
    } else {
        let sym = p.ctx.interner.intern(&name);
        p.ctx.group_by_name(sym).ok_or_else(|| CompileError::UnknownGroup(p.span_at(start)))?
    };
    back_reference(p, n, start)
}

/// Parses a numeric escape per §4.2.2: octal if leading `0` or inside a
/// set, otherwise 1-2 digits tried as a back-reference, falling back to
/// octal if all three digits form a valid octal run.
fn parse_numeric_escape<'a>(p: &mut Parser<'_, 'a>, in_set: bool, start: usize) -> PResult<&'a Node<'a>> {
    let first = p.scanner.peek(0).expect("caller checked digit");
    if first == '0' || in_set {
        let mut value: u32 = 0;
        for _ in 0..3 {
            match p.scanner.peek(0).and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    value = value * 8 + d;
                    p.scanner.bump();
                }
                None => break,
            }
        }
        return Ok(p.alloc(p.literal(char::from_u32(value & 0xFF).unwrap_or('\0'))));
    }

    let checkpoint = p.scanner.checkpoint();
    let mut digits = String::new();
    for _ in 0..3 {
        match p.scanner.peek(0).and_then(|c| c.to_digit(10)) {
            Some(_) => digits.push(p.scanner.peek(0).unwrap()),
            None => break,
        }
        p.scanner.bump();
    }

    if digits.len() == 3 && digits.chars().all(|c| c.to_digit(8).is_some()) {
        let value = u32::from_str_radix(&digits, 8).unwrap_or(0) & 0xFF;
        return Ok(p.alloc(p.literal(char::from_u32(value).unwrap_or('\0'))));
    }

    p.scanner.restore(checkpoint);
    let mut short_digits = String::new();
    for _ in 0..2 {
        match p.scanner.peek(0).filter(|c| c.is_ascii_digit()) {
            Some(c) => {
                short_digits.push(c);
                p.scanner.bump();
            }
            None => break,
        }
    }
    let n: u32 = short_digits.parse().unwrap_or(0);
    back_reference(p, n, start)
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
