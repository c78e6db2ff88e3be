//! The recursive-descent parser (§4.2): *pattern* = *sequence* (`|`
//! *sequence*)\*; *sequence* = *item*\*; *item* = *element* *quantifier*?;
//! *element* = atom | group | set | escape | anchor.
//!
//! Grounded on `_regex_core.py`'s `_parse_pattern`/`_parse_sequence`/
//! `_parse_item` family and split into submodules the way
//! `logicaffeine_language/src/parser/` splits its grammar productions across
//! files sharing one `Parser` struct.

mod escape;
mod group;
mod quantifier;
mod set;
#[cfg(test)]
mod test_support;

use rexc_base::{Arena, Span};

use crate::ast::Node;
use crate::context::Context;
use crate::error::CompileError;
use crate::flags::Flags;
use crate::scanner::Scanner;

/// Internal parse-time control signal (§4.2.1). In addition to an ordinary
/// error, a positional global flag under old behaviour raises this to ask
/// the top-level driver to restart with an augmented global flag set —
/// the one back-tracking re-parse in the front end.
#[derive(Debug)]
pub(crate) enum ParseSignal {
    Error(CompileError),
    Restart(Flags),
}

impl From<CompileError> for ParseSignal {
    fn from(e: CompileError) -> Self {
        ParseSignal::Error(e)
    }
}

pub(crate) type PResult<T> = std::result::Result<T, ParseSignal>;

pub struct Parser<'c, 'a> {
    pub(crate) scanner: Scanner<'a>,
    pub(crate) ctx: &'c mut Context<'a>,
    pub(crate) arena: &'a Arena<Node<'a>>,
    /// Current scoped flags (§3.1); mutated and restored around
    /// `(?flags:body)` and `(?flags)` subpatterns.
    pub(crate) flags: Flags,
}

impl<'c, 'a> Parser<'c, 'a> {
    pub fn new(
        codepoints: &'a [u32],
        ctx: &'c mut Context<'a>,
        arena: &'a Arena<Node<'a>>,
        flags: Flags,
    ) -> Self {
        let mut scanner = Scanner::new(codepoints);
        scanner.set_ignore_space(flags.contains(Flags::VERBOSE));
        Parser { scanner, ctx, arena, flags }
    }

    fn span_at(&self, start: usize) -> Span {
        Span::new(start, self.scanner.pos())
    }

    fn alloc(&self, node: Node<'a>) -> &'a Node<'a> {
        self.arena.alloc(node)
    }

    /// Parses a full pattern and checks that nothing is left over (§4.2).
    pub(crate) fn parse_pattern(&mut self) -> PResult<&'a Node<'a>> {
        let node = self.parse_branch()?;
        if !self.scanner.at_end() {
            return Err(CompileError::TrailingCharacters(self.span_at(self.scanner.pos())).into());
        }
        Ok(node)
    }

    /// *pattern* = *sequence* (`|` *sequence*)\*
    pub(crate) fn parse_branch(&mut self) -> PResult<&'a Node<'a>> {
        let mut arms = vec![self.parse_sequence()?];
        while self.scanner.eat_char('|') {
            arms.push(self.parse_sequence()?);
        }
        if arms.len() == 1 {
            Ok(arms.into_iter().next().unwrap())
        } else {
            Ok(self.alloc(Node::Branch(self.arena.alloc_slice(arms))))
        }
    }

    /// *sequence* = *item*\*, stopping at `|`, `)`, or end of input.
    fn parse_sequence(&mut self) -> PResult<&'a Node<'a>> {
        let mut items = Vec::new();
        loop {
            self.scanner.skip_ignorable();
            match self.scanner.peek(0) {
                None | Some('|') | Some(')') => break,
                _ => items.push(self.parse_item()?),
            }
        }
        if items.len() == 1 {
            Ok(items.into_iter().next().unwrap())
        } else {
            Ok(self.alloc(Node::Sequence(self.arena.alloc_slice(items))))
        }
    }

    /// *item* = *element* *quantifier*?
    fn parse_item(&mut self) -> PResult<&'a Node<'a>> {
        let start = self.scanner.pos();
        if quantifier::peek_is_quantifier_start(self) {
            return Err(CompileError::NothingToRepeat(self.span_at(start)).into());
        }
        let element = self.parse_element()?;
        quantifier::apply_quantifier(self, element, start)
    }

    /// *element* = atom | group | set | escape | anchor
    fn parse_element(&mut self) -> PResult<&'a Node<'a>> {
        self.scanner.skip_ignorable();
        match self.scanner.peek(0) {
            Some('(') => group::parse_group(self),
            Some('[') => set::parse_class(self),
            Some('.') => {
                self.scanner.bump();
                Ok(self.alloc(if self.flags.contains(Flags::DOTALL) {
                    Node::AnyAll
                } else if self.flags.contains(Flags::WORD) {
                    Node::AnyU
                } else {
                    Node::Any
                }))
            }
            Some('^') => {
                self.scanner.bump();
                Ok(self.alloc(self.start_anchor()))
            }
            Some('$') => {
                self.scanner.bump();
                Ok(self.alloc(self.end_anchor()))
            }
            Some('\\') => escape::parse_escape(self, false),
            Some(c) => {
                self.scanner.bump();
                Ok(self.alloc(self.literal(c)))
            }
            None => Err(CompileError::TrailingCharacters(self.span_at(self.scanner.pos())).into()),
        }
    }

    fn start_anchor(&self) -> Node<'a> {
        if self.flags.contains(Flags::MULTILINE) {
            if self.flags.contains(Flags::UNICODE) { Node::StartOfLineU } else { Node::StartOfLine }
        } else {
            Node::StartOfString
        }
    }

    fn end_anchor(&self) -> Node<'a> {
        if self.flags.contains(Flags::MULTILINE) {
            if self.flags.contains(Flags::UNICODE) { Node::EndOfLineU } else { Node::EndOfLine }
        } else if self.flags.contains(Flags::UNICODE) {
            Node::EndOfStringLineU
        } else {
            Node::EndOfStringLine
        }
    }

    /// Builds a literal `Character`/`CharacterIgn` for `c` honouring the
    /// active IGNORECASE flag (§4.2.3's "single character" case).
    fn literal(&self, c: char) -> Node<'a> {
        if self.flags.contains(Flags::IGNORECASE) && !self.ctx.casefold.is_case_stable(c) {
            Node::CharacterIgn { value: c as u32, positive: true, zerowidth: false }
        } else {
            Node::Character { value: c as u32, positive: true, zerowidth: false }
        }
    }
}
