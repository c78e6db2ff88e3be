//! The pattern AST (§3.4): ~30 node variants, arena-allocated with the `'a`
//! lifetime, mirroring the teacher's `LogicExpr<'a>` shape — large
//! struct-like variants boxed to keep the enum small, with a `size_tests`
//! module guarding the budget.

pub mod firstset;
pub mod optimise;

use rexc_base::{Arena, Span, Symbol};

use crate::property::PackedPropertyId;

/// Opaque fuzzy-match annotation attached to a group (§4.2.6). Boxed to
/// keep `Node` small since only a small fraction of groups carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyParams {
    pub max_substitutions: Option<u32>,
    pub max_insertions: Option<u32>,
    pub max_deletions: Option<u32>,
    pub max_errors: Option<u32>,
    pub min_errors: Option<u32>,
    /// Weighted cost bound: `k*i + l*d + m*s < bound`, if given.
    pub cost_weights: Option<(u32, u32, u32, u32)>,
    pub best_match: bool,
    pub enhanced_match: bool,
}

/// Either an explicit group number or a name resolved at `fix_groups` time
/// (§3.4's `Conditional` node takes a group ref).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRef {
    Number(u32),
    Name(Symbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetFlags {
    pub positive: bool,
    pub zerowidth: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SetData<'a> {
    pub items: &'a [&'a Node<'a>],
    pub flags: SetFlags,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Node<'a> {
    // ---- Atoms ----
    Character { value: u32, positive: bool, zerowidth: bool },
    CharacterIgn { value: u32, positive: bool, zerowidth: bool },
    /// A character-class range `lo..=hi` (§4.2.3). Kept distinct from a
    /// `Character` so a 2-element range doesn't expand into per-codepoint
    /// set members; emission (§4.7) folds it into the class bitset like any
    /// other member.
    CharacterRange { lo: u32, hi: u32, positive: bool },
    Any,
    AnyAll,
    AnyU,
    Property { id: PackedPropertyId, positive: bool, zerowidth: bool },
    Grapheme,
    /// `span` is kept so the bounds check against the final `group_count`
    /// (deferred to emission, since a numeric backreference may name a
    /// group the parser has not reached yet) can report `unknown group` at
    /// the reference site.
    RefGroup { number: u32, span: Span },
    RefGroupIgn { number: u32, span: Span },
    String(&'a [u32]),
    StringIgn(&'a [u32]),

    // ---- Zero-width ----
    Boundary(bool),
    DefaultBoundary(bool),
    StartOfLine,
    StartOfLineU,
    StartOfString,
    EndOfLine,
    EndOfLineU,
    EndOfString,
    EndOfStringLine,
    EndOfStringLineU,
    SearchAnchor,

    // ---- Structures ----
    Sequence(&'a [&'a Node<'a>]),
    Branch(&'a [&'a Node<'a>]),
    Group {
        number: u32,
        body: &'a Node<'a>,
        fuzzy: Option<Box<FuzzyParams>>,
    },
    Conditional {
        group: GroupRef,
        yes: &'a Node<'a>,
        no: Option<&'a Node<'a>>,
        /// Kept so group-ref resolution at emission time (a name may refer
        /// forward to a group not yet declared at parse time) can report
        /// `unknown group` at the reference site, not a synthetic span.
        span: Span,
    },
    GreedyRepeat { body: &'a Node<'a>, min: u32, max: u32 },
    LazyRepeat { body: &'a Node<'a>, min: u32, max: u32 },
    Atomic(&'a Node<'a>),
    LookAround { behind: bool, positive: bool, body: &'a Node<'a> },

    SetUnion(SetData<'a>),
    SetInter(SetData<'a>),
    SetDiff(SetData<'a>),
    SetSymDiff(SetData<'a>),
}

impl<'a> Node<'a> {
    pub fn alloc(self, arena: &'a Arena<Node<'a>>) -> &'a Node<'a> {
        arena.alloc(self)
    }

    /// `true` for a node that can never consume input and never fails to
    /// match zero-width (the "matches nothing or ε" Sequence fold relies on
    /// distinguishing these, §4.5).
    pub fn is_zero_width(&self) -> bool {
        matches!(
            self,
            Node::Boundary(_)
                | Node::DefaultBoundary(_)
                | Node::StartOfLine
                | Node::StartOfLineU
                | Node::StartOfString
                | Node::EndOfLine
                | Node::EndOfLineU
                | Node::EndOfString
                | Node::EndOfStringLine
                | Node::EndOfStringLineU
                | Node::SearchAnchor
                | Node::LookAround { .. }
        )
    }

    /// `true` for the empty-sequence node (`Sequence(&[])`), which the
    /// optimiser treats as the match-everywhere-with-no-consumption unit.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Sequence(items) => items.is_empty(),
            _ => false,
        }
    }

    /// `true` when this node has no internal choice points of its own, so
    /// hoisting it out of an `Atomic` wrapper (leak-out, §4.4) or across a
    /// branch boundary changes nothing observable.
    pub fn is_atomic(&self) -> bool {
        match self {
            Node::Character { .. }
            | Node::CharacterIgn { .. }
            | Node::CharacterRange { .. }
            | Node::Any
            | Node::AnyAll
            | Node::AnyU
            | Node::Property { .. }
            | Node::Grapheme
            | Node::RefGroup { .. }
            | Node::RefGroupIgn { .. }
            | Node::String(_)
            | Node::StringIgn(_)
            | Node::SetUnion(_)
            | Node::SetInter(_)
            | Node::SetDiff(_)
            | Node::SetSymDiff(_)
            | Node::Atomic(_) => true,
            n if n.is_zero_width() => true,
            Node::Sequence(items) => items.iter().all(|n| n.is_atomic()),
            _ => false,
        }
    }

    /// `true` if this subtree contains a capturing `Group`. Used by the
    /// optimiser to forbid hoisting a capturing node across a branch
    /// boundary (§4.4 correctness contract).
    pub fn contains_group(&self) -> bool {
        match self {
            Node::Group { .. } => true,
            Node::Sequence(items) | Node::Branch(items) => items.iter().any(|n| n.contains_group()),
            Node::GreedyRepeat { body, .. } | Node::LazyRepeat { body, .. } | Node::Atomic(body) => {
                body.contains_group()
            }
            Node::LookAround { body, .. } => body.contains_group(),
            Node::Conditional { yes, no, .. } => {
                yes.contains_group() || no.map_or(false, |n| n.contains_group())
            }
            Node::SetUnion(d) | Node::SetInter(d) | Node::SetDiff(d) | Node::SetSymDiff(d) => {
                d.items.iter().any(|n| n.contains_group())
            }
            _ => false,
        }
    }

    /// `true` if repeating this node is meaningful: a zero-width node that
    /// always succeeds without consuming can repeat without looping
    /// forever only because the VM enforces the `min <= count <= max`
    /// bound (§6.4); the front end still rejects clearly-empty bodies in
    /// the optimiser's repeat-normalisation pass (§4.4) rather than here.
    pub fn can_repeat(&self) -> bool {
        !self.is_empty()
    }

    /// Splits off the first atomic child for branch prefix-factoring
    /// (§4.4). Returns `None` when there is no meaningful leading atom to
    /// factor (e.g. the node is already a bare atom, or a structure whose
    /// first element cannot be separated without changing semantics). A
    /// packed `String`/`StringIgn` is peeled one codepoint at a time so
    /// factoring still applies across runs the character-packing pass
    /// already coalesced (e.g. arms `"abx"`/`"aby"` still share `"ab"`).
    pub fn get_first(&'a self, arena: &'a Arena<Node<'a>>) -> Option<&'a Node<'a>> {
        match self {
            Node::Sequence(items) => items.first().copied(),
            Node::String(codes) => codes
                .first()
                .map(|v| arena.alloc(Node::Character { value: *v, positive: true, zerowidth: false }) as &Node),
            Node::StringIgn(codes) => codes
                .first()
                .map(|v| arena.alloc(Node::CharacterIgn { value: *v, positive: true, zerowidth: false }) as &Node),
            other => Some(other),
        }
    }

    /// Returns the remainder after removing the node returned by
    /// [`Node::get_first`], allocating a new `Sequence` in `arena` when
    /// necessary.
    pub fn drop_first(&'a self, arena: &'a Arena<Node<'a>>) -> &'a Node<'a> {
        match self {
            Node::Sequence(items) if !items.is_empty() => {
                let rest = arena.alloc_slice(items[1..].iter().copied());
                arena.alloc(Node::Sequence(rest))
            }
            Node::String(codes) if codes.len() > 1 => arena.alloc(Node::String(arena.alloc_slice(codes[1..].iter().copied()))),
            Node::StringIgn(codes) if codes.len() > 1 => {
                arena.alloc(Node::StringIgn(arena.alloc_slice(codes[1..].iter().copied())))
            }
            _ => arena.alloc(Node::Sequence(&[])),
        }
    }

    pub fn get_last(&'a self, arena: &'a Arena<Node<'a>>) -> Option<&'a Node<'a>> {
        match self {
            Node::Sequence(items) => items.last().copied(),
            Node::String(codes) => codes
                .last()
                .map(|v| arena.alloc(Node::Character { value: *v, positive: true, zerowidth: false }) as &Node),
            Node::StringIgn(codes) => codes
                .last()
                .map(|v| arena.alloc(Node::CharacterIgn { value: *v, positive: true, zerowidth: false }) as &Node),
            other => Some(other),
        }
    }

    pub fn drop_last(&'a self, arena: &'a Arena<Node<'a>>) -> &'a Node<'a> {
        match self {
            Node::Sequence(items) if !items.is_empty() => {
                let rest = arena.alloc_slice(items[..items.len() - 1].iter().copied());
                arena.alloc(Node::Sequence(rest))
            }
            Node::String(codes) if codes.len() > 1 => {
                arena.alloc(Node::String(arena.alloc_slice(codes[..codes.len() - 1].iter().copied())))
            }
            Node::StringIgn(codes) if codes.len() > 1 => {
                arena.alloc(Node::StringIgn(arena.alloc_slice(codes[..codes.len() - 1].iter().copied())))
            }
            _ => arena.alloc(Node::Sequence(&[])),
        }
    }

    /// `true` when the first concrete atom of this pattern is unambiguous
    /// enough that the first-set preamble can be omitted entirely (§4.5).
    pub fn has_simple_start(&self) -> bool {
        match self {
            Node::Character { zerowidth: false, .. } | Node::String(_) | Node::CharacterRange { .. } => true,
            Node::Sequence(items) => items.first().map_or(true, |n| n.has_simple_start()),
            Node::Group { body, .. } | Node::Atomic(body) => body.has_simple_start(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod size_tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn node_stays_within_budget() {
        println!("Node size: {} bytes", size_of::<Node>());
        assert!(
            size_of::<Node>() <= 48,
            "Node is {} bytes - consider boxing large variants",
            size_of::<Node>()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_is_empty() {
        let arena: Arena<Node> = Arena::new();
        let n = arena.alloc(Node::Sequence(&[]));
        assert!(n.is_empty());
    }

    #[test]
    fn character_is_atomic_but_branch_is_not() {
        let arena: Arena<Node> = Arena::new();
        let c = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        assert!(c.is_atomic());
        let items = arena.alloc_slice([&*c, &*c]);
        let b = arena.alloc(Node::Branch(items));
        assert!(!b.is_atomic());
    }

    #[test]
    fn contains_group_detects_nested_capture() {
        let arena: Arena<Node> = Arena::new();
        let c = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let g = arena.alloc(Node::Group { number: 1, body: c, fuzzy: None });
        let seq_items = arena.alloc_slice([&*c, &*g]);
        let seq = arena.alloc(Node::Sequence(seq_items));
        assert!(seq.contains_group());
        assert!(!c.contains_group());
    }
}
