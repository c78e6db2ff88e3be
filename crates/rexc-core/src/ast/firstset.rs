//! First-set analysis (§4.5): a cheap over-approximation of "what atom can
//! this pattern start with", used to build an optional scan-ahead preamble.
//!
//! Grounded on `_regex_core.py`'s `_compile_firstset`/`_OP.has_simple_start`
//! family: the same three-way result (nothing, unknown, or a concrete atom
//! set) and the same composition rules per node kind.

use rexc_base::Arena;

use super::{Node, SetData, SetFlags};

/// Result of [`firstset`]. `Unknown` swallows any node this analysis can't
/// characterise (e.g. a back-reference): the compiler falls back to no
/// preamble rather than emit an unsound filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstSet<'a> {
    /// Nothing can match; the pattern is unsatisfiable from here.
    Nothing,
    /// Could start with zero-width, an unrepresentable atom, or both.
    Unknown,
    /// A concrete, possibly-empty set of atoms this pattern can start with.
    /// `contains_epsilon` tracks whether the empty match is also possible
    /// (e.g. an optional leading atom).
    Atoms { members: Vec<&'a Node<'a>>, contains_epsilon: bool },
}

impl<'a> FirstSet<'a> {
    fn epsilon() -> Self {
        FirstSet::Atoms { members: Vec::new(), contains_epsilon: true }
    }

    fn single(node: &'a Node<'a>) -> Self {
        FirstSet::Atoms { members: vec![node], contains_epsilon: false }
    }

    fn union(self, other: FirstSet<'a>) -> FirstSet<'a> {
        match (self, other) {
            (FirstSet::Unknown, _) | (_, FirstSet::Unknown) => FirstSet::Unknown,
            (FirstSet::Nothing, other) => other,
            (this, FirstSet::Nothing) => this,
            (
                FirstSet::Atoms { mut members, contains_epsilon: eps_a },
                FirstSet::Atoms { members: more, contains_epsilon: eps_b },
            ) => {
                for m in more {
                    if !members.iter().any(|existing| std::ptr::eq(*existing, m)) {
                        members.push(m);
                    }
                }
                FirstSet::Atoms { members, contains_epsilon: eps_a || eps_b }
            }
        }
    }

    fn without_epsilon(self) -> FirstSet<'a> {
        match self {
            FirstSet::Atoms { members, .. } => FirstSet::Atoms { members, contains_epsilon: false },
            other => other,
        }
    }

    fn has_epsilon(&self) -> bool {
        matches!(self, FirstSet::Atoms { contains_epsilon: true, .. })
    }

    /// `true` when every member is a plain atom (`Character`/`Property`/
    /// positive `SetUnion`) safe to fold into a compiled bitset preamble.
    fn is_clean(&self) -> bool {
        match self {
            FirstSet::Atoms { members, .. } => members.iter().all(|n| is_settable_atom(n)),
            _ => false,
        }
    }
}

fn is_settable_atom(node: &Node) -> bool {
    matches!(
        node,
        Node::Character { positive: true, .. }
            | Node::Property { positive: true, .. }
            | Node::CharacterRange { positive: true, .. }
    ) || matches!(node, Node::SetUnion(d) if d.flags.positive)
}

/// Computes the first-set of `node` per §4.5's composition rules.
pub fn firstset<'a>(node: &'a Node<'a>) -> FirstSet<'a> {
    match node {
        Node::Sequence(items) => {
            let mut acc = FirstSet::epsilon();
            for item in *items {
                if !acc.has_epsilon() {
                    break;
                }
                acc = acc.without_epsilon().union(firstset(item));
            }
            acc
        }
        Node::Branch(items) => items
            .iter()
            .fold(FirstSet::Nothing, |acc, item| acc.union(firstset(item))),
        Node::GreedyRepeat { body, min, .. } | Node::LazyRepeat { body, min, .. } => {
            let mut fs = firstset(body);
            if *min == 0 {
                fs = fs.union(FirstSet::epsilon());
            }
            fs
        }
        Node::Group { body, .. } | Node::Atomic(body) => firstset(body),
        n if n.is_zero_width() => FirstSet::epsilon(),
        Node::Character { .. } | Node::Property { .. } | Node::CharacterRange { .. } | Node::SetUnion(_)
            if is_settable_atom(node) =>
        {
            FirstSet::single(node)
        }
        _ => FirstSet::Unknown,
    }
}

/// Builds the optional scan-ahead preamble (§4.5): a `SetUnion` with
/// `zerowidth=true` over the pattern's first-set, or `None` when the
/// first-set is empty, unknown, contains ε, or the pattern already has a
/// [`Node::has_simple_start`].
pub fn compile_firstset<'a>(node: &'a Node<'a>, arena: &'a Arena<Node<'a>>) -> Option<&'a Node<'a>> {
    if node.has_simple_start() {
        return None;
    }
    match firstset(node) {
        FirstSet::Atoms { members, contains_epsilon: false } if !members.is_empty() => {
            let fs = FirstSet::Atoms { members, contains_epsilon: false };
            if !fs.is_clean() {
                return None;
            }
            let FirstSet::Atoms { members, .. } = fs else { unreachable!() };
            Some(arena.alloc(Node::SetUnion(SetData {
                items: arena.alloc_slice(members),
                flags: SetFlags { positive: true, zerowidth: true },
            })))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_firstset_is_first_non_epsilon_child() {
        let arena: Arena<Node> = Arena::new();
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
        let seq = arena.alloc(Node::Sequence(arena.alloc_slice([&*a, &*b])));
        let fs = firstset(seq);
        match fs {
            FirstSet::Atoms { members, contains_epsilon } => {
                assert_eq!(members.len(), 1);
                assert!(!contains_epsilon);
            }
            other => panic!("expected Atoms, got {other:?}"),
        }
    }

    #[test]
    fn branch_firstset_is_union_of_arms() {
        let arena: Arena<Node> = Arena::new();
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
        let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*a, &*b])));
        let fs = firstset(branch);
        match fs {
            FirstSet::Atoms { members, .. } => assert_eq!(members.len(), 2),
            other => panic!("expected Atoms, got {other:?}"),
        }
    }

    #[test]
    fn optional_repeat_includes_epsilon() {
        let arena: Arena<Node> = Arena::new();
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let r = arena.alloc(Node::GreedyRepeat { body: a, min: 0, max: 1 });
        assert!(firstset(r).has_epsilon());
    }

    #[test]
    fn lookaround_firstset_is_epsilon_only() {
        let arena: Arena<Node> = Arena::new();
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let la = arena.alloc(Node::LookAround { behind: false, positive: true, body: a });
        let fs = firstset(la);
        match fs {
            FirstSet::Atoms { members, contains_epsilon } => {
                assert!(members.is_empty());
                assert!(contains_epsilon);
            }
            other => panic!("expected epsilon-only Atoms, got {other:?}"),
        }
    }

    #[test]
    fn refgroup_is_unknown() {
        let arena: Arena<Node> = Arena::new();
        let r = arena.alloc(Node::RefGroup { number: 1, span: rexc_base::Span::new(0, 0) });
        assert_eq!(firstset(r), FirstSet::Unknown);
    }

    #[test]
    fn simple_start_pattern_skips_preamble() {
        let arena: Arena<Node> = Arena::new();
        let s = arena.alloc(Node::String(arena.alloc_slice(['a' as u32, 'b' as u32])));
        assert!(compile_firstset(s, &arena).is_none());
    }

    #[test]
    fn branch_of_properties_builds_preamble() {
        use crate::property::PackedPropertyId;
        let arena: Arena<Node> = Arena::new();
        let p1 = arena.alloc(Node::Property {
            id: PackedPropertyId::new(1, 0),
            positive: true,
            zerowidth: false,
        });
        let p2 = arena.alloc(Node::Property {
            id: PackedPropertyId::new(1, 1),
            positive: true,
            zerowidth: false,
        });
        let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*p1, &*p2])));
        let preamble = compile_firstset(branch, &arena);
        assert!(matches!(preamble, Some(Node::SetUnion(_))));
    }
}
