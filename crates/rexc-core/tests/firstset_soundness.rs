//! First-set soundness (§8): every atom a pattern can start with appears in
//! its computed first-set, or the first-set is unknown/epsilon-only.

use rexc_base::Arena;
use rexc_core::ast::firstset::{firstset, FirstSet};
use rexc_core::ast::Node;

#[test]
fn sequence_first_atom_is_in_the_first_set() {
    let arena: Arena<Node> = Arena::new();
    let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
    let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
    let seq = arena.alloc(Node::Sequence(arena.alloc_slice([&*a, &*b])));

    match firstset(seq) {
        FirstSet::Atoms { members, contains_epsilon } => {
            assert!(!contains_epsilon);
            assert!(members.iter().any(|m| std::ptr::eq(*m, a)));
            assert!(!members.iter().any(|m| std::ptr::eq(*m, b)));
        }
        other => panic!("expected a concrete first-set, got {other:?}"),
    }
}

#[test]
fn branch_first_set_covers_every_arm() {
    let arena: Arena<Node> = Arena::new();
    let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
    let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
    let c = arena.alloc(Node::Character { value: 'c' as u32, positive: true, zerowidth: false });
    let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*a, &*b, &*c])));

    match firstset(branch) {
        FirstSet::Atoms { members, .. } => {
            for atom in [a, b, c] {
                assert!(members.iter().any(|m| std::ptr::eq(*m, atom)));
            }
        }
        other => panic!("expected a concrete first-set, got {other:?}"),
    }
}

#[test]
fn optional_leading_repeat_admits_epsilon() {
    let arena: Arena<Node> = Arena::new();
    let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
    let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
    let opt = arena.alloc(Node::GreedyRepeat { body: a, min: 0, max: 1 });
    let seq = arena.alloc(Node::Sequence(arena.alloc_slice([&*opt, &*b])));

    // `a?b` can start with either `a` or `b`, since the `a` is optional.
    match firstset(seq) {
        FirstSet::Atoms { members, .. } => {
            assert!(members.iter().any(|m| std::ptr::eq(*m, a)));
            assert!(members.iter().any(|m| std::ptr::eq(*m, b)));
        }
        other => panic!("expected a concrete first-set, got {other:?}"),
    }
}

#[test]
fn unsatisfiable_branch_is_nothing() {
    let branch = Node::Branch(&[]);
    assert_eq!(firstset(&branch), FirstSet::Nothing);
}
