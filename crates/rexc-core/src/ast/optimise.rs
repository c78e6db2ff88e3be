//! The optimiser (§4.4): a fixed-point-per-node rewrite pass.
//!
//! Each node is visited exactly once (`optimise` is a one-shot owned
//! transformation per §9's design note: "mutable AST with memoised
//! optimisation -> one-shot owned transformation"). Children are optimised
//! bottom-up before the parent rewrite runs, so a single top-level call
//! applies every pass without an explicit worklist.
//!
//! Grounded on `_regex_core.py`'s `_Branch.optimise` / `_SetUnion.optimise`
//! family: nested-branch flattening, prefix/suffix factoring, character
//! packing, and set-algebra simplification all mirror the shape of those
//! methods, adapted to an immutable arena-allocated tree instead of
//! in-place mutation behind a Python `_optimised` flag.

use rexc_base::Arena;

use crate::casefold::CaseFold;
use super::{Node, SetData, SetFlags};

pub struct OptimiseCtx<'a> {
    pub arena: &'a Arena<Node<'a>>,
    pub casefold: &'a dyn CaseFold,
}

/// Runs every optimiser pass over `node` once, returning the rewritten
/// tree. Safe to call at most once per node per §9's one-shot contract.
pub fn optimise<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    let node = optimise_children(node, ctx);
    match node {
        Node::Sequence(_) => flatten_sequence(node, ctx),
        Node::Branch(_) => optimise_branch(node, ctx),
        Node::CharacterIgn { value, positive, zerowidth } => {
            collapse_character_ign(*value, *positive, *zerowidth, ctx)
        }
        Node::Atomic(_) => leak_out_atomic(node, ctx),
        Node::SetUnion(_) | Node::SetInter(_) | Node::SetDiff(_) | Node::SetSymDiff(_) => {
            simplify_set(node, ctx)
        }
        Node::GreedyRepeat { .. } | Node::LazyRepeat { .. } => normalise_repeat(node, ctx),
        _ => node,
    }
}

fn optimise_children<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    match node {
        Node::Sequence(items) => {
            let rewritten: Vec<&Node> = items.iter().map(|n| optimise(n, ctx)).collect();
            ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(rewritten)))
        }
        Node::Branch(items) => {
            let rewritten: Vec<&Node> = items.iter().map(|n| optimise(n, ctx)).collect();
            ctx.arena.alloc(Node::Branch(ctx.arena.alloc_slice(rewritten)))
        }
        Node::Group { number, body, fuzzy } => {
            let body = optimise(body, ctx);
            ctx.arena.alloc(Node::Group { number: *number, body, fuzzy: fuzzy.clone() })
        }
        Node::Conditional { group, yes, no, span } => {
            let yes = optimise(yes, ctx);
            let no = no.map(|n| optimise(n, ctx));
            ctx.arena.alloc(Node::Conditional { group: *group, yes, no, span: *span })
        }
        Node::GreedyRepeat { body, min, max } => {
            let body = optimise(body, ctx);
            ctx.arena.alloc(Node::GreedyRepeat { body, min: *min, max: *max })
        }
        Node::LazyRepeat { body, min, max } => {
            let body = optimise(body, ctx);
            ctx.arena.alloc(Node::LazyRepeat { body, min: *min, max: *max })
        }
        Node::Atomic(body) => {
            let body = optimise(body, ctx);
            ctx.arena.alloc(Node::Atomic(body))
        }
        Node::LookAround { behind, positive, body } => {
            let body = optimise(body, ctx);
            ctx.arena.alloc(Node::LookAround { behind: *behind, positive: *positive, body })
        }
        Node::SetUnion(d) => optimise_set_children(node, d, ctx, Node::SetUnion),
        Node::SetInter(d) => optimise_set_children(node, d, ctx, Node::SetInter),
        Node::SetDiff(d) => optimise_set_children(node, d, ctx, Node::SetDiff),
        Node::SetSymDiff(d) => optimise_set_children(node, d, ctx, Node::SetSymDiff),
        _ => node,
    }
}

fn optimise_set_children<'a>(
    _node: &'a Node<'a>,
    d: &SetData<'a>,
    ctx: &OptimiseCtx<'a>,
    ctor: impl Fn(SetData<'a>) -> Node<'a>,
) -> &'a Node<'a> {
    let rewritten: Vec<&Node> = d.items.iter().map(|n| optimise(n, ctx)).collect();
    ctx.arena.alloc(ctor(SetData { items: ctx.arena.alloc_slice(rewritten), flags: d.flags }))
}

/// Inlines nested `Sequence` children and collapses a singleton to its
/// sole element.
fn flatten_sequence<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    let Node::Sequence(items) = node else { return node };
    let mut flat: Vec<&Node> = Vec::with_capacity(items.len());
    for item in *items {
        match item {
            Node::Sequence(inner) => flat.extend(inner.iter().copied()),
            other => flat.push(other),
        }
    }
    if flat.len() == 1 {
        return flat[0];
    }
    let packed = pack_characters(&flat, ctx);
    if packed.len() == 1 {
        return packed[0];
    }
    ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(packed)))
}

/// Coalesces runs of adjacent `Character`/`CharacterIgn` atoms into
/// `String`/`StringIgn` (§4.4 character packing). Runs of each kind are
/// packed separately; a run is broken by any other node, including a
/// `Character` of the opposite ignorecase-ness.
fn pack_characters<'a>(items: &[&'a Node<'a>], ctx: &OptimiseCtx<'a>) -> Vec<&'a Node<'a>> {
    let mut out: Vec<&Node> = Vec::with_capacity(items.len());
    let mut plain_run: Vec<u32> = Vec::new();
    let mut ign_run: Vec<u32> = Vec::new();

    fn flush_plain<'a>(run: &mut Vec<u32>, out: &mut Vec<&'a Node<'a>>, ctx: &OptimiseCtx<'a>) {
        match run.len() {
            0 => {}
            1 => out.push(ctx.arena.alloc(Node::Character { value: run[0], positive: true, zerowidth: false })),
            _ => out.push(ctx.arena.alloc(Node::String(ctx.arena.alloc_slice(run.iter().copied())))),
        }
        run.clear();
    }
    fn flush_ign<'a>(run: &mut Vec<u32>, out: &mut Vec<&'a Node<'a>>, ctx: &OptimiseCtx<'a>) {
        match run.len() {
            0 => {}
            1 => out.push(ctx.arena.alloc(Node::CharacterIgn { value: run[0], positive: true, zerowidth: false })),
            _ => out.push(ctx.arena.alloc(Node::StringIgn(ctx.arena.alloc_slice(run.iter().copied())))),
        }
        run.clear();
    }

    for item in items {
        match item {
            Node::Character { value, positive: true, zerowidth: false } => {
                flush_ign(&mut ign_run, &mut out, ctx);
                plain_run.push(*value);
            }
            Node::CharacterIgn { value, positive: true, zerowidth: false } => {
                flush_plain(&mut plain_run, &mut out, ctx);
                ign_run.push(*value);
            }
            other => {
                flush_plain(&mut plain_run, &mut out, ctx);
                flush_ign(&mut ign_run, &mut out, ctx);
                out.push(other);
            }
        }
    }
    flush_plain(&mut plain_run, &mut out, ctx);
    flush_ign(&mut ign_run, &mut out, ctx);
    out
}

/// If the character's case-fold equivalence class is a singleton (case
/// stable, e.g. a digit), replaces `CharacterIgn` with plain `Character`
/// (§4.4).
fn collapse_character_ign<'a>(
    value: u32,
    positive: bool,
    zerowidth: bool,
    ctx: &OptimiseCtx<'a>,
) -> &'a Node<'a> {
    let is_stable = char::from_u32(value).map_or(true, |c| ctx.casefold.is_case_stable(c));
    if is_stable {
        ctx.arena.alloc(Node::Character { value, positive, zerowidth })
    } else {
        ctx.arena.alloc(Node::CharacterIgn { value, positive, zerowidth })
    }
}

/// Branch factoring, in the order specified (§4.4):
/// 1. flatten nested branches (done by `optimise_children` + this pass),
/// 2. split common prefix/suffix,
/// 3. merge adjacent branches sharing a character prefix,
/// 4. reduce all-positive-single-atom branches to a `SetUnion`.
fn optimise_branch<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    let Node::Branch(items) = node else { return node };

    let mut arms: Vec<&Node> = Vec::with_capacity(items.len());
    for item in *items {
        match item {
            Node::Branch(inner) => arms.extend(inner.iter().copied()),
            other => arms.push(other),
        }
    }

    if let Some(reduced) = try_reduce_to_set(&arms, ctx) {
        return reduced;
    }

    if arms.len() < 2 {
        return arms.first().copied().unwrap_or(node);
    }

    let (prefix, arms) = split_common_prefix(arms, ctx);
    let (suffix, arms) = split_common_suffix(arms, ctx);
    let arms = merge_character_prefixed_arms(arms, ctx);

    let body: &Node = if arms.len() == 1 {
        arms[0]
    } else {
        ctx.arena.alloc(Node::Branch(ctx.arena.alloc_slice(arms)))
    };

    let mut seq = Vec::new();
    if let Some(p) = prefix {
        seq.push(p);
    }
    seq.push(body);
    if let Some(s) = suffix {
        seq.push(s);
    }
    if seq.len() == 1 {
        seq[0]
    } else {
        ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(seq)))
    }
}

/// If every arm is a single positive atom (`Character`, `Property`, or a
/// positive `SetUnion` of such), collapses the whole branch to one
/// `SetUnion` (§4.4 pass 4).
fn try_reduce_to_set<'a>(arms: &[&'a Node<'a>], ctx: &OptimiseCtx<'a>) -> Option<&'a Node<'a>> {
    if arms.len() < 2 {
        return None;
    }
    let all_atoms = arms.iter().all(|n| is_single_positive_atom(n));
    if !all_atoms {
        return None;
    }
    let members: Vec<&Node> = arms.to_vec();
    Some(ctx.arena.alloc(Node::SetUnion(SetData {
        items: ctx.arena.alloc_slice(members),
        flags: SetFlags { positive: true, zerowidth: false },
    })))
}

fn is_single_positive_atom(node: &Node) -> bool {
    matches!(
        node,
        Node::Character { positive: true, .. }
            | Node::Property { positive: true, .. }
            | Node::CharacterRange { positive: true, .. }
    ) || matches!(node, Node::SetUnion(d) if d.flags.positive)
}

fn split_common_prefix<'a>(
    arms: Vec<&'a Node<'a>>,
    ctx: &OptimiseCtx<'a>,
) -> (Option<&'a Node<'a>>, Vec<&'a Node<'a>>) {
    let mut common = Vec::new();
    let mut arms = arms;
    loop {
        if arms.iter().any(|a| a.contains_group()) {
            break;
        }
        let heads: Vec<Option<&Node>> = arms.iter().map(|a| a.get_first(ctx.arena)).collect();
        let Some(first_head) = heads[0] else { break };
        if !first_head.is_atomic() || !heads.iter().all(|h| *h == Some(first_head)) {
            break;
        }
        common.push(first_head);
        arms = arms.iter().map(|a| a.drop_first(ctx.arena)).collect();
    }
    if common.is_empty() {
        (None, arms)
    } else {
        let prefix_node: &Node = if common.len() == 1 {
            common[0]
        } else {
            let packed = pack_characters(&common, ctx);
            if packed.len() == 1 {
                packed[0]
            } else {
                ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(packed)))
            }
        };
        (Some(prefix_node), arms)
    }
}

fn split_common_suffix<'a>(
    arms: Vec<&'a Node<'a>>,
    ctx: &OptimiseCtx<'a>,
) -> (Option<&'a Node<'a>>, Vec<&'a Node<'a>>) {
    let mut common = Vec::new();
    let mut arms = arms;
    loop {
        if arms.iter().any(|a| a.contains_group()) {
            break;
        }
        let tails: Vec<Option<&Node>> = arms.iter().map(|a| a.get_last(ctx.arena)).collect();
        let Some(first_tail) = tails[0] else { break };
        if !first_tail.is_atomic() || !tails.iter().all(|t| *t == Some(first_tail)) {
            break;
        }
        common.push(first_tail);
        arms = arms.iter().map(|a| a.drop_last(ctx.arena)).collect();
    }
    if common.is_empty() {
        (None, arms)
    } else {
        // Each pass pops from the tail inward, so `common` accumulates in
        // reverse reading order; flip it back before rebuilding the suffix.
        common.reverse();
        let suffix_node: &Node = if common.len() == 1 {
            common[0]
        } else {
            let packed = pack_characters(&common, ctx);
            if packed.len() == 1 {
                packed[0]
            } else {
                ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(packed)))
            }
        };
        (Some(suffix_node), arms)
    }
}

/// Merges adjacent branch arms sharing a leading `Character` into
/// `Character + Branch(tails)` (§4.4 pass 3). Arms are grouped by first
/// appearance of the prefix character to keep ordering stable.
fn merge_character_prefixed_arms<'a>(arms: Vec<&'a Node<'a>>, ctx: &OptimiseCtx<'a>) -> Vec<&'a Node<'a>> {
    let mut order: Vec<u32> = Vec::new();
    let mut groups: std::collections::HashMap<u32, Vec<&Node>> = std::collections::HashMap::new();
    let mut passthrough: Vec<&Node> = Vec::new();

    for arm in arms {
        if let Some(Node::Character { value, positive: true, zerowidth: false }) = arm.get_first(ctx.arena) {
            let tail = arm.drop_first(ctx.arena);
            groups.entry(*value).or_insert_with(|| {
                order.push(*value);
                Vec::new()
            });
            groups.get_mut(value).unwrap().push(tail);
        } else {
            passthrough.push(arm);
        }
    }

    let mut out = Vec::new();
    for value in order {
        let tails = groups.remove(&value).unwrap();
        let tail_node: &Node = if tails.len() == 1 {
            tails[0]
        } else {
            ctx.arena.alloc(Node::Branch(ctx.arena.alloc_slice(tails)))
        };
        let seq = ctx.arena.alloc_slice([
            ctx.arena.alloc(Node::Character { value, positive: true, zerowidth: false }) as &Node,
            tail_node,
        ]);
        out.push(ctx.arena.alloc(Node::Sequence(seq)) as &Node);
    }
    out.extend(passthrough);
    out
}

/// Moves leading/trailing atomic children of an `Atomic` body out into the
/// surrounding sequence; removes the wrapper entirely if nothing
/// non-atomic remains (§4.4).
fn leak_out_atomic<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    let Node::Atomic(body) = node else { return node };
    if body.is_atomic() {
        return body;
    }
    let Node::Sequence(items) = body else { return node };

    let mut lead_end = 0;
    while lead_end < items.len() && items[lead_end].is_atomic() {
        lead_end += 1;
    }
    let mut trail_start = items.len();
    while trail_start > lead_end && items[trail_start - 1].is_atomic() {
        trail_start -= 1;
    }
    if lead_end == 0 && trail_start == items.len() {
        return node;
    }

    let leading = &items[..lead_end];
    let middle = &items[lead_end..trail_start];
    let trailing = &items[trail_start..];

    let middle_node: &Node = if middle.len() == 1 {
        ctx.arena.alloc(Node::Atomic(middle[0]))
    } else {
        let inner = ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(middle.to_vec())));
        ctx.arena.alloc(Node::Atomic(inner))
    };

    let mut seq: Vec<&Node> = Vec::with_capacity(leading.len() + 1 + trailing.len());
    seq.extend_from_slice(leading);
    seq.push(middle_node);
    seq.extend_from_slice(trailing);

    if seq.len() == 1 {
        seq[0]
    } else {
        ctx.arena.alloc(Node::Sequence(ctx.arena.alloc_slice(seq)))
    }
}

/// `SetDiff`/`SetInter`/`SetSymDiff`/`SetUnion` simplification (§4.4):
/// flattens nested same-kind positive children, collapses a single-member
/// set to that member (polarity XOR-combined), and collapses a `SetDiff`
/// with one leading member to that member.
fn simplify_set<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    let (items, flags, is_union) = match node {
        Node::SetUnion(d) => (d.items, d.flags, true),
        Node::SetInter(d) => (d.items, d.flags, false),
        Node::SetDiff(d) => (d.items, d.flags, false),
        Node::SetSymDiff(d) => (d.items, d.flags, false),
        _ => return node,
    };

    let mut flat: Vec<&Node> = Vec::with_capacity(items.len());
    for item in items {
        match (node, item) {
            (Node::SetUnion(_), Node::SetUnion(inner)) if inner.flags.positive && is_union => {
                flat.extend(inner.items.iter().copied());
            }
            _ => flat.push(item),
        }
    }

    if flat.len() == 1 {
        let member = flat[0];
        return xor_polarity(member, flags.positive, ctx);
    }

    let rebuilt = SetData { items: ctx.arena.alloc_slice(flat), flags };
    match node {
        Node::SetUnion(_) => ctx.arena.alloc(Node::SetUnion(rebuilt)),
        Node::SetInter(_) => ctx.arena.alloc(Node::SetInter(rebuilt)),
        Node::SetDiff(_) => ctx.arena.alloc(Node::SetDiff(rebuilt)),
        Node::SetSymDiff(_) => ctx.arena.alloc(Node::SetSymDiff(rebuilt)),
        _ => unreachable!(),
    }
}

fn xor_polarity<'a>(member: &'a Node<'a>, outer_positive: bool, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    if outer_positive {
        return member;
    }
    match member {
        Node::Character { value, positive, zerowidth } => {
            ctx.arena.alloc(Node::Character { value: *value, positive: !positive, zerowidth: *zerowidth })
        }
        Node::Property { id, positive, zerowidth } => {
            ctx.arena.alloc(Node::Property { id: *id, positive: !positive, zerowidth: *zerowidth })
        }
        Node::CharacterRange { lo, hi, positive } => {
            ctx.arena.alloc(Node::CharacterRange { lo: *lo, hi: *hi, positive: !positive })
        }
        Node::SetUnion(d) => ctx.arena.alloc(Node::SetUnion(SetData {
            items: d.items,
            flags: SetFlags { positive: !d.flags.positive, zerowidth: d.flags.zerowidth },
        })),
        other => other,
    }
}

/// `(1,1)` collapses to the body; an empty body collapses the repeat to
/// empty (§4.4).
fn normalise_repeat<'a>(node: &'a Node<'a>, ctx: &OptimiseCtx<'a>) -> &'a Node<'a> {
    let (body, min, max) = match node {
        Node::GreedyRepeat { body, min, max } | Node::LazyRepeat { body, min, max } => (*body, *min, *max),
        _ => return node,
    };
    if body.is_empty() {
        return ctx.arena.alloc(Node::Sequence(&[]));
    }
    if min == 1 && max == 1 {
        return body;
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casefold::AsciiCaseFold;

    fn ctx<'a>(arena: &'a Arena<Node<'a>>, fold: &'a AsciiCaseFold) -> OptimiseCtx<'a> {
        OptimiseCtx { arena, casefold: fold }
    }

    #[test]
    fn character_run_packs_into_string() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
        let seq = arena.alloc(Node::Sequence(arena.alloc_slice([&*a, &*b])));
        let result = optimise(seq, &c);
        match result {
            Node::String(s) => assert_eq!(s, &['a' as u32, 'b' as u32]),
            other => panic!("expected packed String, got {other:?}"),
        }
    }

    #[test]
    fn singleton_sequence_collapses() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let seq = arena.alloc(Node::Sequence(arena.alloc_slice([&*a])));
        let result = optimise(seq, &c);
        assert!(matches!(result, Node::Character { .. }));
    }

    #[test]
    fn one_one_repeat_collapses_to_body() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let r = arena.alloc(Node::GreedyRepeat { body: a, min: 1, max: 1 });
        let result = optimise(r, &c);
        assert!(matches!(result, Node::Character { .. }));
    }

    #[test]
    fn single_member_set_collapses_with_xor_polarity() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let set = arena.alloc(Node::SetUnion(SetData {
            items: arena.alloc_slice([&*a]),
            flags: SetFlags { positive: false, zerowidth: false },
        }));
        let result = optimise(set, &c);
        match result {
            Node::Character { positive, .. } => assert!(!positive),
            other => panic!("expected Character, got {other:?}"),
        }
    }

    #[test]
    fn all_atom_branch_reduces_to_set_union() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
        let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*a, &*b])));
        let result = optimise(branch, &c);
        assert!(matches!(result, Node::SetUnion(_)));
    }

    /// `abx|aby` factors the full two-element common prefix `ab`, not just
    /// its first element (reviewer regression: the old loop body ended with
    /// an unconditional `break`).
    #[test]
    fn branch_factors_multi_element_common_prefix() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let mk = |ch: char| arena.alloc(Node::Character { value: ch as u32, positive: true, zerowidth: false }) as &Node;

        let arm1 = arena.alloc(Node::Sequence(arena.alloc_slice([mk('a'), mk('b'), mk('x')])));
        let arm2 = arena.alloc(Node::Sequence(arena.alloc_slice([mk('a'), mk('b'), mk('y')])));
        let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*arm1, &*arm2])));

        let result = optimise(branch, &c);
        match result {
            Node::Sequence(seq) => {
                assert_eq!(seq.len(), 2, "expected prefix + branch, got {seq:?}");
                match seq[0] {
                    Node::String(s) => assert_eq!(s, &['a' as u32, 'b' as u32]),
                    other => panic!("expected packed 'ab' prefix, got {other:?}"),
                }
                assert!(matches!(seq[1], Node::Branch(_)), "expected reduced Branch(x|y), got {:?}", seq[1]);
            }
            other => panic!("expected Sequence(prefix, Branch), got {other:?}"),
        }
    }

    /// `xa|ya` factors the common suffix `a`, leaving `Branch(x|y) + a`.
    #[test]
    fn branch_factors_common_suffix() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let mk = |ch: char| arena.alloc(Node::Character { value: ch as u32, positive: true, zerowidth: false }) as &Node;

        let arm1 = arena.alloc(Node::Sequence(arena.alloc_slice([mk('x'), mk('a')])));
        let arm2 = arena.alloc(Node::Sequence(arena.alloc_slice([mk('y'), mk('a')])));
        let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*arm1, &*arm2])));

        let result = optimise(branch, &c);
        match result {
            Node::Sequence(seq) => {
                assert_eq!(seq.len(), 2, "expected branch + suffix, got {seq:?}");
                assert!(matches!(seq[0], Node::Branch(_)), "expected reduced Branch(x|y), got {:?}", seq[0]);
                match seq[1] {
                    Node::Character { value, positive: true, .. } => assert_eq!(*value, 'a' as u32),
                    other => panic!("expected 'a' suffix, got {other:?}"),
                }
            }
            other => panic!("expected Sequence(Branch, suffix), got {other:?}"),
        }
    }

    /// `(?>a(?:b))` where only the leading `a` is atomic and the trailing
    /// group is not: `leak_out_atomic` hoists the atomic leading child out
    /// and leaves only the non-atomic group wrapped, rather than leaving the
    /// whole sequence wrapped.
    #[test]
    fn atomic_leaks_out_leading_child_of_mixed_sequence() {
        let arena: Arena<Node> = Arena::new();
        let fold = AsciiCaseFold;
        let c = ctx(&arena, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
        let group = arena.alloc(Node::Group { number: 1, body: b, fuzzy: None });

        let seq = arena.alloc(Node::Sequence(arena.alloc_slice([&*a, &*group])));
        let outer = arena.alloc(Node::Atomic(seq));

        let result = optimise(outer, &c);
        match result {
            Node::Sequence(items) => {
                assert_eq!(items.len(), 2, "expected hoisted atomic 'a' + wrapped group tail, got {items:?}");
                assert!(matches!(items[0], Node::Character { value, positive: true, .. } if *value == 'a' as u32));
                assert!(matches!(items[1], Node::Atomic(_)), "expected the non-atomic group still wrapped, got {:?}", items[1]);
            }
            other => panic!("expected Sequence(a, Atomic(Group(b))), got {other:?}"),
        }
    }

    fn parse<'a>(codepoints: &'a [u32], arena: &'a Arena<Node<'a>>, ctx: &mut crate::context::Context<'a>) -> &'a Node<'a> {
        use crate::flags::Flags;
        use crate::parser::Parser;
        let mut parser = Parser::new(codepoints, ctx, arena, Flags::NONE);
        parser.parse_pattern().unwrap()
    }

    /// §8 "Idempotent optimisation": running `optimise` twice on a node
    /// yields the same node (by equality).
    #[test]
    fn optimising_twice_is_a_no_op() {
        use crate::context::{CompileOptions, Context};
        use crate::flags::Flags;
        use crate::property::PropertyTable;

        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let options = CompileOptions::new(Flags::NONE, &table, &fold, &[]);
        let arena: Arena<Node> = Arena::new();
        let mut pctx = Context::new(&options);
        let codepoints: Vec<u32> = "a(b|c)*(b|c)d".chars().map(|c| c as u32).collect();

        let root = parse(&codepoints, &arena, &mut pctx);
        let c = ctx(&arena, &fold);

        let once = optimise(root, &c);
        let twice = optimise(once, &c);
        assert_eq!(once, twice);
    }

    /// §8 scenario 3: `[a-z&&[^aeiou]]` compiles as a simplified `SetInter`.
    #[test]
    fn character_class_intersection_simplifies_to_set_inter() {
        use crate::context::{CompileOptions, Context};
        use crate::flags::Flags;
        use crate::property::PropertyTable;

        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let options = CompileOptions::new(Flags::NONE, &table, &fold, &[]);
        let arena: Arena<Node> = Arena::new();
        let mut pctx = Context::new(&options);
        let codepoints: Vec<u32> = "[a-z&&[^aeiou]]".chars().map(|c| c as u32).collect();

        let root = parse(&codepoints, &arena, &mut pctx);
        let c = ctx(&arena, &fold);
        let optimised = optimise(root, &c);

        assert!(matches!(optimised, Node::SetInter(_)), "expected SetInter, got {optimised:?}");
    }
}
