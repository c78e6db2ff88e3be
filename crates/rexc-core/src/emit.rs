//! Code emission (§4.6) and bitset construction (§4.7): walks the optimised
//! AST into the flat `u32` opcode stream the out-of-scope VM consumes.
//!
//! Grounded on `_regex_core.py`'s per-node `compile()` methods and
//! `_Set._make_bitset`: this is a one-for-one transliteration of that
//! dispatch, using `u32` code words in a `Vec` instead of Python lists of
//! int tuples, and `Opcode::code()` instead of the `_OP` int constants.

use std::collections::HashMap;

use rexc_base::Span;

use crate::ast::{GroupRef, Node, SetData};
use crate::context::Context;
use crate::error::{CompileError, Result};
use crate::opcode::{Opcode, CODES_PER_SUBSET, INDEXES_PER_CODE, UNLIMITED};

const ZEROWIDTH_FLAG: u32 = 0x2;

fn flags_word(positive: bool, zerowidth: bool) -> u32 {
    positive as u32 | (zerowidth as u32) * ZEROWIDTH_FLAG
}

fn push(code: &mut Vec<u32>, opcode: Opcode) {
    code.push(opcode.code() as u32);
}

/// Resolves a `(?(id)...)` reference to a group number (§3.4, deferred from
/// parse time since a name may refer forward to a group declared later in
/// the pattern, mirroring `_regex_core.py`'s `fix_groups`).
fn resolve_group_ref(ctx: &Context, group: GroupRef, span: Span) -> Result<u32> {
    let n = match group {
        GroupRef::Number(n) => n,
        GroupRef::Name(sym) => ctx.group_by_name(sym).ok_or(CompileError::UnknownGroup(span))?,
    };
    bounds_check_group(ctx, n, span)
}

/// Validates a numeric group reference against the final `group_count`
/// (§6.1/§7 "unknown group"), deferred to emission the same way
/// [`resolve_group_ref`] defers a conditional's reference: a plain numeric
/// backreference can name a group the parser has not declared yet, so
/// there is no earlier point in the pipeline where the final count is
/// known. Mirrors `_regex_core.py`'s `_RefGroup.fix_groups`.
fn bounds_check_group(ctx: &Context, n: u32, span: Span) -> Result<u32> {
    if n < 1 || n > ctx.group_count() {
        return Err(CompileError::UnknownGroup(span));
    }
    Ok(n)
}

/// Emits `node`'s compiled form into `code`, appending rather than
/// returning a fresh vector (matching the teacher's accumulate-into-buffer
/// idiom elsewhere in this crate over the original's list-concatenation
/// style, which would be quadratic here).
pub fn emit<'a>(node: &'a Node<'a>, reverse: bool, ctx: &Context, code: &mut Vec<u32>) -> Result<()> {
    match node {
        Node::Character { value, positive, zerowidth } => {
            push(code, if reverse { Opcode::CharacterRev } else { Opcode::Character });
            code.push(flags_word(*positive, *zerowidth));
            code.push(*value);
        }
        Node::CharacterIgn { value, positive, zerowidth } => {
            push(code, if reverse { Opcode::CharacterIgnRev } else { Opcode::CharacterIgn });
            code.push(flags_word(*positive, *zerowidth));
            code.push(*value);
        }
        Node::CharacterRange { lo, hi, positive } => {
            emit_bitset(&[(*lo, *hi)], *positive, false, reverse, code);
        }
        Node::Any => push(code, if reverse { Opcode::AnyRev } else { Opcode::Any }),
        Node::AnyAll => push(code, if reverse { Opcode::AnyAllRev } else { Opcode::AnyAll }),
        Node::AnyU => push(code, if reverse { Opcode::AnyURev } else { Opcode::AnyU }),
        Node::Property { id, positive, zerowidth } => {
            push(code, if reverse { Opcode::PropertyRev } else { Opcode::Property });
            code.push(flags_word(*positive, *zerowidth));
            code.push(id.0);
        }
        Node::Grapheme => {
            // At least one character up to a grapheme boundary: the same
            // whichever direction we're matching in (§4.6 note in the
            // original's `_Grapheme.compile`).
            push(code, Opcode::LazyRepeat);
            code.push(1);
            code.push(UNLIMITED);
            push(code, if reverse { Opcode::AnyAllRev } else { Opcode::AnyAll });
            push(code, Opcode::End);
            push(code, Opcode::GraphemeBoundary);
            code.push(1);
        }
        Node::RefGroup { number, span } => {
            let n = bounds_check_group(ctx, *number, *span)?;
            push(code, if reverse { Opcode::RefGroupRev } else { Opcode::RefGroup });
            code.push(n);
        }
        Node::RefGroupIgn { number, span } => {
            let n = bounds_check_group(ctx, *number, *span)?;
            push(code, if reverse { Opcode::RefGroupIgnRev } else { Opcode::RefGroupIgn });
            code.push(n);
        }
        Node::String(chars) => emit_string(chars, false, reverse, code),
        Node::StringIgn(chars) => emit_string(chars, true, reverse, code),

        Node::Boundary(positive) => {
            push(code, Opcode::Boundary);
            code.push(*positive as u32);
        }
        Node::DefaultBoundary(positive) => {
            push(code, Opcode::DefaultBoundary);
            code.push(*positive as u32);
        }
        Node::StartOfLine => push(code, Opcode::StartOfLine),
        Node::StartOfLineU => push(code, Opcode::StartOfLineU),
        Node::StartOfString => push(code, Opcode::StartOfString),
        Node::EndOfLine => push(code, Opcode::EndOfLine),
        Node::EndOfLineU => push(code, Opcode::EndOfLineU),
        Node::EndOfString => push(code, Opcode::EndOfString),
        Node::EndOfStringLine => push(code, Opcode::EndOfStringLine),
        Node::EndOfStringLineU => push(code, Opcode::EndOfStringLineU),
        Node::SearchAnchor => push(code, Opcode::SearchAnchor),

        Node::Sequence(items) => {
            if reverse {
                for &item in items.iter().rev() {
                    emit(item, reverse, ctx, code)?;
                }
            } else {
                for &item in items.iter() {
                    emit(item, reverse, ctx, code)?;
                }
            }
        }
        Node::Branch(items) => {
            push(code, Opcode::Branch);
            for &item in items.iter() {
                emit(item, reverse, ctx, code)?;
                push(code, Opcode::Next);
            }
            let last = code.len() - 1;
            code[last] = Opcode::End.code() as u32;
        }
        Node::Group { number, body, .. } => {
            push(code, Opcode::Group);
            code.push(*number);
            emit(body, reverse, ctx, code)?;
            push(code, Opcode::End);
        }
        Node::Conditional { group, yes, no, span } => {
            let n = resolve_group_ref(ctx, *group, *span)?;
            push(code, Opcode::GroupExists);
            code.push(n);
            emit(yes, reverse, ctx, code)?;
            if let Some(no) = no {
                if !no.is_empty() {
                    push(code, Opcode::Next);
                    emit(no, reverse, ctx, code)?;
                }
            }
            push(code, Opcode::End);
        }
        Node::GreedyRepeat { body, min, max } => {
            emit_repeat(Opcode::GreedyRepeat, *min, *max, body, reverse, ctx, code)?;
        }
        Node::LazyRepeat { body, min, max } => {
            emit_repeat(Opcode::LazyRepeat, *min, *max, body, reverse, ctx, code)?;
        }
        Node::Atomic(body) => {
            push(code, Opcode::Atomic);
            emit(body, reverse, ctx, code)?;
            push(code, Opcode::End);
        }
        Node::LookAround { behind, positive, body } => {
            push(code, Opcode::Lookaround);
            code.push(*positive as u32);
            code.push(!*behind as u32);
            emit(body, *behind, ctx, code)?;
            push(code, Opcode::End);
        }

        Node::SetUnion(d) => emit_set(Opcode::SetUnion, Opcode::SetUnionRev, d, reverse, ctx, code)?,
        Node::SetInter(d) => emit_set(Opcode::SetInter, Opcode::SetInterRev, d, reverse, ctx, code)?,
        Node::SetDiff(d) => emit_set(Opcode::SetDiff, Opcode::SetDiffRev, d, reverse, ctx, code)?,
        Node::SetSymDiff(d) => emit_set(Opcode::SetSymDiff, Opcode::SetSymDiffRev, d, reverse, ctx, code)?,
    }
    Ok(())
}

fn emit_string(chars: &[u32], ignorecase: bool, reverse: bool, code: &mut Vec<u32>) {
    let opcode = match (ignorecase, reverse) {
        (false, false) => Opcode::String,
        (false, true) => Opcode::StringRev,
        (true, false) => Opcode::StringIgn,
        (true, true) => Opcode::StringIgnRev,
    };
    push(code, opcode);
    code.push(chars.len() as u32);
    code.extend_from_slice(chars);
}

fn emit_repeat<'a>(
    opcode: Opcode,
    min: u32,
    max: u32,
    body: &'a Node<'a>,
    reverse: bool,
    ctx: &Context,
    code: &mut Vec<u32>,
) -> Result<()> {
    push(code, opcode);
    code.push(min);
    code.push(max);
    emit(body, reverse, ctx, code)?;
    push(code, Opcode::End);
    Ok(())
}

/// A positive set whose members are all plain characters compiles to a
/// bitset directly (§4.7); anything else goes through [`emit_set`]'s
/// compound envelope.
fn emit_set<'a>(
    opcode: Opcode,
    opcode_rev: Opcode,
    data: &SetData<'a>,
    reverse: bool,
    ctx: &Context,
    code: &mut Vec<u32>,
) -> Result<()> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut others: Vec<&'a Node<'a>> = Vec::new();
    for &member in data.items.iter() {
        match member {
            Node::Character { value, positive: true, zerowidth: false } => ranges.push((*value, *value)),
            Node::CharacterRange { lo, hi, positive: true } => ranges.push((*lo, *hi)),
            other => others.push(other),
        }
    }

    if others.is_empty() {
        emit_bitset(&ranges, data.flags.positive, data.flags.zerowidth, reverse, code);
        return Ok(());
    }

    push(code, if reverse { opcode_rev } else { opcode });
    code.push(flags_word(data.flags.positive, data.flags.zerowidth));
    if !ranges.is_empty() {
        emit_bitset(&ranges, true, false, false, code);
    }
    for member in others {
        emit(member, false, ctx, code)?;
    }
    push(code, Opcode::End);
    Ok(())
}

/// Builds `(SMALL_BITSET, ...)` or `(BIG_BITSET, ...)` for the character
/// ranges in `ranges` (§4.7), grounded on `_Set._make_bitset`.
fn emit_bitset(ranges: &[(u32, u32)], positive: bool, zerowidth: bool, reverse: bool, code: &mut Vec<u32>) {
    // A subset is the 256-bit vector of low bytes sharing a top byte,
    // represented as four `u64` limbs since Rust has no native u256.
    let mut subset_bits: HashMap<u32, [u64; 4]> = HashMap::new();
    let mut max_char: u32 = 0;
    for &(lo, hi) in ranges {
        max_char = max_char.max(hi);
        for c in lo..=hi {
            let top = c >> 8;
            let low = c & 0xFF;
            let limb = subset_bits.entry(top).or_insert([0u64; 4]);
            limb[(low / 64) as usize] |= 1u64 << (low % 64);
        }
    }

    let flags = flags_word(positive, zerowidth);

    if subset_bits.len() > 1 {
        let max_top = *subset_bits.keys().max().unwrap_or(&0);
        let mut subset_index: HashMap<[u64; 4], u32> = HashMap::new();
        let mut indexes: Vec<u32> = Vec::new();
        for top in 0..=max_top {
            let subset = subset_bits.get(&top).copied().unwrap_or([0u64; 4]);
            let next_index = subset_index.len() as u32;
            let ind = *subset_index.entry(subset).or_insert(next_index);
            indexes.push(ind);
        }
        let remainder = indexes.len() as u32 % INDEXES_PER_CODE;
        if remainder != 0 {
            indexes.extend(std::iter::repeat(0).take((INDEXES_PER_CODE - remainder) as usize));
        }
        let mut data: Vec<u32> = Vec::new();
        for chunk in indexes.chunks(INDEXES_PER_CODE as usize) {
            let mut word = 0u32;
            for (s, &ind) in chunk.iter().enumerate() {
                word |= ind << (16 * s as u32);
            }
            data.push(word);
        }
        let mut ordered: Vec<([u64; 4], u32)> = subset_index.into_iter().collect();
        ordered.sort_by_key(|&(_, ind)| ind);
        for (subset, _) in ordered {
            data.extend(bitset_to_codes(subset));
        }

        push(code, if reverse { Opcode::BigBitsetRev } else { Opcode::BigBitset });
        code.push(flags);
        code.push(max_char);
        code.extend(data);
    } else {
        let (&top, &subset) = subset_bits.iter().next().unwrap_or((&0, &[0u64; 4]));
        push(code, if reverse { Opcode::SmallBitsetRev } else { Opcode::SmallBitset });
        code.push(flags);
        code.push(top);
        code.extend(bitset_to_codes(subset));
    }
}

/// Packs a 256-bit subset (four `u64` limbs, low-to-high) into
/// `CODES_PER_SUBSET` little-endian `u32` code words.
fn bitset_to_codes(subset: [u64; 4]) -> Vec<u32> {
    let mut bits = 0u128;
    for (i, limb) in subset.iter().enumerate() {
        bits |= (*limb as u128) << (64 * i);
    }
    let mut codes = Vec::with_capacity(CODES_PER_SUBSET as usize);
    let mut remaining = bits;
    for _ in 0..CODES_PER_SUBSET {
        codes.push((remaining & u32::MAX as u128) as u32);
        remaining >>= 32;
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexc_base::Arena;
    use crate::casefold::AsciiCaseFold;
    use crate::context::CompileOptions;
    use crate::flags::Flags;
    use crate::property::PropertyTable;

    fn new_ctx<'t>(table: &'t PropertyTable, fold: &'t AsciiCaseFold) -> Context<'t> {
        let options = CompileOptions::new(Flags::NONE, table, fold, &[]);
        Context::new(&options)
    }

    #[test]
    fn character_emits_value_and_flags_word() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let ctx = new_ctx(&table, &fold);
        let node = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let mut code = Vec::new();
        emit(node, false, &ctx, &mut code).unwrap();
        assert_eq!(code, vec![Opcode::Character.code() as u32, 1, 'a' as u32]);
    }

    #[test]
    fn reverse_selects_rev_opcode() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let ctx = new_ctx(&table, &fold);
        let node = arena.alloc(Node::Any);
        let mut code = Vec::new();
        emit(node, true, &ctx, &mut code).unwrap();
        assert_eq!(code, vec![Opcode::AnyRev.code() as u32]);
    }

    #[test]
    fn string_emits_length_prefixed_codepoints() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let ctx = new_ctx(&table, &fold);
        let chars = arena.alloc_slice(['a' as u32, 'b' as u32]);
        let node = arena.alloc(Node::String(chars));
        let mut code = Vec::new();
        emit(node, false, &ctx, &mut code).unwrap();
        assert_eq!(code, vec![Opcode::String.code() as u32, 2, 'a' as u32, 'b' as u32]);
    }

    #[test]
    fn branch_closes_with_end_not_next() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let ctx = new_ctx(&table, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let b = arena.alloc(Node::Character { value: 'b' as u32, positive: true, zerowidth: false });
        let branch = arena.alloc(Node::Branch(arena.alloc_slice([&*a, &*b])));
        let mut code = Vec::new();
        emit(branch, false, &ctx, &mut code).unwrap();
        assert_eq!(*code.last().unwrap(), Opcode::End.code() as u32);
        let next_count = code.iter().filter(|&&w| w == Opcode::Next.code() as u32).count();
        assert_eq!(next_count, 1, "two arms produce one NEXT between them, the trailing one rewritten to END");
    }

    #[test]
    fn small_bitset_used_when_characters_share_top_byte() {
        let mut code = Vec::new();
        emit_bitset(&[('a' as u32, 'a' as u32), ('z' as u32, 'z' as u32)], true, false, false, &mut code);
        assert_eq!(code[0], Opcode::SmallBitset.code() as u32);
    }

    #[test]
    fn big_bitset_used_across_top_bytes() {
        let mut code = Vec::new();
        emit_bitset(&[(0x0041, 0x0041), (0x0141, 0x0141)], true, false, false, &mut code);
        assert_eq!(code[0], Opcode::BigBitset.code() as u32);
    }

    #[test]
    fn group_emits_number_then_body_then_end() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let ctx = new_ctx(&table, &fold);
        let a = arena.alloc(Node::Character { value: 'a' as u32, positive: true, zerowidth: false });
        let group = arena.alloc(Node::Group { number: 1, body: a, fuzzy: None });
        let mut code = Vec::new();
        emit(group, false, &ctx, &mut code).unwrap();
        assert_eq!(code[0], Opcode::Group.code() as u32);
        assert_eq!(code[1], 1);
        assert_eq!(*code.last().unwrap(), Opcode::End.code() as u32);
    }

    #[test]
    fn unresolvable_conditional_group_name_is_an_error() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let mut ctx = new_ctx(&table, &fold);
        let sym = ctx.interner.intern("missing");
        let yes = arena.alloc(Node::Sequence(&[]));
        let node = arena.alloc(Node::Conditional {
            group: GroupRef::Name(sym),
            yes,
            no: None,
            span: Span::new(0, 1),
        });
        let mut code = Vec::new();
        assert!(matches!(emit(node, false, &ctx, &mut code), Err(CompileError::UnknownGroup(_))));
    }

    #[test]
    fn backreference_past_group_count_is_an_error() {
        let arena: Arena<Node> = Arena::new();
        let table = PropertyTable::new();
        let fold = AsciiCaseFold;
        let ctx = new_ctx(&table, &fold);
        let node = arena.alloc(Node::RefGroup { number: 9, span: Span::new(0, 2) });
        let mut code = Vec::new();
        assert!(matches!(emit(node, false, &ctx, &mut code), Err(CompileError::UnknownGroup(_))));
    }
}
