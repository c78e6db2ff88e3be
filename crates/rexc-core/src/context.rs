//! Compile-time context: the group table, used-group tracking, and the
//! public configuration surface (§3.3, §6.1).

use std::collections::{HashMap, HashSet};

use rexc_base::{Interner, Symbol};

use crate::casefold::CaseFold;
use crate::flags::Flags;
use crate::property::PropertyTable;

/// Open/closed state of a capture group, tracked to forbid forward/self
/// back-references into a group still being parsed (§3.3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Open,
    Closed,
}

/// A compile-time-bound named list of literal alternatives for `\L<name>`
/// (§4.2.5). Supplied by the caller through [`CompileOptions`].
#[derive(Debug, Clone)]
pub struct NamedList {
    pub name: String,
    pub members: Vec<String>,
}

/// Caller-supplied configuration for a single `compile` call (§6.1 input).
///
/// Mirrors the teacher's `CompileOptions`/`CompileContext` split: a plain
/// data struct handed to the entry point, rather than a global or
/// environment-variable configuration surface.
pub struct CompileOptions<'a> {
    pub flags: Flags,
    pub properties: &'a PropertyTable,
    pub casefold: &'a dyn CaseFold,
    pub named_lists: &'a [NamedList],
}

impl<'a> CompileOptions<'a> {
    pub fn new(
        flags: Flags,
        properties: &'a PropertyTable,
        casefold: &'a dyn CaseFold,
        named_lists: &'a [NamedList],
    ) -> Self {
        CompileOptions {
            flags,
            properties,
            casefold,
            named_lists,
        }
    }
}

/// Mutable compile-time state threaded through parsing (§3.3).
///
/// One `Context` is created per top-level `compile` attempt; the old-flags
/// restart (§4.2.1) creates a fresh `Context` for its retry rather than
/// reusing a partially populated one.
pub struct Context<'a> {
    pub interner: Interner,
    pub properties: &'a PropertyTable,
    pub casefold: &'a dyn CaseFold,
    pub named_lists: &'a [NamedList],

    group_count: u32,
    group_index: HashMap<Symbol, u32>,
    group_name: HashMap<u32, Symbol>,
    used_groups: HashSet<u32>,
    group_state: HashMap<u32, GroupState>,
    /// While parsing a branch-reset arm, the set of names already bound
    /// *before this arm started* (§4.2.4): a name in this set came from a
    /// sibling arm or an outer scope and may be re-declared; a name not in
    /// it that is already bound came from earlier in the same arm and is a
    /// *duplicate group*. `None` outside any branch-reset, where every
    /// already-bound name is a duplicate.
    arm_baseline: Option<HashSet<Symbol>>,
}

/// A snapshot of the group-numbering state, taken before each branch-reset
/// arm and restored before the next (§4.2.4).
pub struct GroupSnapshot {
    group_count: u32,
    used_groups: HashSet<u32>,
}

impl<'a> Context<'a> {
    pub fn new(options: &CompileOptions<'a>) -> Self {
        Context {
            interner: Interner::new(),
            properties: options.properties,
            casefold: options.casefold,
            named_lists: options.named_lists,
            group_count: 0,
            group_index: HashMap::new(),
            group_name: HashMap::new(),
            used_groups: HashSet::new(),
            group_state: HashMap::new(),
            arm_baseline: None,
        }
    }

    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// Allocates the next group number and marks it open.
    pub fn new_group(&mut self) -> u32 {
        self.group_count += 1;
        let n = self.group_count;
        self.group_state.insert(n, GroupState::Open);
        self.used_groups.insert(n);
        n
    }

    pub fn close_group(&mut self, n: u32) {
        self.group_state.insert(n, GroupState::Closed);
    }

    pub fn group_state(&self, n: u32) -> Option<GroupState> {
        self.group_state.get(&n).copied()
    }

    /// Registers `name` for group `n`. The *first* registration for a given
    /// name wins: under branch-reset, a sibling branch re-declaring the same
    /// name does not overwrite the mapping (§9 Open Question, `group_index`
    /// is never rolled back in the source this was distilled from).
    pub fn bind_group_name(&mut self, name: Symbol, n: u32) {
        self.group_index.entry(name).or_insert(n);
        self.group_name.entry(n).or_insert(name);
    }

    /// Registers `name` for group `n`, enforcing the within-branch duplicate
    /// rule (§4.2.4): fails if `name` is already bound and the binding did
    /// not predate the current branch-reset arm.
    pub fn declare_group_name(&mut self, name: Symbol, n: u32) -> std::result::Result<(), ()> {
        if self.group_index.contains_key(&name) {
            let predates_arm = self.arm_baseline.as_ref().is_some_and(|b| b.contains(&name));
            if !predates_arm {
                return Err(());
            }
        }
        self.bind_group_name(name, n);
        Ok(())
    }

    /// Enters a branch-reset arm, recording which names are already bound
    /// so re-declaring one of them in a sibling arm is not a duplicate.
    /// Returns the previous baseline so nested branch-resets restore it.
    pub fn begin_branch_reset_arm(&mut self) -> Option<HashSet<Symbol>> {
        let baseline: HashSet<Symbol> = self.group_index.keys().copied().collect();
        std::mem::replace(&mut self.arm_baseline, Some(baseline))
    }

    pub fn end_branch_reset(&mut self, previous: Option<HashSet<Symbol>>) {
        self.arm_baseline = previous;
    }

    pub fn group_by_name(&self, name: Symbol) -> Option<u32> {
        self.group_index.get(&name).copied()
    }

    pub fn name_is_bound(&self, name: Symbol) -> bool {
        self.group_index.contains_key(&name)
    }

    pub fn group_name(&self, n: u32) -> Option<Symbol> {
        self.group_name.get(&n).copied()
    }

    pub fn group_names(&self) -> impl Iterator<Item = (Symbol, u32)> + '_ {
        self.group_index.iter().map(|(&s, &n)| (s, n))
    }

    pub fn used_groups(&self) -> &HashSet<u32> {
        &self.used_groups
    }

    /// Snapshots group-numbering state before a branch-reset arm (§4.2.4).
    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            group_count: self.group_count,
            used_groups: self.used_groups.clone(),
        }
    }

    /// Restores group-numbering state before parsing the next sibling arm.
    pub fn restore(&mut self, snapshot: &GroupSnapshot) {
        self.group_count = snapshot.group_count;
        self.used_groups = snapshot.used_groups.clone();
    }

    /// Applies the post-construct rule: `group_count` becomes the max seen
    /// across arms, `used_groups` becomes their union (§4.2.4).
    pub fn merge_branch_reset(&mut self, max_group_count: u32, union_used: HashSet<u32>) {
        self.group_count = max_group_count;
        self.used_groups = union_used;
    }
}
