//! Determinism and flag-partition properties (§8): compiling the same
//! pattern under the same flags twice yields byte-identical opcode streams,
//! and only the global-flag bits survive into `vm_flags`.

use rexc_core::casefold::AsciiCaseFold;
use rexc_core::context::CompileOptions;
use rexc_core::property::PropertyTable;
use rexc_core::scanner::PatternSource;
use rexc_core::{compile, Flags};

fn compile_pattern(pattern: &str, flags: Flags) -> rexc_core::CompiledProgram {
    let table = PropertyTable::new();
    let fold = AsciiCaseFold;
    let options = CompileOptions::new(flags, &table, &fold, &[]);
    compile(PatternSource::Text(pattern), &options).unwrap()
}

#[test]
fn compiling_twice_yields_identical_code() {
    let patterns = ["a(b|c)*d", "(?P<x>\\w+)\\s+\\1", "[a-z&&[^aeiou]]+", "(?i:abc)"];
    for pattern in patterns {
        let first = compile_pattern(pattern, Flags::NONE);
        let second = compile_pattern(pattern, Flags::NONE);
        assert_eq!(first.code, second.code, "pattern {pattern:?} was not deterministic");
        assert_eq!(first.groups.names, second.groups.names);
    }
}

#[test]
fn vm_flags_carries_only_global_bits() {
    let program = compile_pattern("abc", Flags::IGNORECASE | Flags::UNICODE | Flags::DOTALL);
    let leaked_scoped = program.vm_flags & Flags::SCOPED_MASK.bits();
    assert_eq!(leaked_scoped, 0, "scoped flags must not leak into vm_flags");
    assert_eq!(program.vm_flags & Flags::UNICODE.bits(), Flags::UNICODE.bits());
}

#[test]
fn scoped_flags_alone_do_not_change_group_numbering() {
    let with_scoped = compile_pattern("(a)(b)", Flags::IGNORECASE | Flags::DOTALL);
    let without_scoped = compile_pattern("(a)(b)", Flags::NONE);
    assert_eq!(with_scoped.groups.count, without_scoped.groups.count);
}
