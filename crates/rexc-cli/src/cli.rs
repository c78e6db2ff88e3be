//! Command-line interface for `rexc`.
//!
//! The CLI is built on [`clap`] for argument parsing with derive macros,
//! the same way `apps/logicaffeine_cli` wraps its own compiler crate: a
//! thin `Cli`/`Commands` pair dispatching to one handler function per
//! subcommand, with all the actual work delegated to `rexc_core::compile`.

use clap::{Parser, Subcommand};

use rexc_core::casefold::AsciiCaseFold;
use rexc_core::context::{CompileOptions, NamedList};
use rexc_core::property::PropertyTable;
use rexc_core::scanner::PatternSource;
use rexc_core::Flags;

/// Command-line interface for the `rexc` pattern compiler.
#[derive(Parser)]
#[command(name = "rexc")]
#[command(about = "Compiles a regex pattern to its opcode program", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a pattern and print the resulting program.
    Compile {
        /// The pattern text to compile.
        pattern: String,

        /// One-letter flags to apply (§6.3 alphabet), e.g. "im".
        #[arg(short, long, default_value = "")]
        flags: String,

        /// Treat `pattern` as a raw byte sequence rather than text.
        #[arg(long)]
        bytes: bool,

        /// Print the full program as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,
    },

    /// Compile a pattern and report only success or the error message.
    Check {
        /// The pattern text to check.
        pattern: String,

        /// One-letter flags to apply (§6.3 alphabet), e.g. "im".
        #[arg(short, long, default_value = "")]
        flags: String,
    },
}

/// Parses CLI arguments and executes the corresponding command.
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile { pattern, flags, bytes, json } => cmd_compile(&pattern, &flags, bytes, json),
        Commands::Check { pattern, flags } => cmd_check(&pattern, &flags),
    }
}

fn parse_flags(letters: &str) -> Result<Flags, Box<dyn std::error::Error>> {
    let mut flags = Flags::NONE;
    for letter in letters.chars() {
        let bit = Flags::from_letter(letter).ok_or_else(|| format!("unrecognised flag letter '{letter}'"))?;
        flags |= bit;
    }
    Ok(flags)
}

fn cmd_compile(pattern: &str, flags: &str, bytes: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let flags = parse_flags(flags)?;
    let table = PropertyTable::new();
    let fold = AsciiCaseFold;
    let lists: Vec<NamedList> = Vec::new();
    let options = CompileOptions::new(flags, &table, &fold, &lists);

    let source = if bytes { PatternSource::Bytes(pattern.as_bytes()) } else { PatternSource::Text(pattern) };
    let program = rexc_core::compile(source, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&program)?);
    } else {
        println!("code words: {}", program.code.len());
        println!("group count: {}", program.groups.count);
        for (name, n) in &program.groups.names {
            println!("  group {n}: {name}");
        }
        println!("vm flags: {:#x}", program.vm_flags);
        println!("simple start: {}", program.has_simple_start);
    }
    Ok(())
}

fn cmd_check(pattern: &str, flags: &str) -> Result<(), Box<dyn std::error::Error>> {
    let flags = parse_flags(flags)?;
    let table = PropertyTable::new();
    let fold = AsciiCaseFold;
    let lists: Vec<NamedList> = Vec::new();
    let options = CompileOptions::new(flags, &table, &fold, &lists);

    rexc_core::compile(PatternSource::Text(pattern), &options)?;
    println!("pattern is valid");
    Ok(())
}
