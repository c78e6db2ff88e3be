fn main() {
    if let Err(e) = rexc_cli::run_cli() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
