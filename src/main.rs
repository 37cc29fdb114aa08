//! `tsscript` binary entry point: parses CLI flags and dispatches to the
//! file-compile-and-run path or the REPL (`cli::run_cli`).

fn main() {
    std::process::exit(tsscript::cli::run_cli());
}
