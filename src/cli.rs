//! Command-line front end (`<program> [--help] [--version]
//! [--typecheck] [--html-report] <file>`, falling back to the REPL when no
//! file is given). A `clap::Parser` derive plus a `run_cli` entry point,
//! with a single compile/typecheck/run surface rather than subcommands.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crate::diagnostic::Diagnostic;
use crate::heap::Heap;
use crate::repl::Repl;
use crate::style::Style;
use crate::value::Value;
use crate::vm::{display_value, Vm};
use crate::{checker, html_report, intern::Interner, lexer::Lexer, parser};

#[derive(Parser)]
#[command(name = "tsscript")]
#[command(about = "Lexer, parser, type checker, and VM for a TypeScript subset", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Source file to compile and run. Omit to start the REPL.
    file: Option<PathBuf>,

    /// Stop after type checking; print diagnostics and exit.
    #[arg(long)]
    typecheck: bool,

    /// Also write `<file>.type-errors.html` alongside plain-text output.
    #[arg(long = "html-report")]
    html_report: bool,
}

/// Entry point for the CLI, called from `main.rs`. Returns the process exit
/// code: 0 on success, 1 on any file/parse/type/runtime error.
pub fn run_cli() -> i32 {
    let cli = Cli::parse();
    match cli.file {
        None => {
            Repl::new().run();
            0
        }
        Some(path) => run_file(&path, cli.typecheck, cli.html_report),
    }
}

fn run_file(path: &PathBuf, typecheck_only: bool, html_report: bool) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}: {}", Style::bold_red("error"), path.display(), e);
            return 1;
        }
    };
    let path_str = path.display().to_string();

    if typecheck_only {
        let diagnostics = typecheck(&source);
        report(&path_str, &source, &diagnostics, html_report);
        return if diagnostics.is_empty() { 0 } else { 1 };
    }

    let (function, diagnostics) = crate::compile(&source);
    if !diagnostics.is_empty() || function.is_none() {
        report(&path_str, &source, &diagnostics, html_report);
        return 1;
    }

    let mut vm = Vm::new();
    register_natives(&mut vm);
    match vm.interpret(function.unwrap()) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{}: {}", Style::bold_red("runtime error"), e);
            1
        }
    }
}

/// Runs only lex → parse → type-check, the stage `--typecheck` stops after.
fn typecheck(source: &str) -> Vec<Diagnostic> {
    let arena = crate::arena::Arena::new();
    let mut interner = Interner::new();
    let tokens = Lexer::tokenize(source, &mut interner);
    let (program, mut diagnostics) = parser::parse(source, &tokens, &arena);
    if diagnostics.is_empty() {
        diagnostics.extend(checker::check(&program, &interner));
    }
    diagnostics
}

fn report(path: &str, source: &str, diagnostics: &[Diagnostic], html_report: bool) {
    for d in diagnostics {
        eprintln!("{}: {}", Style::bold_red("error"), d);
    }
    if html_report {
        let out_path = format!("{}.type-errors.html", path);
        let html = html_report::render(path, source, diagnostics);
        if let Err(e) = fs::write(&out_path, html) {
            eprintln!("{}: could not write {}: {}", Style::bold_red("error"), out_path, e);
        }
    }
}

/// Registers the two host-observable native globals a TypeScript-subset
/// program with no standard library would otherwise have no way to produce
/// output from (SPEC_FULL §6, supplementing the original's `main.cpp`).
pub fn register_natives(vm: &mut Vm) {
    vm.register_native("print", native_print);
    vm.register_native("clock", native_clock);
}

fn native_print(args: &[Value], heap: &Heap) -> Result<Value, String> {
    if args.len() != 1 {
        return Err(format!("Expected 1 arguments but got {}", args.len()));
    }
    println!("{}", display_value(args[0], heap));
    Ok(Value::Undefined)
}

fn native_clock(args: &[Value], _heap: &Heap) -> Result<Value, String> {
    if !args.is_empty() {
        return Err(format!("Expected 0 arguments but got {}", args.len()));
    }
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Value::Number(now.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn typecheck_collects_errors_without_running() {
        let diags = typecheck("let x: number = \"hi\";");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn run_file_exits_zero_on_clean_program() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "let x: number = 2 + 3 * 4; x;").unwrap();
        let code = run_file(&f.path().to_path_buf(), false, false);
        assert_eq!(code, 0);
    }

    #[test]
    fn run_file_exits_one_on_type_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "let x: number = \"hi\";").unwrap();
        let code = run_file(&f.path().to_path_buf(), false, false);
        assert_eq!(code, 1);
    }

    #[test]
    fn typecheck_only_does_not_execute() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "let x: number = 2 + 3 * 4; x;").unwrap();
        let code = run_file(&f.path().to_path_buf(), true, false);
        assert_eq!(code, 0);
    }

    #[test]
    fn html_report_written_alongside_plain_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ts");
        fs::write(&path, "let x: number = \"hi\";").unwrap();
        let code = run_file(&path, true, true);
        assert_eq!(code, 1);
        let report_path = format!("{}.type-errors.html", path.display());
        assert!(PathBuf::from(&report_path).exists());
    }
}
