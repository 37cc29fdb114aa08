//! Interactive REPL: each line is compiled and run as an
//! independent program against a persistent `Vm` — so `let`/`function`/
//! `class` declarations from earlier lines stay visible as globals — and
//! against a persistent type-check scope, approximated here by re-checking
//! the whole accumulated transcript before running the new line (the
//! checker has no incremental-scope API to hang a single line's types off
//! of, so the cheapest faithful implementation is to recheck history + line
//! together and only keep `line` if that combined check is clean).

use std::io::{self, BufRead, Write};

use crate::cli::register_natives;
use crate::diagnostic::Diagnostic;
use crate::style::Style;
use crate::vm::{display_value, Vm};

pub struct Repl {
    vm: Vm,
    history: String,
    typecheck_enabled: bool,
}

impl Repl {
    pub fn new() -> Self {
        let mut vm = Vm::new();
        register_natives(&mut vm);
        Repl { vm, history: String::new(), typecheck_enabled: true }
    }

    /// Drives the REPL over stdin/stdout until `.exit` or EOF.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        loop {
            print!("> ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(_) => break,
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if let Some(command) = line.strip_prefix('.') {
                match command.trim() {
                    "exit" => break,
                    "typeson" => {
                        self.typecheck_enabled = true;
                        println!("type checking on");
                    }
                    "typeoff" => {
                        self.typecheck_enabled = false;
                        println!("type checking off");
                    }
                    other => println!("unknown command '.{}'", other),
                }
                continue;
            }
            match self.execute(line) {
                Ok(Some(value)) => println!("{}", value),
                Ok(None) => {}
                Err(diagnostics) => {
                    for d in &diagnostics {
                        eprintln!("{}: {}", Style::bold_red("error"), d);
                    }
                }
            }
        }
    }

    /// Executes one line. Returns the displayed result string (`None` for a
    /// `Null`/`Undefined` top-level result from a declaration-only line) or
    /// the diagnostics that rejected it.
    pub fn execute(&mut self, line: &str) -> Result<Option<String>, Vec<Diagnostic>> {
        if self.typecheck_enabled {
            let combined = format!("{}{}\n", self.history, line);
            let diagnostics = typecheck_source(&combined);
            if !diagnostics.is_empty() {
                return Err(diagnostics);
            }
        }

        let (function, diagnostics) = crate::compile(line);
        let Some(function) = function else {
            return Err(diagnostics);
        };

        match self.vm.interpret(function) {
            Ok(value) => {
                self.history.push_str(line);
                self.history.push('\n');
                let rendered = display_value(value, self.vm.heap());
                Ok(if matches!(rendered.as_str(), "null" | "undefined") { None } else { Some(rendered) })
            }
            Err(e) => Err(vec![Diagnostic::error(e, crate::diagnostic::Position::start())]),
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

fn typecheck_source(source: &str) -> Vec<Diagnostic> {
    let arena = crate::arena::Arena::new();
    let mut interner = crate::intern::Interner::new();
    let tokens = crate::lexer::Lexer::tokenize(source, &mut interner);
    let (program, mut diagnostics) = crate::parser::parse(source, &tokens, &arena);
    if diagnostics.is_empty() {
        diagnostics.extend(crate::checker::check(&program, &interner));
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_globals_across_lines() {
        let mut repl = Repl::new();
        assert_eq!(repl.execute("let x = 1;").unwrap(), None);
        assert_eq!(repl.execute("x + 1;").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn rejects_type_error_without_poisoning_history() {
        let mut repl = Repl::new();
        assert_eq!(repl.execute("let x: number = 1;").unwrap(), None);
        assert!(repl.execute("let y: number = \"no\";").is_err());
        assert_eq!(repl.execute("x + 1;").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn typeoff_allows_untyped_mismatches_through_to_runtime() {
        let mut repl = Repl::new();
        repl.typecheck_enabled = false;
        assert!(repl.execute("let x: number = \"no\";").is_ok());
    }

    #[test]
    fn functions_declared_in_earlier_lines_are_callable_later() {
        let mut repl = Repl::new();
        assert_eq!(repl.execute("function sq(n) { return n * n; }").unwrap(), None);
        assert_eq!(repl.execute("sq(4);").unwrap(), Some("16".to_string()));
    }
}
