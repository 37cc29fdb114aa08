//! A lexer, Pratt parser, type checker, bytecode compiler, and stack-based
//! VM for a statically-typed subset of TypeScript.
//!
//! Modules are layered roughly in compilation order: `token`/`lexer` produce
//! a token stream, `ast`/`parser` build the tree, `types`/`checker` assign
//! and verify static types, `bytecode`/`compiler` lower the tree to a flat
//! instruction stream, and `value`/`heap`/`vm` execute it.

pub mod arena;
pub mod ast;
pub mod bytecode;
pub mod checker;
pub mod cli;
pub mod compiler;
pub mod diagnostic;
pub mod heap;
pub mod html_report;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod style;
pub mod suggest;
pub mod token;
pub mod types;
pub mod value;
pub mod vm;

use diagnostic::Diagnostic;

/// Lexes, parses, type-checks, and compiles `source` in one pass. Any
/// diagnostic from any stage suppresses code generation — the caller gets
/// the full list back and no function to run.
pub fn compile(source: &str) -> (Option<bytecode::Function>, Vec<Diagnostic>) {
    let arena = arena::Arena::new();
    let mut interner = intern::Interner::new();
    let tokens = lexer::Lexer::tokenize(source, &mut interner);
    let (program, mut diagnostics) = parser::parse(source, &tokens, &arena);
    if !diagnostics.is_empty() {
        return (None, diagnostics);
    }
    let type_diagnostics = checker::check(&program, &interner);
    if !type_diagnostics.is_empty() {
        diagnostics.extend(type_diagnostics);
        return (None, diagnostics);
    }
    let (function, compile_diagnostics) = compiler::compile(&program, &interner);
    if !compile_diagnostics.is_empty() {
        diagnostics.extend(compile_diagnostics);
        return (None, diagnostics);
    }
    (Some(function), diagnostics)
}

/// Executes a compiled top-level function on a fresh VM, pre-registering no
/// natives of its own — callers that need `print`/`clock` or other host
/// functions call `vm::Vm::register_native` before this (see `cli.rs`).
pub fn run(function: bytecode::Function) -> Result<value::Value, String> {
    vm::Vm::new().interpret(function)
}
