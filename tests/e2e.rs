//! End-to-end scenarios run through the public `tsscript::compile`/`run`
//! surface, one per documented end-to-end scenario.

use tsscript::value::Value;
use tsscript::vm::Vm;

fn run_source(src: &str) -> Value {
    let (function, diagnostics) = tsscript::compile(src);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
    tsscript::run(function.expect("compile produced no function")).expect("runtime error")
}

#[test]
fn arithmetic_final_value_is_fourteen() {
    let value = run_source("let x: number = 2 + 3 * 4; x;");
    assert_eq!(value, Value::Number(14.0));
}

#[test]
fn type_error_rejects_with_exactly_one_diagnostic_and_no_bytecode() {
    let (function, diagnostics) = tsscript::compile("let x: number = \"hi\";");
    assert!(function.is_none());
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn closure_counter_closes_upvalue_across_calls() {
    let src = r#"
        function makeCounter() {
            let n = 0;
            function inc() { n = n + 1; return n; }
            return inc;
        }
        let c = makeCounter();
        c();
        c();
        c();
    "#;
    let value = run_source(src);
    assert_eq!(value, Value::Number(3.0));
}

#[test]
fn typeof_narrowing_type_checks_clean() {
    let src = r#"
        function f(x) {
            if (typeof x === "string") { return x; }
            return "not string";
        }
    "#;
    let (function, diagnostics) = tsscript::compile(src);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert!(function.is_some());
}

#[test]
fn gc_pressure_collects_discarded_arrays() {
    let src = r#"
        function run() {
            let i = 0;
            while (i < 200000) {
                let a = [1, 2, 3];
                i = i + 1;
            }
            return i;
        }
        run();
    "#;
    let (function, diagnostics) = tsscript::compile(src);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let mut vm = Vm::new();
    let result = vm.interpret(function.unwrap()).expect("runtime error");
    assert_eq!(result, Value::Number(200000.0));
    // The 200,000 discarded `[1, 2, 3]` arrays must not all still be live —
    // only whatever's reachable from the final VM state should survive GC.
    assert!(vm.heap().live_count() < 1_000, "GC did not reclaim discarded arrays: {} live objects", vm.heap().live_count());
}

#[test]
fn instanceof_narrowing_dispatches_to_class_b() {
    let src = r#"
        class A { greet() { return "A"; } }
        class B { greet() { return "B"; } }
        function g(x) {
            if (x instanceof B) { return x.greet(); }
            return "unknown";
        }
        g(new B());
    "#;
    let (function, diagnostics) = tsscript::compile(src);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let mut vm = Vm::new();
    let result = vm.interpret(function.unwrap()).expect("runtime error");
    match result {
        Value::Object(r) => {
            let rendered = tsscript::vm::display_value(result, vm.heap());
            assert_eq!(rendered, "B");
            let _ = r;
        }
        other => panic!("expected a string object, got {:?}", other),
    }
}

#[test]
fn empty_program_compiles_and_runs_to_null() {
    let value = run_source("");
    assert_eq!(value, Value::Null);
}

#[test]
fn declaration_only_program_populates_globals() {
    let src = "let x = 42;";
    let (function, diagnostics) = tsscript::compile(src);
    assert!(diagnostics.is_empty());
    let mut vm = Vm::new();
    vm.interpret(function.unwrap()).expect("runtime error");
    let follow_up = run_source_with_globals(&mut vm, "x;");
    assert_eq!(follow_up, Value::Number(42.0));
}

fn run_source_with_globals(vm: &mut Vm, src: &str) -> Value {
    let (function, diagnostics) = tsscript::compile(src);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    vm.interpret(function.unwrap()).expect("runtime error")
}
