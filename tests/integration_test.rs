// ABOUTME: End-to-end tests driving the full lex/parse/evaluate pipeline

use quill::env::Scope;
use quill::error::{Context, Error};
use quill::interp::{Flow, Interp};
use quill::lexer::{Lexer, TokenKind};
use quill::value::Value;
use std::rc::Rc;

/// Evaluate a program in a fresh interpreter and return the value of its
/// last statement.
fn eval(source: &str) -> Result<Value, Error> {
    let interp = Interp::new(vec![], vec![]);
    eval_with(&interp, source)
}

fn eval_with(interp: &Rc<Interp>, source: &str) -> Result<Value, Error> {
    let scope = Scope::with_parent(interp.globals.clone());
    let context = Context::root("<program>");
    match interp.run("<test>", source, &scope, &context)? {
        Flow::Value(Value::List(items)) => {
            Ok(items.borrow().last().cloned().unwrap_or(Value::null()))
        }
        Flow::Value(value) => Ok(value),
        Flow::Return(value) => Ok(value),
        other => panic!("unexpected control flow at top level: {other:?}"),
    }
}

fn expect_str(source: &str, expected: &str) {
    match eval(source).unwrap() {
        Value::Str(s) => assert_eq!(s, expected),
        other => panic!("expected string, got {other:?}"),
    }
}

fn expect_num(source: &str, expected: f64) {
    match eval(source).unwrap() {
        Value::Number(n) => assert_eq!(n, expected),
        other => panic!("expected number, got {other:?}"),
    }
}

#[test]
fn test_print_returns_null_and_print_ret_returns_text() {
    expect_str(
        "print_ret(\"Greetings universe!\")",
        "Greetings universe!",
    );
    expect_num("print(\"Greetings universe!\")", 0.0);
}

#[test]
fn test_arrow_function_concatenation() {
    expect_str(
        "fun oopify(prefix) -> prefix + \"oop\"\nprint_ret(oopify(\"wh\"))",
        "whoop",
    );
}

#[test]
fn test_join_program() {
    let source = r#"
        fun join(xs, sep) {
          r = ""
          for i = 0 to len(xs) {
            r = r + xs[i]
            if i != len(xs) - 1 { r = r + sep }
          }
          return r
        }
        join(["a","b","c"], ", ")
    "#;
    expect_str(source, "a, b, c");
}

#[test]
fn test_map_over_functions() {
    let source = r#"
        fun oopify(prefix) -> prefix + "oop"
        join(map(["l", "sp"], oopify), ", ")
    "#;
    expect_str(source, "loop, spoop");
}

#[test]
fn test_try_catch_division_by_zero() {
    let source = r#"
        out = ""
        try { x = 1 / 0 } catch as e { out = print_ret(e) }
        out
    "#;
    expect_str(source, "Runtime Error: Division by zero");
}

#[test]
fn test_struct_field_round_trip() {
    let source = r#"
        struct P { x, y }
        p = P{}
        p.x = 3
        p.x + 1
    "#;
    expect_num(source, 4.0);
}

#[test]
fn test_prebound_math_pi_global() {
    expect_num("math_pi", std::f64::consts::PI);
    expect_str("print_ret(math_pi)", "3.141592653589793");
}

#[test]
fn test_stringified_number_relexes_to_same_value() {
    let shown = match eval("print_ret(2.625)").unwrap() {
        Value::Str(s) => s,
        other => panic!("expected string, got {other:?}"),
    };
    let tokens = Lexer::new("<relex>", &shown).tokenize().unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Float(2.625));
}

#[test]
fn test_argv_is_prebound() {
    let interp = Interp::new(vec![], vec!["alpha".to_string(), "beta".to_string()]);
    match eval_with(&interp, "argv[1]").unwrap() {
        Value::Str(s) => assert_eq!(s, "beta"),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn test_evaluation_is_deterministic_without_imports() {
    let source = r#"
        fun fib(n) {
            if n < 2 { return n }
            return fib(n - 1) + fib(n - 2)
        }
        fib(12)
    "#;
    let first = eval(source).unwrap();
    let second = eval(source).unwrap();
    assert_eq!(first.repr(), second.repr());
    assert!(matches!(first, Value::Number(n) if n == 144.0));
}

#[test]
fn test_top_level_return_is_exit_value() {
    let interp = Interp::new(vec![], vec![]);
    let scope = Scope::with_parent(interp.globals.clone());
    let context = Context::root("<program>");
    match interp.run("<test>", "return 3", &scope, &context).unwrap() {
        Flow::Return(Value::Number(n)) => assert_eq!(n, 3.0),
        other => panic!("expected return flow, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_reads_and_writes_error() {
    assert!(eval("xs = [1]\nxs[3]").is_err());
    assert!(eval("xs = [1]\nxs[1] = 2").is_err());
    assert!(eval("xs = [1]\nxs[0] = 2\nxs[0]").is_ok());
}

#[test]
fn test_scope_asymmetry_between_if_and_do() {
    expect_num("if true { x = 1 }\nx", 1.0);
    let err = eval("do { y = 1 }\ny").unwrap_err();
    assert_eq!(err.details, "'y' is not defined");
}

#[test]
fn test_runtime_error_rendering_includes_traceback() {
    let source = "fun divide(a, b) -> a / b\ndivide(1, 0)";
    let err = eval(source).unwrap_err();
    let rendered = err.render();
    assert!(rendered.contains("Traceback (most recent call last):"));
    assert!(rendered.contains("in divide"));
    assert!(rendered.contains("Runtime Error: Division by zero"));
    assert!(rendered.contains("Hint: Make sure the divisor is not 0."));
}

#[test]
fn test_parser_error_rendering_includes_carets() {
    let err = eval("1 +").unwrap_err();
    let rendered = err.render();
    assert!(rendered.starts_with("Invalid Syntax:"));
    assert!(rendered.contains("1 | 1 +"));
    assert!(rendered.contains('^'));
}

#[test]
fn test_switch_on_strings() {
    let source = r#"
        word = "two"
        out = 0
        switch word {
            case "one" { out = 1 }
            case "two" { out = 2 }
            else { out = 99 }
        }
        out
    "#;
    expect_num(source, 2.0);
}

#[test]
fn test_dict_literal_indexing_and_iteration() {
    let source = r#"
        d = {"a": 1, "b": 2}
        keys = ""
        for k in d { keys = keys + k }
        keys + print_ret(d["b"])
    "#;
    expect_str(source, "ab2");
}

#[test]
fn test_string_iteration_and_repeat() {
    expect_str("out = \"\"\nfor c in \"ab\" { out = out + c + \"-\" }\nout", "a-b-");
    expect_str("\"ab\" * 3", "ababab");
}

#[test]
fn test_assignment_writes_in_current_frame_only() {
    let source = r#"
        counter = 0
        fun bump() {
            counter = counter + 1
            return counter
        }
        bump()
        bump()
    "#;
    // Assignment writes into the call frame, not the outer scope, so the
    // outer counter stays at 0 and each call returns 1.
    expect_num(source, 1.0);
}

#[test]
fn test_reduce_and_filter_builtins() {
    expect_num("reduce([1, 2, 3, 4], fun(a, b) -> a + b, 0)", 10.0);
    expect_num("len(filter(range(0, 10), fun(n) -> n % 2 == 0))", 5.0);
}

#[test]
fn test_range_builtin_matches_for_loop() {
    let source = r#"
        total = 0
        for n in range(0, 5) { total = total + n }
        total
    "#;
    expect_num(source, 10.0);
}

#[test]
fn test_fstring_pipeline() {
    expect_str("name = \"world\"\nf\"hello {name}, {1 + 1}\"", "hello world, 2");
}

#[test]
fn test_dynamic_parameter_uses_dollar() {
    let source = r#"
        fun clamp(n from $ % 10) -> n
        clamp(123)
    "#;
    expect_num(source, 3.0);
}

#[test]
fn test_default_parameters() {
    let source = r#"
        fun greet(name, punct = "!") -> name + punct
        greet("hi") + greet("yo", "?")
    "#;
    expect_str(source, "hi!yo?");
}
