mod common;

use pretty_assertions::assert_eq;

use common::{failure_of, output_of, session};
use rox::error::LoxError;
use rox::value::Value;

fn runtime_message(source: &str) -> String {
    let (_, err) = failure_of(source);

    match err {
        LoxError::Runtime { message, .. } => message,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

fn eval(source: &str) -> Value {
    let (mut interpreter, _) = session();
    interpreter.eval_source(source).unwrap()
}

#[test]
fn uninitialized_variable_reads_as_nil() {
    assert_eq!(
        output_of("var a; print a; print a == nil; print !a;"),
        vec!["nil", "true", "true"]
    );
}

#[test]
fn plus_adds_numbers_and_concatenates_otherwise() {
    assert_eq!(
        output_of(r#"print 1 + "a"; print "a" + 1; print 1 + 2; print "x" + nil;"#),
        vec!["1a", "a1", "3", "xnil"]
    );
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    assert_eq!(
        runtime_message("print 10 / 0;"),
        "Attempted to divide by zero, which is not allowed."
    );
    assert_eq!(output_of("print 10 % 3; print 7 / 2;"), vec!["1", "3.5"]);
}

#[test]
fn bitwise_operators_truncate_to_integers() {
    assert_eq!(
        output_of("print 5 | 2; print 5 ^ 1; print 5.9 | 0;"),
        vec!["7", "4", "5"]
    );
}

#[test]
fn arithmetic_requires_numbers() {
    assert_eq!(runtime_message(r#"print "a" - 1;"#), "Operands must be numbers.");
    assert_eq!(runtime_message(r#"print -"a";"#), "Operand must be a number.");
    assert_eq!(runtime_message("print nil < 1;"), "Operands must be numbers.");
}

#[test]
fn indexing_arrays_and_strings() {
    assert_eq!(
        output_of(r#"var a = [1, 2, 3]; print a[1.7]; print "abc"[1]; print a;"#),
        vec!["2", "b", "[1, 2, 3]"]
    );

    assert_eq!(runtime_message("print [1, 2, 3][5];"), "Array index out of bounds.");
    assert_eq!(runtime_message(r#"print "abc"[3];"#), "String index out of bounds.");
    assert_eq!(runtime_message("print [1][-1];"), "Array index out of bounds.");
    assert_eq!(runtime_message(r#"print [1]["0"];"#), "Index must be a number.");
    assert_eq!(runtime_message("print 12[0];"), "Can only index into arrays or strings.");
}

#[test]
fn truthiness_and_logical_operators_return_operands() {
    assert_eq!(
        output_of(
            r#"
            print nil or "default";
            print 0 and "zero is truthy";
            print "" || "unused";
            print false && missing;
            "#
        ),
        vec!["default", "zero is truthy", "", "false"]
    );
}

#[test]
fn conditional_evaluates_one_branch_and_comma_yields_right() {
    assert_eq!(
        output_of(
            r#"
            var hits = 0;
            fun hit(v) { hits = hits + 1; return v; }
            print true ? hit(1) : hit(2);
            print hits;
            print (hit(3), hit(4));
            print hits;
            "#
        ),
        vec!["1", "1", "4", "3"]
    );
}

#[test]
fn equality_is_by_value_for_scalars_and_identity_otherwise() {
    assert_eq!(eval("1 == 1").to_string(), "true");
    assert_eq!(eval(r#""a" == "a""#).to_string(), "true");
    assert_eq!(eval("nil == false").to_string(), "false");
    assert_eq!(eval("[1] == [1]").to_string(), "false");
    assert_eq!(
        output_of("var a = [1]; var b = a; print a == b; fun f() {} print f == f;"),
        vec!["true", "true"]
    );
}

#[test]
fn closures_in_loops_capture_each_iteration() {
    let lines = output_of(
        r#"
        var first = nil;
        var last = nil;
        for (var i = 0; i < 3; i = i + 1) {
          var j = i;
          fun show() { print j; }
          if (first == nil) first = show;
          last = show;
        }
        first();
        last();
        "#,
    );

    assert_eq!(lines, vec!["0", "2"]);
}

#[test]
fn ten_closures_print_their_own_values() {
    let lines = output_of(
        r#"
        var i = 0;
        var chain = nil;
        while (i < 10) {
          var value = i;
          var previous = chain;
          fun link() {
            if (previous != nil) previous();
            print value;
          }
          chain = link;
          i = i + 1;
        }
        chain();
        "#,
    );

    let expected: Vec<String> = (0..10).map(|n| n.to_string()).collect();
    assert_eq!(lines, expected);
}

#[test]
fn counters_share_their_closure_environment() {
    let lines = output_of(
        r#"
        fun makeCounter() {
          var count = 0;
          fun inc() { count = count + 1; return count; }
          return inc;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a(); print a(); print b();
        "#,
    );

    assert_eq!(lines, vec!["1", "2", "1"]);
}

#[test]
fn break_leaves_only_the_innermost_loop() {
    let lines = output_of(
        r#"
        var i = 0;
        while (i < 3) {
          var j = 0;
          while (true) {
            if (j == 2) break;
            j = j + 1;
          }
          print i + j;
          i = i + 1;
        }
        print "done";
        "#,
    );

    assert_eq!(lines, vec!["2", "3", "4", "done"]);
}

#[test]
fn return_propagates_out_of_loops() {
    let lines = output_of(
        r#"
        fun find(items, wanted) {
          for (var i = 0; i < len(items); i = i + 1) {
            while (true) {
              if (items[i] == wanted) return i;
              break;
            }
          }
          return -1;
        }
        print find([4, 5, 6], 6);
        print find([4, 5, 6], 9);
        "#,
    );

    assert_eq!(lines, vec!["2", "-1"]);
}

#[test]
fn functions_without_return_yield_nil() {
    assert_eq!(output_of("fun f() {} print f(); print f;"), vec!["nil", "<fn f>"]);
}

#[test]
fn recursion_works_through_the_global_frame() {
    assert_eq!(
        output_of("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);"),
        vec!["610"]
    );
}

#[test]
fn arity_is_checked_exactly() {
    assert_eq!(
        runtime_message("fun f(a, b) {} f(1);"),
        "Expected 2 arguments but got 1."
    );
    assert_eq!(
        runtime_message(r#""not callable"();"#),
        "Can only call functions and classes."
    );
}

#[test]
fn runtime_error_stops_the_unit_but_keeps_prior_output() {
    let (lines, err) = failure_of("print 1; print missing; print 2;");

    assert_eq!(lines, vec!["1"]);
    assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");
}

#[test]
fn session_survives_runtime_errors() {
    let (mut interpreter, out) = session();

    interpreter.run_source("var total = 1;").unwrap();
    assert!(interpreter.run_source("total = total + nope;").is_err());
    interpreter.run_source("total = total + 1; print total;").unwrap();

    assert_eq!(out.lines(), vec!["2"]);
}

#[test]
fn arrays_are_shared_by_reference() {
    assert_eq!(
        output_of("var a = [1, [2]]; var b = a; print b[1]; print len(a); print [];"),
        vec!["[2]", "2", "[]"]
    );
}

#[test]
fn natives_len_and_error() {
    assert_eq!(
        output_of(r#"print len([1, 2]); print len("hi"); print len(nil);"#),
        vec!["2", "2", "3"]
    );
    assert_eq!(
        runtime_message("len(5);"),
        "Argument to 'len' must be a string or an array."
    );
    assert_eq!(runtime_message(r#"error("boom " + 42);"#), "boom 42");
}

#[test]
fn clock_returns_seconds() {
    let now = eval("clock()");

    match now {
        Value::Number(seconds) => assert!(seconds > 1_600_000_000.0, "{}", seconds),
        other => panic!("clock returned {:?}", other),
    }
}

#[test]
fn repl_lines_echo_trailing_expressions() {
    let (mut interpreter, out) = session();

    assert!(interpreter.run_repl_line("var x = 20;").unwrap().is_none());
    let value = interpreter.run_repl_line("x + 1").unwrap();

    assert_eq!(value.map(|v| v.to_string()), Some("21".to_string()));
    assert!(out.lines().is_empty());
}
