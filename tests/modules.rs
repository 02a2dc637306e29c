mod common;

use pretty_assertions::assert_eq;

use common::session_with;
use rox::error::LoxError;
use rox::module::MemoryLoader;

const MATH: &str = r#"
print "loading math";
export var pi = 3;
export fun area(r) { return pi * r * r; }
var hidden = "also spliced";
"#;

#[test]
fn module_runs_once_and_binds_into_importer() {
    let loader = MemoryLoader::new().with_module("math.lox", MATH);
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(
            r#"
            import "math.lox";
            import "math.lox";
            print area(2);
            print pi;
            print hidden;
            "#,
        )
        .unwrap();

    assert_eq!(out.lines(), vec!["loading math", "12", "3", "also spliced"]);
}

#[test]
fn exports_are_recorded_per_module() {
    let loader = MemoryLoader::new().with_module("math.lox", MATH);
    let (mut interpreter, _) = session_with(loader);

    assert_eq!(interpreter.module_exports("math.lox"), None);

    interpreter.run_source(r#"import "math.lox";"#).unwrap();

    assert_eq!(
        interpreter.module_exports("math.lox"),
        Some(vec!["area".to_string(), "pi".to_string()])
    );
}

#[test]
fn imported_functions_see_their_own_module_globals() {
    let loader = MemoryLoader::new().with_module(
        "counter.lox",
        r#"
        var count = 0;
        export fun bump() { count = count + 1; return count; }
        "#,
    );
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(
            r#"
            import "counter.lox";
            var count = 100;
            print bump();
            print bump();
            print count;
            "#,
        )
        .unwrap();

    assert_eq!(out.lines(), vec!["1", "2", "100"]);
}

#[test]
fn reimport_splices_a_fresh_snapshot() {
    let loader = MemoryLoader::new().with_module(
        "state.lox",
        r#"
        var value = "initial";
        fun change() { value = "changed"; }
        "#,
    );
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(
            r#"
            import "state.lox";
            change();
            print value;
            import "state.lox";
            print value;
            "#,
        )
        .unwrap();

    assert_eq!(out.lines(), vec!["initial", "changed"]);
}

#[test]
fn imports_persist_across_session_units() {
    let loader = MemoryLoader::new().with_module("greet.lox", r#"print "once"; fun hi() { return "hi"; }"#);
    let (mut interpreter, out) = session_with(loader);

    interpreter.run_source(r#"import "greet.lox";"#).unwrap();
    interpreter.run_source(r#"import "greet.lox"; print hi();"#).unwrap();

    assert_eq!(out.lines(), vec!["once", "hi"]);
}

#[test]
fn nested_imports_and_classes() {
    let loader = MemoryLoader::new()
        .with_module(
            "shapes.lox",
            r#"
            import "math.lox";
            export class Square {
              init(side) { this.side = side; }
              area { return this.side * this.side * pi / pi; }
            }
            "#,
        )
        .with_module("math.lox", MATH);
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(r#"import "shapes.lox"; print Square(3).area; print area(1);"#)
        .unwrap();

    assert_eq!(out.lines(), vec!["loading math", "9", "3"]);
}

#[test]
fn cyclic_imports_terminate() {
    let loader = MemoryLoader::new()
        .with_module("a.lox", r#"import "b.lox"; var a = "a";"#)
        .with_module("b.lox", r#"import "a.lox"; var b = "b";"#);
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(r#"import "a.lox"; print a; print b;"#)
        .unwrap();

    assert_eq!(out.lines(), vec!["a", "b"]);
}

#[test]
fn missing_module_is_a_runtime_error_at_import() {
    let (mut interpreter, out) = session_with(MemoryLoader::new());

    let err = interpreter
        .run_source("print 1;\nimport \"nowhere.lox\";\nprint 2;")
        .unwrap_err();

    assert_eq!(err.to_string(), "Could not import module 'nowhere.lox'.\n[line 2]");
    assert_eq!(out.lines(), vec!["1"]);
}

#[test]
fn static_errors_in_modules_name_the_module() {
    let loader = MemoryLoader::new().with_module("bad.lox", "return 1;");
    let (mut interpreter, out) = session_with(loader);

    let err = interpreter.run_source(r#"import "bad.lox"; print "after";"#).unwrap_err();

    assert!(matches!(err, LoxError::Module { ref path, .. } if path == "bad.lox"));
    assert!(err.is_static());
    assert_eq!(
        err.to_string(),
        "in module 'bad.lox': [line 1] Error at 'return': Can't return from top-level code."
    );
    assert!(out.lines().is_empty());
    assert_eq!(interpreter.module_exports("bad.lox"), None);
}

#[test]
fn runtime_errors_in_modules_abort_the_importer() {
    let loader = MemoryLoader::new().with_module("boom.lox", r#"print "start"; error("boom");"#);
    let (mut interpreter, out) = session_with(loader);

    let err = interpreter
        .run_source(r#"import "boom.lox"; print "after";"#)
        .unwrap_err();

    assert_eq!(err.message(), "boom");
    assert_eq!(out.lines(), vec!["start"]);
}

#[test]
fn main_program_callbacks_keep_their_own_globals() {
    let loader = MemoryLoader::new().with_module(
        "apply.lox",
        r#"
        var x = "module";
        fun apply(f) { return f(); }
        "#,
    );
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(
            r#"
            import "apply.lox";
            x = "main";
            fun callback() { return x; }
            print apply(callback);
            "#,
        )
        .unwrap();

    assert_eq!(out.lines(), vec!["main"]);
}

#[test]
fn closures_made_by_module_functions_write_module_state() {
    let loader = MemoryLoader::new().with_module(
        "counter.lox",
        r#"
        var count = 0;
        fun make() {
          fun inc() { count = count + 1; return count; }
          return inc;
        }
        fun get() { return count; }
        "#,
    );
    let (mut interpreter, out) = session_with(loader);

    interpreter
        .run_source(
            r#"
            import "counter.lox";
            var inc = make();
            inc();
            inc();
            print get();
            print count;
            "#,
        )
        .unwrap();

    assert_eq!(out.lines(), vec!["2", "0"]);
}
