mod common;

use pretty_assertions::assert_eq;

use common::{failure_of, output_of};
use rox::error::LoxError;

fn runtime_message(source: &str) -> String {
    match failure_of(source).1 {
        LoxError::Runtime { message, .. } => message,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn instances_hold_fields_and_print_by_class() {
    assert_eq!(
        output_of(
            r#"
            class Point {}
            var p = Point();
            p.x = 1;
            p.y = p.x + 1;
            print p.y;
            print p;
            print Point;
            "#
        ),
        vec!["2", "Point instance", "Point"]
    );
}

#[test]
fn init_runs_once_and_call_returns_the_instance() {
    let lines = output_of(
        r#"
        var runs = 0;
        class Box {
          init(value) {
            runs = runs + 1;
            this.value = value;
            return;
          }
        }
        var b = Box(7);
        print runs;
        print b.value;
        print b;
        "#,
    );

    assert_eq!(lines, vec!["1", "7", "Box instance"]);
}

#[test]
fn calling_init_directly_returns_this() {
    let lines = output_of(
        r#"
        class Box { init() { this.n = 1; } }
        var b = Box();
        var again = b.init();
        print again == b;
        "#,
    );

    assert_eq!(lines, vec!["true"]);
}

#[test]
fn class_arity_follows_init() {
    assert_eq!(
        runtime_message("class P { init(a, b) {} } P(1);"),
        "Expected 2 arguments but got 1."
    );
    assert_eq!(
        runtime_message("class Q {} Q(1);"),
        "Expected 0 arguments but got 1."
    );
}

#[test]
fn methods_bind_this_and_survive_extraction() {
    let lines = output_of(
        r#"
        class Greeter {
          init(name) { this.name = name; }
          greet() { return "hi " + this.name; }
        }
        var g = Greeter("ana");
        var method = g.greet;
        g.name = "bo";
        print method();
        print Greeter("cy").greet();
        "#,
    );

    assert_eq!(lines, vec!["hi bo", "hi cy"]);
}

#[test]
fn fields_shadow_methods() {
    let lines = output_of(
        r#"
        class A { m() { return "method"; } }
        var a = A();
        print a.m();
        a.m = "field";
        print a.m;
        "#,
    );

    assert_eq!(lines, vec!["method", "field"]);
}

#[test]
fn getters_run_on_access() {
    let lines = output_of(
        r#"
        class Circle {
          init(radius) { this.radius = radius; }
          area { return 3 * this.radius * this.radius; }
        }
        var c = Circle(2);
        print c.area;
        c.radius = 3;
        print c.area;
        "#,
    );

    assert_eq!(lines, vec!["12", "27"]);
}

#[test]
fn class_methods_live_on_the_metaclass() {
    let lines = output_of(
        r#"
        class Math {
          class square(n) { return n * n; }
          class named() { return this; }
        }
        print Math.square(4);
        print Math.named() == Math;
        "#,
    );

    assert_eq!(lines, vec!["16", "true"]);

    assert_eq!(
        runtime_message("class M { class s() {} } M().s();"),
        "Undefined property 's'."
    );
    assert_eq!(
        runtime_message("class M { i() {} } M.i();"),
        "Undefined property 'i'."
    );
}

#[test]
fn class_values_hold_their_own_fields() {
    let lines = output_of(
        r#"
        class Counter {
          init() { Counter.total = Counter.total + 1; }
          class count() { return this.total; }
        }
        Counter.total = 0;
        Counter(); Counter();
        print Counter.count();
        "#,
    );

    assert_eq!(lines, vec!["2"]);
}

#[test]
fn property_access_on_non_instances_fails() {
    assert_eq!(runtime_message("var x = 1; print x.y;"), "Only instances have properties.");
    assert_eq!(runtime_message(r#""s".len = 1;"#), "Only instances have fields.");
    assert_eq!(
        runtime_message("class E {} print E().missing;"),
        "Undefined property 'missing'."
    );
}

#[test]
fn methods_close_over_their_defining_scope() {
    let lines = output_of(
        r##"
        fun makeClass(prefix) {
          class Tagged {
            tag(s) { return prefix + s; }
          }
          return Tagged;
        }
        var T = makeClass("#");
        print T().tag("x");
        "##,
    );

    assert_eq!(lines, vec!["#x"]);
}
