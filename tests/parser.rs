use pretty_assertions::assert_eq;

use rox::ast::Stmt;
use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::parser::{Parser, ReplInput};
use rox::scanner::scan_tokens;

fn print_expr(source: &str) -> String {
    let tokens = scan_tokens(source.as_bytes()).expect("scan");
    let expr = Parser::new(tokens).parse_expression().expect("parse");

    AstPrinter::print(&expr)
}

fn parse_program(source: &str) -> Result<Vec<Stmt>, LoxError> {
    Parser::new(scan_tokens(source.as_bytes())?).parse()
}

fn parse_error(source: &str) -> String {
    match parse_program(source) {
        Ok(statements) => panic!("expected a parse error, got {:?}", statements),
        Err(e) => e.to_string(),
    }
}

#[test]
fn precedence_ladder() {
    assert_eq!(print_expr("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
    assert_eq!(print_expr("(1 + 2) * 3"), "(* (group (+ 1.0 2.0)) 3.0)");
    assert_eq!(print_expr("-a < b == !c"), "(== (< (- a) b) (! c))");
    assert_eq!(print_expr("10 % 3 | 4 ^ 1"), "(^ (| (% 10.0 3.0) 4.0) 1.0)");
}

#[test]
fn conditional_is_right_associative() {
    assert_eq!(print_expr("a ? b : c ? d : e"), "(?: a b (?: c d e))");
}

#[test]
fn comma_binds_looser_than_conditional() {
    assert_eq!(print_expr("a, b ? c : d"), "(, a (?: b c d))");
}

#[test]
fn logical_operators_accept_both_spellings() {
    assert_eq!(print_expr("a and b || c"), "(|| (and a b) c)");
}

#[test]
fn call_arguments_are_not_comma_expressions() {
    assert_eq!(print_expr("f(1, g(2, 3))"), "(call f 1.0 (call g 2.0 3.0))");
}

#[test]
fn arrays_index_and_properties_chain() {
    assert_eq!(print_expr("[1, \"x\", nil]"), "(array 1.0 x nil)");
    assert_eq!(print_expr("a.b[0](c)"), "(call (index (. a b) 0.0) c)");
}

#[test]
fn assignment_targets() {
    assert_eq!(print_expr("a = b = 1"), "(= a (= b 1.0))");
    assert_eq!(print_expr("p.x = 2"), "(= (. p x) 2.0)");

    let message = parse_error("1 + 2 = 3;");
    assert!(message.contains("Invalid assignment target."), "{}", message);
}

#[test]
fn missing_left_operand_is_reported() {
    let message = parse_error("print * 3;");
    assert_eq!(message, "[line 1] Error at '*': Missing left-hand operand.");
}

#[test]
fn for_loop_desugars_to_while_in_block() {
    let statements = parse_program("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();

    assert_eq!(statements.len(), 1);

    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected block, got {:?}", statements[0]);
    };
    assert!(matches!(outer[0], Stmt::Var { .. }));

    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected while, got {:?}", outer[1]);
    };
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected block body, got {:?}", body);
    };
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(_)));
}

#[test]
fn class_bodies_collect_getters_and_class_methods() {
    let statements = parse_program(
        "class Circle {
           init(r) { this.r = r; }
           area { return 3 * this.r * this.r; }
           class unit() { return Circle(1); }
         }",
    )
    .unwrap();

    let Stmt::Class(decl) = &statements[0] else {
        panic!("expected class, got {:?}", statements[0]);
    };

    let names: Vec<&str> = decl.methods.iter().map(|m| m.name.lexeme.as_str()).collect();
    assert_eq!(names, vec!["init", "area"]);
    assert!(!decl.methods[0].is_getter());
    assert!(decl.methods[1].is_getter());

    assert_eq!(decl.class_methods.len(), 1);
    assert_eq!(decl.class_methods[0].name.lexeme, "unit");
}

#[test]
fn functions_require_parameter_lists() {
    let message = parse_error("fun f { }");
    assert!(message.contains("Expected '(' after function name."), "{}", message);
}

#[test]
fn import_and_export_statements() {
    let statements = parse_program("import \"lib.lox\"; export fun f() {} export var x = 1;").unwrap();

    assert!(matches!(statements[0], Stmt::Import { .. }));

    let exported: Vec<&str> = statements[1..]
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Export { declaration, .. } => declaration.declared_name(),
            _ => None,
        })
        .map(|name| name.lexeme.as_str())
        .collect();
    assert_eq!(exported, vec!["f", "x"]);

    let message = parse_error("export print 1;");
    assert!(
        message.contains("Can only export variable, function, or class declarations."),
        "{}",
        message
    );

    let message = parse_error("import lib;");
    assert!(message.contains("Expected string after 'import'."), "{}", message);
}

#[test]
fn first_error_is_returned_after_synchronizing() {
    let message = parse_error("var = 1;\nprint (;\n");
    assert_eq!(message, "[line 1] Error at '=': Expected variable name.");
}

#[test]
fn repl_accepts_trailing_bare_expression() {
    let tokens = scan_tokens(b"var a = 1; a + 1").unwrap();
    match Parser::new(tokens).parse_repl().unwrap() {
        ReplInput::Expression(expr) => assert_eq!(AstPrinter::print(&expr), "(+ a 1.0)"),
        ReplInput::Statements(s) => panic!("expected expression, got {:?}", s),
    }

    let tokens = scan_tokens(b"print 1;").unwrap();
    assert!(matches!(
        Parser::new(tokens).parse_repl().unwrap(),
        ReplInput::Statements(_)
    ));
}
