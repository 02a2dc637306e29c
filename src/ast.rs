//! Abstract syntax tree consumed by the resolver and interpreter.
//!
//! Nodes own their tokens so a parsed program can outlive the source text it
//! came from.  Function and class declarations sit behind `Rc` because closures
//! and classes keep pointing at them long after the statement list is gone.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a variable‑reference node.  Keys the resolver's distance map,
/// and stays unique across every unit parsed in the process (REPL lines,
/// imported modules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// Every kind of *expression* in Rox.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Prefix unary operator expression: `!ready`, `-42`.
    Unary { operator: Token, right: Box<Expr> },

    /// Infix binary operator expression, including the comma operator.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `condition ? then_branch : else_branch`
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Parenthesised sub‑expression.
    Grouping(Box<Expr>),

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// `identifier "=" expression`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Function‑, method‑ or constructor call.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The `this` keyword inside a method.
    This { id: ExprId, keyword: Token },

    /// `[a, b, c]`
    Array { elements: Vec<Expr> },

    /// `target[index]`
    ArrayAccess {
        target: Box<Expr>,
        /// The closing `]` token.
        bracket: Token,
        index: Box<Expr>,
    },
}

/// A named function or method.  `params == None` marks a getter, which is
/// declared without a parameter list and invoked on property access.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Option<Vec<Token>>,
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.as_ref().map_or(0, Vec::len)
    }

    pub fn is_getter(&self) -> bool {
        self.params.is_none()
    }

    pub fn params(&self) -> &[Token] {
        self.params.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug)]
pub struct ClassDecl {
    pub name: Token,
    pub methods: Vec<Rc<FunctionDecl>>,
    /// Methods declared with a leading `class` keyword.
    pub class_methods: Vec<Rc<FunctionDecl>>,
}

/// Complete executable constructs.  A program is a sequence of these.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// `"var" IDENT ("=" initializer)? ";"`
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop; `for` is desugared into this at parse time.
    While { condition: Expr, body: Box<Stmt> },

    /// `break;` ‑ keyword kept for diagnostics.
    Break { keyword: Token },

    Function(Rc<FunctionDecl>),

    Class(Rc<ClassDecl>),

    /// `return` statement inside a function body.  Absent value ⇒ `nil`.
    Return { keyword: Token, value: Option<Expr> },

    /// `import "path";`
    Import { keyword: Token, path: Token },

    /// `export <declaration>`
    Export {
        keyword: Token,
        declaration: Box<Stmt>,
    },
}

impl Stmt {
    /// Name token introduced by a declaration statement, if any.
    pub fn declared_name(&self) -> Option<&Token> {
        match self {
            Stmt::Var { name, .. } => Some(name),
            Stmt::Function(decl) => Some(&decl.name),
            Stmt::Class(decl) => Some(&decl.name),
            _ => None,
        }
    }
}
