//! Static resolver pass for the **Rox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String,bool>` tracking declared/defined).
//! 2. Report static errors (self‑referencing initializer, `return` outside a
//!    function, `break` outside a loop, `this` outside a class).
//! 3. Tell the interpreter, for *each* variable occurrence, whether it's a local
//!    (and at what depth) or a global, so the interpreter never falls back to
//!    dynamic lookup that would see a later shadowing local.
//!
//! Scopes pushed here mirror the environments the interpreter creates: one per
//! block, one per function call (parameters and body share it), and one per
//! class body holding `this` (the frame `bind` creates at runtime).
//! Redeclaring a name in the same scope is allowed.

use crate::ast::{ClassDecl, Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// What kind of body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// Are we inside a class body?  Used to validate `this`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances for locals by calling back into the interpreter.  Anything not
/// recorded is a global of the unit being resolved.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    /// Resolve a lone expression (REPL echo, `evaluate` command).
    pub fn resolve_expression(&mut self, expr: &Expr) -> Result<()> {
        self.resolve_expr(expr)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Class(decl) => self.resolve_class(decl)?,

            Stmt::Block(statements) => {
                self.begin_scope();
                let result = self.resolve_all(statements);
                self.end_scope();
                result?;
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // the name is visible inside its own body (recursion)
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr)?,

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;

                self.loop_depth += 1;
                let result = self.resolve_stmt(body);
                self.loop_depth -= 1;
                result?;
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    return Err(LoxError::resolve(
                        keyword,
                        "Must be inside a loop to use 'break'.",
                    ));
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(keyword, "Can't return from top-level code."));
                }
                if let Some(expr) = value {
                    self.resolve_expr(expr)?;
                }
            }

            // imported names are spliced in at runtime and read as globals
            Stmt::Import { .. } => {}

            Stmt::Export { declaration, .. } => self.resolve_stmt(declaration)?,
        }

        Ok(())
    }

    fn resolve_all(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner)?,

            Expr::Unary { right, .. } => self.resolve_expr(right)?,

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(then_branch)?;
                self.resolve_expr(else_branch)?;
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(LoxError::resolve(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object)?,

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)?;
            }

            Expr::Array { elements } => {
                for element in elements {
                    self.resolve_expr(element)?;
                }
            }

            Expr::ArrayAccess { target, index, .. } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)?;
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function & class helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// One scope for a function's parameters + body, matching the single
    /// environment a call creates.  Loops outside the function don't make
    /// `break` legal inside it.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) -> Result<()> {
        let enclosing_function = self.current_function;
        let enclosing_loops = self.loop_depth;
        self.current_function = kind;
        self.loop_depth = 0;

        self.begin_scope();
        for param in decl.params() {
            self.declare(param);
            self.define(param);
        }
        let result = self.resolve_all(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
        self.loop_depth = enclosing_loops;
        result
    }

    fn resolve_class(&mut self, decl: &ClassDecl) -> Result<()> {
        self.declare(&decl.name);
        self.define(&decl.name);

        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.begin_scope();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert("this".to_string(), true);
        }

        let mut result: Result<()> = Ok(());

        for method in &decl.methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            result = self.resolve_function(method, kind);
            if result.is_err() {
                break;
            }
        }

        if result.is_ok() {
            for method in &decl.class_methods {
                result = self.resolve_function(method, FunctionType::Method);
                if result.is_err() {
                    break;
                }
            }
        }

        self.end_scope();
        self.current_class = enclosing_class;
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
        debug!("Scope pushed (depth {})", self.scopes.len());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
        debug!("Scope popped (depth {})", self.scopes.len());
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as a local at depth `d`; leave it
    /// unrecorded (global) if no scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
