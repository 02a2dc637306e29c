//! Tree‑walking evaluator.
//!
//! The interpreter is the session object: it owns the root environment (the
//! natives), the resolver's distance map and the module table, so several
//! independent sessions can coexist in one process.
//!
//! Statement execution returns [`Flow`] instead of unwinding: `return`
//! travels outwards as `Flow::Return` until a function call consumes it,
//! `break` as `Flow::Break` until the innermost `while` consumes it.  Runtime
//! errors travel as `Err` to the top of the current unit.

use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{natives, Callable, LoxFunction};
use crate::class::LoxClass;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::module::{FsLoader, ModuleLoader, ModuleSystem};
use crate::parser::{Parser, ReplInput};
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
}

pub struct Interpreter {
    /// Root scope holding the natives; parent of every module scope.
    pub(crate) globals: EnvRef,
    /// Global frame of the unit currently running: `globals` for the main
    /// program, the module scope while a module (or one of its functions) runs.
    pub(crate) unit_globals: EnvRef,
    pub(crate) environment: EnvRef,
    locals: HashMap<ExprId, usize>,
    pub(crate) modules: ModuleSystem,
    /// Path of the module whose top level is executing, if any.
    pub(crate) current_module: Option<String>,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a session printing to stdout and importing from the current
    /// directory, with the native functions defined.
    pub fn new() -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new_ref();

        for native in natives() {
            debug!("Defining native function '{}'", native.name);

            globals
                .borrow_mut()
                .define(native.name, Value::Native(Rc::new(native)));
        }

        Self {
            unit_globals: Rc::clone(&globals),
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            modules: ModuleSystem::new(Box::new(FsLoader::default())),
            current_module: None,
            out: Box::new(io::stdout()),
        }
    }

    /// Redirect `print` output.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Replace the source loader used by `import`.
    pub fn with_loader(mut self, loader: Box<dyn ModuleLoader>) -> Self {
        self.modules = ModuleSystem::new(loader);
        self
    }

    /// Resolver callback: `id` refers to a binding `depth` scopes out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {:?} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    // ───────────────────────── source entry points ─────────────────────────

    /// Scan, parse, resolve and run one unit of source in this session.
    pub fn run_source(&mut self, source: &str) -> Result<()> {
        let statements: Vec<Stmt> = Parser::new(scan_tokens(source.as_bytes())?).parse()?;

        Resolver::new(self).resolve(&statements)?;

        self.interpret(&statements)
    }

    /// Evaluate a single expression in this session.
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let expr: Expr = Parser::new(scan_tokens(source.as_bytes())?).parse_expression()?;

        Resolver::new(self).resolve_expression(&expr)?;

        self.evaluate(&expr)
    }

    /// Run one REPL line.  Returns the value of a bare trailing expression.
    pub fn run_repl_line(&mut self, source: &str) -> Result<Option<Value>> {
        match Parser::new(scan_tokens(source.as_bytes())?).parse_repl()? {
            ReplInput::Statements(statements) => {
                Resolver::new(self).resolve(&statements)?;
                self.interpret(&statements)?;
                Ok(None)
            }

            ReplInput::Expression(expr) => {
                Resolver::new(self).resolve_expression(&expr)?;
                self.evaluate(&expr).map(Some)
            }
        }
    }

    // ───────────────────────────── statements ──────────────────────────────

    /// Execute a resolved program.  The first runtime error aborts the rest.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            self.execute(stmt)?;
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Uninitialized,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment: EnvRef = Environment::child_of(&self.environment);
                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                debug!("Exited while loop");
                Ok(Flow::Normal)
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Function(decl) => {
                let function = LoxFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    false,
                    self.defining_module(),
                );

                info!("Function '{}' defined", decl.name.lexeme);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Class(decl) => {
                let name: &str = &decl.name.lexeme;
                self.environment.borrow_mut().define(name, Value::Nil);

                let class_methods = decl
                    .class_methods
                    .iter()
                    .map(|method| {
                        let function = LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&self.environment),
                            false,
                            self.defining_module(),
                        );
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let metaclass = LoxClass::new(format!("{} metaclass", name), None, class_methods);

                let methods = decl
                    .methods
                    .iter()
                    .map(|method| {
                        let function = LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&self.environment),
                            method.name.lexeme == "init",
                            self.defining_module(),
                        );
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name, Some(Rc::new(metaclass)), methods);

                info!("Class '{}' defined", name);
                self.environment
                    .borrow_mut()
                    .define(name, Value::Class(Rc::new(class)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Import { keyword, path } => {
                let TokenType::STRING(path) = &path.token_type else {
                    return Err(LoxError::runtime(keyword, "Expected string after 'import'."));
                };

                self.import_module(keyword, path)?;
                Ok(Flow::Normal)
            }

            Stmt::Export {
                keyword,
                declaration,
            } => {
                self.execute(declaration)?;

                let Some(name) = declaration.declared_name() else {
                    return Err(LoxError::runtime(
                        keyword,
                        "Can only export variable, function, or class declarations.",
                    ));
                };

                let value: Value = self
                    .environment
                    .borrow()
                    .get_local(&name.lexeme)
                    .unwrap_or(Value::Nil);

                self.export_binding(&name.lexeme, value);
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` with `environment` active, restoring the previous
    /// environment on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> Result<Flow> {
        debug!("Entering block with {} statements", statements.len());

        let previous: EnvRef = mem::replace(&mut self.environment, environment);

        let result: Result<Flow> = self.run_statements(statements);

        self.environment = previous;

        debug!("Exited block");
        result
    }

    fn run_statements(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    /// Execute a function body in its call frame.  The function's own unit
    /// supplies the global frame meanwhile: its module's scope, or the root
    /// scope for functions of the main program.
    pub fn execute_body(
        &mut self,
        body: &[Stmt],
        environment: EnvRef,
        module_env: Option<&EnvRef>,
    ) -> Result<Flow> {
        let unit: EnvRef = Rc::clone(module_env.unwrap_or(&self.globals));
        let previous: EnvRef = mem::replace(&mut self.unit_globals, unit);

        let result: Result<Flow> = self.execute_block(body, environment);

        self.unit_globals = previous;

        result
    }

    /// Module tag for functions created right now: the active global frame,
    /// unless that is the main program's.
    fn defining_module(&self) -> Option<EnvRef> {
        if Rc::ptr_eq(&self.unit_globals, &self.globals) {
            None
        } else {
            Some(Rc::clone(&self.unit_globals))
        }
    }

    // ───────────────────────────── expressions ─────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::string(s),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    TokenType::MINUS => Ok(Value::Number(-number_operand(operator, &right)?)),
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let decided: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        if !Environment::assign_at(
                            &self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        ) {
                            return Err(resolution_mismatch(name, distance));
                        }
                    }
                    None => self.unit_globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call_value(&callee, paren, values)
            }

            Expr::Get { object, name } => {
                let object: Value = self.evaluate(object)?;
                let member: Value = get_property(&object, name)?;

                match &member {
                    Value::Function(method) if method.is_getter() => {
                        debug!("Invoking getter '{}'", name.lexeme);
                        method.call(self, name, Vec::new())
                    }
                    _ => Ok(member),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value: Value = self.evaluate(value)?;
                        instance.set(name, value.clone());
                        Ok(value)
                    }
                    Value::Class(class) => {
                        let value: Value = self.evaluate(value)?;
                        class.set(name, value.clone());
                        Ok(value)
                    }
                    _ => Err(LoxError::runtime(name, "Only instances have fields.")),
                }
            }

            Expr::Array { elements } => {
                let mut values: Vec<Value> = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }

                Ok(Value::array(values))
            }

            Expr::ArrayAccess {
                target,
                bracket,
                index,
            } => {
                let target: Value = self.evaluate(target)?;
                let index: Value = self.evaluate(index)?;

                index_value(bracket, &target, &index)
            }
        }
    }

    /// Check the callable contract and arity, then invoke.
    pub fn call_value(&mut self, callee: &Value, paren: &Token, arguments: Vec<Value>) -> Result<Value> {
        let Some(callable) = callee.as_callable() else {
            return Err(LoxError::runtime(paren, "Can only call functions and classes."));
        };

        if arguments.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            ));
        }

        callable.call(self, paren, arguments)
    }

    /// Resolver distance if there is one, otherwise the unit's global frame
    /// by name.  Never searches the active chain.
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| resolution_mismatch(name, distance)),
            None => self.unit_globals.borrow().get(name),
        }
    }
}

/// The resolver promised a binding that the environment chain does not have.
fn resolution_mismatch(name: &Token, distance: usize) -> LoxError {
    LoxError::runtime(
        name,
        format!(
            "Internal error: no binding for '{}' at scope distance {}.",
            name.lexeme, distance
        ),
    )
}

fn number_operand(operator: &Token, operand: &Value) -> Result<f64> {
    match operand {
        Value::Number(n) => Ok(*n),
        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    let value: Value = match operator.token_type {
        TokenType::COMMA => right,

        TokenType::EQUAL_EQUAL => Value::Bool(left.is_equal(&right)),
        TokenType::BANG_EQUAL => Value::Bool(!left.is_equal(&right)),

        TokenType::PLUS => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            _ => Value::string(format!("{}{}", left, right)),
        },

        TokenType::MINUS => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(a - b)
        }
        TokenType::STAR => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(a * b)
        }
        TokenType::SLASH => {
            let (a, b) = number_operands(operator, &left, &right)?;
            if b == 0.0 {
                return Err(LoxError::runtime(
                    operator,
                    "Attempted to divide by zero, which is not allowed.",
                ));
            }
            Value::Number(a / b)
        }
        TokenType::PERCENT => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(a % b)
        }
        TokenType::BAR => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(f64::from(a as i32 | b as i32))
        }
        TokenType::XOR => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(f64::from(a as i32 ^ b as i32))
        }

        TokenType::GREATER => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a > b)
        }
        TokenType::GREATER_EQUAL => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a >= b)
        }
        TokenType::LESS => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a < b)
        }
        TokenType::LESS_EQUAL => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a <= b)
        }

        _ => return Err(LoxError::runtime(operator, "Invalid binary operator.")),
    };

    Ok(value)
}

fn get_property(object: &Value, name: &Token) -> Result<Value> {
    match object {
        Value::Instance(instance) => instance.get(name),
        Value::Class(class) => class.get(name),
        _ => Err(LoxError::runtime(name, "Only instances have properties.")),
    }
}

fn index_value(bracket: &Token, target: &Value, index: &Value) -> Result<Value> {
    let Value::Number(n) = index else {
        return Err(LoxError::runtime(bracket, "Index must be a number."));
    };

    // truncate toward zero; negative indices are out of range
    let i: i64 = *n as i64;

    match target {
        Value::Array(elements) => usize::try_from(i)
            .ok()
            .and_then(|i| elements.borrow().get(i).cloned())
            .ok_or_else(|| LoxError::runtime(bracket, "Array index out of bounds.")),

        Value::String(s) => usize::try_from(i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::string(c.to_string()))
            .ok_or_else(|| LoxError::runtime(bracket, "String index out of bounds.")),

        _ => Err(LoxError::runtime(
            bracket,
            "Can only index into arrays or strings.",
        )),
    }
}
