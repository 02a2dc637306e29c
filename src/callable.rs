//! The uniform call contract and its two function‑shaped implementors:
//! user functions/methods (closures) and native built‑ins.  Classes are the
//! third implementor, see [`crate::class`].

use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Anything that can appear to the left of `( … )`.
pub trait Callable {
    /// Exact number of arguments the call must supply.
    fn arity(&self) -> usize;

    /// Invoke with already‑evaluated, arity‑checked arguments.  `paren` is the
    /// call site's closing parenthesis, used to anchor runtime errors.
    fn call(&self, interpreter: &mut Interpreter, paren: &Token, arguments: Vec<Value>)
        -> Result<Value>;
}

// ─────────────────────────────────────────────────────────────────────────────
// User functions
// ─────────────────────────────────────────────────────────────────────────────

/// A function declaration paired with the scope it was defined in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
    /// Top‑level scope of the module the function came from.  Unresolved
    /// (global) names inside the body are looked up there.
    module_env: Option<EnvRef>,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: EnvRef,
        is_initializer: bool,
        module_env: Option<EnvRef>,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
            module_env,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn is_getter(&self) -> bool {
        self.declaration.is_getter()
    }

    pub fn module_env(&self) -> Option<&EnvRef> {
        self.module_env.as_ref()
    }

    /// New closure over a one‑binding scope holding `this`.  The receiver is
    /// left untouched.
    pub fn bind(&self, this: Value) -> LoxFunction {
        let environment: EnvRef = Environment::child_of(&self.closure);
        environment.borrow_mut().define("this", this);

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
            module_env: self.module_env.clone(),
        }
    }

    /// Same declaration and closure, tagged with the module it was imported from.
    pub fn with_module(&self, module_env: EnvRef) -> LoxFunction {
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::clone(&self.closure),
            is_initializer: self.is_initializer,
            module_env: Some(module_env),
        }
    }

    fn bound_this(&self, paren: &Token) -> Result<Value> {
        Environment::get_at(&self.closure, 0, "this").ok_or_else(|| {
            LoxError::runtime(paren, "Initializer called without a bound instance.")
        })
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.arity()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        let environment: EnvRef = Environment::child_of(&self.closure);

        for (param, argument) in self.declaration.params().iter().zip(arguments) {
            debug!("Binding parameter '{}' to {}", param.lexeme, argument);
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        let flow: Flow =
            interpreter.execute_body(&self.declaration.body, environment, self.module_env.as_ref())?;

        if self.is_initializer {
            return self.bound_this(paren);
        }

        match flow {
            Flow::Return(value) => {
                debug!("Function '{}' returned: {}", self.name(), value);
                Ok(value)
            }
            Flow::Normal | Flow::Break => Ok(Value::Nil),
        }
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────────

pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

/// Built‑in implemented in Rust.  Failures are plain messages that the call
/// site turns into runtime errors.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        let result: Value =
            (self.func)(&arguments).map_err(|message| LoxError::runtime(paren, message))?;

        info!("Native function '{}' returned: {}", self.name, result);

        Ok(result)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// The functions every session starts with.
pub fn natives() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            func: clock,
        },
        NativeFunction {
            name: "error",
            arity: 1,
            func: error,
        },
        NativeFunction {
            name: "len",
            arity: 1,
            func: len,
        },
    ]
}

/// Seconds since the Unix epoch, millisecond resolution.
fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    Ok(Value::Number(Utc::now().timestamp_millis() as f64 / 1000.0))
}

fn error(args: &[Value]) -> std::result::Result<Value, String> {
    match args.first() {
        Some(message) => Err(message.to_string()),
        None => Err("Error thrown with no message.".to_string()),
    }
}

fn len(args: &[Value]) -> std::result::Result<Value, String> {
    match args.first() {
        Some(Value::Number(_)) => {
            Err("Argument to 'len' must be a string or an array.".to_string())
        }
        Some(Value::Array(elements)) => Ok(Value::Number(elements.borrow().len() as f64)),
        Some(other) => Ok(Value::Number(other.to_string().chars().count() as f64)),
        None => Err("Expected 1 arguments but got 0.".to_string()),
    }
}
