//! Classes, metaclasses and instances.
//!
//! A class value plays two roles.  Called, it constructs instances.  Used as
//! an object (`Point.origin()`), it behaves like an instance of its metaclass:
//! properties come from its own field map first, then from the metaclass's
//! methods bound to the class itself.  Instance lookup never consults the
//! metaclass and metaclass lookup never consults instance methods.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::callable::{Callable, LoxFunction};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

pub struct LoxClass {
    name: String,
    metaclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
    /// State stored on the class value itself (`Counter.total = 0`).
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxClass {
    pub fn new(
        name: impl Into<String>,
        metaclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name: name.into(),
            metaclass,
            methods,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned()
    }

    /// Property read on the class value: own fields, then class‑level methods
    /// bound with `this` = the class.
    pub fn get(self: &Rc<Self>, name: &Token) -> Result<Value> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = self
            .metaclass
            .as_ref()
            .and_then(|meta| meta.find_method(&name.lexeme));

        match method {
            Some(method) => {
                debug!("Binding class method '{}.{}'", self.name, name.lexeme);
                Ok(Value::Function(Rc::new(
                    method.bind(Value::Class(Rc::clone(self))),
                )))
            }
            None => Err(undefined_property(name)),
        }
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

/// Calling a class constructs an instance and runs `init` on it, if present.
impl Callable for Rc<LoxClass> {
    fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Constructing instance of '{}'", self.name);

        let instance: Value = Value::Instance(Rc::new(LoxInstance::new(Rc::clone(self))));

        if let Some(initializer) = self.find_method("init") {
            initializer
                .bind(instance.clone())
                .call(interpreter, paren, arguments)?;
        }

        Ok(instance)
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    /// Fields shadow methods; methods are bound afresh on every access.
    pub fn get(self: &Rc<Self>, name: &Token) -> Result<Value> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        match self.class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(
                method.bind(Value::Instance(Rc::clone(self))),
            ))),
            None => Err(undefined_property(name)),
        }
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

fn undefined_property(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined property '{}'.", name.lexeme))
}
