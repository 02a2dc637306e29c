use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope.  Closures, bound methods and active frames all
/// hold one, so a scope lives exactly as long as something still reaches it.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Fresh root scope, already wrapped for sharing.
    pub fn new_ref() -> EnvRef {
        Rc::new(RefCell::new(Environment::new()))
    }

    /// Fresh child scope of `enclosing`, already wrapped for sharing.
    pub fn child_of(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    /// Insert or overwrite in this frame only.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Read `name` from this frame only, without walking outwards.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Snapshot of this frame's own bindings.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Walk exactly `distance` parent links.  `None` means the chain is
    /// shorter than the resolver promised.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: EnvRef = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Resolver‑backed read: exactly `distance` hops, then this frame only.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        debug!("get_at distance={} name={}", distance, name);

        Environment::ancestor(env, distance)?.borrow().get_local(name)
    }

    /// Resolver‑backed write: exactly `distance` hops, then this frame only.
    /// Returns `false` if the frame does not exist.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &str, value: Value) -> bool {
        debug!("assign_at distance={} name={}", distance, name);

        match Environment::ancestor(env, distance) {
            Some(frame) => {
                frame.borrow_mut().define(name, value);
                true
            }
            None => false,
        }
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn get_walks_to_enclosing_scope() {
        let globals = Environment::new_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner = Environment::child_of(&globals);

        let value = inner.borrow().get(&ident("a")).unwrap();
        assert_eq!(value.to_string(), "1");
    }

    #[test]
    fn assign_updates_declaring_frame() {
        let globals = Environment::new_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::child_of(&globals);

        inner
            .borrow_mut()
            .assign(&ident("a"), Value::Number(2.0))
            .unwrap();

        assert!(inner.borrow().get_local("a").is_none());
        assert_eq!(globals.borrow().get_local("a").unwrap().to_string(), "2");
    }

    #[test]
    fn undefined_names_fail() {
        let globals = Environment::new_ref();

        let err = globals.borrow().get(&ident("missing")).unwrap_err();
        assert!(err.to_string().contains("Undefined variable 'missing'."));

        let err = globals
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .unwrap_err();
        assert!(err.to_string().contains("Undefined variable"));
    }

    #[test]
    fn get_at_does_not_fall_back() {
        let globals = Environment::new_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let middle = Environment::child_of(&globals);
        let inner = Environment::child_of(&middle);

        assert!(Environment::get_at(&inner, 2, "a").is_some());
        assert!(Environment::get_at(&inner, 1, "a").is_none());
        assert!(Environment::get_at(&inner, 3, "a").is_none());
    }

    #[test]
    fn assign_at_writes_the_exact_frame() {
        let globals = Environment::new_ref();
        let inner = Environment::child_of(&globals);

        assert!(Environment::assign_at(&inner, 1, "x", Value::Bool(true)));
        assert_eq!(globals.borrow().get_local("x").unwrap().to_string(), "true");
        assert!(!Environment::assign_at(&inner, 5, "x", Value::Nil));
    }
}
