use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::callable::{Callable, LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance};

/// Runtime value.  Everything except numbers, booleans and strings is a
/// shared reference: copying a `Value` aliases arrays, functions, classes
/// and instances rather than duplicating them.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,

    /// Bound by `var x;`.  Reads yield it, and it behaves as `nil` everywhere
    /// user code can observe it.
    Uninitialized,

    Bool(bool),

    Number(f64),

    String(Rc<str>),

    Array(Rc<RefCell<Vec<Value>>>),

    Function(Rc<LoxFunction>),

    Native(Rc<NativeFunction>),

    Class(Rc<LoxClass>),

    Instance(Rc<LoxInstance>),
}

impl Value {
    pub fn string<S: AsRef<str>>(s: S) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    /// `nil`, the uninitialized sentinel and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil | Value::Uninitialized => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil | Value::Uninitialized)
    }

    /// Language equality: `nil` only equals `nil`; numbers, strings and
    /// booleans compare by value; everything else by identity.
    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nil() || b.is_nil() => a.is_nil() && b.is_nil(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The value's uniform call contract, if it has one.
    pub fn as_callable(&self) -> Option<&dyn Callable> {
        let callable: &dyn Callable = match self {
            Value::Function(f) => &**f,
            Value::Native(n) => &**n,
            Value::Class(c) => c,
            _ => return None,
        };

        Some(callable)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil | Value::Uninitialized => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
            }

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Native(_) => write!(f, "<native fn>"),

            Value::Class(class) => write!(f, "{}", class.name()),

            Value::Instance(instance) => write!(f, "{} instance", instance.class().name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-2.5).to_string(), "-2.5");
    }

    #[test]
    fn infinities_print_like_the_language() {
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn uninitialized_renders_and_behaves_as_nil() {
        let sentinel = Value::Uninitialized;

        assert_eq!(sentinel.to_string(), "nil");
        assert!(!sentinel.is_truthy());
        assert!(sentinel.is_equal(&Value::Nil));
        assert!(!sentinel.is_equal(&Value::Bool(false)));
    }

    #[test]
    fn arrays_print_their_elements() {
        let v = Value::array(vec![
            Value::Number(1.0),
            Value::string("a"),
            Value::array(vec![Value::Nil]),
        ]);

        assert_eq!(v.to_string(), "[1, a, [nil]]");
    }

    #[test]
    fn arrays_compare_by_identity() {
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(1.0)]);

        assert!(a.is_equal(&a.clone()));
        assert!(!a.is_equal(&b));
    }

    #[test]
    fn zero_and_empty_string_are_truthy() {
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }
}
