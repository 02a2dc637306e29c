//! Rox: a tree‑walking interpreter for a small dynamically typed scripting
//! language with closures, classes, arrays and file‑based modules.
//!
//! Pipeline: [`scanner`] → [`parser`] → [`resolver`] → [`interpreter`].
//! The [`interpreter::Interpreter`] is the session object tying them together.

pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod module;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;
