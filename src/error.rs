//! Centralised error hierarchy for the **Rox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, module loader) convert
//! their failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow` in the binary, while still preserving rich diagnostic detail.
//!
//! Static errors (`Lex`, `Parse`, `Resolve`, `Module`) stop a unit before it
//! runs; `Runtime` aborts the unit that is executing.  `return` and `break`
//! are *not* errors and never travel through this type.
//!
//! The module **does not** print diagnostics itself

use std::io;
use thiserror::Error;

use log::info;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    Parse {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Static‑analysis or resolution failure (e.g. self‑referencing initializer).
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    Resolve {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Runtime evaluation error, anchored at the offending token.
    #[error("{message}\n[line {line}]")]
    Runtime {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// A static error raised while loading an imported module.
    #[error("in module '{path}': {source}")]
    Module {
        path: String,
        #[source]
        source: Box<LoxError>,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            lexeme: token.lexeme.clone(),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            lexeme: token.lexeme.clone(),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            lexeme: token.lexeme.clone(),
            line: token.line,
        }
    }

    /// Wrap a static error that surfaced while loading `path`.
    pub fn module<S: Into<String>>(path: S, source: LoxError) -> Self {
        LoxError::Module {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// `true` for errors that prevent a unit from executing at all.
    pub fn is_static(&self) -> bool {
        match self {
            LoxError::Lex { .. }
            | LoxError::Parse { .. }
            | LoxError::Resolve { .. }
            | LoxError::Utf8(_) => true,
            LoxError::Module { source, .. } => source.is_static(),
            _ => false,
        }
    }

    /// Message text without the location decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            LoxError::Module { source, .. } => source.message(),
            other => other.to_string(),
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
