//! File‑based modules.
//!
//! `import "path";` loads a unit of source through a [`ModuleLoader`], runs it
//! once in its own top‑level scope (a child of the natives scope), and copies
//! every top‑level binding of that scope into the importing scope.  Later
//! imports of the same path skip execution and only copy again, so importers
//! see a snapshot taken at their own import.
//!
//! `export <declaration>` additionally records the declared name in the
//! module's export table.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::mem;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::Stmt;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::token::Token;
use crate::value::Value;

/// Source of module text, keyed by the path written after `import`.
pub trait ModuleLoader {
    fn load(&self, path: &str) -> io::Result<String>;
}

/// Reads modules from disk, relative to `root`.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ModuleLoader for FsLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        let full_path: PathBuf = self.root.join(path);
        debug!("Reading module source from {}", full_path.display());

        fs::read_to_string(full_path)
    }
}

/// Serves modules from an in‑memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        self.sources.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no module at '{}'", path))
        })
    }
}

/// A loaded module: its top‑level scope and what it exported.
struct Module {
    environment: EnvRef,
    exports: HashMap<String, Value>,
}

/// The session's module table plus the loader feeding it.
pub struct ModuleSystem {
    loader: Box<dyn ModuleLoader>,
    modules: HashMap<String, Module>,
}

impl ModuleSystem {
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            modules: HashMap::new(),
        }
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    fn environment(&self, path: &str) -> Option<EnvRef> {
        self.modules
            .get(path)
            .map(|module| Rc::clone(&module.environment))
    }
}

impl Interpreter {
    /// Execute `import "path";` in the current scope.
    pub(crate) fn import_module(&mut self, keyword: &Token, path: &str) -> Result<()> {
        if self.modules.is_loaded(path) {
            debug!("Module '{}' already loaded; splicing only", path);
        } else {
            self.load_module(keyword, path)?;
        }

        self.splice_module(path);
        Ok(())
    }

    /// Record a top‑level `export` of the module currently executing.
    pub(crate) fn export_binding(&mut self, name: &str, value: Value) {
        let Some(path) = self.current_module.as_deref() else {
            debug!("Export of '{}' outside a module; nothing to record", name);
            return;
        };

        if let Some(module) = self.modules.modules.get_mut(path) {
            debug!("Module '{}' exports '{}'", path, name);
            module.exports.insert(name.to_string(), value);
        }
    }

    /// Exported names of a loaded module, sorted.  `None` if `path` was never
    /// imported.
    pub fn module_exports(&self, path: &str) -> Option<Vec<String>> {
        let module: &Module = self.modules.modules.get(path)?;

        let mut names: Vec<String> = module.exports.keys().cloned().collect();
        names.sort();

        Some(names)
    }

    fn load_module(&mut self, keyword: &Token, path: &str) -> Result<()> {
        info!("Loading module '{}'", path);

        let source: String = self.modules.loader.load(path).map_err(|err| {
            debug!("Loader failed for '{}': {}", path, err);
            LoxError::runtime(keyword, format!("Could not import module '{}'.", path))
        })?;

        let statements: Vec<Stmt> = scan_tokens(source.as_bytes())
            .and_then(|tokens| Parser::new(tokens).parse())
            .map_err(|err| LoxError::module(path, err))?;

        Resolver::new(self)
            .resolve(&statements)
            .map_err(|err| LoxError::module(path, err))?;

        let module_env: EnvRef = Environment::child_of(&self.globals);

        // registered before running so a cyclic import finds it
        self.modules.modules.insert(
            path.to_string(),
            Module {
                environment: Rc::clone(&module_env),
                exports: HashMap::new(),
            },
        );

        let previous_env: EnvRef = mem::replace(&mut self.environment, Rc::clone(&module_env));
        let previous_globals: EnvRef = mem::replace(&mut self.unit_globals, module_env);
        let previous_module: Option<String> = self.current_module.replace(path.to_string());

        let result: Result<()> = self.interpret(&statements);

        self.environment = previous_env;
        self.unit_globals = previous_globals;
        self.current_module = previous_module;

        if result.is_ok() {
            info!("Module '{}' loaded", path);
        }

        result
    }

    /// Copy the module's top‑level bindings into the current scope.  Untagged
    /// functions are rewrapped with the module scope as their global frame;
    /// tagged ones keep the module they came from.
    fn splice_module(&mut self, path: &str) {
        let Some(module_env) = self.modules.environment(path) else {
            return;
        };

        let bindings: Vec<(String, Value)> = module_env.borrow().bindings();
        debug!("Splicing {} binding(s) from '{}'", bindings.len(), path);

        for (name, value) in bindings {
            let value: Value = match value {
                Value::Function(function) if function.module_env().is_none() => {
                    Value::Function(Rc::new(function.with_module(Rc::clone(&module_env))))
                }
                other => other,
            };

            self.environment.borrow_mut().define(&name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_loader_reports_missing_paths() {
        let loader = MemoryLoader::new().with_module("a.lox", "var a = 1;");

        assert_eq!(loader.load("a.lox").ok().as_deref(), Some("var a = 1;"));
        assert_eq!(
            loader.load("b.lox").map_err(|e| e.kind()).err(),
            Some(io::ErrorKind::NotFound)
        );
    }
}
