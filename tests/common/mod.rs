#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::module::MemoryLoader;

/// `Write` sink whose contents stay readable after the interpreter takes it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Session printing into a fresh buffer, importing from `loader`.
pub fn session_with(loader: MemoryLoader) -> (Interpreter, SharedBuffer) {
    let out = SharedBuffer::default();
    let interpreter = Interpreter::new()
        .with_output(Box::new(out.clone()))
        .with_loader(Box::new(loader));

    (interpreter, out)
}

pub fn session() -> (Interpreter, SharedBuffer) {
    session_with(MemoryLoader::new())
}

/// Run `source` in a fresh session; printed lines on success.
pub fn run(source: &str) -> Result<Vec<String>, LoxError> {
    let (mut interpreter, out) = session();
    interpreter.run_source(source)?;
    Ok(out.lines())
}

/// Run `source` expecting success; printed lines.
pub fn output_of(source: &str) -> Vec<String> {
    match run(source) {
        Ok(lines) => lines,
        Err(e) => panic!("program failed: {}", e),
    }
}

/// Run `source` expecting failure; printed lines before the failure and the error.
pub fn failure_of(source: &str) -> (Vec<String>, LoxError) {
    let (mut interpreter, out) = session();
    match interpreter.run_source(source) {
        Ok(()) => panic!("program unexpectedly succeeded: {:?}", out.lines()),
        Err(e) => (out.lines(), e),
    }
}
