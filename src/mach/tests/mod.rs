use super::*;
use crate::prog::{ErrorCode, Etype, Func, ImageBuilder, Opcode as Op, PROG_ID_VERSION, PROG_V6P_VERSION};
use std::io::Write;
use std::sync::{Arc, Mutex};

mod debugger_test;
mod edict_test;
mod property_test;

fn load(b: &ImageBuilder) -> Progs {
    load_with(b, Config::default())
}

fn load_with(b: &ImageBuilder, config: Config) -> Progs {
    let mut progs = Progs::new(config);
    progs.set_output(Box::new(std::io::sink()));
    if let Err(e) = progs.load(&b.build()) {
        panic!("{}", e);
    }
    progs
}

/// An image with one field and a `main` that returns nothing.
fn with_fields(version: u32, fields: &[(&str, Etype)]) -> (ImageBuilder, Func) {
    let mut b = ImageBuilder::new(version);
    for &(name, etype) in fields {
        b.field(name, etype);
    }
    let main = b.function("main", &[], &[]);
    b.statement(Op::Return, 0, 0, 0);
    (b, main)
}

/// Collects what the VM prints.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
