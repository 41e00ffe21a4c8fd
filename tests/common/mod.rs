#![allow(dead_code)]
use qcvm::mach::{cmds, Config, Progs};
use qcvm::prog::{Etype, ImageBuilder, Opcode};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Collects what the VM prints.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
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

/// A VM with the stock builtins, `b` loaded and output captured.
pub fn stock(b: &ImageBuilder, seed: Option<u64>) -> (Progs, Capture) {
    let capture = Capture::default();
    let mut progs = Progs::new(Config::default());
    progs.set_output(Box::new(capture.clone()));
    cmds::register(&mut progs, seed).unwrap();
    if let Err(e) = progs.load(&b.build()) {
        panic!("{}", e);
    }
    (progs, capture)
}

/// Declares builtin `name` by number and the global that refers to it.
pub fn builtin(b: &mut ImageBuilder, name: &str, id: i32, numparams: i32) -> u16 {
    let index = b.builtin(name, id, numparams);
    b.func_global(name, index)
}

/// Stores each argument into its parameter, then calls `func`.
pub fn call(b: &mut ImageBuilder, func: u16, args: &[(Opcode, u16)]) {
    for (i, &(store, ofs)) in args.iter().enumerate() {
        let p = b.param_ofs(i);
        b.statement(store, ofs, p, 0);
    }
    let op = Opcode::from_u16(Opcode::Call0 as u16 + args.len() as u16).unwrap();
    b.statement(op, func, 0, 0);
}

/// Ends `main` by returning whatever the last call returned.
pub fn return_result(b: &mut ImageBuilder) {
    let ret = b.return_ofs();
    b.statement(Opcode::Return, ret, 0, 0);
}

pub fn returned_string(progs: &Progs) -> String {
    let handle = progs.return_value::<i32>().unwrap();
    progs.string(handle).unwrap().into_owned()
}

/// An image with a `classname` field, and the global holding its offset.
pub fn with_classname() -> (ImageBuilder, u16) {
    let mut b = ImageBuilder::new(qcvm::prog::PROG_ID_VERSION);
    let classname = b.field("classname", Etype::String);
    (b, classname)
}

/// A fresh directory under the system temp dir.
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("qcvm-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
