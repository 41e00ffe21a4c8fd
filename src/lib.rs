//! # QuakeC VM
//!
//! A virtual machine for compiled QuakeC: the `progs.dat` images that
//! Quake-family engines load for their game logic.
//!
//! Load an image into a `Progs`, register the builtins it calls, then
//! run its functions with `execute`.
//! ```
//! use qcvm::mach::{Config, Progs, Value};
//! use qcvm::prog::{Etype, ImageBuilder, Opcode, PROG_ID_VERSION};
//!
//! let mut b = ImageBuilder::new(PROG_ID_VERSION);
//! let answer = b.float("answer", 42.0);
//! b.function("main", &[], &[]);
//! b.statement(Opcode::Return, answer, 0, 0);
//! let mut progs = Progs::new(Config::default());
//! progs.load(&b.build()).unwrap();
//! progs.call_by_name("main", &[]).unwrap();
//! assert_eq!(progs.return_value::<f32>().unwrap(), 42.0);
//! ```
//!
//! The `qcvm` binary does the same from the command line and has an
//! interactive debugger.

pub mod mach;
pub mod prog;
