//! # qcvm
//!
//! Runs a function from a QuakeC progs image.
//!

mod term;

fn main() {
    term::main();
}
