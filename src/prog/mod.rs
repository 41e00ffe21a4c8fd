/*!
## Rust Program Module

This Rust module reads and writes compiled QuakeC programs.

## Program images

A progs image is a little-endian file: a fixed header of section
offsets and counts followed by statements, global and field definitions,
function descriptors, a string table and the initial global words.
`Image::parse` validates and normalises it; `ImageBuilder` writes one.

## Debug symbols

An optional companion file maps statements to source lines and names
function locals. It carries the CRC of the image it was built against.

*/

/// A statement index, or a cell offset in the flat address space.
pub type Address = u32;

mod builder;
mod debug;
mod error;
mod format;
mod image;
mod opcode;
mod types;

#[cfg(test)]
mod tests;

pub use builder::{Func, ImageBuilder, RESERVED_OFS};
pub use debug::{AuxFunction, DebugBuilder, DebugInfo, Lineno, PROG_DEBUG_VERSION};
pub use error::{Error, ErrorCode, ErrorKind};
pub use format::{
    crc16, version_string, Def, FunctionDef, Header, Lump, Statement, MAX_PARMS,
    PROG_ID_VERSION, PROG_V6P_VERSION,
};
pub use image::Image;
pub use opcode::{Opcode, OpcodeInfo, Version, OP_BREAK};
pub use types::{Etype, DEF_SAVEGLOBAL};
