/*!
## Rust Machine Module

This Rust module is a virtual machine for QuakeC progs.

## Memory

A loaded image gets one flat array of 32-bit cells: the globals, then
every edict's fields, then the zone heap and finally the push/pop stack.
Each region starts on a 64-cell boundary. Bytecode addresses cells by
offset and never sees a native pointer.

## Execution

`Progs::execute` runs a function until it returns to the depth it was
called at. Builtins are plain Rust functions that read their parameters
from the VM and may call back into it. A runtime error either goes to the
installed debug handler or unwinds and is returned as fatal.

*/

mod abi;
mod builtins;
mod call;
pub mod cmds;
mod config;
mod debugger;
mod edict;
mod exec;
mod memory;
mod operation;
mod progs;
mod resources;
mod stack;
mod strings;
mod zone;

#[cfg(test)]
mod tests;

pub use abi::{check_statements, Abi, Symbols, LEGACY_PARAM_SIZE};
pub use builtins::{Builtin, BuiltinFn, BuiltinId, Builtins, AUTO_BUILTIN_BASE};
pub use call::CallFrame;
pub use config::{
    AllocateFn, BiMapFn, Config, EdictFn, FaultPolicy, FreeFn, Hooks, LoadFileFn, ResolveFn,
};
pub use debugger::{DebugEvent, DebugHandler, Resume, Watch};
pub use edict::{EdictCount, EdictHeader, Edicts};
pub use memory::{float_string, Memory, Ptr, Value, Word};
pub use operation::{Operation, Quat, Vec3};
pub use progs::{Entry, Function, Layout, LoadFn, Progs};
pub use resources::{Resource, Resources};
pub use stack::Stack;
pub use strings::{StringKind, Strings};
pub use zone::{BlockInfo, Zone, ZoneErrorFn, ZoneStats};
