use super::Progs;
use crate::prog::Error;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, Error>;

/// What integer division, `mod` and `rem` do with a zero divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Raise a runtime error.
    Fatal,
    /// Substitute a fixed result and carry on.
    IeeeFixup,
}

impl Default for FaultPolicy {
    fn default() -> FaultPolicy {
        FaultPolicy::Fatal
    }
}

/// ## VM settings
///
/// Sizes are in cells.

#[derive(Debug, Clone)]
pub struct Config {
    pub bounds_check: bool,
    /// Refuse `address` on the world entity.
    pub null_bad: bool,
    /// Fill freed edicts with `0xdeadbeef` instead of zero.
    pub deadbeef_ents: bool,
    /// Fill a callee's locals with `0xdeadbeef` before copying arguments.
    pub deadbeef_locals: bool,
    pub fault_policy: FaultPolicy,
    /// Statements one `execute` may run; 0 is unlimited.
    pub max_statements: u64,
    pub max_edicts: u32,
    /// Edicts after the world that `alloc_edict` never hands out.
    pub reserved_edicts: u32,
    pub zone_size: u32,
    pub stack_size: u32,
    pub max_call_depth: usize,
    pub locals_stack_size: usize,
    /// Bind unknown builtins to a stub that fails when called.
    pub permissive_builtins: bool,
    pub load_debug: bool,
    /// Where source files named by the debug info are looked for.
    pub source_path: PathBuf,
    /// Reject images whose header CRC differs.
    pub required_crc: Option<u32>,
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bounds_check: true,
            null_bad: false,
            deadbeef_ents: false,
            deadbeef_locals: false,
            fault_policy: FaultPolicy::Fatal,
            max_statements: 1_000_000,
            max_edicts: 768,
            reserved_edicts: 0,
            zone_size: 0,
            stack_size: 0,
            max_call_depth: 64,
            locals_stack_size: 4096,
            permissive_builtins: false,
            load_debug: true,
            source_path: PathBuf::from("."),
            required_crc: None,
            trace: false,
        }
    }
}

pub type LoadFileFn = fn(&Path) -> std::io::Result<Vec<u8>>;
pub type AllocateFn = fn(usize) -> Option<Vec<u32>>;
pub type FreeFn = fn(Vec<u32>);
pub type EdictFn = fn(&mut Progs, usize) -> Result<()>;
pub type BiMapFn = fn(i32) -> i32;
pub type ResolveFn = fn(&mut Progs) -> Result<()>;

fn load_file(path: &Path) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

fn allocate(cells: usize) -> Option<Vec<u32>> {
    let mut v = Vec::new();
    v.try_reserve_exact(cells).ok()?;
    v.resize(cells, 0);
    Some(v)
}

fn free(_cells: Vec<u32>) {}

/// ## Host collaborators
///
/// `unlink` takes an edict out of the host's world before it is freed;
/// `free_edict`, when set, replaces the default clearing of its fields.
/// `bi_map` renumbers builtin ids found in the image and `resolve` runs
/// after the VM has found its own globals.

#[derive(Clone, Copy)]
pub struct Hooks {
    pub load_file: LoadFileFn,
    pub allocate: AllocateFn,
    pub free: FreeFn,
    pub unlink: Option<EdictFn>,
    pub free_edict: Option<EdictFn>,
    pub bi_map: Option<BiMapFn>,
    pub resolve: Option<ResolveFn>,
}

impl Default for Hooks {
    fn default() -> Hooks {
        Hooks {
            load_file,
            allocate,
            free,
            unlink: None,
            free_edict: None,
            bi_map: None,
            resolve: None,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Hooks {{ unlink: {}, free_edict: {}, bi_map: {}, resolve: {} }}",
            self.unlink.is_some(),
            self.free_edict.is_some(),
            self.bi_map.is_some(),
            self.resolve.is_some()
        )
    }
}
