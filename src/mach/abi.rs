use crate::error;
use crate::prog::{Def, Error, Etype, Image, Opcode, Statement, Version, MAX_PARMS, OP_BREAK};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Error>;

/// Legacy images pass each parameter in three cells.
pub const LEGACY_PARAM_SIZE: u32 = 3;
const LEGACY_RETURN: u32 = 1;
const LEGACY_PARAM_0: u32 = 4;

/// ## Name indices
///
/// Rebuilt on every load. The first function with a name wins, which
/// matters for `.ctor`: those are found by scanning instead.

#[derive(Debug, Clone, Default)]
pub struct Symbols {
    pub functions: HashMap<String, usize>,
    pub globals: HashMap<String, Def>,
    pub fields: HashMap<String, Def>,
    global_names: HashMap<u16, String>,
}

impl Symbols {
    pub fn build(image: &Image) -> Symbols {
        let mut symbols = Symbols::default();
        for (i, f) in image.functions.iter().enumerate().skip(1) {
            symbols
                .functions
                .entry(image.string(f.name).into_owned())
                .or_insert(i);
        }
        for def in &image.globaldefs {
            let name = image.string(def.name).into_owned();
            symbols
                .global_names
                .entry(def.offset)
                .or_insert_with(|| name.clone());
            symbols.globals.entry(name).or_insert(*def);
        }
        for def in &image.fielddefs {
            symbols
                .fields
                .entry(image.string(def.name).into_owned())
                .or_insert(*def);
        }
        symbols
    }

    /// Name of the global starting at `ofs`.
    pub fn global_name(&self, ofs: u16) -> Option<&str> {
        self.global_names.get(&ofs).map(|s| s.as_str())
    }
}

/// ## Calling convention and well-known globals
///
/// Everything the interpreter needs to find by name, resolved once per
/// load. A missing required symbol fails the load.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abi {
    pub extended: bool,
    pub return_ofs: u32,
    pub param_ofs: [u32; MAX_PARMS],
    pub param_size: u32,
    /// log2 cells.
    pub param_alignment: u32,
    pub self_ofs: u32,
    pub time_ofs: u32,
    pub stack_ofs: Option<u32>,
    pub nextthink: Option<u32>,
    pub frame: Option<u32>,
    pub think: Option<u32>,
    /// What the original comparison opcodes store for true.
    pub true_bits: u32,
}

fn required(symbols: &Symbols, names: &[&str]) -> Result<u32> {
    for name in names {
        if let Some(def) = symbols.globals.get(*name) {
            return Ok(def.offset as u32);
        }
    }
    Err(error!(MissingSymbol; "unable to find {}", names[0]))
}

impl Abi {
    pub fn resolve(image: &Image, symbols: &Symbols) -> Result<Abi> {
        let mut abi = Abi {
            self_ofs: required(symbols, &["self", ".self"])?,
            time_ofs: required(symbols, &["time"])?,
            stack_ofs: symbols.globals.get(".stack").map(|d| d.offset as u32),
            nextthink: symbols.fields.get("nextthink").map(|d| d.offset as u32),
            frame: symbols.fields.get("frame").map(|d| d.offset as u32),
            think: symbols.fields.get("think").map(|d| d.offset as u32),
            ..Abi::default()
        };
        if image.instruction_set() == Version::Id {
            abi.return_ofs = LEGACY_RETURN;
            for (i, ofs) in abi.param_ofs.iter_mut().enumerate() {
                *ofs = LEGACY_PARAM_0 + LEGACY_PARAM_SIZE * i as u32;
            }
            abi.param_size = LEGACY_PARAM_SIZE;
            abi.true_bits = 1.0f32.to_bits();
            return Ok(abi);
        }

        abi.extended = true;
        abi.true_bits = 1;
        abi.return_ofs = required(symbols, &[".return"])?;
        for (i, ofs) in abi.param_ofs.iter_mut().enumerate() {
            *ofs = required(symbols, &[&format!(".param_{}", i)])?;
        }
        let word = |name: &str, default: u32| match symbols.globals.get(name) {
            Some(def) => image
                .globals
                .get(def.offset as usize)
                .copied()
                .unwrap_or(default),
            None => default,
        };
        abi.param_size = word(".param_size", LEGACY_PARAM_SIZE);
        abi.param_alignment = word(".param_alignment", 0);
        if abi.param_size == 0 || abi.param_size > 32 {
            return Err(error!(Malformed; "parameter size {} is out of range", abi.param_size));
        }
        if abi.param_alignment > 7 {
            return Err(error!(Malformed;
                "parameter alignment {} is out of range",
                abi.param_alignment
            ));
        }
        Ok(abi)
    }

    pub fn has_state_fields(&self) -> bool {
        self.nextthink.is_some() && self.frame.is_some() && self.think.is_some()
    }
}

/// ## Load-time statement checks
///
/// After these pass, the interpreter may assume every opcode is known
/// and every typed operand lies inside the globals.

pub fn check_statements(image: &Image, abi: &Abi) -> Result<()> {
    let numglobals = image.globals.len() as u32;
    let numstatements = image.statements.len() as i64;
    let version = image.instruction_set();
    for (addr, st) in image.statements.iter().enumerate() {
        let addr = addr as u32;
        let op = match Opcode::from_u16(st.op & !OP_BREAK) {
            Some(op) => op,
            None => return Err(error!(BadStatement, addr; "unknown opcode {}", st.op & !OP_BREAK)),
        };
        let info = op.info();
        if info.version > version {
            return Err(error!(BadStatement, addr;
                "{} is not allowed in a version {} image",
                op.opname(),
                image.version()
            ));
        }
        let check = |operand: u16, size: u32, which: char| -> Result<()> {
            if operand as u32 + size > numglobals {
                Err(error!(BadStatement, addr;
                    "{} operand {} out of range: {} + {} > {}",
                    op.opname(),
                    which,
                    operand,
                    size,
                    numglobals
                ))
            } else {
                Ok(())
            }
        };
        let branch = |delta: u16| -> Result<()> {
            let target = addr as i64 + delta as i16 as i64;
            if target < 0 || target >= numstatements {
                Err(error!(BadStatement, addr;
                    "{} branch to {} is outside the statements",
                    op.opname(),
                    target
                ))
            } else {
                Ok(())
            }
        };
        match op {
            Opcode::Done | Opcode::Return => {
                check(st.a, 1, 'a')?;
                check(st.b, 0, 'b')?;
                check(st.c, 0, 'c')?;
                continue;
            }
            Opcode::Goto => {
                branch(st.a)?;
                check_none(st, op, addr, [false, true, true])?;
                continue;
            }
            Opcode::If
            | Opcode::Ifnot
            | Opcode::Ifbe
            | Opcode::Ifb
            | Opcode::Ifae
            | Opcode::Ifa => {
                check(st.a, 1, 'a')?;
                branch(st.b)?;
                check_none(st, op, addr, [false, false, true])?;
                continue;
            }
            Opcode::Movei => {
                check(st.a, st.b as u32, 'a')?;
                check(st.c, st.b as u32, 'c')?;
                continue;
            }
            Opcode::Memseti => {
                check(st.a, 1, 'a')?;
                check(st.c, st.b as u32, 'c')?;
                continue;
            }
            Opcode::State | Opcode::StateF => {
                if !abi.has_state_fields() {
                    return Err(error!(BadStatement, addr;
                        "{} needs the nextthink, frame and think fields",
                        op.opname()
                    ));
                }
            }
            _ => {}
        }
        if op.is_push_pop() && abi.stack_ofs.is_none() {
            return Err(error!(BadStatement, addr; "{} needs a .stack global", op.opname()));
        }
        let operands = [st.a, st.b, st.c];
        for (i, (&operand, &etype)) in operands.iter().zip(info.types.iter()).enumerate() {
            let which = (b'a' + i as u8) as char;
            match etype {
                Etype::Invalid => {
                    if operand != 0 {
                        return Err(error!(BadStatement, addr;
                            "{} has a non-zero operand {}",
                            op.opname(),
                            which
                        ));
                    }
                }
                Etype::Short => {}
                Etype::Void => check(operand, if operand == 0 { 0 } else { 1 }, which)?,
                _ => check(operand, etype.size(), which)?,
            }
        }
    }
    Ok(())
}

fn check_none(st: &Statement, op: Opcode, addr: u32, unused: [bool; 3]) -> Result<()> {
    let operands = [st.a, st.b, st.c];
    for i in 0..3 {
        if unused[i] && operands[i] != 0 {
            return Err(error!(BadStatement, addr;
                "{} has a non-zero operand {}",
                op.opname(),
                (b'a' + i as u8) as char
            ));
        }
    }
    Ok(())
}
