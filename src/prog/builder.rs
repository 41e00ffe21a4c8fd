use super::format::*;
use super::{Etype, Opcode};
use std::collections::HashMap;

/// Legacy images keep the return value and eight 3-cell parameters
/// below this offset.
pub const RESERVED_OFS: u32 = 28;
const EXTENDED_PARAM_SIZE: u32 = 4;
const EXTENDED_PARAM_ALIGNMENT: u32 = 2;

/// Where a function's parameters and locals landed in the globals.
#[derive(Debug, Clone, Default)]
pub struct Func {
    pub index: i32,
    pub first_statement: u32,
    pub params: Vec<u16>,
    pub locals: Vec<u16>,
    pub argc: Option<u16>,
    pub argv: Option<u16>,
}

/// ## Progs image writer
///
/// Lays out globals, functions and statements the way a QuakeC
/// compiler does, for hosts that generate code and for tests.
/// Statement 0 and function 0 are the reserved null entries.

#[derive(Debug, Clone)]
pub struct ImageBuilder {
    version: u32,
    crc: u32,
    strings: Vec<u8>,
    string_ofs: HashMap<String, i32>,
    globals: Vec<u32>,
    globaldefs: Vec<Def>,
    fielddefs: Vec<Def>,
    functions: Vec<FunctionDef>,
    statements: Vec<Statement>,
    entityfields: u32,
    file: i32,
}

impl ImageBuilder {
    /// An image with the ABI globals plus `self` and `time`.
    pub fn new(version: u32) -> ImageBuilder {
        let mut b = ImageBuilder::bare(version);
        b.global("self", Etype::Entity, &[0]);
        b.global("time", Etype::Float, &[0]);
        b
    }

    /// An image with only the ABI globals.
    pub fn bare(version: u32) -> ImageBuilder {
        let mut b = ImageBuilder {
            version,
            crc: 0,
            strings: vec![0],
            string_ofs: HashMap::new(),
            globals: vec![],
            globaldefs: vec![],
            fielddefs: vec![],
            functions: vec![FunctionDef::default()],
            statements: vec![Statement::default()],
            entityfields: 0,
            file: 0,
        };
        if b.is_extended() {
            b.globals.push(0);
            let zeros = [0; EXTENDED_PARAM_SIZE as usize];
            b.global(".return", Etype::Void, &zeros);
            for i in 0..MAX_PARMS {
                b.global(&format!(".param_{}", i), Etype::Void, &zeros);
            }
            b.global(".param_size", Etype::Int, &[EXTENDED_PARAM_SIZE]);
            b.global(".param_alignment", Etype::Int, &[EXTENDED_PARAM_ALIGNMENT]);
        } else {
            b.globals.resize(RESERVED_OFS as usize, 0);
        }
        b
    }

    fn is_extended(&self) -> bool {
        self.version != PROG_ID_VERSION
    }

    fn param_size(&self) -> u32 {
        if self.is_extended() {
            EXTENDED_PARAM_SIZE
        } else {
            3
        }
    }

    /// Offset of the return slot.
    pub fn return_ofs(&self) -> u16 {
        1
    }

    /// Offset of parameter slot `i`.
    pub fn param_ofs(&self, i: usize) -> u16 {
        if self.is_extended() {
            (1 + EXTENDED_PARAM_SIZE * (i as u32 + 1)) as u16
        } else {
            (4 + 3 * i) as u16
        }
    }

    pub fn set_crc(&mut self, crc: u32) -> &mut ImageBuilder {
        self.crc = crc;
        self
    }

    pub fn source_file(&mut self, name: &str) -> &mut ImageBuilder {
        self.file = self.string(name);
        self
    }

    pub fn string(&mut self, s: &str) -> i32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&ofs) = self.string_ofs.get(s) {
            return ofs;
        }
        let ofs = self.strings.len() as i32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.string_ofs.insert(s.to_string(), ofs);
        ofs
    }

    /// Appends a global; an empty name leaves it without a def.
    pub fn global(&mut self, name: &str, etype: Etype, cells: &[u32]) -> u16 {
        let ofs = self.globals.len() as u16;
        self.globals.extend_from_slice(cells);
        let size = etype.size() as usize;
        if cells.len() < size {
            self.globals.resize(ofs as usize + size, 0);
        }
        if !name.is_empty() {
            let name = self.string(name);
            self.globaldefs.push(Def::new(etype, ofs, name));
        }
        ofs
    }

    pub fn float(&mut self, name: &str, v: f32) -> u16 {
        self.global(name, Etype::Float, &[v.to_bits()])
    }

    pub fn int(&mut self, name: &str, v: i32) -> u16 {
        self.global(name, Etype::Int, &[v as u32])
    }

    pub fn vector(&mut self, name: &str, v: [f32; 3]) -> u16 {
        self.global(
            name,
            Etype::Vector,
            &[v[0].to_bits(), v[1].to_bits(), v[2].to_bits()],
        )
    }

    pub fn string_global(&mut self, name: &str, s: &str) -> u16 {
        let ofs = self.string(s);
        self.global(name, Etype::String, &[ofs as u32])
    }

    pub fn entity(&mut self, name: &str) -> u16 {
        self.global(name, Etype::Entity, &[0])
    }

    pub fn pointer(&mut self, name: &str, v: u32) -> u16 {
        self.global(name, Etype::Pointer, &[v])
    }

    pub fn func_global(&mut self, name: &str, index: i32) -> u16 {
        self.global(name, Etype::Func, &[index as u32])
    }

    /// `.stack`, the push/pop stack pointer.
    pub fn stack_global(&mut self) -> u16 {
        self.pointer(".stack", 0)
    }

    /// `.debug_file`, naming the debug symbols next to the image.
    pub fn debug_file(&mut self, name: &str) -> u16 {
        self.string_global(".debug_file", name)
    }

    /// Declares an entity field and the global holding its offset.
    pub fn field(&mut self, name: &str, etype: Etype) -> u16 {
        let field_ofs = self.entityfields;
        self.entityfields += etype.size().max(1);
        let name_ofs = self.string(name);
        self.fielddefs.push(Def::new(etype, field_ofs as u16, name_ofs));
        self.global(name, Etype::Field, &[field_ofs])
    }

    fn alignment_for(&self, etype: Etype) -> u32 {
        if !self.is_extended() {
            return 0;
        }
        match etype {
            Etype::Double => 1,
            Etype::Quat => 2,
            _ => 0,
        }
    }

    fn place(&mut self, dst: &mut u32, size: u32, alignment: u32) -> u16 {
        let mask = (1u32 << alignment) - 1;
        *dst = (*dst + mask) & !mask;
        let ofs = *dst;
        *dst += size;
        if self.globals.len() < *dst as usize {
            self.globals.resize(*dst as usize, 0);
        }
        ofs as u16
    }

    fn add_function(&mut self, name: &str, params: &[Etype], locals: &[Etype], varargs: bool) -> Func {
        let index = self.functions.len() as i32;
        let params_start = self.globals.len() as u32;
        let mut dst = params_start;
        let mut func = Func {
            index,
            first_statement: self.statements.len() as u32,
            ..Func::default()
        };
        if varargs {
            func.argc = Some(self.place(&mut dst, 1, 0));
            func.argv = Some(self.place(&mut dst, 1, 0));
        }
        let mut def = FunctionDef {
            first_statement: func.first_statement as i32,
            params_start,
            name: self.string(name),
            file: self.file,
            numparams: if varargs {
                -(params.len() as i32) - 1
            } else {
                params.len() as i32
            },
            ..FunctionDef::default()
        };
        for (i, &etype) in params.iter().enumerate() {
            let alignment = self.alignment_for(etype);
            def.param_size[i] = FunctionDef::pack_param(etype.size(), alignment);
            func.params.push(self.place(&mut dst, etype.size(), alignment));
        }
        if varargs {
            let alignment = if self.is_extended() {
                EXTENDED_PARAM_ALIGNMENT
            } else {
                0
            };
            let tail = self.param_size() * MAX_PARMS as u32;
            self.place(&mut dst, tail, alignment);
        }
        for &etype in locals {
            let alignment = self.alignment_for(etype);
            func.locals.push(self.place(&mut dst, etype.size(), alignment));
        }
        def.locals = dst - params_start;
        self.functions.push(def);
        func
    }

    /// A bytecode function whose statements are the ones added next.
    pub fn function(&mut self, name: &str, params: &[Etype], locals: &[Etype]) -> Func {
        self.add_function(name, params, locals, false)
    }

    /// Like `function`, with `argc`/`argv` receiving extra arguments.
    pub fn varargs_function(&mut self, name: &str, fixed: &[Etype], locals: &[Etype]) -> Func {
        self.add_function(name, fixed, locals, true)
    }

    /// A builtin by number, or by name when `id` is 0.
    pub fn builtin(&mut self, name: &str, id: i32, numparams: i32) -> i32 {
        let index = self.functions.len() as i32;
        let def = FunctionDef {
            first_statement: -id,
            name: self.string(name),
            file: self.file,
            numparams,
            ..FunctionDef::default()
        };
        self.functions.push(def);
        index
    }

    pub fn statement(&mut self, op: Opcode, a: u16, b: u16, c: u16) -> u32 {
        self.statements.push(Statement {
            op: op as u16,
            a,
            b,
            c,
        });
        self.statements.len() as u32 - 1
    }

    /// Index the next statement will get.
    pub fn here(&self) -> u32 {
        self.statements.len() as u32
    }

    pub fn statement_mut(&mut self, index: u32) -> Option<&mut Statement> {
        self.statements.get_mut(index as usize)
    }

    pub fn globals_len(&self) -> u32 {
        self.globals.len() as u32
    }

    pub fn build(&self) -> Vec<u8> {
        let mut ofs = HEADER_SIZE as u32;
        let mut lump = |count: usize, size: usize| {
            let l = Lump {
                offset: ofs,
                count: count as u32,
            };
            ofs += (count * size) as u32;
            l
        };
        let header = Header {
            version: self.version,
            crc: self.crc,
            statements: lump(self.statements.len(), STATEMENT_SIZE),
            globaldefs: lump(self.globaldefs.len(), DEF_SIZE),
            fielddefs: lump(self.fielddefs.len(), DEF_SIZE),
            functions: lump(self.functions.len(), FUNCTION_SIZE),
            strings: lump(self.strings.len(), 1),
            globals: lump(self.globals.len(), 4),
            entityfields: self.entityfields,
        };
        let mut out = Vec::with_capacity(ofs as usize);
        header.write(&mut out);
        for st in &self.statements {
            st.write(&mut out);
        }
        for def in self.globaldefs.iter().chain(self.fielddefs.iter()) {
            def.write(&mut out);
        }
        for f in &self.functions {
            f.write(&mut out);
        }
        out.extend_from_slice(&self.strings);
        for &g in &self.globals {
            put_u32(&mut out, g);
        }
        out
    }
}
