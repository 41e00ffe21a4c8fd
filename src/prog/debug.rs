use super::format::{put_u16, put_u32, read_lump, str_at, Def, Reader, DEF_SIZE};
use super::{Address, Error, Image};
use crate::error;
use std::collections::HashMap;
use std::path::Path;

type Result<T> = std::result::Result<T, Error>;

pub const PROG_DEBUG_VERSION: u32 = 0x0000_1001;
const DEBUG_HEADER_SIZE: usize = 32;
const AUX_SIZE: usize = 20;
const LINENO_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuxFunction {
    pub function: u32,
    pub source_line: u32,
    pub line_info: u32,
    pub local_defs: u32,
    pub num_locals: u32,
}

/// `line == 0` marks a function entry and `fa` is then an aux function
/// index; otherwise `fa` is a statement address and `line` is relative
/// to the function's `source_line`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lineno {
    pub fa: u32,
    pub line: u32,
}

/// ## Debug symbols for a loaded image

#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub crc: u16,
    pub auxfunctions: Vec<AuxFunction>,
    pub linenos: Vec<Lineno>,
    pub locals: Vec<Def>,
    aux_map: HashMap<u32, usize>,
    sources: HashMap<String, Option<Vec<String>>>,
}

impl DebugInfo {
    /// Parses a debug file and checks it belongs to `image`.
    pub fn parse(bytes: &[u8], image: &Image) -> Result<DebugInfo> {
        if bytes.len() < DEBUG_HEADER_SIZE {
            return Err(error!(Truncated; "debug file is only {} bytes", bytes.len()));
        }
        let mut r = Reader::new(bytes, 0);
        let version = r.u32()?;
        if version != PROG_DEBUG_VERSION {
            return Err(error!(BadVersion;
                "unsupported debug version {:x}.{:03x}.{:03x}",
                (version >> 24) & 0xff,
                (version >> 12) & 0xfff,
                version & 0xfff
            ));
        }
        let crc = r.u16()?;
        let _pad = r.u16()?;
        if crc != image.crc {
            return Err(error!(CrcMismatch; "CRCs: sym:{} dat:{}", crc, image.crc));
        }
        let aux = super::Lump {
            offset: r.u32()?,
            count: r.u32()?,
        };
        let lines = super::Lump {
            offset: r.u32()?,
            count: r.u32()?,
        };
        let locals = super::Lump {
            offset: r.u32()?,
            count: r.u32()?,
        };
        let auxfunctions = read_lump(bytes, "aux functions", aux, AUX_SIZE, |r| {
            Ok(AuxFunction {
                function: r.u32()?,
                source_line: r.u32()?,
                line_info: r.u32()?,
                local_defs: r.u32()?,
                num_locals: r.u32()?,
            })
        })?;
        let linenos = read_lump(bytes, "line numbers", lines, LINENO_SIZE, |r| {
            Ok(Lineno {
                fa: r.u32()?,
                line: r.u32()?,
            })
        })?;
        let locals = read_lump(bytes, "local defs", locals, DEF_SIZE, Def::read)?;

        let mut aux_map = HashMap::new();
        for (i, aux) in auxfunctions.iter().enumerate() {
            if aux.function as usize >= image.functions.len() {
                return Err(error!(Malformed; "aux function {} names function {}", i, aux.function));
            }
            aux_map.insert(aux.function, i);
        }
        for lineno in &linenos {
            if lineno.line == 0 && lineno.fa as usize >= auxfunctions.len() {
                return Err(error!(Malformed; "line entry names aux function {}", lineno.fa));
            }
        }
        Ok(DebugInfo {
            crc,
            auxfunctions,
            linenos,
            locals,
            aux_map,
            sources: HashMap::new(),
        })
    }

    pub fn aux_for_function(&self, function: usize) -> Option<&AuxFunction> {
        self.aux_map
            .get(&(function as u32))
            .map(|&i| &self.auxfunctions[i])
    }

    fn lineno_addr(&self, image: &Image, lineno: &Lineno) -> u32 {
        if lineno.line != 0 {
            return lineno.fa;
        }
        let aux = &self.auxfunctions[lineno.fa as usize];
        match image.functions.get(aux.function as usize) {
            Some(f) => f.first_statement.max(0) as u32,
            None => 0,
        }
    }

    fn lineno_func(&self, index: usize) -> Option<&AuxFunction> {
        let mut i = index;
        while i > 0 && self.linenos[i].line != 0 {
            i -= 1;
        }
        let lineno = &self.linenos[i];
        if lineno.line != 0 {
            return None;
        }
        self.auxfunctions.get(lineno.fa as usize)
    }

    fn find_lineno(&self, image: &Image, addr: Address) -> Option<usize> {
        (0..self.linenos.len())
            .rev()
            .find(|&i| self.lineno_addr(image, &self.linenos[i]) <= addr)
    }

    /// Source file and line of the statement at `addr`.
    pub fn location(&self, image: &Image, addr: Address) -> Option<(String, u32)> {
        let index = self.find_lineno(image, addr)?;
        let aux = self.lineno_func(index)?;
        let f = image.functions.get(aux.function as usize)?;
        let line = aux.source_line + self.linenos[index].line;
        Some((image.string(f.file).into_owned(), line))
    }

    /// Like `location`, but only for the first statement of a line, with
    /// the text of that line when the source can be found.
    pub fn source_line(
        &mut self,
        image: &Image,
        addr: Address,
        source_path: &Path,
    ) -> Option<String> {
        let index = self.find_lineno(image, addr)?;
        if self.lineno_addr(image, &self.linenos[index]) != addr {
            return None;
        }
        let (file, line) = self.location(image, addr)?;
        let lines = self
            .sources
            .entry(file.clone())
            .or_insert_with(|| load_source(&source_path.join(&file)));
        match lines {
            Some(lines) if line >= 1 && (line as usize) <= lines.len() => {
                Some(format!("{}:{}:{}", file, line, lines[line as usize - 1]))
            }
            _ => Some(format!("{}:{}", file, line)),
        }
    }

    /// Name of the local at global offset `ofs` in `function`.
    pub fn local_name(&self, image: &Image, function: usize, ofs: u32) -> Option<String> {
        let aux = self.aux_for_function(function)?;
        let f = image.functions.get(function)?;
        if ofs < f.params_start || ofs >= f.params_start + f.locals {
            return None;
        }
        let start = aux.local_defs as usize;
        let end = start + aux.num_locals as usize;
        self.locals
            .get(start..end)?
            .iter()
            .find(|def| def.offset as u32 == ofs)
            .map(|def| String::from_utf8_lossy(str_at(&image.strings, def.name)).into_owned())
    }
}

fn load_source(path: &Path) -> Option<Vec<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(|l| l.to_string())
                .collect(),
        ),
        Err(_) => None,
    }
}

/// ## Debug file writer
///
/// Functions are added in order; each gets an entry line followed by
/// its `(statement, relative line)` pairs.

#[derive(Debug, Default)]
pub struct DebugBuilder {
    auxfunctions: Vec<AuxFunction>,
    linenos: Vec<Lineno>,
    locals: Vec<Def>,
}

impl DebugBuilder {
    pub fn new() -> DebugBuilder {
        DebugBuilder::default()
    }

    pub fn function(&mut self, function: u32, source_line: u32, lines: &[(Address, u32)], locals: &[Def]) {
        let aux = self.auxfunctions.len() as u32;
        self.auxfunctions.push(AuxFunction {
            function,
            source_line,
            line_info: self.linenos.len() as u32,
            local_defs: self.locals.len() as u32,
            num_locals: locals.len() as u32,
        });
        self.linenos.push(Lineno { fa: aux, line: 0 });
        for &(addr, line) in lines {
            self.linenos.push(Lineno { fa: addr, line });
        }
        self.locals.extend_from_slice(locals);
    }

    pub fn build(&self, crc: u16) -> Vec<u8> {
        let aux_ofs = DEBUG_HEADER_SIZE;
        let lines_ofs = aux_ofs + self.auxfunctions.len() * AUX_SIZE;
        let locals_ofs = lines_ofs + self.linenos.len() * LINENO_SIZE;
        let mut out = Vec::new();
        put_u32(&mut out, PROG_DEBUG_VERSION);
        put_u16(&mut out, crc);
        put_u16(&mut out, 0);
        put_u32(&mut out, aux_ofs as u32);
        put_u32(&mut out, self.auxfunctions.len() as u32);
        put_u32(&mut out, lines_ofs as u32);
        put_u32(&mut out, self.linenos.len() as u32);
        put_u32(&mut out, locals_ofs as u32);
        put_u32(&mut out, self.locals.len() as u32);
        for aux in &self.auxfunctions {
            put_u32(&mut out, aux.function);
            put_u32(&mut out, aux.source_line);
            put_u32(&mut out, aux.line_info);
            put_u32(&mut out, aux.local_defs);
            put_u32(&mut out, aux.num_locals);
        }
        for lineno in &self.linenos {
            put_u32(&mut out, lineno.fa);
            put_u32(&mut out, lineno.line);
        }
        for def in &self.locals {
            def.write(&mut out);
        }
        out
    }
}
