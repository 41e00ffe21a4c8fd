use super::format::*;
use super::{Error, Version};
use crate::error;
use std::borrow::Cow;

type Result<T> = std::result::Result<T, Error>;

/// ## Parsed progs image
///
/// Every multi-byte value has been converted from the little-endian file
/// layout. `crc` is computed over the whole file, the header included;
/// it is what a debug file has to match.

#[derive(Debug, Clone, Default)]
pub struct Image {
    pub header: Header,
    pub crc: u16,
    pub statements: Vec<Statement>,
    pub globaldefs: Vec<Def>,
    pub fielddefs: Vec<Def>,
    pub functions: Vec<FunctionDef>,
    pub strings: Vec<u8>,
    pub globals: Vec<u32>,
}

impl Image {
    pub fn parse(bytes: &[u8]) -> Result<Image> {
        let header = Header::read(bytes)?;
        if header.version != PROG_ID_VERSION && header.version != PROG_V6P_VERSION {
            return Err(error!(BadVersion;
                "({}) [{} expected]",
                version_string(header.version),
                version_string(PROG_V6P_VERSION)
            ));
        }
        let statements = read_lump(
            bytes,
            "statements",
            header.statements,
            STATEMENT_SIZE,
            Statement::read,
        )?;
        let globaldefs = read_lump(bytes, "global defs", header.globaldefs, DEF_SIZE, Def::read)?;
        let fielddefs = read_lump(bytes, "field defs", header.fielddefs, DEF_SIZE, Def::read)?;
        let functions = read_lump(
            bytes,
            "functions",
            header.functions,
            FUNCTION_SIZE,
            FunctionDef::read,
        )?;
        let mut strings = read_lump(bytes, "strings", header.strings, 1, |r| r.u8())?;
        if strings.last() != Some(&0) {
            strings.push(0);
        }
        let globals = read_lump(bytes, "globals", header.globals, 4, |r| r.u32())?;

        let image = Image {
            crc: crc16(bytes),
            header,
            statements,
            globaldefs,
            fielddefs,
            functions,
            strings,
            globals,
        };
        image.validate()?;
        Ok(image)
    }

    fn validate(&self) -> Result<()> {
        if self.statements.is_empty() || self.functions.is_empty() {
            return Err(error!(Malformed; "no statements or no functions"));
        }
        for def in &self.fielddefs {
            if def.is_saved() {
                return Err(error!(Malformed;
                    "field {} has the save-global flag",
                    self.string(def.name)
                ));
            }
        }
        for def in &self.globaldefs {
            if def.offset as u32 >= self.globals.len() as u32 {
                return Err(error!(Malformed;
                    "global {} is outside the globals",
                    self.string(def.name)
                ));
            }
        }
        let numstatements = self.statements.len() as i64;
        let numglobals = self.globals.len() as u32;
        for (i, f) in self.functions.iter().enumerate().skip(1) {
            if f.numparams > MAX_PARMS as i32 || f.numparams < -(MAX_PARMS as i32) - 1 {
                return Err(error!(Malformed;
                    "function {} has {} parameters",
                    self.string(f.name),
                    f.numparams
                ));
            }
            if f.first_statement > 0 {
                if f.first_statement as i64 >= numstatements {
                    return Err(error!(Malformed;
                        "function {} starts outside the statements",
                        self.string(f.name)
                    ));
                }
                match f.params_start.checked_add(f.locals) {
                    Some(end) if end <= numglobals => {}
                    _ => {
                        return Err(error!(Malformed;
                            "locals of function {} ({}) are outside the globals",
                            self.string(f.name),
                            i
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn instruction_set(&self) -> Version {
        if self.header.version == PROG_ID_VERSION {
            Version::Id
        } else {
            Version::V6p
        }
    }

    pub fn entityfields(&self) -> u32 {
        self.header.entityfields
    }

    /// A name from the string table, lossily decoded.
    pub fn string(&self, ofs: i32) -> Cow<'_, str> {
        String::from_utf8_lossy(str_at(&self.strings, ofs))
    }

    pub fn function_name(&self, index: usize) -> Cow<'_, str> {
        match self.functions.get(index) {
            Some(f) => self.string(f.name),
            None => Cow::Borrowed("?"),
        }
    }
}
