use super::{Etype, DEF_SAVEGLOBAL};
use crate::error;
use crate::prog::Error;

type Result<T> = std::result::Result<T, Error>;

pub const PROG_ID_VERSION: u32 = 6;
pub const PROG_V6P_VERSION: u32 = 0x00ff_f00a;

pub const HEADER_SIZE: usize = 60;
pub const STATEMENT_SIZE: usize = 8;
pub const DEF_SIZE: usize = 8;
pub const FUNCTION_SIZE: usize = 36;
pub const MAX_PARMS: usize = 8;

static CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// CRC-16/CCITT as used for progs and their debug files.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

/// Engine versions print as `MM.mmm.ppp`; the original one is just 6.
pub fn version_string(version: u32) -> String {
    if version >= 0x00ff_f000 {
        format!(
            "{:02x}.{:03x}.{:03x}",
            version >> 24,
            (version >> 12) & 0xfff,
            version & 0xfff
        )
    } else {
        format!("{}", version)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub offset: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub crc: u32,
    pub statements: Lump,
    pub globaldefs: Lump,
    pub fielddefs: Lump,
    pub functions: Lump,
    pub strings: Lump,
    pub globals: Lump,
    pub entityfields: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statement {
    pub op: u16,
    pub a: u16,
    pub b: u16,
    pub c: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Def {
    pub type_word: u16,
    pub offset: u16,
    pub name: i32,
}

impl Def {
    pub fn new(etype: Etype, offset: u16, name: i32) -> Def {
        Def {
            type_word: etype as u16,
            offset,
            name,
        }
    }
    pub fn etype(&self) -> Etype {
        Etype::from_u16(self.type_word)
    }
    pub fn is_saved(&self) -> bool {
        self.type_word & DEF_SAVEGLOBAL != 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionDef {
    pub first_statement: i32,
    pub params_start: u32,
    pub locals: u32,
    pub profile: u32,
    pub name: i32,
    pub file: i32,
    pub numparams: i32,
    pub param_size: [u8; MAX_PARMS],
}

impl FunctionDef {
    /// Size in cells and alignment as log2 cells of parameter `i`.
    pub fn param(&self, i: usize) -> (u32, u32) {
        let packed = self.param_size[i];
        ((packed & 0x1f) as u32, (packed >> 5) as u32)
    }
    pub fn pack_param(size: u32, alignment: u32) -> u8 {
        ((size & 0x1f) | ((alignment & 0x07) << 5)) as u8
    }
    pub fn is_builtin(&self) -> bool {
        self.first_statement <= 0
    }
    pub fn is_varargs(&self) -> bool {
        self.numparams < 0
    }
    /// Count of named parameters, excluding a variadic tail.
    pub fn fixed_params(&self) -> usize {
        if self.numparams < 0 {
            (-self.numparams - 1) as usize
        } else {
            self.numparams as usize
        }
    }
}

pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8], pos: usize) -> Reader<'a> {
        Reader { bytes, pos }
    }
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        match self.bytes.get(self.pos..self.pos + len) {
            Some(slice) => {
                self.pos += len;
                Ok(slice)
            }
            None => Err(error!(Truncated; "read past end of file at byte {}", self.pos)),
        }
    }
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }
    fn lump(&mut self) -> Result<Lump> {
        Ok(Lump {
            offset: self.u32()?,
            count: self.u32()?,
        })
    }
}

impl Header {
    pub fn read(bytes: &[u8]) -> Result<Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(error!(Truncated; "{} bytes is too short for a progs header", bytes.len()));
        }
        let mut r = Reader::new(bytes, 0);
        Ok(Header {
            version: r.u32()?,
            crc: r.u32()?,
            statements: r.lump()?,
            globaldefs: r.lump()?,
            fielddefs: r.lump()?,
            functions: r.lump()?,
            strings: r.lump()?,
            globals: r.lump()?,
            entityfields: r.u32()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        put_u32(out, self.version);
        put_u32(out, self.crc);
        for lump in [
            self.statements,
            self.globaldefs,
            self.fielddefs,
            self.functions,
            self.strings,
            self.globals,
        ]
        .iter()
        {
            put_u32(out, lump.offset);
            put_u32(out, lump.count);
        }
        put_u32(out, self.entityfields);
    }
}

/// Reads `lump.count` records of `size` bytes each.
pub fn read_lump<T, F>(bytes: &[u8], what: &str, lump: Lump, size: usize, mut parse: F) -> Result<Vec<T>>
where
    F: FnMut(&mut Reader) -> Result<T>,
{
    let start = lump.offset as usize;
    let end = start.checked_add(lump.count as usize * size);
    match end {
        Some(end) if end <= bytes.len() => {}
        _ => {
            return Err(error!(Truncated; "{} extend past end of file", what));
        }
    }
    let mut r = Reader::new(bytes, start);
    let mut records = Vec::with_capacity(lump.count as usize);
    for _ in 0..lump.count {
        records.push(parse(&mut r)?);
    }
    Ok(records)
}

impl Statement {
    pub fn read(r: &mut Reader) -> Result<Statement> {
        Ok(Statement {
            op: r.u16()?,
            a: r.u16()?,
            b: r.u16()?,
            c: r.u16()?,
        })
    }
    pub fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.op);
        put_u16(out, self.a);
        put_u16(out, self.b);
        put_u16(out, self.c);
    }
}

impl Def {
    pub fn read(r: &mut Reader) -> Result<Def> {
        Ok(Def {
            type_word: r.u16()?,
            offset: r.u16()?,
            name: r.i32()?,
        })
    }
    pub fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.type_word);
        put_u16(out, self.offset);
        put_u32(out, self.name as u32);
    }
}

impl FunctionDef {
    pub fn read(r: &mut Reader) -> Result<FunctionDef> {
        let mut f = FunctionDef {
            first_statement: r.i32()?,
            params_start: r.u32()?,
            locals: r.u32()?,
            profile: r.u32()?,
            name: r.i32()?,
            file: r.i32()?,
            numparams: r.i32()?,
            param_size: [0; MAX_PARMS],
        };
        for size in f.param_size.iter_mut() {
            *size = r.u8()?;
        }
        Ok(f)
    }
    pub fn write(&self, out: &mut Vec<u8>) {
        put_u32(out, self.first_statement as u32);
        put_u32(out, self.params_start);
        put_u32(out, self.locals);
        put_u32(out, self.profile);
        put_u32(out, self.name as u32);
        put_u32(out, self.file as u32);
        put_u32(out, self.numparams as u32);
        out.extend_from_slice(&self.param_size);
    }
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// NUL-terminated string at `ofs`; out of range reads as empty.
pub fn str_at(strings: &[u8], ofs: i32) -> &[u8] {
    if ofs < 0 || ofs as usize >= strings.len() {
        return b"";
    }
    let tail = &strings[ofs as usize..];
    match tail.iter().position(|&b| b == 0) {
        Some(end) => &tail[..end],
        None => tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        assert_eq!(version_string(PROG_V6P_VERSION), "00.fff.00a");
        assert_eq!(version_string(0x00ff_f010), "00.fff.010");
        assert_eq!(version_string(7), "7");
    }

    #[test]
    fn test_crc_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29b1);
    }

    #[test]
    fn test_param_packing() {
        let mut f = FunctionDef::default();
        f.param_size[0] = FunctionDef::pack_param(4, 2);
        f.param_size[1] = 3;
        assert_eq!(f.param(0), (4, 2));
        assert_eq!(f.param(1), (3, 0));
    }

    #[test]
    fn test_str_at() {
        let strings = b"\0self\0time";
        assert_eq!(str_at(strings, 1), b"self");
        assert_eq!(str_at(strings, 6), b"time");
        assert_eq!(str_at(strings, 0), b"");
        assert_eq!(str_at(strings, 99), b"");
        assert_eq!(str_at(strings, -1), b"");
    }

    #[test]
    fn test_short_header() {
        assert_eq!(
            Header::read(&[0u8; 10]).unwrap_err().code(),
            crate::prog::ErrorCode::Truncated
        );
    }
}
