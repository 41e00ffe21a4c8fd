use crate::error;
use crate::prog::{Error, Etype};

type Result<T> = std::result::Result<T, Error>;

/// ## Cell offset into the flat address space
///
/// Bytecode never sees a native pointer. Every address it can form is a
/// cell offset and offset 0 is the null sentinel.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(pub u32);

impl Ptr {
    pub const NULL: Ptr = Ptr(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
    pub fn add(self, cells: u32) -> Ptr {
        Ptr(self.0.wrapping_add(cells))
    }
    pub fn offset(self, cells: i32) -> Ptr {
        Ptr(self.0.wrapping_add(cells as u32))
    }
}

impl std::fmt::Display for Ptr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

impl From<u32> for Ptr {
    fn from(ofs: u32) -> Ptr {
        Ptr(ofs)
    }
}

/// A value that lives in `SIZE` consecutive cells.
pub trait Word: Copy {
    const SIZE: u32;
    fn read(cells: &[u32]) -> Self;
    fn write(self, cells: &mut [u32]);
}

impl Word for u32 {
    const SIZE: u32 = 1;
    #[inline]
    fn read(cells: &[u32]) -> u32 {
        cells[0]
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        cells[0] = self
    }
}

impl Word for i32 {
    const SIZE: u32 = 1;
    #[inline]
    fn read(cells: &[u32]) -> i32 {
        cells[0] as i32
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        cells[0] = self as u32
    }
}

impl Word for f32 {
    const SIZE: u32 = 1;
    #[inline]
    fn read(cells: &[u32]) -> f32 {
        f32::from_bits(cells[0])
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        cells[0] = self.to_bits()
    }
}

impl Word for Ptr {
    const SIZE: u32 = 1;
    #[inline]
    fn read(cells: &[u32]) -> Ptr {
        Ptr(cells[0])
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        cells[0] = self.0
    }
}

impl Word for [f32; 3] {
    const SIZE: u32 = 3;
    #[inline]
    fn read(cells: &[u32]) -> [f32; 3] {
        [
            f32::from_bits(cells[0]),
            f32::from_bits(cells[1]),
            f32::from_bits(cells[2]),
        ]
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        for (cell, v) in cells.iter_mut().zip(self.iter()) {
            *cell = v.to_bits();
        }
    }
}

impl Word for [f32; 4] {
    const SIZE: u32 = 4;
    #[inline]
    fn read(cells: &[u32]) -> [f32; 4] {
        [
            f32::from_bits(cells[0]),
            f32::from_bits(cells[1]),
            f32::from_bits(cells[2]),
            f32::from_bits(cells[3]),
        ]
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        for (cell, v) in cells.iter_mut().zip(self.iter()) {
            *cell = v.to_bits();
        }
    }
}

impl Word for f64 {
    const SIZE: u32 = 2;
    #[inline]
    fn read(cells: &[u32]) -> f64 {
        f64::from_bits(cells[0] as u64 | (cells[1] as u64) << 32)
    }
    #[inline]
    fn write(self, cells: &mut [u32]) {
        let bits = self.to_bits();
        cells[0] = bits as u32;
        cells[1] = (bits >> 32) as u32;
    }
}

/// ## Typed value for hosts
///
/// Strings, entities and functions keep their raw encodings; `Progs`
/// knows how to turn them into text.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Void,
    String(i32),
    Float(f32),
    Vector([f32; 3]),
    Entity(u32),
    Field(u32),
    Func(i32),
    Pointer(Ptr),
    Quat([f32; 4]),
    Int(i32),
    Uint(u32),
    Double(f64),
}

impl Value {
    pub fn etype(&self) -> Etype {
        use Value::*;
        match self {
            Void => Etype::Void,
            String(_) => Etype::String,
            Float(_) => Etype::Float,
            Vector(_) => Etype::Vector,
            Entity(_) => Etype::Entity,
            Field(_) => Etype::Field,
            Func(_) => Etype::Func,
            Pointer(_) => Etype::Pointer,
            Quat(_) => Etype::Quat,
            Int(_) => Etype::Int,
            Uint(_) => Etype::Uint,
            Double(_) => Etype::Double,
        }
    }

    pub fn size(&self) -> u32 {
        self.etype().size()
    }

    fn read(etype: Etype, cells: &[u32]) -> Value {
        match etype {
            Etype::String => Value::String(i32::read(cells)),
            Etype::Float => Value::Float(f32::read(cells)),
            Etype::Vector => Value::Vector(<[f32; 3]>::read(cells)),
            Etype::Entity => Value::Entity(u32::read(cells)),
            Etype::Field => Value::Field(u32::read(cells)),
            Etype::Func => Value::Func(i32::read(cells)),
            Etype::Pointer => Value::Pointer(Ptr::read(cells)),
            Etype::Quat => Value::Quat(<[f32; 4]>::read(cells)),
            Etype::Int => Value::Int(i32::read(cells)),
            Etype::Uint => Value::Uint(u32::read(cells)),
            Etype::Double => Value::Double(f64::read(cells)),
            Etype::Void | Etype::Short | Etype::Invalid => Value::Void,
        }
    }

    fn write(self, cells: &mut [u32]) {
        use Value::*;
        match self {
            Void => {}
            String(v) | Func(v) | Int(v) => v.write(cells),
            Entity(v) | Field(v) | Uint(v) => v.write(cells),
            Float(v) => v.write(cells),
            Vector(v) => v.write(cells),
            Pointer(v) => v.write(cells),
            Quat(v) => v.write(cells),
            Double(v) => v.write(cells),
        }
    }
}

/// `ftos` formatting: integral values without decimals, others with
/// trailing zeros trimmed.
pub fn float_string(v: f32) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e9 {
        format!("{}", v as i64)
    } else if v.is_finite() {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        format!("{}", v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Value::*;
        match self {
            Void => write!(f, "void"),
            String(v) => write!(f, "string {}", v),
            Float(v) => write!(f, "{}", float_string(*v)),
            Vector(v) => write!(f, "'{} {} {}'", v[0], v[1], v[2]),
            Entity(v) => write!(f, "entity {}", v),
            Field(v) => write!(f, ".{}", v),
            Func(v) => write!(f, "function {}", v),
            Pointer(v) => write!(f, "{}", v),
            Quat(v) => write!(f, "'{} {} {} {}'", v[0], v[1], v[2], v[3]),
            Int(v) => write!(f, "{}", v),
            Uint(v) => write!(f, "{}", v),
            Double(v) => write!(f, "{}", v),
        }
    }
}

/// ## Flat address space
///
/// All access is bounds checked against the arena itself; range checks
/// that depend on the layout (null pointer, stack, entity area) belong
/// to the interpreter.

#[derive(Debug, Default)]
pub struct Memory {
    cells: Vec<u32>,
}

impl Memory {
    pub fn new(cells: Vec<u32>) -> Memory {
        Memory { cells }
    }

    pub fn len(&self) -> u32 {
        self.cells.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [u32] {
        &mut self.cells
    }

    pub fn into_cells(self) -> Vec<u32> {
        self.cells
    }

    fn outside(ofs: u32, len: u32) -> Error {
        error!(OutOfBounds; "{} cells at {} are outside memory", len, ofs)
    }

    pub fn slice(&self, ofs: u32, len: u32) -> Result<&[u32]> {
        let start = ofs as usize;
        match self.cells.get(start..start.saturating_add(len as usize)) {
            Some(cells) => Ok(cells),
            None => Err(Memory::outside(ofs, len)),
        }
    }

    pub fn slice_mut(&mut self, ofs: u32, len: u32) -> Result<&mut [u32]> {
        let start = ofs as usize;
        match self.cells.get_mut(start..start.saturating_add(len as usize)) {
            Some(cells) => Ok(cells),
            None => Err(Memory::outside(ofs, len)),
        }
    }

    #[inline]
    pub fn get<T: Word>(&self, ofs: u32) -> Result<T> {
        Ok(T::read(self.slice(ofs, T::SIZE)?))
    }

    #[inline]
    pub fn set<T: Word>(&mut self, ofs: u32, v: T) -> Result<()> {
        v.write(self.slice_mut(ofs, T::SIZE)?);
        Ok(())
    }

    /// Overlapping ranges are copied as if through a buffer.
    pub fn copy(&mut self, src: u32, dst: u32, len: u32) -> Result<()> {
        self.slice(src, len)?;
        self.slice(dst, len)?;
        let src = src as usize;
        self.cells
            .copy_within(src..src + len as usize, dst as usize);
        Ok(())
    }

    pub fn fill(&mut self, dst: u32, len: u32, v: u32) -> Result<()> {
        for cell in self.slice_mut(dst, len)?.iter_mut() {
            *cell = v;
        }
        Ok(())
    }

    pub fn value(&self, ofs: u32, etype: Etype) -> Result<Value> {
        let cells = self.slice(ofs, etype.size())?;
        Ok(Value::read(etype, cells))
    }

    pub fn set_value(&mut self, ofs: u32, value: Value) -> Result<()> {
        let cells = self.slice_mut(ofs, value.size())?;
        value.write(cells);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_low_word_first() {
        let mut mem = Memory::new(vec![0; 4]);
        mem.set(1, 1.5f64).unwrap();
        let bits = 1.5f64.to_bits();
        assert_eq!(mem.cells()[1], bits as u32);
        assert_eq!(mem.cells()[2], (bits >> 32) as u32);
        assert_eq!(mem.get::<f64>(1).unwrap(), 1.5);
    }

    #[test]
    fn test_out_of_arena() {
        let mut mem = Memory::new(vec![0; 4]);
        assert!(mem.get::<[f32; 3]>(2).is_err());
        assert!(mem.set(4, 1u32).is_err());
        assert!(mem.set(u32::max_value(), 1u32).is_err());
        assert!(mem.copy(0, 3, 2).is_err());
    }

    #[test]
    fn test_values() {
        let mut mem = Memory::new(vec![0; 8]);
        mem.set_value(2, Value::Vector([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(
            mem.value(2, Etype::Vector).unwrap(),
            Value::Vector([1.0, 2.0, 3.0])
        );
        assert_eq!(mem.value(3, Etype::Float).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_float_string() {
        assert_eq!(float_string(3.0), "3");
        assert_eq!(float_string(-0.5), "-0.5");
        assert_eq!(float_string(0.1), "0.1");
    }
}
