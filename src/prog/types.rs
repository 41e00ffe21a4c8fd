/// ## Type tags
///
/// The numbering is the one used on disk by global and field defs.
/// Sizes are in 32-bit cells.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Etype {
    Void = 0,
    String = 1,
    Float = 2,
    Vector = 3,
    Entity = 4,
    Field = 5,
    Func = 6,
    Pointer = 7,
    Quat = 8,
    Int = 9,
    Uint = 10,
    Short = 11,
    Double = 12,
    Invalid = 0xffff,
}

/// Set in a def's type word when the global belongs in saved games.
pub const DEF_SAVEGLOBAL: u16 = 1 << 15;

impl Etype {
    pub fn from_u16(tag: u16) -> Etype {
        use Etype::*;
        match tag & !DEF_SAVEGLOBAL {
            0 => Void,
            1 => String,
            2 => Float,
            3 => Vector,
            4 => Entity,
            5 => Field,
            6 => Func,
            7 => Pointer,
            8 => Quat,
            9 => Int,
            10 => Uint,
            11 => Short,
            12 => Double,
            _ => Invalid,
        }
    }

    pub fn size(self) -> u32 {
        use Etype::*;
        match self {
            Vector => 3,
            Quat => 4,
            Double => 2,
            Short | Invalid => 0,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        use Etype::*;
        match self {
            Void => "void",
            String => "string",
            Float => "float",
            Vector => "vector",
            Entity => "entity",
            Field => "field",
            Func => "function",
            Pointer => "pointer",
            Quat => "quaternion",
            Int => "int",
            Uint => "uint",
            Short => "short",
            Double => "double",
            Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for Etype {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
