/*!
## Opcode table

One row per instruction: number, variant, operator, mnemonic, operand
types and the first image version that may use it. Number 187 is unused.

*/

use super::Etype;
use super::Etype::*;

/// Set on a statement's opcode word to trap into the debugger.
pub const OP_BREAK: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    /// The original instruction set.
    Id,
    /// Extensions: integers, pointers, quaternions, doubles, stack.
    V6p,
}

#[derive(Debug)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub opname: &'static str,
    pub types: [Etype; 3],
    pub version: Version,
}

macro_rules! opcodes {
    ($($num:literal $var:ident $name:literal $opname:literal $a:ident $b:ident $c:ident $ver:ident;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Opcode {
            $($var = $num,)*
        }

        impl Opcode {
            pub fn from_u16(op: u16) -> Option<Opcode> {
                match op {
                    $($num => Some(Opcode::$var),)*
                    _ => None,
                }
            }

            pub fn info(self) -> &'static OpcodeInfo {
                match self {
                    $(Opcode::$var => &OpcodeInfo {
                        name: $name,
                        opname: $opname,
                        types: [$a, $b, $c],
                        version: Version::$ver,
                    },)*
                }
            }
        }
    };
}

opcodes! {
      0 Done       "<DONE>" "done" Entity Field Void Id;
      1 MulF       "*" "mul.f" Float Float Float Id;
      2 MulV       "*" "mul.v" Vector Vector Float Id;
      3 MulFv      "*" "mul.fv" Float Vector Vector Id;
      4 MulVf      "*" "mul.vf" Vector Float Vector Id;
      5 DivF       "/" "div.f" Float Float Float Id;
      6 AddF       "+" "add.f" Float Float Float Id;
      7 AddV       "+" "add.v" Vector Vector Vector Id;
      8 SubF       "-" "sub.f" Float Float Float Id;
      9 SubV       "-" "sub.v" Vector Vector Vector Id;
     10 EqF        "==" "eq.f" Float Float Int Id;
     11 EqV        "==" "eq.v" Vector Vector Int Id;
     12 EqS        "==" "eq.s" String String Int Id;
     13 EqE        "==" "eq.e" Entity Entity Int Id;
     14 EqFn       "==" "eq.fn" Func Func Int Id;
     15 NeF        "!=" "ne.f" Float Float Int Id;
     16 NeV        "!=" "ne.v" Vector Vector Int Id;
     17 NeS        "!=" "ne.s" String String Int Id;
     18 NeE        "!=" "ne.e" Entity Entity Int Id;
     19 NeFn       "!=" "ne.fn" Func Func Int Id;
     20 LeF        "<=" "le.f" Float Float Int Id;
     21 GeF        ">=" "ge.f" Float Float Int Id;
     22 LtF        "<" "lt.f" Float Float Int Id;
     23 GtF        ">" "gt.f" Float Float Int Id;
     24 LoadF      "." "load.f" Entity Field Float Id;
     25 LoadV      "." "load.v" Entity Field Vector Id;
     26 LoadS      "." "load.s" Entity Field String Id;
     27 LoadEnt    "." "load.ent" Entity Field Entity Id;
     28 LoadFld    "." "load.fld" Entity Field Field Id;
     29 LoadFn     "." "load.fn" Entity Field Func Id;
     30 Address    "&" "address" Entity Field Pointer Id;
     31 StoreF     "=" "store.f" Float Float Invalid Id;
     32 StoreV     "=" "store.v" Vector Vector Invalid Id;
     33 StoreS     "=" "store.s" String String Invalid Id;
     34 StoreEnt   "=" "store.ent" Entity Entity Invalid Id;
     35 StoreFld   "=" "store.fld" Field Field Invalid Id;
     36 StoreFn    "=" "store.fn" Func Func Invalid Id;
     37 StorepF    ".=" "storep.f" Float Pointer Invalid Id;
     38 StorepV    ".=" "storep.v" Vector Pointer Invalid Id;
     39 StorepS    ".=" "storep.s" String Pointer Invalid Id;
     40 StorepEnt  ".=" "storep.ent" Entity Pointer Invalid Id;
     41 StorepFld  ".=" "storep.fld" Field Pointer Invalid Id;
     42 StorepFn   ".=" "storep.fn" Func Pointer Invalid Id;
     43 Return     "<RETURN>" "return" Void Invalid Invalid Id;
     44 NotF       "!" "not.f" Float Invalid Int Id;
     45 NotV       "!" "not.v" Vector Invalid Int Id;
     46 NotS       "!" "not.s" String Invalid Int Id;
     47 NotEnt     "!" "not.ent" Entity Invalid Int Id;
     48 NotFn      "!" "not.fn" Func Invalid Int Id;
     49 If         "<IF>" "if" Int Short Invalid Id;
     50 Ifnot      "<IFNOT>" "ifnot" Int Short Invalid Id;
     51 Call0      "<CALL0>" "call0" Func Invalid Invalid Id;
     52 Call1      "<CALL1>" "call1" Func Invalid Invalid Id;
     53 Call2      "<CALL2>" "call2" Func Invalid Invalid Id;
     54 Call3      "<CALL3>" "call3" Func Invalid Invalid Id;
     55 Call4      "<CALL4>" "call4" Func Invalid Invalid Id;
     56 Call5      "<CALL5>" "call5" Func Invalid Invalid Id;
     57 Call6      "<CALL6>" "call6" Func Invalid Invalid Id;
     58 Call7      "<CALL7>" "call7" Func Invalid Invalid Id;
     59 Call8      "<CALL8>" "call8" Func Invalid Invalid Id;
     60 State      "<STATE>" "state" Float Func Invalid Id;
     61 Goto       "<GOTO>" "goto" Short Invalid Invalid Id;
     62 And        "&&" "and.f" Float Float Int Id;
     63 Or         "||" "or.f" Float Float Int Id;
     64 Bitand     "&" "bitand" Float Float Float Id;
     65 Bitor      "|" "bitor" Float Float Float Id;
     66 AddS       "+" "add.s" String String String V6p;
     67 LeS        "<=" "le.s" String String Int V6p;
     68 GeS        ">=" "ge.s" String String Int V6p;
     69 LtS        "<" "lt.s" String String Int V6p;
     70 GtS        ">" "gt.s" String String Int V6p;
     71 AddI       "+" "add.i" Int Int Int V6p;
     72 SubI       "-" "sub.i" Int Int Int V6p;
     73 MulI       "*" "mul.i" Int Int Int V6p;
     74 DivI       "/" "div.i" Int Int Int V6p;
     75 BitandI    "&" "bitand.i" Int Int Int V6p;
     76 BitorI     "|" "bitor.i" Int Int Int V6p;
     77 GeI        ">=" "ge.i" Int Int Int V6p;
     78 LeI        "<=" "le.i" Int Int Int V6p;
     79 GtI        ">" "gt.i" Int Int Int V6p;
     80 LtI        "<" "lt.i" Int Int Int V6p;
     81 AndI       "&&" "and.i" Int Int Int V6p;
     82 OrI        "||" "or.i" Int Int Int V6p;
     83 NotI       "!" "not.i" Int Invalid Int V6p;
     84 EqI        "==" "eq.i" Int Int Int V6p;
     85 NeI        "!=" "ne.i" Int Int Int V6p;
     86 StoreI     "=" "store.i" Int Int Invalid V6p;
     87 StorepI    ".=" "storep.i" Int Pointer Invalid V6p;
     88 LoadI      "." "load.i" Entity Field Int V6p;
     89 ConvIf     "<CONV>" "conv.if" Int Invalid Float V6p;
     90 ConvFi     "<CONV>" "conv.fi" Float Invalid Int V6p;
     91 BitxorF    "^" "bitxor.f" Float Float Float V6p;
     92 BitxorI    "^" "bitxor.i" Int Int Int V6p;
     93 BitnotF    "~" "bitnot.f" Float Invalid Float V6p;
     94 BitnotI    "~" "bitnot.i" Int Invalid Int V6p;
     95 ShlF       "<<" "shl.f" Float Float Float V6p;
     96 ShrF       ">>" "shr.f" Float Float Float V6p;
     97 ShlI       "<<" "shl.i" Int Int Int V6p;
     98 ShrI       ">>" "shr.i" Int Int Int V6p;
     99 RemF       "%" "rem.f" Float Float Float V6p;
    100 RemI       "%" "rem.i" Int Int Int V6p;
    101 LoadbF     "." "loadb.f" Pointer Int Float V6p;
    102 LoadbV     "." "loadb.v" Pointer Int Vector V6p;
    103 LoadbS     "." "loadb.s" Pointer Int String V6p;
    104 LoadbEnt   "." "loadb.ent" Pointer Int Entity V6p;
    105 LoadbFld   "." "loadb.fld" Pointer Int Field V6p;
    106 LoadbFn    "." "loadb.fn" Pointer Int Func V6p;
    107 LoadbI     "." "loadb.i" Pointer Int Int V6p;
    108 LoadbP     "." "loadb.p" Pointer Int Pointer V6p;
    109 StorebF    ".=" "storeb.f" Float Pointer Int V6p;
    110 StorebV    ".=" "storeb.v" Vector Pointer Int V6p;
    111 StorebS    ".=" "storeb.s" String Pointer Int V6p;
    112 StorebEnt  ".=" "storeb.ent" Entity Pointer Int V6p;
    113 StorebFld  ".=" "storeb.fld" Field Pointer Int V6p;
    114 StorebFn   ".=" "storeb.fn" Func Pointer Int V6p;
    115 StorebI    ".=" "storeb.i" Int Pointer Int V6p;
    116 StorebP    ".=" "storeb.p" Pointer Pointer Int V6p;
    117 AddressVoid "&" "address" Void Invalid Pointer V6p;
    118 AddressF   "&" "address.f" Float Invalid Pointer V6p;
    119 AddressV   "&" "address.v" Vector Invalid Pointer V6p;
    120 AddressS   "&" "address.s" String Invalid Pointer V6p;
    121 AddressEnt "&" "address.ent" Entity Invalid Pointer V6p;
    122 AddressFld "&" "address.fld" Field Invalid Pointer V6p;
    123 AddressFn  "&" "address.fn" Func Invalid Pointer V6p;
    124 AddressI   "&" "address.i" Int Invalid Pointer V6p;
    125 AddressP   "&" "address.p" Pointer Invalid Pointer V6p;
    126 Lea        "&" "lea" Pointer Int Pointer V6p;
    127 Ifbe       "<IFBE>" "ifbe" Int Short Invalid V6p;
    128 Ifb        "<IFB>" "ifb" Int Short Invalid V6p;
    129 Ifae       "<IFAE>" "ifae" Int Short Invalid V6p;
    130 Ifa        "<IFA>" "ifa" Int Short Invalid V6p;
    131 Jump       "<JUMP>" "jump" Int Invalid Invalid V6p;
    132 Jumpb      "<JUMPB>" "jumpb" Void Int Invalid V6p;
    133 LtU        "<" "lt.u" Uint Uint Int V6p;
    134 GtU        ">" "gt.u" Uint Uint Int V6p;
    135 LeU        "<=" "le.u" Uint Uint Int V6p;
    136 GeU        ">=" "ge.u" Uint Uint Int V6p;
    137 LoadbiF    "." "loadbi.f" Pointer Short Float V6p;
    138 LoadbiV    "." "loadbi.v" Pointer Short Vector V6p;
    139 LoadbiS    "." "loadbi.s" Pointer Short String V6p;
    140 LoadbiEnt  "." "loadbi.ent" Pointer Short Entity V6p;
    141 LoadbiFld  "." "loadbi.fld" Pointer Short Field V6p;
    142 LoadbiFn   "." "loadbi.fn" Pointer Short Func V6p;
    143 LoadbiI    "." "loadbi.i" Pointer Short Int V6p;
    144 LoadbiP    "." "loadbi.p" Pointer Short Pointer V6p;
    145 StorebiF   ".=" "storebi.f" Float Pointer Short V6p;
    146 StorebiV   ".=" "storebi.v" Vector Pointer Short V6p;
    147 StorebiS   ".=" "storebi.s" String Pointer Short V6p;
    148 StorebiEnt ".=" "storebi.ent" Entity Pointer Short V6p;
    149 StorebiFld ".=" "storebi.fld" Field Pointer Short V6p;
    150 StorebiFn  ".=" "storebi.fn" Func Pointer Short V6p;
    151 StorebiI   ".=" "storebi.i" Int Pointer Short V6p;
    152 StorebiP   ".=" "storebi.p" Pointer Pointer Short V6p;
    153 Leai       "&" "leai" Pointer Short Pointer V6p;
    154 LoadP      "." "load.p" Entity Field Pointer V6p;
    155 StoreP     "=" "store.p" Pointer Pointer Invalid V6p;
    156 StorepP    ".=" "storep.p" Pointer Pointer Invalid V6p;
    157 NotP       "!" "not.p" Pointer Invalid Int V6p;
    158 EqP        "==" "eq.p" Pointer Pointer Int V6p;
    159 NeP        "!=" "ne.p" Pointer Pointer Int V6p;
    160 LeP        "<=" "le.p" Pointer Pointer Int V6p;
    161 GeP        ">=" "ge.p" Pointer Pointer Int V6p;
    162 LtP        "<" "lt.p" Pointer Pointer Int V6p;
    163 GtP        ">" "gt.p" Pointer Pointer Int V6p;
    164 Movei      "<MOVE>" "movei" Void Short Void V6p;
    165 Movep      "<MOVEP>" "movep" Pointer Int Pointer V6p;
    166 Movepi     "<MOVEP>" "movepi" Pointer Short Pointer V6p;
    167 ShrU       ">>" "shr.u" Uint Int Uint V6p;
    168 StateF     "<STATE>" "state.f" Float Func Float V6p;
    169 AddQ       "+" "add.q" Quat Quat Quat V6p;
    170 SubQ       "-" "sub.q" Quat Quat Quat V6p;
    171 MulQ       "*" "mul.q" Quat Quat Quat V6p;
    172 MulQf      "*" "mul.qf" Quat Float Quat V6p;
    173 MulFq      "*" "mul.fq" Float Quat Quat V6p;
    174 MulQv      "*" "mul.qv" Quat Vector Vector V6p;
    175 ConjQ      "~" "conj.q" Quat Invalid Quat V6p;
    176 NotQ       "!" "not.q" Quat Invalid Int V6p;
    177 EqQ        "==" "eq.q" Quat Quat Int V6p;
    178 NeQ        "!=" "ne.q" Quat Quat Int V6p;
    179 StoreQ     "=" "store.q" Quat Quat Invalid V6p;
    180 StorebQ    ".=" "storeb.q" Quat Pointer Int V6p;
    181 StorebiQ   ".=" "storebi.q" Quat Pointer Short V6p;
    182 StorepQ    ".=" "storep.q" Quat Pointer Invalid V6p;
    183 LoadQ      "." "load.q" Entity Field Quat V6p;
    184 LoadbQ     "." "loadb.q" Pointer Int Quat V6p;
    185 LoadbiQ    "." "loadbi.q" Pointer Short Quat V6p;
    186 AddressQ   "&" "address.q" Quat Invalid Pointer V6p;
    188 Rcall1     "<RCALL1>" "rcall1" Func Void Invalid V6p;
    189 Rcall2     "<RCALL2>" "rcall2" Func Void Void V6p;
    190 Rcall3     "<RCALL3>" "rcall3" Func Void Void V6p;
    191 Rcall4     "<RCALL4>" "rcall4" Func Void Void V6p;
    192 Rcall5     "<RCALL5>" "rcall5" Func Void Void V6p;
    193 Rcall6     "<RCALL6>" "rcall6" Func Void Void V6p;
    194 Rcall7     "<RCALL7>" "rcall7" Func Void Void V6p;
    195 Rcall8     "<RCALL8>" "rcall8" Func Void Void V6p;
    196 ReturnV    "<RETURN_V>" "return" Invalid Invalid Invalid V6p;
    197 PushS      "<PUSH>" "push.s" String Invalid Invalid V6p;
    198 PushF      "<PUSH>" "push.f" Float Invalid Invalid V6p;
    199 PushV      "<PUSH>" "push.v" Vector Invalid Invalid V6p;
    200 PushEnt    "<PUSH>" "push.ent" Entity Invalid Invalid V6p;
    201 PushFld    "<PUSH>" "push.fld" Field Invalid Invalid V6p;
    202 PushFn     "<PUSH>" "push.fn" Func Invalid Invalid V6p;
    203 PushP      "<PUSH>" "push.p" Pointer Invalid Invalid V6p;
    204 PushQ      "<PUSH>" "push.q" Quat Invalid Invalid V6p;
    205 PushI      "<PUSH>" "push.i" Int Invalid Invalid V6p;
    206 PushD      "<PUSH>" "push.d" Double Invalid Invalid V6p;
    207 PushbS     "<PUSH>" "pushb.s" Pointer Int String V6p;
    208 PushbF     "<PUSH>" "pushb.f" Pointer Int Float V6p;
    209 PushbV     "<PUSH>" "pushb.v" Pointer Int Vector V6p;
    210 PushbEnt   "<PUSH>" "pushb.ent" Pointer Int Entity V6p;
    211 PushbFld   "<PUSH>" "pushb.fld" Pointer Int Field V6p;
    212 PushbFn    "<PUSH>" "pushb.fn" Pointer Int Func V6p;
    213 PushbP     "<PUSH>" "pushb.p" Pointer Int Pointer V6p;
    214 PushbQ     "<PUSH>" "pushb.q" Pointer Int Quat V6p;
    215 PushbI     "<PUSH>" "pushb.i" Pointer Int Int V6p;
    216 PushbD     "<PUSH>" "pushb.d" Pointer Int Double V6p;
    217 PushbiS    "<PUSH>" "pushbi.s" Pointer Short String V6p;
    218 PushbiF    "<PUSH>" "pushbi.f" Pointer Short Float V6p;
    219 PushbiV    "<PUSH>" "pushbi.v" Pointer Short Vector V6p;
    220 PushbiEnt  "<PUSH>" "pushbi.ent" Pointer Short Entity V6p;
    221 PushbiFld  "<PUSH>" "pushbi.fld" Pointer Short Field V6p;
    222 PushbiFn   "<PUSH>" "pushbi.fn" Pointer Short Func V6p;
    223 PushbiP    "<PUSH>" "pushbi.p" Pointer Short Pointer V6p;
    224 PushbiQ    "<PUSH>" "pushbi.q" Pointer Short Quat V6p;
    225 PushbiI    "<PUSH>" "pushbi.i" Pointer Short Int V6p;
    226 PushbiD    "<PUSH>" "pushbi.d" Pointer Short Double V6p;
    227 PopS       "<POP>" "pop.s" String Invalid Invalid V6p;
    228 PopF       "<POP>" "pop.f" Float Invalid Invalid V6p;
    229 PopV       "<POP>" "pop.v" Vector Invalid Invalid V6p;
    230 PopEnt     "<POP>" "pop.ent" Entity Invalid Invalid V6p;
    231 PopFld     "<POP>" "pop.fld" Field Invalid Invalid V6p;
    232 PopFn      "<POP>" "pop.fn" Func Invalid Invalid V6p;
    233 PopP       "<POP>" "pop.p" Pointer Invalid Invalid V6p;
    234 PopQ       "<POP>" "pop.q" Quat Invalid Invalid V6p;
    235 PopI       "<POP>" "pop.i" Int Invalid Invalid V6p;
    236 PopD       "<POP>" "pop.d" Double Invalid Invalid V6p;
    237 PopbS      "<POP>" "popb.s" Pointer Int String V6p;
    238 PopbF      "<POP>" "popb.f" Pointer Int Float V6p;
    239 PopbV      "<POP>" "popb.v" Pointer Int Vector V6p;
    240 PopbEnt    "<POP>" "popb.ent" Pointer Int Entity V6p;
    241 PopbFld    "<POP>" "popb.fld" Pointer Int Field V6p;
    242 PopbFn     "<POP>" "popb.fn" Pointer Int Func V6p;
    243 PopbP      "<POP>" "popb.p" Pointer Int Pointer V6p;
    244 PopbQ      "<POP>" "popb.q" Pointer Int Quat V6p;
    245 PopbI      "<POP>" "popb.i" Pointer Int Int V6p;
    246 PopbD      "<POP>" "popb.d" Pointer Int Double V6p;
    247 PopbiS     "<POP>" "popbi.s" Pointer Short String V6p;
    248 PopbiF     "<POP>" "popbi.f" Pointer Short Float V6p;
    249 PopbiV     "<POP>" "popbi.v" Pointer Short Vector V6p;
    250 PopbiEnt   "<POP>" "popbi.ent" Pointer Short Entity V6p;
    251 PopbiFld   "<POP>" "popbi.fld" Pointer Short Field V6p;
    252 PopbiFn    "<POP>" "popbi.fn" Pointer Short Func V6p;
    253 PopbiP     "<POP>" "popbi.p" Pointer Short Pointer V6p;
    254 PopbiQ     "<POP>" "popbi.q" Pointer Short Quat V6p;
    255 PopbiI     "<POP>" "popbi.i" Pointer Short Int V6p;
    256 PopbiD     "<POP>" "popbi.d" Pointer Short Double V6p;
    257 AddD       "+" "add.d" Double Double Double V6p;
    258 SubD       "-" "sub.d" Double Double Double V6p;
    259 MulD       "*" "mul.d" Double Double Double V6p;
    260 MulQd      "*" "mul.qd" Quat Double Quat V6p;
    261 MulDq      "*" "mul.dq" Double Quat Quat V6p;
    262 MulVd      "*" "mul.vd" Vector Double Vector V6p;
    263 MulDv      "*" "mul.dv" Double Vector Vector V6p;
    264 DivD       "/" "div.d" Double Double Double V6p;
    265 RemD       "%" "rem.d" Double Double Double V6p;
    266 GeD        ">=" "ge.d" Double Double Int V6p;
    267 LeD        "<=" "le.d" Double Double Int V6p;
    268 GtD        ">" "gt.d" Double Double Int V6p;
    269 LtD        "<" "lt.d" Double Double Int V6p;
    270 NotD       "!" "not.d" Double Invalid Int V6p;
    271 EqD        "==" "eq.d" Double Double Int V6p;
    272 NeD        "!=" "ne.d" Double Double Int V6p;
    273 ConvFd     "<CONV>" "conv.fd" Float Invalid Double V6p;
    274 ConvDf     "<CONV>" "conv.df" Double Invalid Float V6p;
    275 ConvId     "<CONV>" "conv.id" Int Invalid Double V6p;
    276 ConvDi     "<CONV>" "conv.di" Double Invalid Int V6p;
    277 StoreD     "=" "store.d" Double Double Invalid V6p;
    278 StorebD    ".=" "storeb.d" Double Pointer Int V6p;
    279 StorebiD   ".=" "storebi.d" Double Pointer Short V6p;
    280 StorepD    ".=" "storep.d" Double Pointer Invalid V6p;
    281 LoadD      "." "load.d" Entity Field Double V6p;
    282 LoadbD     "." "loadb.d" Pointer Int Double V6p;
    283 LoadbiD    "." "loadbi.d" Pointer Short Double V6p;
    284 AddressD   "&" "address.d" Double Invalid Pointer V6p;
    285 ModI       "%%" "mod.i" Int Int Int V6p;
    286 ModF       "%%" "mod.f" Float Float Float V6p;
    287 ModD       "%%" "mod.d" Double Double Double V6p;
    288 Memseti    "<MEMSET>" "memseti" Int Short Void V6p;
    289 Memsetp    "<MEMSETP>" "memsetp" Int Int Pointer V6p;
    290 Memsetpi   "<MEMSETP>" "memsetpi" Int Short Pointer V6p;
}

impl Opcode {
    pub fn opname(self) -> &'static str {
        self.info().opname
    }

    pub fn is_branch(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Goto | If | Ifnot | Ifbe | Ifb | Ifae | Ifa
        )
    }

    pub fn is_call(self) -> bool {
        (self as u16 >= Opcode::Call0 as u16 && self as u16 <= Opcode::Call8 as u16)
            || (self as u16 >= Opcode::Rcall1 as u16 && self as u16 <= Opcode::Rcall8 as u16)
    }

    pub fn is_push_pop(self) -> bool {
        self as u16 >= Opcode::PushS as u16 && self as u16 <= Opcode::PopbiD as u16
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.info().opname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering() {
        assert_eq!(Opcode::from_u16(0), Some(Opcode::Done));
        assert_eq!(Opcode::from_u16(43), Some(Opcode::Return));
        assert_eq!(Opcode::from_u16(65), Some(Opcode::Bitor));
        assert_eq!(Opcode::from_u16(187), None);
        assert_eq!(Opcode::from_u16(290), Some(Opcode::Memsetpi));
        assert_eq!(Opcode::from_u16(291), None);
    }

    #[test]
    fn test_every_number_round_trips() {
        for n in 0..=290u16 {
            if let Some(op) = Opcode::from_u16(n) {
                assert_eq!(op as u16, n);
            }
        }
    }

    #[test]
    fn test_versions() {
        assert_eq!(Opcode::Bitor.info().version, Version::Id);
        assert_eq!(Opcode::AddS.info().version, Version::V6p);
        assert_eq!(Opcode::MulVd.info().version, Version::V6p);
        assert_eq!(Opcode::StorepD.info().version, Version::V6p);
    }

    #[test]
    fn test_families() {
        assert!(Opcode::Call3.is_call());
        assert!(Opcode::Rcall8.is_call());
        assert!(!Opcode::ReturnV.is_call());
        assert!(Opcode::PushbiQ.is_push_pop());
        assert!(Opcode::Ifa.is_branch());
        assert_eq!(Opcode::LoadbiV.info().types, [Pointer, Short, Vector]);
    }
}
