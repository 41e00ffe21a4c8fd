/*!
## Stock builtins

Engine-independent builtins with their classic numbers. Install them
with `register` before loading an image that uses them.

*/

use super::builtins::{BuiltinFn, BuiltinId};
use super::memory::float_string;
use super::resources::Resource;
use super::{Operation, Progs};
use crate::error;
use crate::prog::{Error, Etype};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

type Result<T> = std::result::Result<T, Error>;

const RANDOM: &str = "random";

/// Per-VM generator behind `random`.
pub struct Random {
    seed: Option<u64>,
    rng: StdRng,
}

impl Random {
    pub fn new(seed: Option<u64>) -> Random {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Random { seed, rng }
    }
}

impl Resource for Random {
    fn clear(&mut self) {
        *self = Random::new(self.seed);
    }
}

const BUILTINS: &[(&str, i32, BuiltinFn)] = &[
    ("break", 6, pf_break),
    ("random", 7, pf_random),
    ("normalize", 9, pf_normalize),
    ("vlen", 12, pf_vlen),
    ("vectoyaw", 13, pf_vectoyaw),
    ("spawn", 14, pf_spawn),
    ("remove", 15, pf_remove),
    ("find", 18, pf_find),
    ("dprint", 25, pf_dprint),
    ("ftos", 26, pf_ftos),
    ("vtos", 27, pf_vtos),
    ("coredump", 28, pf_coredump),
    ("traceon", 29, pf_traceon),
    ("traceoff", 30, pf_traceoff),
    ("eprint", 31, pf_eprint),
    ("rint", 36, pf_rint),
    ("floor", 37, pf_floor),
    ("ceil", 38, pf_ceil),
    ("fabs", 43, pf_fabs),
    ("nextent", 47, pf_nextent),
    ("vectoangles", 51, pf_vectoangles),
    ("stof", 81, pf_stof),
    ("strlen", 100, pf_strlen),
    ("charcount", 101, pf_charcount),
    ("sprintf", 109, pf_sprintf),
    ("ftoi", 110, pf_ftoi),
    ("itof", 111, pf_itof),
    ("itos", 112, pf_itos),
    ("stoi", 113, pf_stoi),
    ("stov", 114, pf_stov),
];

/// Registers every stock builtin and the generator `random` draws
/// from. A seed makes `random` repeatable.
pub fn register(progs: &mut Progs, seed: Option<u64>) -> Result<()> {
    for &(name, id, func) in BUILTINS {
        progs.register_builtin(name, BuiltinId::Fixed(id), func)?;
    }
    progs.register_resource(RANDOM, Random::new(seed))
}

fn param_edict(progs: &Progs, i: usize) -> Result<usize> {
    let ent = progs.param::<u32>(i)?;
    progs.entity_to_edict(ent)
}

fn return_edict(progs: &mut Progs, edict: usize) -> Result<()> {
    let ent = progs.edict_to_entity(edict);
    progs.set_return(ent)
}

/// Concatenates the string parameters from `first` on.
fn var_string(progs: &Progs, first: usize) -> Result<String> {
    let mut out = String::new();
    for i in first..progs.argc() {
        out.push_str(&progs.param_string(i)?);
    }
    Ok(out)
}

fn yaw(v: [f32; 3]) -> f32 {
    if v[0] == 0.0 && v[1] == 0.0 {
        return 0.0;
    }
    let yaw = (v[1].atan2(v[0]).to_degrees()) as i32 as f32;
    if yaw < 0.0 {
        yaw + 360.0
    } else {
        yaw
    }
}

fn pf_break(progs: &mut Progs) -> Result<()> {
    progs.print("break statement\n");
    let state = progs.dump_state();
    progs.print(&state);
    Ok(())
}

fn pf_random(progs: &mut Progs) -> Result<()> {
    let r = match progs.find_resource_mut::<Random>(RANDOM) {
        Some(random) => random.rng.next_u32(),
        None => return Err(error!(Builtin; "random: no generator registered")),
    };
    progs.set_return((r & 0x7fff) as f32 / 0x7fff as f32)
}

fn pf_normalize(progs: &mut Progs) -> Result<()> {
    let v = progs.param::<[f32; 3]>(0)?;
    let len = Operation::length_v(v);
    let n = if len == 0.0 {
        [0.0; 3]
    } else {
        Operation::scale_v(v, 1.0 / len)
    };
    progs.set_return(n)
}

fn pf_vlen(progs: &mut Progs) -> Result<()> {
    let v = progs.param::<[f32; 3]>(0)?;
    progs.set_return(Operation::length_v(v))
}

fn pf_vectoyaw(progs: &mut Progs) -> Result<()> {
    let v = progs.param::<[f32; 3]>(0)?;
    progs.set_return(yaw(v))
}

fn pf_vectoangles(progs: &mut Progs) -> Result<()> {
    let v = progs.param::<[f32; 3]>(0)?;
    let (pitch, yaw) = if v[0] == 0.0 && v[1] == 0.0 {
        (if v[2] > 0.0 { 90.0 } else { 270.0 }, 0.0)
    } else {
        let forward = (v[0] * v[0] + v[1] * v[1]).sqrt();
        let mut pitch = (v[2].atan2(forward).to_degrees()) as i32 as f32;
        if pitch < 0.0 {
            pitch += 360.0;
        }
        (pitch, yaw(v))
    };
    progs.set_return([pitch, yaw, 0.0])
}

fn pf_spawn(progs: &mut Progs) -> Result<()> {
    let edict = progs.alloc_edict()?;
    return_edict(progs, edict)
}

fn pf_remove(progs: &mut Progs) -> Result<()> {
    let edict = param_edict(progs, 0)?;
    progs.free_edict(edict)
}

fn pf_find(progs: &mut Progs) -> Result<()> {
    let start = param_edict(progs, 0)?;
    let field = progs.param::<u32>(1)?;
    let def = progs
        .image()
        .fielddefs
        .iter()
        .find(|d| d.offset as u32 == field)
        .copied();
    let etype = match def {
        Some(def) => def.etype(),
        None => return Err(error!(Builtin; "find: bad search field {}", field)),
    };
    let mut edict = start;
    while let Some(next) = progs.next_edict(edict) {
        edict = next;
        let ptr = progs.edict_ptr(edict).add(field).0;
        let found = match etype {
            Etype::String => {
                let wanted = progs.param_string(2)?;
                let handle = progs.memory().get::<i32>(ptr)?;
                progs.string(handle)? == wanted.as_str()
            }
            Etype::Float => progs.memory().get::<f32>(ptr)? == progs.param::<f32>(2)?,
            Etype::Vector => progs.memory().get::<[f32; 3]>(ptr)? == progs.param::<[f32; 3]>(2)?,
            Etype::Int | Etype::Entity | Etype::Func | Etype::Uint => {
                progs.memory().get::<u32>(ptr)? == progs.param::<u32>(2)?
            }
            _ => return Err(error!(Builtin; "find: unsupported search field type {}", etype)),
        };
        if found {
            return return_edict(progs, edict);
        }
    }
    return_edict(progs, 0)
}

fn pf_dprint(progs: &mut Progs) -> Result<()> {
    let s = var_string(progs, 0)?;
    progs.print(&s);
    Ok(())
}

fn pf_ftos(progs: &mut Progs) -> Result<()> {
    let v = progs.param::<f32>(0)?;
    progs.return_string(&float_string(v))
}

fn pf_vtos(progs: &mut Progs) -> Result<()> {
    let v = progs.param::<[f32; 3]>(0)?;
    progs.return_string(&format!("'{:5.1} {:5.1} {:5.1}'", v[0], v[1], v[2]))
}

fn pf_coredump(progs: &mut Progs) -> Result<()> {
    let mut out = String::new();
    for edict in 0..progs.num_edicts() {
        out.push_str(&progs.print_edict(edict)?);
    }
    progs.print(&out);
    Ok(())
}

fn pf_traceon(progs: &mut Progs) -> Result<()> {
    progs.set_trace(true);
    Ok(())
}

fn pf_traceoff(progs: &mut Progs) -> Result<()> {
    progs.set_trace(false);
    Ok(())
}

fn pf_eprint(progs: &mut Progs) -> Result<()> {
    let edict = param_edict(progs, 0)?;
    let s = progs.print_edict(edict)?;
    progs.print(&s);
    Ok(())
}

fn pf_rint(progs: &mut Progs) -> Result<()> {
    let f = progs.param::<f32>(0)?;
    let r = if f > 0.0 {
        (f + 0.5) as i32
    } else {
        (f - 0.5) as i32
    };
    progs.set_return(r as f32)
}

fn pf_floor(progs: &mut Progs) -> Result<()> {
    let f = progs.param::<f32>(0)?;
    progs.set_return(f.floor())
}

fn pf_ceil(progs: &mut Progs) -> Result<()> {
    let f = progs.param::<f32>(0)?;
    progs.set_return(f.ceil())
}

fn pf_fabs(progs: &mut Progs) -> Result<()> {
    let f = progs.param::<f32>(0)?;
    progs.set_return(f.abs())
}

fn pf_nextent(progs: &mut Progs) -> Result<()> {
    let edict = param_edict(progs, 0)?;
    let next = progs.next_edict(edict).unwrap_or(0);
    return_edict(progs, next)
}

/// Leading number of `s` like C's `atof`; junk yields 0.
fn parse_float(s: &str) -> f32 {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return 0.0;
    }
    s[..end].parse().unwrap_or(0.0)
}

fn pf_stof(progs: &mut Progs) -> Result<()> {
    let s = progs.param_string(0)?;
    progs.set_return(parse_float(&s))
}

fn pf_stoi(progs: &mut Progs) -> Result<()> {
    let s = progs.param_string(0)?;
    progs.set_return(parse_float(&s) as i32)
}

fn pf_stov(progs: &mut Progs) -> Result<()> {
    let s = progs.param_string(0)?;
    let mut v = [0.0f32; 3];
    let inner = s.trim().trim_start_matches('\'').trim_end_matches('\'');
    for (slot, word) in v.iter_mut().zip(inner.split_whitespace()) {
        *slot = parse_float(word);
    }
    progs.set_return(v)
}

fn pf_ftoi(progs: &mut Progs) -> Result<()> {
    let f = progs.param::<f32>(0)?;
    progs.set_return(f as i32)
}

fn pf_itof(progs: &mut Progs) -> Result<()> {
    let i = progs.param::<i32>(0)?;
    progs.set_return(i as f32)
}

fn pf_itos(progs: &mut Progs) -> Result<()> {
    let i = progs.param::<i32>(0)?;
    progs.return_string(&i.to_string())
}

fn pf_strlen(progs: &mut Progs) -> Result<()> {
    let s = progs.param_string(0)?;
    progs.set_return(s.len() as f32)
}

fn pf_charcount(progs: &mut Progs) -> Result<()> {
    let goal = progs.param_string(0)?;
    let count = match goal.bytes().next() {
        Some(goal) => progs.param_string(1)?.bytes().filter(|&b| b == goal).count(),
        None => 0,
    };
    progs.set_return(count as f32)
}

/// `printf` for progs: `%s %d %i %x %f %g %v %e %%` with optional
/// width and precision, each conversion taking the next parameter.
pub fn format(progs: &Progs, fmt: &str, first: usize) -> Result<String> {
    let mut out = String::new();
    let mut arg = first;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == '-' {
                spec.push(c);
                chars.next();
            } else {
                break;
            }
        }
        let conv = match chars.next() {
            Some(conv) => conv,
            None => return Err(error!(Builtin; "sprintf: format ends in %")),
        };
        if conv == '%' {
            out.push('%');
            continue;
        }
        if arg >= progs.argc() {
            return Err(error!(Builtin; "sprintf: not enough arguments for {:?}", fmt));
        }
        let left = spec.starts_with('-');
        let spec = spec.trim_start_matches('-');
        let mut parts = spec.splitn(2, '.');
        let width: usize = parts.next().and_then(|w| w.parse().ok()).unwrap_or(0);
        let precision: Option<usize> = parts.next().and_then(|p| p.parse().ok());
        let text = match conv {
            's' => progs.param_string(arg)?,
            'd' | 'i' => progs.param::<i32>(arg)?.to_string(),
            'x' => format!("{:x}", progs.param::<i32>(arg)?),
            'f' => format!("{:.*}", precision.unwrap_or(6), progs.param::<f32>(arg)?),
            'g' => float_string(progs.param::<f32>(arg)?),
            'v' => {
                let v = progs.param::<[f32; 3]>(arg)?;
                let p = precision.unwrap_or(1);
                format!("'{:.*} {:.*} {:.*}'", p, v[0], p, v[1], p, v[2])
            }
            'e' => {
                let edict = param_edict(progs, arg)?;
                format!("entity {}", edict)
            }
            other => return Err(error!(Builtin; "sprintf: unknown conversion %{}", other)),
        };
        arg += 1;
        if left {
            out.push_str(&format!("{:<1$}", text, width));
        } else {
            out.push_str(&format!("{:>1$}", text, width));
        }
    }
    Ok(out)
}

fn pf_sprintf(progs: &mut Progs) -> Result<()> {
    let fmt = progs.param_string(0)?;
    let s = format(progs, &fmt, 1)?;
    progs.return_string(&s)
}
