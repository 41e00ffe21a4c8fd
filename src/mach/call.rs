use super::debugger::DebugEvent;
use super::progs::Entry;
use super::{Progs, Value};
use crate::error;
use crate::prog::{Error, MAX_PARMS};

type Result<T> = std::result::Result<T, Error>;

/// One activation of a bytecode function.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    /// The calling statement; execution resumes after it.
    pub statement: u32,
    pub function: usize,
    /// The caller's temp strings, reinstated on return.
    pub temps: Vec<i32>,
    /// Length of the locals window before this call.
    pub locals: usize,
}

fn align(ofs: u32, alignment: u32) -> u32 {
    let mask = (1u32 << alignment) - 1;
    (ofs + mask) & !mask
}

impl Progs {
    /// Current call depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> impl Iterator<Item = &CallFrame> {
        self.frames.iter()
    }

    pub fn current_function(&self) -> usize {
        self.xfunction
    }

    pub fn current_statement(&self) -> u32 {
        self.xstatement
    }

    /// Sets the parameters from `args`, then runs `fnum`.
    pub fn call(&mut self, fnum: i32, args: &[Value]) -> Result<()> {
        if args.len() > MAX_PARMS {
            return Err(error!(BadFunction; "{} arguments is more than {}", args.len(), MAX_PARMS));
        }
        for (i, &arg) in args.iter().enumerate() {
            if arg.size() > self.abi.param_size {
                return Err(error!(BadFunction;
                    "argument {} needs {} cells but parameters hold {}",
                    i,
                    arg.size(),
                    self.abi.param_size
                ));
            }
            let ofs = self.abi.param_ofs[i];
            self.memory.set_value(ofs, arg)?;
        }
        self.argc = args.len();
        self.execute(fnum)
    }

    /// Like `call`, looking the function up by name.
    pub fn call_by_name(&mut self, name: &str, args: &[Value]) -> Result<()> {
        match self.find_function(name) {
            Some(fnum) => self.call(fnum, args),
            None => Err(error!(MissingSymbol; "no function named {}", name)),
        }
    }

    /// Starts a call. Builtins run to completion here and the result is
    /// `false`; a bytecode function is entered and the result is `true`.
    pub(crate) fn call_function(&mut self, fnum: i32) -> Result<bool> {
        if fnum == 0 {
            let self_ent = self.memory.get::<u32>(self.abi.self_ofs)?;
            if self_ent != 0 {
                return Err(error!(NullFunction; "self = {}", self.value_string(Value::Entity(self_ent))));
            }
            return Err(error!(NullFunction));
        }
        if fnum < 0 {
            let func = match self.builtins.by_id(-fnum) {
                Some(b) => b.func,
                None => return Err(error!(BadFunction; "Bad builtin call number {}", -fnum)),
            };
            func(self)?;
            return Ok(false);
        }
        let (entry, native) = match self.functions.get(fnum as usize) {
            Some(f) => (f.entry, f.native),
            None => return Err(error!(BadFunction; "Bad function number {}", fnum)),
        };
        match (entry, native) {
            (Entry::Statement(_), _) => {
                self.enter_function(fnum as usize)?;
                Ok(true)
            }
            (Entry::Builtin(_), Some(func)) => {
                if let Some(f) = self.functions.get_mut(fnum as usize) {
                    f.profile += 1;
                }
                func(self)?;
                Ok(false)
            }
            (Entry::Null, _) => Err(error!(NullFunction)),
            (Entry::Builtin(id), None) | (Entry::Missing(id), _) => Err(error!(Builtin;
                "Bad builtin call number {} ({})",
                id,
                self.function_name(fnum)
            )),
        }
    }

    pub(crate) fn enter_function(&mut self, fnum: usize) -> Result<()> {
        let def = match self.functions.get(fnum) {
            Some(f) => f.def,
            None => return Err(error!(BadFunction; "Bad function number {}", fnum)),
        };
        let frame = CallFrame {
            statement: self.xstatement,
            function: self.xfunction,
            temps: vec![],
            locals: self.locals.len(),
        };
        self.frames.push(frame)?;
        let saved = match self.memory.slice(def.params_start, def.locals) {
            Ok(locals) => self.locals.extend_from_slice(locals),
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            let _ = self.frames.pop();
            return Err(e);
        }
        let temps = self.strings.take_temps();
        if let Some(frame) = self.frames.last_mut() {
            frame.temps = temps;
        }

        if self.config.deadbeef_locals {
            self.memory.fill(def.params_start, def.locals, 0xdead_beef)?;
        }

        let param_size = self.abi.param_size;
        let fixed = def.fixed_params();
        let mut dst = def.params_start;
        if def.is_varargs() {
            dst += 2;
        }
        for i in 0..fixed.min(MAX_PARMS) {
            let (size, alignment) = def.param(i);
            dst = align(dst, alignment);
            self.memory.copy(self.abi.param_ofs[i], dst, size)?;
            dst += size;
        }
        if def.is_varargs() {
            dst = align(dst, self.abi.param_alignment);
            let argc = self.argc.saturating_sub(fixed);
            self.memory.set(def.params_start, argc as i32)?;
            self.memory.set(def.params_start + 1, dst)?;
            for i in fixed..self.argc.min(MAX_PARMS) {
                self.memory.copy(self.abi.param_ofs[i], dst, param_size)?;
                dst += param_size;
            }
        }

        self.xfunction = fnum;
        self.xstatement = (def.first_statement as u32).wrapping_sub(1);
        self.debug_event(DebugEvent::Subenter(fnum));
        Ok(())
    }

    /// Pops the current frame without telling the debugger. The string
    /// in the return slot survives when `keep` is set.
    fn pop_frame(&mut self, keep: bool) -> Result<()> {
        let def = match self.functions.get(self.xfunction) {
            Some(f) => f.def,
            None => return Err(error!(BadFunction; "Bad function number {}", self.xfunction)),
        };
        let n = def.locals as usize;
        let saved = self.locals.tail(n)?;
        self.memory
            .slice_mut(def.params_start, def.locals)?
            .copy_from_slice(saved);
        self.locals.truncate_by(n)?;
        let frame = self.frames.pop()?;
        let keep = if keep {
            self.memory.get::<i32>(self.abi.return_ofs)?
        } else {
            0
        };
        self.strings.release_temps(frame.temps, keep);
        self.xstatement = frame.statement;
        self.xfunction = frame.function;
        Ok(())
    }

    pub(crate) fn leave_function(&mut self) -> Result<()> {
        self.pop_frame(true)?;
        self.debug_event(DebugEvent::Subexit);
        Ok(())
    }

    /// Pops frames back to `depth`, restoring locals and releasing temp
    /// strings. Used when an error abandons a call.
    pub(crate) fn unwind(&mut self, depth: usize) {
        while self.frames.len() > depth {
            if self.pop_frame(false).is_err() {
                break;
            }
        }
        while self.frames.len() > depth {
            match self.frames.pop() {
                Ok(frame) => {
                    self.locals.truncate(frame.locals);
                    self.strings.release_temps(frame.temps, 0);
                    self.xstatement = frame.statement;
                    self.xfunction = frame.function;
                }
                Err(_) => break,
            }
        }
    }
}
