/*!
## Interpreter

`execute` runs one function to completion. Each statement is fetched,
checked for a breakpoint, traced if asked and dispatched on its opcode.
Operand handling is shared through generic helpers so every typed
variant gets its own monomorphised code.

Errors that a debug handler continues from skip the faulting statement.
Everything else unwinds to the depth `execute` was entered at and comes
back as a fatal error carrying a dump of the VM state.

*/

use super::debugger::{DebugEvent, Resume};
use super::operation::{Quat, Vec3};
use super::{Operation, Progs, Word};
use crate::error;
use crate::prog::{Error, Opcode, Statement, OP_BREAK};
use std::cmp::Ordering;

type Result<T> = std::result::Result<T, Error>;

/// Added to `time` by `state`.
const STATE_THINK: f32 = 0.1;

fn short(operand: u16) -> i32 {
    operand as i16 as i32
}

impl Progs {
    /// Calls `fnum` and runs until it returns.
    ///
    /// Temp strings made at host depth, including one returned by a
    /// top-level call, live until the next top-level call finishes.
    pub fn execute(&mut self, fnum: i32) -> Result<()> {
        if !self.frames.is_empty() {
            return self.run(fnum);
        }
        let stale = self.strings.take_temps();
        let result = self.run(fnum);
        let keep = match self.memory.get::<i32>(self.abi.return_ofs) {
            Ok(handle) => handle,
            // an unloaded VM has no return slot
            Err(_) => 0,
        };
        self.strings.release_chain(stale, keep);
        result
    }

    fn run(&mut self, fnum: i32) -> Result<()> {
        let exitdepth = self.frames.len();
        match self.call_function(fnum) {
            Ok(false) => return Ok(()),
            Ok(true) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let e = self.fatal_error(e);
                self.unwind(exitdepth);
                return Err(e);
            }
        }
        let mut count = 0u64;
        loop {
            if let Err(e) = self.check_limits(&mut count) {
                self.handle_error(e, exitdepth)?;
            }
            self.xstatement = self.xstatement.wrapping_add(1);
            if let Err(e) = self.step() {
                self.handle_error(e, exitdepth)?;
            }
            if self.frames.len() <= exitdepth {
                return Ok(());
            }
        }
    }

    fn check_limits(&mut self, count: &mut u64) -> Result<()> {
        *count += 1;
        if self.config.max_statements > 0 && *count > self.config.max_statements {
            *count = 0;
            return Err(error!(RunawayLoop; "{} statements", self.config.max_statements));
        }
        if self.interrupt.swap(false, std::sync::atomic::Ordering::Relaxed) {
            return Err(error!(Interrupted));
        }
        Ok(())
    }

    /// `Ok` means carry on with the next statement.
    fn handle_error(&mut self, e: Error, exitdepth: usize) -> Result<()> {
        if e.is_fatal() {
            self.unwind(exitdepth);
            return Err(e);
        }
        let e = self.locate(e);
        if e.code() != crate::prog::ErrorCode::Aborted && self.debug_handler.is_some() {
            if self.debug_event(DebugEvent::Error(&e)) == Resume::Continue {
                return Ok(());
            }
        }
        let e = self.fatal_error(e);
        self.unwind(exitdepth);
        Err(e)
    }

    fn locate(&self, e: Error) -> Error {
        let e = e.in_statement(self.xstatement);
        let location = self
            .debug
            .as_ref()
            .and_then(|d| d.location(&self.image, self.xstatement));
        match location {
            Some((file, line)) => e.in_source(&file, line),
            None => e,
        }
    }

    fn fatal_error(&mut self, e: Error) -> Error {
        let e = self.locate(e);
        let trace = self.dump_state();
        self.debug_event(DebugEvent::Terminate);
        log::error!("{}", e);
        log::error!("{}", trace);
        e.with_trace(trace).fatal()
    }

    fn step(&mut self) -> Result<()> {
        let addr = self.xstatement;
        let st = match self.image.statements.get(addr as usize) {
            Some(st) => *st,
            None => return Err(error!(OutOfBounds; "statement {} is out of range", addr)),
        };
        if st.op & OP_BREAK != 0 {
            if self.debug_handler.is_none() {
                return Err(error!(Breakpoint));
            }
            if self.debug_event(DebugEvent::Breakpoint(addr)) == Resume::Abort {
                return Err(error!(Aborted));
            }
        }
        if self.trace {
            if self.debug_handler.is_some() {
                if self.debug_event(DebugEvent::Trace(addr)) == Resume::Abort {
                    return Err(error!(Aborted));
                }
            } else {
                let line = self.print_statement(addr);
                self.print(&format!("{}\n", line));
            }
        }
        if let Some(f) = self.functions.get_mut(self.xfunction) {
            f.profile += 1;
        }
        let op = match Opcode::from_u16(st.op & !OP_BREAK) {
            Some(op) => op,
            None => return Err(error!(BadOpcode; "{}", st.op & !OP_BREAK)),
        };
        self.dispatch(op, &st)?;
        self.check_watchpoint()
    }

    #[inline]
    fn rd<T: Word>(&self, ofs: u16) -> Result<T> {
        self.memory.get(ofs as u32)
    }

    #[inline]
    fn wr<T: Word>(&mut self, ofs: u16, v: T) -> Result<()> {
        self.memory.set(ofs as u32, v)
    }

    #[inline]
    fn binary<A: Word, B: Word, C: Word, F: FnOnce(A, B) -> C>(
        &mut self,
        st: &Statement,
        f: F,
    ) -> Result<()> {
        let a = self.rd::<A>(st.a)?;
        let b = self.rd::<B>(st.b)?;
        self.wr(st.c, f(a, b))
    }

    #[inline]
    fn binary_try<A: Word, B: Word, C: Word, F: FnOnce(A, B) -> Result<C>>(
        &mut self,
        st: &Statement,
        f: F,
    ) -> Result<()> {
        let a = self.rd::<A>(st.a)?;
        let b = self.rd::<B>(st.b)?;
        self.wr(st.c, f(a, b)?)
    }

    #[inline]
    fn unary<A: Word, C: Word, F: FnOnce(A) -> C>(&mut self, st: &Statement, f: F) -> Result<()> {
        let a = self.rd::<A>(st.a)?;
        self.wr(st.c, f(a))
    }

    fn store<T: Word>(&mut self, st: &Statement) -> Result<()> {
        let v = self.rd::<T>(st.a)?;
        self.wr(st.b, v)
    }

    /// Validates a pointer to `size` cells.
    pub(crate) fn check_ptr(&self, ptr: u32, size: u32) -> Result<u32> {
        if self.config.bounds_check {
            if ptr == 0 {
                return Err(error!(OutOfBounds; "null pointer access"));
            }
            if ptr as u64 + size as u64 > self.layout.globals_size as u64 {
                return Err(error!(OutOfBounds; "invalid memory access: {}", ptr));
            }
        }
        Ok(ptr)
    }

    /// Address of `size` cells of `field` in the entity `ent`.
    fn entity_field(&self, ent: u32, field: u32, size: u32) -> Result<u32> {
        if self.config.bounds_check {
            let limit = self.edicts.num_edicts() as u64 * self.layout.edict_size as u64;
            if ent as u64 >= limit {
                return Err(error!(OutOfBounds; "invalid entity {}", ent));
            }
            if field as u64 + size as u64 > self.image.entityfields() as u64 {
                return Err(error!(OutOfBounds; "invalid field {}", field));
            }
        }
        Ok(self.layout.edict_area.wrapping_add(ent).wrapping_add(field))
    }

    fn load_field<T: Word>(&mut self, st: &Statement) -> Result<()> {
        let ent = self.rd::<u32>(st.a)?;
        let field = self.rd::<u32>(st.b)?;
        let ptr = self.entity_field(ent, field, T::SIZE)?;
        let v = self.memory.get::<T>(ptr)?;
        self.wr(st.c, v)
    }

    fn storep<T: Word>(&mut self, st: &Statement) -> Result<()> {
        let ptr = self.rd::<u32>(st.b)?;
        let ptr = self.check_ptr(ptr, T::SIZE)?;
        let v = self.rd::<T>(st.a)?;
        self.memory.set(ptr, v)
    }

    fn loadb<T: Word>(&mut self, st: &Statement, index: i32) -> Result<()> {
        let base = self.rd::<u32>(st.a)?;
        let ptr = self.check_ptr(base.wrapping_add(index as u32), T::SIZE)?;
        let v = self.memory.get::<T>(ptr)?;
        self.wr(st.c, v)
    }

    fn storeb<T: Word>(&mut self, st: &Statement, index: i32) -> Result<()> {
        let base = self.rd::<u32>(st.b)?;
        let ptr = self.check_ptr(base.wrapping_add(index as u32), T::SIZE)?;
        let v = self.rd::<T>(st.a)?;
        self.memory.set(ptr, v)
    }

    fn stack_ofs(&self) -> Result<u32> {
        match self.abi.stack_ofs {
            Some(ofs) => Ok(ofs),
            None => Err(error!(BadOpcode; "no .stack global")),
        }
    }

    fn push<T: Word>(&mut self, v: T) -> Result<()> {
        let stack = self.stack_ofs()?;
        let sp = self.memory.get::<u32>(stack)?;
        let new = sp.wrapping_sub(T::SIZE);
        if self.config.bounds_check
            && (sp < self.layout.stack_bottom + T::SIZE || sp > self.layout.globals_size)
        {
            return Err(error!(StackOverflow; "progs stack overflow"));
        }
        self.memory.set(new, v)?;
        self.memory.set(stack, new)
    }

    fn pop<T: Word>(&mut self) -> Result<T> {
        let stack = self.stack_ofs()?;
        let sp = self.memory.get::<u32>(stack)?;
        if self.config.bounds_check
            && (sp < self.layout.stack_bottom
                || sp as u64 + T::SIZE as u64 > self.layout.globals_size as u64)
        {
            return Err(error!(StackUnderflow; "progs stack underflow"));
        }
        let v = self.memory.get::<T>(sp)?;
        self.memory.set(stack, sp.wrapping_add(T::SIZE))?;
        Ok(v)
    }

    fn push_global<T: Word>(&mut self, st: &Statement) -> Result<()> {
        let v = self.rd::<T>(st.a)?;
        self.push(v)
    }

    fn pushb<T: Word>(&mut self, st: &Statement, index: i32) -> Result<()> {
        let base = self.rd::<u32>(st.a)?;
        let ptr = self.check_ptr(base.wrapping_add(index as u32), T::SIZE)?;
        let v = self.memory.get::<T>(ptr)?;
        self.push(v)
    }

    fn pop_global<T: Word>(&mut self, st: &Statement) -> Result<()> {
        let v = self.pop::<T>()?;
        self.wr(st.a, v)
    }

    fn popb<T: Word>(&mut self, st: &Statement, index: i32) -> Result<()> {
        let base = self.rd::<u32>(st.a)?;
        let ptr = self.check_ptr(base.wrapping_add(index as u32), T::SIZE)?;
        let v = self.pop::<T>()?;
        self.memory.set(ptr, v)
    }

    fn branch(&mut self, delta: i32) {
        self.xstatement = self.xstatement.wrapping_add(delta as u32).wrapping_sub(1);
    }

    fn jump(&mut self, target: u32) -> Result<()> {
        if target as usize >= self.image.statements.len() {
            return Err(error!(OutOfBounds; "jump to {} is out of range", target));
        }
        self.xstatement = target.wrapping_sub(1);
        Ok(())
    }

    fn string_cmp(&self, st: &Statement) -> Result<Ordering> {
        let a = self.rd::<i32>(st.a)?;
        let b = self.rd::<i32>(st.b)?;
        if a == b {
            return Ok(Ordering::Equal);
        }
        Ok(self.strings.get(a)?.cmp(self.strings.get(b)?))
    }

    fn string_is_empty(&self, handle: i32) -> Result<bool> {
        Ok(handle == 0 || self.strings.get(handle)?.is_empty())
    }

    fn call_op(&mut self, st: &Statement, argc: usize) -> Result<()> {
        self.argc = argc;
        let fnum = self.rd::<i32>(st.a)?;
        self.call_function(fnum)?;
        Ok(())
    }

    fn rcall_op(&mut self, st: &Statement, argc: usize) -> Result<()> {
        let size = self.abi.param_size;
        self.memory.copy(st.b as u32, self.abi.param_ofs[0], size)?;
        if argc > 1 {
            self.memory.copy(st.c as u32, self.abi.param_ofs[1], size)?;
        }
        self.call_op(st, argc)
    }

    fn return_op(&mut self, st: &Statement) -> Result<()> {
        let size = self.abi.param_size;
        if st.a == 0 {
            self.memory.fill(self.abi.return_ofs, size, 0)?;
        } else {
            self.memory.copy(st.a as u32, self.abi.return_ofs, size)?;
        }
        self.leave_function()
    }

    fn state_op(&mut self, st: &Statement, think_time: f32) -> Result<()> {
        let (nextthink, frame, think) = match (self.abi.nextthink, self.abi.frame, self.abi.think) {
            (Some(n), Some(f), Some(t)) => (n, f, t),
            _ => return Err(error!(BadOpcode; "state needs nextthink, frame and think")),
        };
        let ent = self.memory.get::<u32>(self.abi.self_ofs)?;
        let time = self.memory.get::<f32>(self.abi.time_ofs)?;
        let ptr = self.entity_field(ent, nextthink, 1)?;
        self.memory.set(ptr, time + think_time)?;
        let ptr = self.entity_field(ent, frame, 1)?;
        let v = self.rd::<f32>(st.a)?;
        self.memory.set(ptr, v)?;
        let ptr = self.entity_field(ent, think, 1)?;
        let v = self.rd::<i32>(st.b)?;
        self.memory.set(ptr, v)
    }

    fn move_cells(&mut self, src: u32, dst: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let src = self.check_ptr(src, count)?;
        let dst = self.check_ptr(dst, count)?;
        self.memory.copy(src, dst, count)
    }

    fn set_cells(&mut self, dst: u32, count: u32, v: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let dst = self.check_ptr(dst, count)?;
        self.memory.fill(dst, count, v)
    }

    fn dispatch(&mut self, op: Opcode, st: &Statement) -> Result<()> {
        use Opcode::*;
        let t = self.abi.true_bits;
        let tb = move |x: bool| -> u32 {
            if x {
                t
            } else {
                0
            }
        };
        let policy = self.config.fault_policy;
        match op {
            Done | Return => self.return_op(st),
            ReturnV => self.leave_function(),

            MulF => self.binary(st, |a: f32, b: f32| a * b),
            MulV => self.binary(st, |a: Vec3, b: Vec3| Operation::dot_v(a, b)),
            MulFv => self.binary(st, |a: f32, b: Vec3| Operation::scale_v(b, a)),
            MulVf => self.binary(st, |a: Vec3, b: f32| Operation::scale_v(a, b)),
            DivF => self.binary(st, |a: f32, b: f32| a / b),
            AddF => self.binary(st, |a: f32, b: f32| a + b),
            AddV => self.binary(st, |a: Vec3, b: Vec3| Operation::add_v(a, b)),
            SubF => self.binary(st, |a: f32, b: f32| a - b),
            SubV => self.binary(st, |a: Vec3, b: Vec3| Operation::sub_v(a, b)),

            EqF => self.binary(st, move |a: f32, b: f32| tb(a == b)),
            EqV => self.binary(st, move |a: Vec3, b: Vec3| tb(a == b)),
            EqS => {
                let v = tb(self.string_cmp(st)? == Ordering::Equal);
                self.wr(st.c, v)
            }
            EqE => self.binary(st, move |a: u32, b: u32| tb(a == b)),
            EqFn => self.binary(st, move |a: i32, b: i32| tb(a == b)),
            NeF => self.binary(st, move |a: f32, b: f32| tb(a != b)),
            NeV => self.binary(st, move |a: Vec3, b: Vec3| tb(a != b)),
            NeS => {
                let v = tb(self.string_cmp(st)? != Ordering::Equal);
                self.wr(st.c, v)
            }
            NeE => self.binary(st, move |a: u32, b: u32| tb(a != b)),
            NeFn => self.binary(st, move |a: i32, b: i32| tb(a != b)),
            LeF => self.binary(st, move |a: f32, b: f32| tb(a <= b)),
            GeF => self.binary(st, move |a: f32, b: f32| tb(a >= b)),
            LtF => self.binary(st, move |a: f32, b: f32| tb(a < b)),
            GtF => self.binary(st, move |a: f32, b: f32| tb(a > b)),

            LoadF => self.load_field::<f32>(st),
            LoadV => self.load_field::<Vec3>(st),
            LoadS | LoadFn | LoadI => self.load_field::<i32>(st),
            LoadEnt | LoadFld | LoadP => self.load_field::<u32>(st),
            LoadQ => self.load_field::<Quat>(st),
            LoadD => self.load_field::<f64>(st),
            Address => {
                let ent = self.rd::<u32>(st.a)?;
                let field = self.rd::<u32>(st.b)?;
                if self.config.null_bad && ent == 0 {
                    return Err(error!(OutOfBounds; "assignment to world entity"));
                }
                let ptr = self.entity_field(ent, field, 1)?;
                self.wr(st.c, ptr)
            }

            StoreF | StoreS | StoreEnt | StoreFld | StoreFn | StoreI | StoreP => {
                self.store::<u32>(st)
            }
            StoreV => self.store::<Vec3>(st),
            StoreQ => self.store::<Quat>(st),
            StoreD => self.store::<f64>(st),
            StorepF | StorepS | StorepEnt | StorepFld | StorepFn | StorepI | StorepP => {
                self.storep::<u32>(st)
            }
            StorepV => self.storep::<Vec3>(st),
            StorepQ => self.storep::<Quat>(st),
            StorepD => self.storep::<f64>(st),

            NotF => self.unary(st, move |a: f32| tb(a == 0.0)),
            NotV => self.unary(st, move |a: Vec3| tb(Operation::is_zero_v(a))),
            NotS => {
                let a = self.rd::<i32>(st.a)?;
                let v = tb(self.string_is_empty(a)?);
                self.wr(st.c, v)
            }
            NotEnt | NotFn => self.unary(st, move |a: u32| tb(a == 0)),

            If => {
                if self.rd::<u32>(st.a)? != 0 {
                    self.branch(short(st.b));
                }
                Ok(())
            }
            Ifnot => {
                if self.rd::<u32>(st.a)? == 0 {
                    self.branch(short(st.b));
                }
                Ok(())
            }
            Ifbe | Ifb | Ifae | Ifa => {
                let a = self.rd::<i32>(st.a)?;
                let taken = match op {
                    Ifbe => a <= 0,
                    Ifb => a < 0,
                    Ifae => a >= 0,
                    _ => a > 0,
                };
                if taken {
                    self.branch(short(st.b));
                }
                Ok(())
            }
            Goto => {
                self.branch(short(st.a));
                Ok(())
            }
            Jump => {
                let target = self.rd::<u32>(st.a)?;
                self.jump(target)
            }
            Jumpb => {
                let index = self.rd::<i32>(st.b)?;
                let ptr = self.check_ptr((st.a as u32).wrapping_add(index as u32), 1)?;
                let target = self.memory.get::<u32>(ptr)?;
                self.jump(target)
            }

            Call0 | Call1 | Call2 | Call3 | Call4 | Call5 | Call6 | Call7 | Call8 => {
                self.call_op(st, (op as u16 - Call0 as u16) as usize)
            }
            Rcall1 | Rcall2 | Rcall3 | Rcall4 | Rcall5 | Rcall6 | Rcall7 | Rcall8 => {
                self.rcall_op(st, (op as u16 - Rcall1 as u16) as usize + 1)
            }
            State => self.state_op(st, STATE_THINK),
            StateF => {
                let think_time = self.rd::<f32>(st.c)?;
                self.state_op(st, think_time)
            }

            And => self.binary(st, move |a: f32, b: f32| tb(a != 0.0 && b != 0.0)),
            Or => self.binary(st, move |a: f32, b: f32| tb(a != 0.0 || b != 0.0)),
            Bitand => self.binary(st, |a: f32, b: f32| Operation::bits_f(a, b, |x, y| x & y)),
            Bitor => self.binary(st, |a: f32, b: f32| Operation::bits_f(a, b, |x, y| x | y)),

            AddS => {
                let a = self.rd::<i32>(st.a)?;
                let b = self.rd::<i32>(st.b)?;
                let mut s = self.strings.get(a)?.to_vec();
                s.extend_from_slice(self.strings.get(b)?);
                let handle = self.strings.make_temp(s);
                self.wr(st.c, handle)
            }
            LeS | GeS | LtS | GtS => {
                let ord = self.string_cmp(st)?;
                let v = match op {
                    LeS => ord != Ordering::Greater,
                    GeS => ord != Ordering::Less,
                    LtS => ord == Ordering::Less,
                    _ => ord == Ordering::Greater,
                };
                self.wr(st.c, v as i32)
            }

            AddI => self.binary(st, |a: i32, b: i32| a.wrapping_add(b)),
            SubI => self.binary(st, |a: i32, b: i32| a.wrapping_sub(b)),
            MulI => self.binary(st, |a: i32, b: i32| a.wrapping_mul(b)),
            DivI => self.binary_try(st, |a: i32, b: i32| Operation::div_i(a, b, policy)),
            RemI => self.binary_try(st, |a: i32, b: i32| Operation::rem_i(a, b, policy)),
            ModI => self.binary_try(st, |a: i32, b: i32| Operation::mod_i(a, b, policy)),
            BitandI => self.binary(st, |a: i32, b: i32| a & b),
            BitorI => self.binary(st, |a: i32, b: i32| a | b),
            BitxorI => self.binary(st, |a: i32, b: i32| a ^ b),
            BitnotI => self.unary(st, |a: i32| !a),
            ShlI => self.binary(st, Operation::shl_i),
            ShrI => self.binary(st, Operation::shr_i),
            ShrU => self.binary(st, Operation::shr_u),
            GeI => self.binary(st, |a: i32, b: i32| (a >= b) as i32),
            LeI => self.binary(st, |a: i32, b: i32| (a <= b) as i32),
            GtI => self.binary(st, |a: i32, b: i32| (a > b) as i32),
            LtI => self.binary(st, |a: i32, b: i32| (a < b) as i32),
            AndI => self.binary(st, |a: i32, b: i32| (a != 0 && b != 0) as i32),
            OrI => self.binary(st, |a: i32, b: i32| (a != 0 || b != 0) as i32),
            NotI => self.unary(st, |a: i32| (a == 0) as i32),
            EqI => self.binary(st, |a: i32, b: i32| (a == b) as i32),
            NeI => self.binary(st, |a: i32, b: i32| (a != b) as i32),
            LtU => self.binary(st, |a: u32, b: u32| (a < b) as i32),
            GtU => self.binary(st, |a: u32, b: u32| (a > b) as i32),
            LeU => self.binary(st, |a: u32, b: u32| (a <= b) as i32),
            GeU => self.binary(st, |a: u32, b: u32| (a >= b) as i32),
            ConvIf => self.unary(st, |a: i32| a as f32),
            ConvFi => self.unary(st, |a: f32| a as i32),

            BitxorF => self.binary(st, |a: f32, b: f32| Operation::bits_f(a, b, |x, y| x ^ y)),
            BitnotF => self.unary(st, |a: f32| !(a as i32) as f32),
            ShlF => self.binary(st, |a: f32, b: f32| Operation::bits_f(a, b, Operation::shl_i)),
            ShrF => self.binary(st, |a: f32, b: f32| Operation::bits_f(a, b, Operation::shr_i)),
            RemF => self.binary(st, |a: f32, b: f32| a % b),
            ModF => self.binary(st, Operation::mod_f),

            LoadbF => self.loadb::<f32>(st, self.rd::<i32>(st.b)?),
            LoadbV => self.loadb::<Vec3>(st, self.rd::<i32>(st.b)?),
            LoadbS | LoadbEnt | LoadbFld | LoadbFn | LoadbI | LoadbP => {
                self.loadb::<u32>(st, self.rd::<i32>(st.b)?)
            }
            LoadbQ => self.loadb::<Quat>(st, self.rd::<i32>(st.b)?),
            LoadbD => self.loadb::<f64>(st, self.rd::<i32>(st.b)?),
            LoadbiF => self.loadb::<f32>(st, short(st.b)),
            LoadbiV => self.loadb::<Vec3>(st, short(st.b)),
            LoadbiS | LoadbiEnt | LoadbiFld | LoadbiFn | LoadbiI | LoadbiP => {
                self.loadb::<u32>(st, short(st.b))
            }
            LoadbiQ => self.loadb::<Quat>(st, short(st.b)),
            LoadbiD => self.loadb::<f64>(st, short(st.b)),

            StorebF => self.storeb::<f32>(st, self.rd::<i32>(st.c)?),
            StorebV => self.storeb::<Vec3>(st, self.rd::<i32>(st.c)?),
            StorebS | StorebEnt | StorebFld | StorebFn | StorebI | StorebP => {
                self.storeb::<u32>(st, self.rd::<i32>(st.c)?)
            }
            StorebQ => self.storeb::<Quat>(st, self.rd::<i32>(st.c)?),
            StorebD => self.storeb::<f64>(st, self.rd::<i32>(st.c)?),
            StorebiF => self.storeb::<f32>(st, short(st.c)),
            StorebiV => self.storeb::<Vec3>(st, short(st.c)),
            StorebiS | StorebiEnt | StorebiFld | StorebiFn | StorebiI | StorebiP => {
                self.storeb::<u32>(st, short(st.c))
            }
            StorebiQ => self.storeb::<Quat>(st, short(st.c)),
            StorebiD => self.storeb::<f64>(st, short(st.c)),

            AddressVoid | AddressF | AddressV | AddressS | AddressEnt | AddressFld | AddressFn
            | AddressI | AddressP | AddressQ | AddressD => self.wr(st.c, st.a as u32),
            Lea => self.binary(st, |a: u32, b: i32| a.wrapping_add(b as u32)),
            Leai => {
                let a = self.rd::<u32>(st.a)?;
                self.wr(st.c, a.wrapping_add(short(st.b) as u32))
            }

            NotP => self.unary(st, |a: u32| (a == 0) as i32),
            EqP => self.binary(st, |a: u32, b: u32| (a == b) as i32),
            NeP => self.binary(st, |a: u32, b: u32| (a != b) as i32),
            LeP => self.binary(st, |a: u32, b: u32| (a <= b) as i32),
            GeP => self.binary(st, |a: u32, b: u32| (a >= b) as i32),
            LtP => self.binary(st, |a: u32, b: u32| (a < b) as i32),
            GtP => self.binary(st, |a: u32, b: u32| (a > b) as i32),

            Movei => self.memory.copy(st.a as u32, st.c as u32, st.b as u32),
            Movep => {
                let src = self.rd::<u32>(st.a)?;
                let dst = self.rd::<u32>(st.c)?;
                let count = self.rd::<i32>(st.b)?;
                self.move_cells(src, dst, count as u32)
            }
            Movepi => {
                let src = self.rd::<u32>(st.a)?;
                let dst = self.rd::<u32>(st.c)?;
                self.move_cells(src, dst, st.b as u32)
            }
            Memseti => {
                let v = self.rd::<u32>(st.a)?;
                self.memory.fill(st.c as u32, st.b as u32, v)
            }
            Memsetp => {
                let v = self.rd::<u32>(st.a)?;
                let count = self.rd::<i32>(st.b)?;
                let dst = self.rd::<u32>(st.c)?;
                self.set_cells(dst, count as u32, v)
            }
            Memsetpi => {
                let v = self.rd::<u32>(st.a)?;
                let dst = self.rd::<u32>(st.c)?;
                self.set_cells(dst, st.b as u32, v)
            }

            AddQ => self.binary(st, |a: Quat, b: Quat| Operation::add_q(a, b)),
            SubQ => self.binary(st, |a: Quat, b: Quat| Operation::sub_q(a, b)),
            MulQ => self.binary(st, |a: Quat, b: Quat| Operation::mul_q(a, b)),
            MulQf => self.binary(st, |a: Quat, b: f32| Operation::scale_q(a, b)),
            MulFq => self.binary(st, |a: f32, b: Quat| Operation::scale_q(b, a)),
            MulQv => self.binary(st, |a: Quat, b: Vec3| Operation::mul_qv(a, b)),
            ConjQ => self.unary(st, |a: Quat| Operation::conj_q(a)),
            NotQ => self.unary(st, |a: Quat| Operation::is_zero_q(a) as i32),
            EqQ => self.binary(st, |a: Quat, b: Quat| (a == b) as i32),
            NeQ => self.binary(st, |a: Quat, b: Quat| (a != b) as i32),

            PushS | PushF | PushEnt | PushFld | PushFn | PushP | PushI => {
                self.push_global::<u32>(st)
            }
            PushV => self.push_global::<Vec3>(st),
            PushQ => self.push_global::<Quat>(st),
            PushD => self.push_global::<f64>(st),
            PushbS | PushbF | PushbEnt | PushbFld | PushbFn | PushbP | PushbI => {
                self.pushb::<u32>(st, self.rd::<i32>(st.b)?)
            }
            PushbV => self.pushb::<Vec3>(st, self.rd::<i32>(st.b)?),
            PushbQ => self.pushb::<Quat>(st, self.rd::<i32>(st.b)?),
            PushbD => self.pushb::<f64>(st, self.rd::<i32>(st.b)?),
            PushbiS | PushbiF | PushbiEnt | PushbiFld | PushbiFn | PushbiP | PushbiI => {
                self.pushb::<u32>(st, short(st.b))
            }
            PushbiV => self.pushb::<Vec3>(st, short(st.b)),
            PushbiQ => self.pushb::<Quat>(st, short(st.b)),
            PushbiD => self.pushb::<f64>(st, short(st.b)),
            PopS | PopF | PopEnt | PopFld | PopFn | PopP | PopI => self.pop_global::<u32>(st),
            PopV => self.pop_global::<Vec3>(st),
            PopQ => self.pop_global::<Quat>(st),
            PopD => self.pop_global::<f64>(st),
            PopbS | PopbF | PopbEnt | PopbFld | PopbFn | PopbP | PopbI => {
                self.popb::<u32>(st, self.rd::<i32>(st.b)?)
            }
            PopbV => self.popb::<Vec3>(st, self.rd::<i32>(st.b)?),
            PopbQ => self.popb::<Quat>(st, self.rd::<i32>(st.b)?),
            PopbD => self.popb::<f64>(st, self.rd::<i32>(st.b)?),
            PopbiS | PopbiF | PopbiEnt | PopbiFld | PopbiFn | PopbiP | PopbiI => {
                self.popb::<u32>(st, short(st.b))
            }
            PopbiV => self.popb::<Vec3>(st, short(st.b)),
            PopbiQ => self.popb::<Quat>(st, short(st.b)),
            PopbiD => self.popb::<f64>(st, short(st.b)),

            AddD => self.binary(st, |a: f64, b: f64| a + b),
            SubD => self.binary(st, |a: f64, b: f64| a - b),
            MulD => self.binary(st, |a: f64, b: f64| a * b),
            DivD => self.binary(st, |a: f64, b: f64| a / b),
            RemD => self.binary(st, |a: f64, b: f64| a % b),
            ModD => self.binary(st, Operation::mod_d),
            MulQd => self.binary(st, |a: Quat, b: f64| Operation::scale_q(a, b as f32)),
            MulDq => self.binary(st, |a: f64, b: Quat| Operation::scale_q(b, a as f32)),
            MulVd => self.binary(st, |a: Vec3, b: f64| Operation::scale_v(a, b as f32)),
            MulDv => self.binary(st, |a: f64, b: Vec3| Operation::scale_v(b, a as f32)),
            GeD => self.binary(st, |a: f64, b: f64| (a >= b) as i32),
            LeD => self.binary(st, |a: f64, b: f64| (a <= b) as i32),
            GtD => self.binary(st, |a: f64, b: f64| (a > b) as i32),
            LtD => self.binary(st, |a: f64, b: f64| (a < b) as i32),
            NotD => self.unary(st, |a: f64| (a == 0.0) as i32),
            EqD => self.binary(st, |a: f64, b: f64| (a == b) as i32),
            NeD => self.binary(st, |a: f64, b: f64| (a != b) as i32),
            ConvFd => self.unary(st, |a: f32| a as f64),
            ConvDf => self.unary(st, |a: f64| a as f32),
            ConvId => self.unary(st, |a: i32| a as f64),
            ConvDi => self.unary(st, |a: f64| a as i32),
        }
    }
}
