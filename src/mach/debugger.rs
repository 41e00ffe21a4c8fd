/*!
## Debugger support

A single handler receives structured events from the interpreter and
decides whether execution carries on. Without one, tracing prints each
statement to the output sink and a breakpoint or watchpoint is an
ordinary runtime error.

*/

use super::{Progs, Ptr, Value};
use crate::error;
use crate::prog::{Error, Etype, Opcode, OP_BREAK};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugEvent<'a> {
    /// A bytecode function was entered.
    Subenter(usize),
    Subexit,
    /// About to run the statement at this address.
    Trace(u32),
    Breakpoint(u32),
    Watchpoint { ptr: Ptr, old: u32, new: u32 },
    Error(&'a Error),
    /// A fatal error is about to be returned.
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Continue,
    Abort,
}

pub trait DebugHandler {
    fn event(&mut self, progs: &mut Progs, event: DebugEvent) -> Resume;
}

/// The watched cell and its last seen value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    pub ptr: Ptr,
    pub old: u32,
}

impl Progs {
    /// Hands `event` to the handler, if any. The handler is taken out of
    /// the VM while it runs so it can inspect and modify it.
    pub(crate) fn debug_event(&mut self, event: DebugEvent) -> Resume {
        let mut handler = match self.debug_handler.take() {
            Some(handler) => handler,
            None => return Resume::Continue,
        };
        let resume = handler.event(self, event);
        if self.debug_handler.is_none() {
            self.debug_handler = Some(handler);
        }
        resume
    }

    pub fn trace(&self) -> bool {
        self.trace
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn set_breakpoint(&mut self, statement: u32) -> Result<()> {
        match self.image.statements.get_mut(statement as usize) {
            Some(st) => {
                st.op |= OP_BREAK;
                Ok(())
            }
            None => Err(error!(OutOfBounds; "no statement {}", statement)),
        }
    }

    pub fn clear_breakpoint(&mut self, statement: u32) -> Result<()> {
        match self.image.statements.get_mut(statement as usize) {
            Some(st) => {
                st.op &= !OP_BREAK;
                Ok(())
            }
            None => Err(error!(OutOfBounds; "no statement {}", statement)),
        }
    }

    /// Watches one cell; `None` removes the watchpoint.
    pub fn set_watchpoint(&mut self, ptr: Option<Ptr>) -> Result<()> {
        self.watch = match ptr {
            Some(ptr) => Some(Watch {
                ptr,
                old: self.memory.get(ptr.0)?,
            }),
            None => None,
        };
        Ok(())
    }

    pub fn watchpoint(&self) -> Option<Watch> {
        self.watch
    }

    pub(crate) fn check_watchpoint(&mut self) -> Result<()> {
        let watch = match self.watch {
            Some(watch) => watch,
            None => return Ok(()),
        };
        let new = self.memory.get::<u32>(watch.ptr.0)?;
        if new == watch.old {
            return Ok(());
        }
        self.watch = Some(Watch { ptr: watch.ptr, old: new });
        if self.debug_handler.is_none() {
            return Err(error!(Watchpoint;
                "{} changed from {:#x} to {:#x}",
                watch.ptr,
                watch.old,
                new
            ));
        }
        let event = DebugEvent::Watchpoint {
            ptr: watch.ptr,
            old: watch.old,
            new,
        };
        match self.debug_event(event) {
            Resume::Continue => Ok(()),
            Resume::Abort => Err(error!(Aborted)),
        }
    }

    fn operand_string(&self, operand: u16, etype: Etype) -> String {
        match etype {
            Etype::Invalid => String::new(),
            Etype::Short => format!("{}", operand as i16),
            _ => {
                let name = match self.global_name(operand) {
                    Some(name) => name,
                    None => format!("[{}]", operand),
                };
                let etype = if etype == Etype::Void { Etype::Int } else { etype };
                match self.memory.value(operand as u32, etype) {
                    Ok(value) => format!("{}({})", name, self.value_string(value)),
                    Err(_) => name,
                }
            }
        }
    }

    /// One statement disassembled with its operand values, preceded by
    /// its source line when debug info has one.
    pub fn print_statement(&mut self, addr: u32) -> String {
        let mut out = String::new();
        if let Some(debug) = &mut self.debug {
            if let Some(line) = debug.source_line(&self.image, addr, &self.config.source_path) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        let st = match self.image.statements.get(addr as usize) {
            Some(st) => *st,
            None => {
                out.push_str(&format!("{:04x} <bad statement>", addr));
                return out;
            }
        };
        let op = match Opcode::from_u16(st.op & !OP_BREAK) {
            Some(op) => op,
            None => {
                out.push_str(&format!("{:04x} <bad opcode {}>", addr, st.op & !OP_BREAK));
                return out;
            }
        };
        let mark = if st.op & OP_BREAK != 0 { '*' } else { ' ' };
        out.push_str(&format!("{:04x}{}{:<12}", addr, mark, op.opname()));
        let types = op.info().types;
        for (&operand, &etype) in [st.a, st.b, st.c].iter().zip(types.iter()) {
            let s = self.operand_string(operand, etype);
            if !s.is_empty() {
                out.push(' ');
                out.push_str(&s);
            }
        }
        out
    }

    /// Innermost frame first.
    pub fn stack_trace(&self) -> String {
        if self.frames.is_empty() {
            return "<NO STACK>\n".to_string();
        }
        let mut out = String::new();
        let mut line = |statement: u32, function: usize| {
            let name = self.function_name(function as i32);
            let location = self
                .debug
                .as_ref()
                .and_then(|d| d.location(&self.image, statement));
            match location {
                Some((file, line)) => {
                    out.push_str(&format!("{:>12} : {} ({}:{})\n", statement, name, file, line))
                }
                None => out.push_str(&format!("{:>12} : {}\n", statement, name)),
            }
        };
        line(self.xstatement, self.xfunction);
        for frame in self.frames.iter().rev() {
            if frame.function == 0 {
                continue;
            }
            line(frame.statement, frame.function);
        }
        out
    }

    /// The statements leading up to the current one and the call stack.
    pub fn dump_state(&mut self) -> String {
        let mut out = String::new();
        let first = self
            .functions
            .get(self.xfunction)
            .filter(|f| f.def.first_statement > 0)
            .map(|f| f.def.first_statement as u32);
        if let Some(first) = first {
            let start = self.xstatement.saturating_sub(5).max(first);
            for addr in start..=self.xstatement {
                out.push_str(&self.print_statement(addr));
                out.push('\n');
            }
        }
        out.push_str(&self.stack_trace());
        out
    }

    /// Functions that ran, busiest first.
    pub fn profile(&self) -> Vec<(String, u64)> {
        let mut report: Vec<(String, u64)> = self
            .functions
            .iter()
            .filter(|f| f.profile > 0)
            .map(|f| (f.name.clone(), f.profile))
            .collect();
        report.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        report
    }

    pub fn clear_profile(&mut self) {
        for f in self.functions.iter_mut() {
            f.profile = 0;
        }
    }

    /// Text for a global by name, as the console shows it.
    pub fn print_global(&self, name: &str) -> Result<String> {
        let value: Value = self.global_value(name)?;
        Ok(format!("{} = {}", name, self.value_string(value)))
    }
}
