use ansi_term::Style;
use linefeed::{DefaultTerminal, Interface, ReadResult};
use qcvm::mach::{DebugEvent, DebugHandler, Progs, Resume};

const HELP: &str = "\
s            step one statement
c            continue
bt           call stack
p <global>   print a global
b <stmt>     toggle a breakpoint
w <global>   watch a global, w alone clears
profile      busiest functions
q            abort
";

/// ## Interactive debugger
///
/// Takes over on breakpoints, watchpoints and errors, and after every
/// statement while stepping.

pub struct Console {
    interface: Interface<DefaultTerminal>,
    stepping: bool,
}

impl Console {
    pub fn new() -> std::io::Result<Console> {
        let interface = Interface::new("qcvm")?;
        interface.set_prompt("debug> ")?;
        Ok(Console {
            interface,
            stepping: false,
        })
    }

    fn say(&self, s: &str) {
        let _ = self.interface.write_fmt(format_args!("{}\n", s));
    }

    fn bold(&self, s: &str) {
        self.say(&Style::new().bold().paint(s).to_string());
    }

    fn prompt(&mut self, progs: &mut Progs) -> Resume {
        loop {
            let line = match self.interface.read_line() {
                Ok(ReadResult::Input(line)) => line,
                Ok(_) | Err(_) => return Resume::Abort,
            };
            self.interface.add_history_unique(line.clone());
            let mut words = line.split_whitespace();
            let command = words.next().unwrap_or("");
            let arg = words.next();
            match (command, arg) {
                ("s", _) => {
                    self.stepping = true;
                    progs.set_trace(true);
                    return Resume::Continue;
                }
                ("c", _) => {
                    self.stepping = false;
                    progs.set_trace(false);
                    return Resume::Continue;
                }
                ("q", _) => return Resume::Abort,
                ("bt", _) => self.say(progs.stack_trace().trim_end()),
                ("p", Some(name)) => match progs.print_global(name) {
                    Ok(s) => self.say(&s),
                    Err(e) => self.bold(&e.to_string()),
                },
                ("b", Some(stmt)) => self.toggle_breakpoint(progs, stmt),
                ("w", Some(name)) => {
                    let result = progs
                        .global_ptr(name)
                        .and_then(|ptr| progs.set_watchpoint(Some(ptr)));
                    if let Err(e) = result {
                        self.bold(&e.to_string());
                    }
                }
                ("w", None) => {
                    let _ = progs.set_watchpoint(None);
                }
                ("profile", _) => {
                    for (name, count) in progs.profile().iter().take(20) {
                        self.say(&format!("{:>10} {}", count, name));
                    }
                }
                ("", _) => {}
                _ => self.say(HELP.trim_end()),
            }
        }
    }

    fn toggle_breakpoint(&self, progs: &mut Progs, stmt: &str) {
        let parsed = match stmt.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => stmt.parse(),
        };
        let addr = match parsed {
            Ok(addr) => addr,
            Err(_) => return self.bold(&format!("bad statement number {}", stmt)),
        };
        let set = progs
            .image()
            .statements
            .get(addr as usize)
            .map_or(false, |st| st.op & qcvm::prog::OP_BREAK != 0);
        let result = if set {
            progs.clear_breakpoint(addr)
        } else {
            progs.set_breakpoint(addr)
        };
        match result {
            Ok(()) if set => self.say(&format!("breakpoint at {:04x} cleared", addr)),
            Ok(()) => self.say(&format!("breakpoint at {:04x} set", addr)),
            Err(e) => self.bold(&e.to_string()),
        }
    }
}

impl DebugHandler for Console {
    fn event(&mut self, progs: &mut Progs, event: DebugEvent) -> Resume {
        match event {
            DebugEvent::Trace(addr) if self.stepping => {
                self.say(&progs.print_statement(addr));
                self.prompt(progs)
            }
            DebugEvent::Trace(addr) => {
                self.say(&progs.print_statement(addr));
                Resume::Continue
            }
            DebugEvent::Breakpoint(addr) => {
                self.say(&format!("breakpoint at {:04x}", addr));
                self.say(&progs.print_statement(addr));
                self.prompt(progs)
            }
            DebugEvent::Watchpoint { ptr, old, new } => {
                self.say(&format!("watchpoint {} changed from {:#x} to {:#x}", ptr, old, new));
                self.prompt(progs)
            }
            DebugEvent::Error(e) => {
                self.bold(&e.to_string());
                self.say("c skips the statement, q aborts");
                self.prompt(progs)
            }
            DebugEvent::Subenter(_) | DebugEvent::Subexit | DebugEvent::Terminate => {
                Resume::Continue
            }
        }
    }
}
