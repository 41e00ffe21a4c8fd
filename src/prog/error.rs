use super::Address;

/// ## Error reporting
///
/// Every failure in the crate is an `Error` carrying an `ErrorCode`.
/// The code decides the `ErrorKind`; the rest is context that gets
/// attached on the way out: the statement that was executing, the
/// source location when debug info is loaded, and for fatal errors a
/// dump of the VM state.

#[derive(Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    statement: Option<Address>,
    location: Option<(String, u32)>,
    message: String,
    trace: String,
    fatal: bool,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::prog::Error::new($crate::prog::ErrorCode::$err)
    };
    ($err:ident; $($arg:tt)+) => {
        $crate::prog::Error::new($crate::prog::ErrorCode::$err).message(&format!($($arg)+))
    };
    ($err:ident, $st:expr) => {
        $crate::prog::Error::new($crate::prog::ErrorCode::$err).in_statement($st)
    };
    ($err:ident, $st:expr; $($arg:tt)+) => {
        $crate::prog::Error::new($crate::prog::ErrorCode::$err)
            .in_statement($st)
            .message(&format!($($arg)+))
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Load,
    Link,
    Runtime,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorCode {
    #[error("truncated image")]
    Truncated,
    #[error("unrecognised version number")]
    BadVersion,
    #[error("CRC mismatch")]
    CrcMismatch,
    #[error("malformed image")]
    Malformed,
    #[error("invalid statement")]
    BadStatement,
    #[error("out of memory")]
    OutOfMemory,
    #[error("file error")]
    Io,

    #[error("undefined symbol")]
    MissingSymbol,
    #[error("undefined builtin")]
    UnresolvedBuiltin,
    #[error("builtin collision")]
    BuiltinCollision,
    #[error("duplicate resource")]
    DuplicateResource,

    #[error("bad opcode")]
    BadOpcode,
    #[error("out of bounds")]
    OutOfBounds,
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("NULL function")]
    NullFunction,
    #[error("bad function")]
    BadFunction,
    #[error("division by zero")]
    DivisionByZero,
    #[error("breakpoint")]
    Breakpoint,
    #[error("watchpoint")]
    Watchpoint,
    #[error("runaway loop error")]
    RunawayLoop,
    #[error("interrupted")]
    Interrupted,
    #[error("zone error")]
    Zone,
    #[error("bad string")]
    BadString,
    #[error("bad edict")]
    BadEdict,
    #[error("builtin error")]
    Builtin,
    #[error("aborted")]
    Aborted,
}

impl ErrorCode {
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            Truncated | BadVersion | CrcMismatch | Malformed | BadStatement | OutOfMemory | Io => {
                ErrorKind::Load
            }
            MissingSymbol | UnresolvedBuiltin | BuiltinCollision | DuplicateResource => {
                ErrorKind::Link
            }
            _ => ErrorKind::Runtime,
        }
    }
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code,
            statement: None,
            location: None,
            message: String::new(),
            trace: String::new(),
            fatal: false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        if self.fatal {
            ErrorKind::Fatal
        } else {
            self.code.kind()
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn statement(&self) -> Option<Address> {
        self.statement
    }

    pub fn location(&self) -> Option<(&str, u32)> {
        self.location.as_ref().map(|(file, line)| (file.as_str(), *line))
    }

    pub fn text(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// The first statement recorded wins; inner errors know better.
    pub fn in_statement(mut self, statement: Address) -> Error {
        if self.statement.is_none() {
            self.statement = Some(statement);
        }
        self
    }

    pub fn in_source(mut self, file: &str, line: u32) -> Error {
        if self.location.is_none() {
            self.location = Some((file.to_string(), line));
        }
        self
    }

    pub fn message(mut self, message: &str) -> Error {
        debug_assert!(self.message.is_empty());
        self.message = message.to_string();
        self
    }

    pub fn with_trace(mut self, trace: String) -> Error {
        self.trace = trace;
        self
    }

    pub fn fatal(mut self) -> Error {
        self.fatal = true;
        self
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut suffix = String::new();
        if let Some(statement) = self.statement {
            suffix.push_str(&format!(" at statement {:04x}", statement));
        }
        if let Some((file, line)) = &self.location {
            suffix.push_str(&format!(" ({}:{})", file, line));
        }
        if !self.message.is_empty() {
            suffix.push_str(&format!("; {}", self.message));
        }
        if self.fatal {
            write!(f, "FATAL: {}{}", self.code, suffix)
        } else {
            write!(f, "{}{}", self.code, suffix)
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::new(ErrorCode::Io).message(&error.to_string())
    }
}
