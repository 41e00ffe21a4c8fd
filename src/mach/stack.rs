use crate::error;
use crate::prog::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Stack enforced and size limited vector

pub struct Stack<T> {
    overflow_message: &'static str,
    underflow_message: &'static str,
    max_len: usize,
    vec: Vec<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.vec)
    }
}

impl<T> Stack<T> {
    pub fn new(
        max_len: usize,
        overflow_message: &'static str,
        underflow_message: &'static str,
    ) -> Stack<T> {
        Stack {
            overflow_message,
            underflow_message,
            max_len,
            vec: vec![],
        }
    }
    pub fn max_len(&self) -> usize {
        self.max_len
    }
    fn overflow_error(&self) -> Error {
        error!(StackOverflow; "{}", self.overflow_message)
    }
    fn underflow_error(&self) -> Error {
        error!(StackUnderflow; "{}", self.underflow_message)
    }
    pub fn clear(&mut self) {
        self.vec.clear()
    }
    pub fn len(&self) -> usize {
        self.vec.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
    pub fn last(&self) -> Option<&T> {
        self.vec.last()
    }
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.vec.last_mut()
    }
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.vec.get(idx)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.vec.iter()
    }
    /// Nothing is pushed when the stack is full.
    pub fn push(&mut self, val: T) -> Result<()> {
        if self.vec.len() >= self.max_len {
            return Err(self.overflow_error());
        }
        self.vec.push(val);
        Ok(())
    }
    pub fn pop(&mut self) -> Result<T> {
        match self.vec.pop() {
            Some(v) => Ok(v),
            None => Err(self.underflow_error()),
        }
    }
    /// The last `len` entries, oldest first.
    pub fn tail(&self, len: usize) -> Result<&[T]> {
        if len > self.vec.len() {
            Err(self.underflow_error())
        } else {
            Ok(&self.vec[self.vec.len() - len..])
        }
    }
    /// Drops the last `len` entries.
    pub fn truncate_by(&mut self, len: usize) -> Result<()> {
        if len > self.vec.len() {
            Err(self.underflow_error())
        } else {
            let new_len = self.vec.len() - len;
            self.vec.truncate(new_len);
            Ok(())
        }
    }
    pub fn truncate(&mut self, len: usize) {
        self.vec.truncate(len)
    }
}

impl<T: Clone> Stack<T> {
    /// Pushes all of `vals` or, if they do not fit, none of them.
    pub fn extend_from_slice(&mut self, vals: &[T]) -> Result<()> {
        if self.vec.len() + vals.len() > self.max_len {
            return Err(self.overflow_error());
        }
        self.vec.extend_from_slice(vals);
        Ok(())
    }
}
