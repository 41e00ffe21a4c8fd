use crate::error;
use crate::prog::Error;
use std::borrow::Cow;

type Result<T> = std::result::Result<T, Error>;

const RETURN_STRINGS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    /// In the image's string table.
    Static,
    /// Lives until freed.
    Dynamic,
    /// Freed when the function that made it returns.
    Temp,
    /// One of a small ring of builtin results.
    Return,
}

#[derive(Debug)]
struct Slot {
    kind: StringKind,
    text: Vec<u8>,
}

/// ## String handles
///
/// Handle 0 is the empty string, a positive handle is an offset into the
/// static table and a negative handle `-(slot + 1)` names a runtime
/// string. Temp strings are chained to the executing frame; the chain is
/// swapped out on call and released on return.

#[derive(Debug, Default)]
pub struct Strings {
    table: Vec<u8>,
    slots: Vec<Option<Slot>>,
    free_slots: Vec<usize>,
    temps: Vec<i32>,
    returns: [i32; RETURN_STRINGS],
    return_pos: usize,
}

fn slot_index(handle: i32) -> usize {
    (-(handle as i64) - 1) as usize
}

impl Strings {
    /// Takes a new static table and drops every runtime string.
    pub fn load(&mut self, mut table: Vec<u8>) {
        if table.last() != Some(&0) {
            table.push(0);
        }
        *self = Strings {
            table,
            ..Strings::default()
        };
    }

    fn slot(&self, handle: i32) -> Option<&Slot> {
        if handle >= 0 {
            return None;
        }
        self.slots.get(slot_index(handle))?.as_ref()
    }

    pub fn kind(&self, handle: i32) -> Option<StringKind> {
        if handle >= 0 {
            if (handle as usize) < self.table.len() {
                Some(StringKind::Static)
            } else {
                None
            }
        } else {
            self.slot(handle).map(|slot| slot.kind)
        }
    }

    pub fn is_valid(&self, handle: i32) -> bool {
        self.kind(handle).is_some()
    }

    pub fn get(&self, handle: i32) -> Result<&[u8]> {
        if handle >= 0 {
            let start = handle as usize;
            if start >= self.table.len() {
                return Err(error!(BadString; "string offset {} is outside the string table", handle));
            }
            let tail = &self.table[start..];
            let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
            return Ok(&tail[..end]);
        }
        match self.slot(handle) {
            Some(slot) => Ok(&slot.text),
            None => Err(error!(BadString; "string handle {} has been freed", handle)),
        }
    }

    pub fn get_str(&self, handle: i32) -> Result<Cow<'_, str>> {
        Ok(String::from_utf8_lossy(self.get(handle)?))
    }

    fn alloc(&mut self, kind: StringKind, text: Vec<u8>) -> i32 {
        let slot = Slot { kind, text };
        let index = match self.free_slots.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        -(index as i32) - 1
    }

    fn release(&mut self, handle: i32) {
        if handle >= 0 {
            return;
        }
        let index = slot_index(handle);
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.take().is_some() {
                self.free_slots.push(index);
            }
        }
    }

    /// A string owned by the executing function.
    pub fn make_temp<S: Into<Vec<u8>>>(&mut self, text: S) -> i32 {
        let handle = self.alloc(StringKind::Temp, text.into());
        self.temps.push(handle);
        handle
    }

    /// A string that lives until `free` is called on it.
    pub fn make_dynamic<S: Into<Vec<u8>>>(&mut self, text: S) -> i32 {
        self.alloc(StringKind::Dynamic, text.into())
    }

    /// A builtin result; the oldest of the ring is recycled.
    pub fn make_return<S: Into<Vec<u8>>>(&mut self, text: S) -> i32 {
        let old = self.returns[self.return_pos];
        if old != 0 {
            self.release(old);
        }
        let handle = self.alloc(StringKind::Return, text.into());
        self.returns[self.return_pos] = handle;
        self.return_pos = (self.return_pos + 1) % RETURN_STRINGS;
        handle
    }

    /// Frees a dynamic string.
    pub fn free(&mut self, handle: i32) -> Result<()> {
        match self.kind(handle) {
            Some(StringKind::Dynamic) => {
                self.release(handle);
                Ok(())
            }
            Some(kind) => Err(error!(BadString; "attempt to free a {:?} string", kind)),
            None => Err(error!(BadString; "attempt to free invalid string {}", handle)),
        }
    }

    /// Starts a fresh temp chain, handing back the current one.
    pub fn take_temps(&mut self) -> Vec<i32> {
        std::mem::take(&mut self.temps)
    }

    /// Frees the current chain and reinstates `saved`. A temp `keep`
    /// survives and moves to the reinstated chain.
    pub fn release_temps(&mut self, saved: Vec<i32>, keep: i32) {
        let temps = std::mem::replace(&mut self.temps, saved);
        for handle in temps {
            if handle == keep {
                self.temps.push(handle);
            } else {
                self.release(handle);
            }
        }
    }

    /// Frees an abandoned chain. A temp `keep` survives and joins the
    /// current chain.
    pub fn release_chain(&mut self, chain: Vec<i32>, keep: i32) {
        for handle in chain {
            if handle == keep {
                if !self.temps.contains(&handle) {
                    self.temps.push(handle);
                }
            } else {
                self.release(handle);
            }
        }
    }

    /// Frees the current chain.
    pub fn clear_temps(&mut self) {
        for handle in std::mem::take(&mut self.temps) {
            self.release(handle);
        }
    }

    pub fn temps(&self) -> &[i32] {
        &self.temps
    }

    /// Runtime strings currently allocated.
    pub fn count(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }
}
