use super::{Progs, Ptr, Value, Word};
use crate::error;
use crate::prog::{Def, Error, Etype};

type Result<T> = std::result::Result<T, Error>;

/// A freed edict is only reused once it has been dead this long, unless
/// it was freed during the first seconds of the run.
const REUSE_DELAY: f32 = 0.5;
const STARTUP_TIME: f32 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdictHeader {
    pub free: bool,
    pub freetime: f32,
}

/// ## Edict bookkeeping
///
/// The fields of every edict live in the flat space; only the free
/// flag and free time are kept here. Edict 0 is the world and slots
/// below `first` are reserved for the host.

#[derive(Debug, Clone, Default)]
pub struct Edicts {
    headers: Vec<EdictHeader>,
    num_edicts: usize,
    first: usize,
}

impl Edicts {
    pub(crate) fn reset(&mut self, max_edicts: u32, num_edicts: u32) {
        self.headers = vec![EdictHeader::default(); max_edicts as usize];
        self.num_edicts = num_edicts as usize;
        self.first = num_edicts as usize;
    }

    pub fn num_edicts(&self) -> usize {
        self.num_edicts
    }

    pub fn max_edicts(&self) -> usize {
        self.headers.len()
    }

    pub fn header(&self, edict: usize) -> Option<&EdictHeader> {
        self.headers.get(edict)
    }
}

/// What `edict_count` found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdictCount {
    pub active: usize,
    pub free: usize,
    /// Active edicts with a `model` field set.
    pub models: usize,
}

impl Progs {
    pub fn edicts(&self) -> &Edicts {
        &self.edicts
    }

    pub fn num_edicts(&self) -> usize {
        self.edicts.num_edicts
    }

    pub fn edict_to_entity(&self, edict: usize) -> u32 {
        edict as u32 * self.layout.edict_size
    }

    pub fn entity_to_edict(&self, entity: u32) -> Result<usize> {
        let size = self.layout.edict_size.max(1);
        let edict = (entity / size) as usize;
        if entity % size != 0 || edict >= self.edicts.max_edicts() {
            return Err(error!(BadEdict; "bad entity value {}", entity));
        }
        Ok(edict)
    }

    fn check_edict(&self, edict: usize) -> Result<()> {
        if edict >= self.edicts.num_edicts {
            return Err(error!(BadEdict; "edict {} is not in use", edict));
        }
        Ok(())
    }

    /// First cell of an edict's fields.
    pub fn edict_ptr(&self, edict: usize) -> Ptr {
        Ptr(self.layout.edict_area + self.edict_to_entity(edict))
    }

    pub fn is_free(&self, edict: usize) -> bool {
        self.edicts.headers.get(edict).map_or(true, |h| h.free)
    }

    fn clear_edict(&mut self, edict: usize, fill: u32) -> Result<()> {
        let ptr = self.edict_ptr(edict);
        let size = self.image.entityfields();
        self.memory.fill(ptr.0, size, fill)
    }

    /// Finds or makes an edict, cleared and live.
    pub fn alloc_edict(&mut self) -> Result<usize> {
        let time = self.time()?;
        let max = self.edicts.max_edicts();
        let found = (self.edicts.first..self.edicts.num_edicts).find(|&i| {
            let h = self.edicts.headers[i];
            h.free && (h.freetime < STARTUP_TIME || time - h.freetime > REUSE_DELAY)
        });
        let edict = match found {
            Some(i) => i,
            None if self.edicts.num_edicts < max => {
                self.edicts.num_edicts += 1;
                self.edicts.num_edicts - 1
            }
            None => {
                log::warn!("no free edicts");
                let last = max - 1;
                if let Some(unlink) = self.hooks.unlink {
                    unlink(self, last)?;
                }
                last
            }
        };
        self.clear_edict(edict, 0)?;
        self.edicts.headers[edict] = EdictHeader::default();
        Ok(edict)
    }

    /// Unlinks an edict from the host's world and clears it. The slot
    /// stays out of circulation for a moment.
    pub fn free_edict(&mut self, edict: usize) -> Result<()> {
        if edict == 0 {
            return Err(error!(BadEdict; "attempt to free the world"));
        }
        self.check_edict(edict)?;
        if let Some(unlink) = self.hooks.unlink {
            unlink(self, edict)?;
        }
        if self.config.deadbeef_ents {
            self.clear_edict(edict, 0xdead_beef)?;
        } else if let Some(free_edict) = self.hooks.free_edict {
            free_edict(self, edict)?;
        } else {
            self.clear_edict(edict, 0)?;
        }
        let time = self.time()?;
        self.edicts.headers[edict] = EdictHeader {
            free: true,
            freetime: time,
        };
        Ok(())
    }

    /// The next live edict after `edict`.
    pub fn next_edict(&self, edict: usize) -> Option<usize> {
        (edict + 1..self.edicts.num_edicts).find(|&i| !self.edicts.headers[i].free)
    }

    pub fn edict_count(&self) -> EdictCount {
        let model = self.find_field("model");
        let mut count = EdictCount::default();
        for i in 0..self.edicts.num_edicts {
            if self.edicts.headers[i].free {
                count.free += 1;
                continue;
            }
            count.active += 1;
            if let Some(def) = model {
                let ptr = self.edict_ptr(i).0 + def.offset as u32;
                if self.memory.get::<i32>(ptr).unwrap_or(0) != 0 {
                    count.models += 1;
                }
            }
        }
        count
    }

    fn field_def(&self, name: &str) -> Result<Def> {
        match self.find_field(name) {
            Some(def) => Ok(def),
            None => Err(error!(MissingSymbol; "no field named {}", name)),
        }
    }

    pub fn field_ptr(&self, edict: usize, name: &str) -> Result<Ptr> {
        self.check_edict(edict)?;
        let def = self.field_def(name)?;
        Ok(self.edict_ptr(edict).add(def.offset as u32))
    }

    pub fn field<T: Word>(&self, edict: usize, name: &str) -> Result<T> {
        let ptr = self.field_ptr(edict, name)?;
        self.memory.get(ptr.0)
    }

    pub fn set_field<T: Word>(&mut self, edict: usize, name: &str, v: T) -> Result<()> {
        let ptr = self.field_ptr(edict, name)?;
        self.memory.set(ptr.0, v)
    }

    /// A field read as its declared type.
    pub fn field_value(&self, edict: usize, name: &str) -> Result<Value> {
        self.check_edict(edict)?;
        let def = self.field_def(name)?;
        let ptr = self.edict_ptr(edict).add(def.offset as u32);
        self.memory.value(ptr.0, def.etype())
    }

    /// Every field with a non-zero value, one per line.
    pub fn print_edict(&self, edict: usize) -> Result<String> {
        self.check_edict(edict)?;
        if self.is_free(edict) {
            return Ok(format!("EDICT {}: FREE\n", edict));
        }
        let base = self.edict_ptr(edict);
        let mut out = format!("EDICT {}:\n", edict);
        for def in &self.image.fielddefs {
            let name = self.image.string(def.name);
            if name.is_empty() || name.ends_with("_x") || name.ends_with("_y") || name.ends_with("_z")
            {
                continue;
            }
            let etype = def.etype();
            if etype == Etype::Void {
                continue;
            }
            let ptr = base.add(def.offset as u32).0;
            let cells = self.memory.slice(ptr, etype.size().max(1))?;
            if cells.iter().all(|&c| c == 0) {
                continue;
            }
            let value = self.memory.value(ptr, etype)?;
            out.push_str(&format!("{:>15} {}\n", name, self.value_string(value)));
        }
        Ok(out)
    }
}
