use super::{Memory, Ptr};
use crate::error;
use crate::prog::Error;

type Result<T> = std::result::Result<T, Error>;

/// Every block header carries this id, and so does the cell after a
/// used block's data.
pub const ZONEID: u32 = 0x001d_4a11;
/// Never split off a free block smaller than this.
pub const MINFRAGMENT: u32 = 16;
/// Cells in a block header.
pub const HEADER: u32 = 6;

// block header
const BLOCK_SIZE: u32 = 0;
const TAG: u32 = 1;
const NEXT: u32 = 2;
const PREV: u32 = 3;
const SIZE: u32 = 4;
const ID: u32 = 5;

// zone header; the sentinel block is never free and has size 0
const ZONE_SIZE: u32 = 0;
const ROVER: u32 = 1;
const SENTINEL: u32 = 2;
const FIRST: u32 = SENTINEL + HEADER;

pub type ZoneErrorFn = fn(&Error);

/// Cells a block holding `size` cells takes, header and canary included.
fn block_need(size: u32) -> Option<u32> {
    size.checked_add(HEADER + 1 + 1).map(|n| n & !1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// First data cell.
    pub ptr: Ptr,
    /// Cells taken, header and canary included.
    pub block_size: u32,
    /// 0 for a free block.
    pub tag: u32,
    /// Cells requested.
    pub size: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneStats {
    pub blocks: u32,
    pub free_blocks: u32,
    pub used_cells: u32,
    pub free_cells: u32,
    pub largest_free: u32,
}

/// ## Next-fit heap inside the flat address space
///
/// Blocks form a doubly linked ring in address order through a sentinel
/// that lives in the zone header. Allocation continues from the rover,
/// adjacent free blocks are merged on free. All sizes are in cells.

#[derive(Clone, Copy)]
pub struct Zone {
    base: u32,
    size: u32,
    error_hook: Option<ZoneErrorFn>,
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Zone {{ base: {}, size: {} }}", self.base, self.size)
    }
}

impl Zone {
    /// Smallest zone that can hold one block.
    pub const MIN_SIZE: u32 = FIRST + HEADER + MINFRAGMENT;

    pub fn new(base: u32, size: u32) -> Zone {
        Zone {
            base,
            size,
            error_hook: None,
        }
    }

    /// Called with every corruption or exhaustion error before it is
    /// returned.
    pub fn set_error_hook(&mut self, hook: Option<ZoneErrorFn>) {
        self.error_hook = hook;
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether `ptr` could be a data pointer handed out by this zone.
    pub fn contains(&self, ptr: Ptr) -> bool {
        ptr.0 >= self.base + FIRST + HEADER && ptr.0 < self.base + self.size
    }

    fn fail(&self, err: Error) -> Error {
        if let Some(hook) = self.error_hook {
            hook(&err);
        }
        err
    }

    fn get(&self, mem: &Memory, block: u32, field: u32) -> Result<u32> {
        mem.get::<u32>(block + field).map_err(|e| self.fail(e))
    }

    fn set(&self, mem: &mut Memory, block: u32, field: u32, v: u32) -> Result<()> {
        mem.set(block + field, v).map_err(|e| self.fail(e))
    }

    fn sentinel(&self) -> u32 {
        self.base + SENTINEL
    }

    /// Lays out an empty zone: the sentinel and one free block.
    pub fn init(&self, mem: &mut Memory) -> Result<()> {
        if self.size < Zone::MIN_SIZE {
            return Err(self.fail(error!(Zone; "zone of {} cells is too small", self.size)));
        }
        mem.slice(self.base, self.size).map_err(|e| self.fail(e))?;
        mem.fill(self.base, self.size, 0)?;
        let sentinel = self.sentinel();
        let first = self.base + FIRST;
        self.set(mem, self.base, ZONE_SIZE, self.size)?;
        self.set(mem, self.base, ROVER, first)?;
        self.set(mem, sentinel, BLOCK_SIZE, 0)?;
        self.set(mem, sentinel, TAG, 1)?;
        self.set(mem, sentinel, NEXT, first)?;
        self.set(mem, sentinel, PREV, first)?;
        self.set(mem, sentinel, ID, ZONEID)?;
        self.set(mem, first, BLOCK_SIZE, self.size - FIRST)?;
        self.set(mem, first, TAG, 0)?;
        self.set(mem, first, NEXT, sentinel)?;
        self.set(mem, first, PREV, sentinel)?;
        self.set(mem, first, ID, ZONEID)
    }

    /// Zero-filled allocation with tag 1.
    pub fn malloc(&self, mem: &mut Memory, size: u32) -> Result<Ptr> {
        let ptr = self.tag_malloc(mem, size, 1)?;
        mem.fill(ptr.0, size, 0)?;
        Ok(ptr)
    }

    pub fn tag_malloc(&self, mem: &mut Memory, size: u32, tag: u32) -> Result<Ptr> {
        if tag == 0 {
            return Err(self.fail(error!(Zone; "tried to use a 0 tag")));
        }
        let need = match block_need(size) {
            Some(n) => n,
            None => return Err(self.fail(error!(Zone; "failed on allocation of {} cells", size))),
        };

        let mut rover = self.get(mem, self.base, ROVER)?;
        let mut base = rover;
        let start = self.get(mem, base, PREV)?;
        loop {
            if rover == start {
                return Err(self.fail(error!(Zone; "failed on allocation of {} cells", size)));
            }
            if self.get(mem, rover, TAG)? != 0 {
                rover = self.get(mem, rover, NEXT)?;
                base = rover;
            } else {
                rover = self.get(mem, rover, NEXT)?;
            }
            if self.get(mem, base, TAG)? == 0 && self.get(mem, base, BLOCK_SIZE)? >= need {
                break;
            }
        }

        let extra = self.get(mem, base, BLOCK_SIZE)? - need;
        if extra > MINFRAGMENT {
            let new = base + need;
            let next = self.get(mem, base, NEXT)?;
            self.set(mem, new, BLOCK_SIZE, extra)?;
            self.set(mem, new, TAG, 0)?;
            self.set(mem, new, SIZE, 0)?;
            self.set(mem, new, PREV, base)?;
            self.set(mem, new, ID, ZONEID)?;
            self.set(mem, new, NEXT, next)?;
            self.set(mem, next, PREV, new)?;
            self.set(mem, base, NEXT, new)?;
            self.set(mem, base, BLOCK_SIZE, need)?;
        }
        self.set(mem, base, TAG, tag)?;
        self.set(mem, base, SIZE, size)?;
        self.set(mem, base, ID, ZONEID)?;
        let next = self.get(mem, base, NEXT)?;
        self.set(mem, self.base, ROVER, next)?;
        let block_size = self.get(mem, base, BLOCK_SIZE)?;
        self.set(mem, base, block_size - 1, ZONEID)?;
        Ok(Ptr(base + HEADER))
    }

    /// Header of the used block holding `ptr`, after checking it.
    fn used_block(&self, mem: &Memory, ptr: Ptr, what: &str) -> Result<u32> {
        if ptr.is_null() {
            return Err(self.fail(error!(Zone; "{} a NULL pointer", what)));
        }
        if !self.contains(ptr) {
            return Err(self.fail(error!(Zone; "{} a pointer outside of the zone", what)));
        }
        let block = ptr.0 - HEADER;
        if self.get(mem, block, ID)? != ZONEID {
            return Err(self.fail(error!(Zone; "{} a pointer without ZONEID", what)));
        }
        if self.get(mem, block, TAG)? == 0 {
            return Err(self.fail(error!(Zone; "{} a freed pointer", what)));
        }
        let block_size = self.get(mem, block, BLOCK_SIZE)?;
        if block_size < HEADER + 1 || self.get(mem, block, block_size - 1)? != ZONEID {
            return Err(self.fail(error!(Zone; "memory overwritten past the end of block {}", ptr.0)));
        }
        Ok(block)
    }

    pub fn free(&self, mem: &mut Memory, ptr: Ptr) -> Result<()> {
        let mut block = self.used_block(mem, ptr, "freed")?;
        let rover = self.get(mem, self.base, ROVER)?;
        self.set(mem, block, TAG, 0)?;
        self.set(mem, block, SIZE, 0)?;

        let other = self.get(mem, block, PREV)?;
        if self.get(mem, other, TAG)? == 0 {
            let size = self.get(mem, other, BLOCK_SIZE)? + self.get(mem, block, BLOCK_SIZE)?;
            let next = self.get(mem, block, NEXT)?;
            self.set(mem, other, BLOCK_SIZE, size)?;
            self.set(mem, other, NEXT, next)?;
            self.set(mem, next, PREV, other)?;
            self.set(mem, block, ID, 0)?;
            if block == rover {
                self.set(mem, self.base, ROVER, other)?;
            }
            block = other;
        }

        let other = self.get(mem, block, NEXT)?;
        if self.get(mem, other, TAG)? == 0 {
            let size = self.get(mem, block, BLOCK_SIZE)? + self.get(mem, other, BLOCK_SIZE)?;
            let next = self.get(mem, other, NEXT)?;
            self.set(mem, block, BLOCK_SIZE, size)?;
            self.set(mem, block, NEXT, next)?;
            self.set(mem, next, PREV, block)?;
            self.set(mem, other, ID, 0)?;
            if other == self.get(mem, self.base, ROVER)? {
                self.set(mem, self.base, ROVER, block)?;
            }
        }
        Ok(())
    }

    /// Frees every block carrying `tag`.
    pub fn free_tags(&self, mem: &mut Memory, tag: u32) -> Result<()> {
        if tag == 0 {
            return Err(self.fail(error!(Zone; "tried to free tag 0")));
        }
        let tagged: Vec<Ptr> = self
            .blocks(mem)?
            .into_iter()
            .filter(|b| b.tag == tag)
            .map(|b| b.ptr)
            .collect();
        for ptr in tagged {
            self.free(mem, ptr)?;
        }
        Ok(())
    }

    /// Requested size of the used block at `ptr`.
    pub fn size_of(&self, mem: &Memory, ptr: Ptr) -> Result<u32> {
        let block = self.used_block(mem, ptr, "sized")?;
        self.get(mem, block, SIZE)
    }

    /// Grows or shrinks `ptr`, keeping its contents and tag. Cells past
    /// the old size are zero. A null `ptr` allocates.
    pub fn realloc(&self, mem: &mut Memory, ptr: Ptr, size: u32) -> Result<Ptr> {
        if ptr.is_null() {
            return self.malloc(mem, size);
        }
        let block = self.used_block(mem, ptr, "reallocated")?;
        let tag = self.get(mem, block, TAG)?;
        let old_size = self.get(mem, block, SIZE)?;
        // refuse before freeing so a failure leaves `ptr` intact
        match block_need(size) {
            Some(need) if need <= self.largest_after_free(mem, block)? => {}
            _ => return Err(self.fail(error!(Zone; "failed on allocation of {} cells", size))),
        }
        let keep = old_size.min(size);
        let data = mem.slice(ptr.0, keep)?.to_vec();
        self.free(mem, ptr)?;
        let new = self.tag_malloc(mem, size, tag)?;
        mem.slice_mut(new.0, keep)?.copy_from_slice(&data);
        mem.fill(new.0 + keep, size - keep, 0)?;
        Ok(new)
    }

    /// The largest free block there would be once `block` is freed and
    /// merged with its free neighbours.
    fn largest_after_free(&self, mem: &Memory, block: u32) -> Result<u32> {
        let mut merged = self.get(mem, block, BLOCK_SIZE)?;
        for &link in &[PREV, NEXT] {
            let other = self.get(mem, block, link)?;
            if self.get(mem, other, TAG)? == 0 {
                merged += self.get(mem, other, BLOCK_SIZE)?;
            }
        }
        let largest = self
            .blocks(mem)?
            .iter()
            .filter(|b| b.tag == 0)
            .map(|b| b.block_size)
            .max()
            .unwrap_or(0);
        Ok(merged.max(largest))
    }

    /// Walks the ring from the sentinel, in address order.
    pub fn blocks(&self, mem: &Memory) -> Result<Vec<BlockInfo>> {
        let sentinel = self.sentinel();
        let limit = self.size / 2;
        let mut blocks = vec![];
        let mut block = self.get(mem, sentinel, NEXT)?;
        while block != sentinel {
            if blocks.len() as u32 > limit {
                return Err(self.fail(error!(Zone; "block ring does not close")));
            }
            blocks.push(BlockInfo {
                ptr: Ptr(block + HEADER),
                block_size: self.get(mem, block, BLOCK_SIZE)?,
                tag: self.get(mem, block, TAG)?,
                size: self.get(mem, block, SIZE)?,
            });
            block = self.get(mem, block, NEXT)?;
        }
        Ok(blocks)
    }

    pub fn check_heap(&self, mem: &Memory) -> Result<()> {
        let sentinel = self.sentinel();
        let end = self.base + self.size;
        let mut block = self.get(mem, sentinel, NEXT)?;
        if block != self.base + FIRST {
            return Err(self.fail(error!(Zone; "first block is not at the start of the zone")));
        }
        let mut count = 0;
        while block != sentinel {
            count += 1;
            if count > self.size / 2 {
                return Err(self.fail(error!(Zone; "block ring does not close")));
            }
            if block < self.base + FIRST || block >= end {
                return Err(self.fail(error!(Zone; "block {} is outside the zone", block)));
            }
            if self.get(mem, block, ID)? != ZONEID {
                return Err(self.fail(error!(Zone; "block {} has no ZONEID", block)));
            }
            let block_size = self.get(mem, block, BLOCK_SIZE)?;
            let tag = self.get(mem, block, TAG)?;
            let next = self.get(mem, block, NEXT)?;
            if block_size < HEADER + 1 {
                return Err(self.fail(error!(Zone; "block {} has size {}", block, block_size)));
            }
            if tag != 0 && self.get(mem, block, block_size - 1)? != ZONEID {
                return Err(self.fail(error!(Zone; "memory overwritten past the end of block {}", block)));
            }
            if next == sentinel {
                if block + block_size != end {
                    return Err(self.fail(error!(Zone; "last block does not reach the end of the zone")));
                }
            } else {
                if block + block_size != next {
                    return Err(self.fail(error!(Zone; "block size does not touch the next block")));
                }
                if self.get(mem, next, TAG)? == 0 && tag == 0 {
                    return Err(self.fail(error!(Zone; "two consecutive free blocks")));
                }
            }
            if self.get(mem, next, PREV)? != block {
                return Err(self.fail(error!(Zone; "next block doesn't have proper back link")));
            }
            block = next;
        }
        Ok(())
    }

    pub fn stats(&self, mem: &Memory) -> Result<ZoneStats> {
        let mut stats = ZoneStats::default();
        for b in self.blocks(mem)? {
            stats.blocks += 1;
            if b.tag == 0 {
                stats.free_blocks += 1;
                stats.free_cells += b.block_size;
                stats.largest_free = stats.largest_free.max(b.block_size);
            } else {
                stats.used_cells += b.block_size;
            }
        }
        Ok(stats)
    }

    pub fn dump(&self, mem: &Memory) -> Result<String> {
        let rover = self.get(mem, self.base, ROVER)?;
        let mut s = format!("zone size: {}  location: {}  rover: {}\n", self.size, self.base, rover);
        for b in self.blocks(mem)? {
            s.push_str(&format!(
                "block: {:6}  size: {:6}  tag: {:4}  request: {:6}\n",
                b.ptr.0 - HEADER,
                b.block_size,
                b.tag,
                b.size
            ));
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(size: u32) -> (Zone, Memory) {
        let mut mem = Memory::new(vec![0; 64 + size as usize]);
        let zone = Zone::new(64, size);
        zone.init(&mut mem).unwrap();
        (zone, mem)
    }

    #[test]
    fn test_empty_zone() {
        let (zone, mem) = zone(256);
        let blocks = zone.blocks(&mem).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_size, 256 - FIRST);
        assert_eq!(blocks[0].tag, 0);
        zone.check_heap(&mem).unwrap();
    }

    #[test]
    fn test_split_and_coalesce() {
        let (zone, mut mem) = zone(256);
        let a = zone.malloc(&mut mem, 10).unwrap();
        let b = zone.malloc(&mut mem, 10).unwrap();
        assert!(b.0 >= a.0 + 10);
        assert_eq!(zone.blocks(&mem).unwrap().len(), 3);
        zone.free(&mut mem, a).unwrap();
        zone.check_heap(&mem).unwrap();
        zone.free(&mut mem, b).unwrap();
        zone.check_heap(&mem).unwrap();
        assert_eq!(zone.blocks(&mem).unwrap().len(), 1);
    }

    #[test]
    fn test_no_split_below_min_fragment() {
        let (zone, mut mem) = zone(Zone::MIN_SIZE);
        zone.malloc(&mut mem, 4).unwrap();
        let blocks = zone.blocks(&mem).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].size, 4);
    }

    #[test]
    fn test_double_free() {
        let (zone, mut mem) = zone(256);
        let a = zone.malloc(&mut mem, 10).unwrap();
        zone.malloc(&mut mem, 10).unwrap();
        zone.free(&mut mem, a).unwrap();
        let err = zone.free(&mut mem, a).unwrap_err();
        assert_eq!(err.text(), "freed a freed pointer");
    }

    #[test]
    fn test_canary() {
        let (zone, mut mem) = zone(256);
        let a = zone.malloc(&mut mem, 10).unwrap();
        let block_size = mem.get::<u32>(a.0 - HEADER).unwrap();
        mem.set(a.0 - HEADER + block_size - 1, 0u32).unwrap();
        assert!(zone.check_heap(&mem).is_err());
        assert!(zone.free(&mut mem, a).is_err());
    }

    #[test]
    fn test_bad_pointers() {
        let (zone, mut mem) = zone(256);
        assert_eq!(zone.free(&mut mem, Ptr::NULL).unwrap_err().text(), "freed a NULL pointer");
        assert!(zone.free(&mut mem, Ptr(3)).is_err());
        assert!(zone.tag_malloc(&mut mem, 3, 0).is_err());
    }

    #[test]
    fn test_exhaustion() {
        let (zone, mut mem) = zone(64);
        assert!(zone.malloc(&mut mem, 100).is_err());
    }

    #[test]
    fn test_realloc_keeps_data() {
        let (zone, mut mem) = zone(256);
        let a = zone.malloc(&mut mem, 4).unwrap();
        mem.set(a.0, 77u32).unwrap();
        zone.malloc(&mut mem, 4).unwrap();
        let b = zone.realloc(&mut mem, a, 20).unwrap();
        assert_eq!(mem.get::<u32>(b.0).unwrap(), 77);
        assert_eq!(mem.get::<u32>(b.0 + 19).unwrap(), 0);
        assert_eq!(zone.size_of(&mem, b).unwrap(), 20);
        zone.check_heap(&mem).unwrap();
    }

    #[test]
    fn test_failed_realloc_keeps_block() {
        let (zone, mut mem) = zone(256);
        let a = zone.malloc(&mut mem, 10).unwrap();
        mem.set(a.0, 42u32).unwrap();
        assert!(zone.realloc(&mut mem, a, 10_000).is_err());
        assert_eq!(zone.size_of(&mem, a).unwrap(), 10);
        assert_eq!(mem.get::<u32>(a.0).unwrap(), 42);
        zone.check_heap(&mem).unwrap();
    }

    #[test]
    fn test_realloc_into_merged_neighbour() {
        let (zone, mut mem) = zone(256);
        let a = zone.malloc(&mut mem, 40).unwrap();
        let b = zone.malloc(&mut mem, 40).unwrap();
        zone.malloc(&mut mem, 100).unwrap();
        mem.set(b.0, 9u32).unwrap();
        zone.free(&mut mem, a).unwrap();
        let b = zone.realloc(&mut mem, b, 80).unwrap();
        assert_eq!(mem.get::<u32>(b.0).unwrap(), 9);
        zone.check_heap(&mem).unwrap();
    }

    #[test]
    fn test_free_tags() {
        let (zone, mut mem) = zone(512);
        zone.tag_malloc(&mut mem, 8, 5).unwrap();
        let keep = zone.tag_malloc(&mut mem, 8, 1).unwrap();
        zone.tag_malloc(&mut mem, 8, 5).unwrap();
        zone.free_tags(&mut mem, 5).unwrap();
        zone.check_heap(&mem).unwrap();
        let used: Vec<_> = zone.blocks(&mem).unwrap().into_iter().filter(|b| b.tag != 0).collect();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].ptr, keep);
    }
}
