//! Region arena: the ordered sequence + free lists that carve up one
//! address space's virtual range.
//!
//! Generalizes `memory::vma`'s linear `Vec<Vma>` list into the model
//! `AddressSpace` actually needs: an ordered sequence covering the range
//! with no gaps, an id-keyed map for O(log n) address lookup, and
//! power-of-two free lists for `ANY` placement. Regions reference each
//! other by `RegionId` rather than by pointer/index, the same
//! pointer-graphs-become-ids choice `fs::ext2` makes for block/inode
//! numbers.

use crate::error::KernelError;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

pub const PAGE_SIZE: u64 = 4096;
const PAGE_SHIFT: u32 = 12;
/// Enough lists to cover any region up to 2^47 bytes (full canonical half).
const NUM_FREELISTS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection(u8);

impl Protection {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(0b001);
    pub const WRITE: Self = Self(0b010);
    pub const EXEC: Self = Self(0b100);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for Protection {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapFlags(u8);

impl MapFlags {
    pub const NONE: Self = Self(0);
    pub const PRIVATE: Self = Self(0b0001);
    pub const OVERCOMMIT: Self = Self(0b0010);
    pub const INHERIT: Self = Self(0b0100);
    pub const STACK: Self = Self(0b1000);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for MapFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Allocated,
    Free,
    Reserved,
}

/// Where a caller wants a new mapping placed.
#[derive(Debug, Clone, Copy)]
pub enum PlacementSpec {
    /// Let the freelists pick an address.
    Any,
    /// Place exactly at `start`, displacing whatever is already there.
    Exact { start: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegionId(pub u64);

/// An opaque reference to an object this region is backed by (file-map,
/// device, etc). The VMM layer only needs identity + an offset; the actual
/// `get_page`/`release_page` operations live with whatever owns the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    pub start: u64,
    pub size: u64,
    pub prot: Protection,
    pub flags: MapFlags,
    pub state: RegionState,
    pub object: Option<ObjectHandle>,
    pub object_offset: u64,
    /// Set for regions backed by an anonymous map; `memory::amap::AmapId`
    /// kept as a raw `u64` here to avoid a dependency cycle with `amap.rs`.
    pub amap: Option<u64>,
    pub amap_offset: u64,
    pub name: Option<&'static str>,
}

impl Region {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// Same state, backed by the same amap/object at a contiguous offset —
    /// mergeable per the "adjacent unused regions of the same state are
    /// always merged" invariant.
    fn mergeable_with(&self, other: &Region) -> bool {
        if self.state != other.state {
            return false;
        }
        match self.state {
            RegionState::Free | RegionState::Reserved => true,
            RegionState::Allocated => false,
        }
    }
}

fn freelist_index(size: u64) -> usize {
    let pages = size >> PAGE_SHIFT;
    let k = 63 - pages.leading_zeros();
    (k as usize).min(NUM_FREELISTS - 1)
}

/// The arena owning one address space's regions: ordered sequence, O(log n)
/// lookup map, and power-of-two free lists plus non-empty bitmap.
pub struct RegionArena {
    base: u64,
    limit: u64,
    next_id: u64,
    /// Ordered by start address; invariant: covers `[base, limit)` with no
    /// gaps or overlaps.
    sequence: Vec<RegionId>,
    regions: BTreeMap<RegionId, Region>,
    by_start: BTreeMap<u64, RegionId>,
    freelists: [Vec<RegionId>; NUM_FREELISTS],
    nonempty_mask: u64,
    /// Single-region fast path for repeated faults in the same region.
    find_cache: Option<RegionId>,
}

impl RegionArena {
    /// A fresh arena covering `[base, base+size)`, entirely FREE.
    pub fn new(base: u64, size: u64) -> Self {
        assert!(base % PAGE_SIZE == 0 && size % PAGE_SIZE == 0);
        let mut arena = Self {
            base,
            limit: base + size,
            next_id: 1,
            sequence: Vec::new(),
            regions: BTreeMap::new(),
            by_start: BTreeMap::new(),
            freelists: core::array::from_fn(|_| Vec::new()),
            nonempty_mask: 0,
            find_cache: None,
        };
        if size > 0 {
            let id = arena.alloc_id();
            let region = Region {
                id,
                start: base,
                size,
                prot: Protection::NONE,
                flags: MapFlags::NONE,
                state: RegionState::Free,
                object: None,
                object_offset: 0,
                amap: None,
                amap_offset: 0,
                name: None,
            };
            arena.insert_tracking(region.clone());
            arena.push_to_freelist(&region);
        }
        arena
    }

    fn alloc_id(&mut self) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert_tracking(&mut self, region: Region) {
        let id = region.id;
        let start = region.start;
        let pos = self
            .sequence
            .binary_search_by_key(&start, |id| self.regions[id].start)
            .unwrap_or_else(|p| p);
        self.sequence.insert(pos, id);
        self.by_start.insert(start, id);
        self.regions.insert(id, region);
    }

    fn remove_tracking(&mut self, id: RegionId) -> Region {
        let region = self.regions.remove(&id).expect("region id must exist");
        self.by_start.remove(&region.start);
        if let Ok(pos) = self.sequence.binary_search(&id) {
            self.sequence.remove(pos);
        } else if let Some(pos) = self.sequence.iter().position(|&r| r == id) {
            self.sequence.remove(pos);
        }
        if self.find_cache == Some(id) {
            self.find_cache = None;
        }
        region
    }

    fn push_to_freelist(&mut self, region: &Region) {
        let idx = freelist_index(region.size);
        self.freelists[idx].push(region.id);
        self.nonempty_mask |= 1 << idx;
    }

    fn remove_from_freelist(&mut self, region: &Region) {
        let idx = freelist_index(region.size);
        if let Some(pos) = self.freelists[idx].iter().position(|&id| id == region.id) {
            self.freelists[idx].remove(pos);
        }
        if self.freelists[idx].is_empty() {
            self.nonempty_mask &= !(1 << idx);
        }
    }

    /// Find the region (of any state) containing `addr`, if any.
    pub fn find(&mut self, addr: u64) -> Option<&Region> {
        if let Some(id) = self.find_cache {
            if self.regions.get(&id).map(|r| r.contains(addr)) == Some(true) {
                return self.regions.get(&id);
            }
        }
        let id = self
            .by_start
            .range(..=addr)
            .next_back()
            .map(|(_, &id)| id)
            .filter(|id| self.regions[id].contains(addr))?;
        self.find_cache = Some(id);
        self.regions.get(&id)
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Validate the generic placement preconditions shared by `map`/`reserve`.
    fn validate_range(&self, start: u64, size: u64) -> Result<(), KernelError> {
        if size == 0 || size % PAGE_SIZE != 0 {
            return Err(KernelError::InvalidArg);
        }
        let end = start.checked_add(size).ok_or(KernelError::InvalidArg)?;
        if start % PAGE_SIZE != 0 || start < self.base || end > self.limit {
            return Err(KernelError::InvalidArg);
        }
        Ok(())
    }

    /// `map(ANY, ...)`: search the freelists starting at the index that
    /// guarantees a fit, walk each non-empty list in order, take the first
    /// region large enough, and split the remainder back onto its freelist.
    fn place_any(&mut self, size: u64) -> Result<Region, KernelError> {
        let is_pow2 = size.is_power_of_two();
        let mut idx = freelist_index(size);
        if !is_pow2 {
            // Non-power-of-two must look one bucket higher to guarantee a fit,
            // unless that bucket is empty, in which case start at idx anyway
            // (idx's own list may still contain an oversized entry).
            if idx + 1 < NUM_FREELISTS && (self.nonempty_mask & (1 << (idx + 1))) != 0 {
                idx += 1;
            }
        }

        for i in idx..NUM_FREELISTS {
            if self.nonempty_mask & (1 << i) == 0 {
                continue;
            }
            let candidates = self.freelists[i].clone();
            for candidate_id in candidates {
                let candidate = self.regions[&candidate_id].clone();
                if candidate.size < size {
                    continue;
                }
                self.remove_from_freelist(&candidate);
                let taken = self.remove_tracking(candidate_id);

                let head = Region {
                    id: taken.id,
                    start: taken.start,
                    size,
                    ..taken.clone()
                };

                if taken.size > size {
                    let tail_id = self.alloc_id();
                    let tail = Region {
                        id: tail_id,
                        start: taken.start + size,
                        size: taken.size - size,
                        prot: Protection::NONE,
                        flags: MapFlags::NONE,
                        state: RegionState::Free,
                        object: None,
                        object_offset: 0,
                        amap: None,
                        amap_offset: 0,
                        name: None,
                    };
                    self.insert_tracking(tail.clone());
                    self.push_to_freelist(&tail);
                }

                self.insert_tracking(head.clone());
                return Ok(head);
            }
        }
        Err(KernelError::NoMemory)
    }

    /// `trim_regions(start, size)`: cut/split/destroy every region
    /// overlapping `[start, start+size)` so an exact hole exists.
    fn trim_regions(&mut self, start: u64, size: u64) -> Result<(), KernelError> {
        let end = start + size;
        loop {
            let overlap_id = self
                .sequence
                .iter()
                .copied()
                .find(|&id| {
                    let r = &self.regions[&id];
                    r.start < end && start < r.end()
                });
            let Some(id) = overlap_id else { break };
            let region = self.regions[&id].clone();

            if region.start >= start && region.end() <= end {
                self.destroy_region_entry(id);
                continue;
            }

            if region.start < start && region.end() > end {
                // Split into head (before hole) + tail (after hole).
                self.remove_from_freelist_if_free(&region);
                self.remove_tracking(id);

                let head = Region {
                    id,
                    size: start - region.start,
                    ..region.clone()
                };
                let tail_id = self.alloc_id();
                let tail = Region {
                    id: tail_id,
                    start: end,
                    size: region.end() - end,
                    object_offset: region.object_offset + (end - region.start),
                    amap_offset: region.amap_offset + (end - region.start),
                    ..region.clone()
                };
                self.insert_tracking(head.clone());
                self.insert_tracking(tail.clone());
                if head.state == RegionState::Free {
                    self.push_to_freelist(&head);
                }
                if tail.state == RegionState::Free {
                    self.push_to_freelist(&tail);
                }
                continue;
            }

            if region.start < start {
                // Shrink from the back: keep [region.start, start).
                self.remove_from_freelist_if_free(&region);
                self.remove_tracking(id);
                let shrunk = Region {
                    id,
                    size: start - region.start,
                    ..region
                };
                self.insert_tracking(shrunk.clone());
                if shrunk.state == RegionState::Free {
                    self.push_to_freelist(&shrunk);
                }
                continue;
            }

            // region.end() > end: shrink from the front: keep [end, region.end()).
            self.remove_from_freelist_if_free(&region);
            self.remove_tracking(id);
            let advance = end - region.start;
            let shrunk = Region {
                id,
                start: end,
                size: region.end() - end,
                object_offset: region.object_offset + advance,
                amap_offset: region.amap_offset + advance,
                ..region
            };
            self.insert_tracking(shrunk.clone());
            if shrunk.state == RegionState::Free {
                self.push_to_freelist(&shrunk);
            }
        }
        Ok(())
    }

    fn remove_from_freelist_if_free(&mut self, region: &Region) {
        if region.state == RegionState::Free {
            self.remove_from_freelist(region);
        }
    }

    fn destroy_region_entry(&mut self, id: RegionId) {
        let region = self.remove_tracking(id);
        if region.state == RegionState::Free {
            self.remove_from_freelist(&region);
        }
    }

    /// Merge `id` with its immediate neighbor in `sequence` if mergeable,
    /// in the given direction. Returns the surviving id.
    fn try_merge_neighbor(&mut self, id: RegionId, forward: bool) -> RegionId {
        let Some(pos) = self.sequence.iter().position(|&r| r == id) else {
            return id;
        };
        let neighbor_pos = if forward {
            pos.checked_add(1)
        } else {
            pos.checked_sub(1)
        };
        let Some(neighbor_pos) = neighbor_pos else {
            return id;
        };
        let Some(&neighbor_id) = self.sequence.get(neighbor_pos) else {
            return id;
        };

        let region = self.regions[&id].clone();
        let neighbor = self.regions[&neighbor_id].clone();
        if !region.mergeable_with(&neighbor) {
            return id;
        }

        let (first, second) = if forward {
            (region, neighbor)
        } else {
            (neighbor, region)
        };
        if first.end() != second.start {
            return id;
        }

        self.remove_from_freelist_if_free(&first);
        self.remove_from_freelist_if_free(&second);
        self.remove_tracking(first.id);
        self.remove_tracking(second.id);

        let merged_id = self.alloc_id();
        let merged = Region {
            id: merged_id,
            start: first.start,
            size: first.size + second.size,
            ..first
        };
        self.insert_tracking(merged.clone());
        if merged.state == RegionState::Free {
            self.push_to_freelist(&merged);
        }
        merged_id
    }

    fn merge_both_sides(&mut self, id: RegionId) -> RegionId {
        let id = self.try_merge_neighbor(id, false);
        self.try_merge_neighbor(id, true)
    }

    /// Create an ALLOCATED region per `spec`.
    pub fn map(
        &mut self,
        spec: PlacementSpec,
        size: u64,
        prot: Protection,
        flags: MapFlags,
        object: Option<ObjectHandle>,
        object_offset: u64,
        amap: Option<u64>,
        name: Option<&'static str>,
    ) -> Result<Region, KernelError> {
        if prot.is_empty() {
            return Err(KernelError::InvalidArg);
        }
        if object_offset % PAGE_SIZE != 0 {
            return Err(KernelError::InvalidArg);
        }

        let placed = match spec {
            PlacementSpec::Any => {
                self.validate_range(self.base, size).map_err(|_| KernelError::InvalidArg)?;
                self.place_any(size)?
            }
            PlacementSpec::Exact { start } => {
                self.validate_range(start, size)?;
                self.trim_regions(start, size)?;
                let id = self.alloc_id();
                let region = Region {
                    id,
                    start,
                    size,
                    prot: Protection::NONE,
                    flags: MapFlags::NONE,
                    state: RegionState::Free,
                    object: None,
                    object_offset: 0,
                    amap: None,
                    amap_offset: 0,
                    name: None,
                };
                self.insert_tracking(region.clone());
                region
            }
        };

        let id = placed.id;
        self.remove_tracking(id);
        let allocated = Region {
            id,
            prot,
            flags,
            state: RegionState::Allocated,
            object,
            object_offset,
            amap,
            amap_offset: 0,
            name,
            ..placed
        };
        self.insert_tracking(allocated.clone());
        self.find_cache = Some(id);
        Ok(allocated)
    }

    pub fn reserve(&mut self, start: u64, size: u64) -> Result<(), KernelError> {
        self.validate_range(start, size)?;
        self.trim_regions(start, size)?;
        let id = self.alloc_id();
        let region = Region {
            id,
            start,
            size,
            prot: Protection::NONE,
            flags: MapFlags::NONE,
            state: RegionState::Reserved,
            object: None,
            object_offset: 0,
            amap: None,
            amap_offset: 0,
            name: None,
        };
        self.insert_tracking(region);
        self.merge_both_sides(id);
        Ok(())
    }

    /// Mark `[start, start+size)` FREE, coalescing on both sides. Returns
    /// the destroyed allocated regions so the caller (`AddressSpace::unmap`)
    /// can release their amaps/objects and unmap their pages first.
    pub fn unmap(&mut self, start: u64, size: u64) -> Result<Vec<Region>, KernelError> {
        self.validate_range(start, size)?;
        let mut released = Vec::new();

        let end = start + size;
        loop {
            let overlap_id = self.sequence.iter().copied().find(|&id| {
                let r = &self.regions[&id];
                r.state == RegionState::Allocated && r.start < end && start < r.end()
            });
            let Some(id) = overlap_id else { break };
            released.push(self.regions[&id].clone());
        }

        self.trim_regions(start, size)?;
        let id = self.alloc_id();
        let region = Region {
            id,
            start,
            size,
            prot: Protection::NONE,
            flags: MapFlags::NONE,
            state: RegionState::Free,
            object: None,
            object_offset: 0,
            amap: None,
            amap_offset: 0,
            name: None,
        };
        self.insert_tracking(region);
        self.push_to_freelist(&self.regions[&id].clone());
        self.merge_both_sides(id);

        Ok(released)
    }

    pub fn iter_allocated(&self) -> impl Iterator<Item = &Region> {
        self.regions.values().filter(|r| r.state == RegionState::Allocated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x4000_0000;
    const SIZE: u64 = 0x1000_0000;

    #[test_case]
    fn fresh_arena_is_one_free_region() {
        let mut arena = RegionArena::new(BASE, SIZE);
        let r = arena.find(BASE).unwrap();
        assert_eq!(r.state, RegionState::Free);
        assert_eq!(r.size, SIZE);
    }

    #[test_case]
    fn map_any_splits_freelist_entry() {
        let mut arena = RegionArena::new(BASE, SIZE);
        let region = arena
            .map(PlacementSpec::Any, 0x1000, Protection::READ, MapFlags::PRIVATE, None, 0, None, None)
            .unwrap();
        assert_eq!(region.size, 0x1000);
        assert_eq!(region.state, RegionState::Allocated);

        let free_after = arena.find(region.end()).unwrap();
        assert_eq!(free_after.state, RegionState::Free);
        assert_eq!(free_after.size, SIZE - 0x1000);
    }

    #[test_case]
    fn map_exact_displaces_existing() {
        let mut arena = RegionArena::new(BASE, SIZE);
        let a = arena
            .map(PlacementSpec::Exact { start: BASE }, 0x2000, Protection::READ, MapFlags::NONE, None, 0, None, None)
            .unwrap();
        assert_eq!(a.start, BASE);

        let b = arena
            .map(
                PlacementSpec::Exact { start: BASE + 0x1000 },
                0x1000,
                Protection::WRITE,
                MapFlags::NONE,
                None,
                0,
                None,
                None,
            )
            .unwrap();
        assert_eq!(b.start, BASE + 0x1000);

        let left = arena.find(BASE).unwrap();
        assert_eq!(left.size, 0x1000);
        assert_eq!(left.state, RegionState::Allocated);
    }

    #[test_case]
    fn unmap_merges_with_neighboring_free_space() {
        let mut arena = RegionArena::new(BASE, SIZE);
        let region = arena
            .map(PlacementSpec::Any, 0x1000, Protection::READ, MapFlags::NONE, None, 0, None, None)
            .unwrap();
        arena.unmap(region.start, region.size).unwrap();

        let merged = arena.find(BASE).unwrap();
        assert_eq!(merged.state, RegionState::Free);
        assert_eq!(merged.size, SIZE);
    }

    #[test_case]
    fn map_rejects_zero_size_and_unaligned() {
        let mut arena = RegionArena::new(BASE, SIZE);
        assert_eq!(
            arena.map(PlacementSpec::Any, 0, Protection::READ, MapFlags::NONE, None, 0, None, None),
            Err(KernelError::InvalidArg)
        );
        assert_eq!(
            arena.map(PlacementSpec::Any, 100, Protection::READ, MapFlags::NONE, None, 0, None, None),
            Err(KernelError::InvalidArg)
        );
    }

    #[test_case]
    fn map_rejects_empty_protection() {
        let mut arena = RegionArena::new(BASE, SIZE);
        assert_eq!(
            arena.map(PlacementSpec::Any, 0x1000, Protection::NONE, MapFlags::NONE, None, 0, None, None),
            Err(KernelError::InvalidArg)
        );
    }

    #[test_case]
    fn reserve_is_never_chosen_by_any_placement() {
        let mut arena = RegionArena::new(BASE, SIZE);
        arena.reserve(BASE, 0x2000).unwrap();
        let region = arena
            .map(PlacementSpec::Any, SIZE - 0x2000, Protection::READ, MapFlags::NONE, None, 0, None, None)
            .unwrap();
        assert!(region.start >= BASE + 0x2000);
    }
}
