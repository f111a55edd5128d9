//! `TileMap`: open-addressing map from tile origin `(x, y)` to `TileIdx`.
//!
//! Robin Hood probing with backward-shift deletion, so there are no
//! tombstones and misses stop as soon as the probe runs past where the key
//! would have been placed.

use super::tile::TileIdx;

const MX: u64 = 0x9e37_79b9_7f4a_7c15;
const MY: u64 = 0xc2b2_ae3d_27d4_eb4f;

#[inline(always)]
fn coord_hash((x, y): (i64, i64)) -> u64 {
    let h = (x as u64).wrapping_mul(MX) ^ (y as u64).wrapping_mul(MY).rotate_left(29);
    h ^ (h >> 32)
}

/// Occupied slot. `dist` is how far it sits from its home bucket.
#[derive(Clone, Copy, Debug)]
struct Entry {
    key: (i64, i64),
    value: TileIdx,
    dist: u32,
}

/// Load factor: grow when more than half full.
const LOAD_NUM: usize = 1;
const LOAD_DEN: usize = 2;
const MIN_SLOTS: usize = 16;

#[derive(Clone, Debug)]
pub struct TileMap {
    slots: Vec<Option<Entry>>,
    len: usize,
    /// `capacity - 1`; capacity is a power of two.
    mask: usize,
}

impl Default for TileMap {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl TileMap {
    /// Create an empty map with room for at least `cap` entries before growing.
    pub fn with_capacity(cap: usize) -> Self {
        let slots = Self::slots_for(cap);
        Self {
            slots: vec![None; slots],
            len: 0,
            mask: slots - 1,
        }
    }

    fn slots_for(entries: usize) -> usize {
        entries
            .saturating_mul(LOAD_DEN)
            .div_ceil(LOAD_NUM)
            .next_power_of_two()
            .max(MIN_SLOTS)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.len = 0;
    }

    /// Position of `key`, if present.
    fn find(&self, key: (i64, i64)) -> Option<usize> {
        let mut pos = coord_hash(key) as usize & self.mask;
        let mut dist = 0u32;
        loop {
            let entry = self.slots[pos]?;
            // Everything further along the chain is closer to its own home.
            if dist > entry.dist {
                return None;
            }
            if entry.key == key {
                return Some(pos);
            }
            pos = (pos + 1) & self.mask;
            dist += 1;
        }
    }

    #[inline]
    pub fn get(&self, key: (i64, i64)) -> Option<TileIdx> {
        self.find(key).and_then(|pos| self.slots[pos].map(|e| e.value))
    }

    #[inline]
    pub fn contains(&self, key: (i64, i64)) -> bool {
        self.find(key).is_some()
    }

    /// Insert a mapping. Returns the previous value if the key was present.
    pub fn insert(&mut self, key: (i64, i64), value: TileIdx) -> Option<TileIdx> {
        if let Some(pos) = self.find(key) {
            let entry = self.slots[pos].as_mut()?;
            return Some(std::mem::replace(&mut entry.value, value));
        }
        if (self.len + 1) * LOAD_DEN > self.slots.len() * LOAD_NUM {
            self.resize(self.slots.len() * 2);
        }
        self.place(Entry { key, value, dist: 0 });
        self.len += 1;
        None
    }

    /// Robin Hood placement of a key known to be absent.
    fn place(&mut self, mut ins: Entry) {
        let mut pos = coord_hash(ins.key) as usize & self.mask;
        ins.dist = 0;
        loop {
            let Some(existing) = self.slots[pos].as_mut() else {
                self.slots[pos] = Some(ins);
                return;
            };
            if ins.dist > existing.dist {
                std::mem::swap(existing, &mut ins);
            }
            ins.dist += 1;
            pos = (pos + 1) & self.mask;
        }
    }

    /// Remove a mapping. Returns the value if the key was present.
    pub fn remove(&mut self, key: (i64, i64)) -> Option<TileIdx> {
        let removed = self.find(key)?;
        let value = self.slots[removed].take()?.value;
        self.len -= 1;

        // Backward shift: pull displaced successors one slot toward home.
        let mut gap = removed;
        loop {
            let next = (gap + 1) & self.mask;
            match self.slots[next] {
                Some(mut entry) if entry.dist > 0 => {
                    entry.dist -= 1;
                    self.slots[gap] = Some(entry);
                    self.slots[next] = None;
                    gap = next;
                }
                _ => return Some(value),
            }
        }
    }

    fn resize(&mut self, new_cap: usize) {
        debug_assert!(new_cap.is_power_of_two());
        let old = std::mem::replace(&mut self.slots, vec![None; new_cap]);
        self.mask = new_cap - 1;
        for entry in old.into_iter().flatten() {
            self.place(entry);
        }
    }

    /// All `(coord, TileIdx)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = ((i64, i64), TileIdx)> + '_ {
        self.slots.iter().flatten().map(|e| (e.key, e.value))
    }
}
