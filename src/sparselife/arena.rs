//! Tile arena for SparseLife.
//!
//! Tiles live in a slot vector addressed by `TileIdx`. Released slots go on a
//! free list and are handed out again before the vector grows, so handles stay
//! small and dense under churn. A released handle must not be used again until
//! the slot is reissued.

use super::tile::{Tile, TileIdx};

const INITIAL_TILE_CAPACITY: usize = 64;
const MIN_GROW_TILES: usize = 64;

#[derive(Debug)]
pub struct TileArena {
    slots: Vec<Option<Tile>>,
    free_list: Vec<TileIdx>,
    occupied_count: usize,
}

impl Default for TileArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TileArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(INITIAL_TILE_CAPACITY),
            free_list: Vec::new(),
            occupied_count: 0,
        }
    }

    fn ensure_growth_capacity(&mut self) {
        let len = self.slots.len();
        if len < self.slots.capacity() {
            return;
        }
        self.slots.reserve((len / 2).max(MIN_GROW_TILES));
    }

    /// Store `tile` and return its handle, reusing a released slot if any.
    pub fn insert(&mut self, tile: Tile) -> TileIdx {
        self.occupied_count += 1;
        if let Some(recycled) = self.free_list.pop() {
            let slot = &mut self.slots[recycled.index()];
            debug_assert!(slot.is_none(), "free list holds an occupied slot");
            *slot = Some(tile);
            return recycled;
        }
        self.ensure_growth_capacity();
        let idx = TileIdx(self.slots.len() as u32);
        self.slots.push(Some(tile));
        idx
    }

    /// Take the tile out of `idx` and recycle the slot.
    ///
    /// Panics if the slot is vacant.
    pub fn release(&mut self, idx: TileIdx) -> Tile {
        let tile = self
            .slots
            .get_mut(idx.index())
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("released vacant tile slot {idx:?}"));
        self.free_list.push(idx);
        self.occupied_count -= 1;
        tile
    }

    #[inline(always)]
    pub fn get(&self, idx: TileIdx) -> Option<&Tile> {
        self.slots.get(idx.index()).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, idx: TileIdx) -> Option<&mut Tile> {
        self.slots.get_mut(idx.index()).and_then(Option::as_mut)
    }

    /// Like [`TileArena::get`], for handles that are known to be live.
    #[inline]
    pub fn tile(&self, idx: TileIdx) -> &Tile {
        self.get(idx)
            .unwrap_or_else(|| panic!("tile slot {idx:?} is vacant"))
    }

    #[inline]
    pub fn tile_mut(&mut self, idx: TileIdx) -> &mut Tile {
        self.get_mut(idx)
            .unwrap_or_else(|| panic!("tile slot {idx:?} is vacant"))
    }

    /// Occupied tiles in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = (TileIdx, &Tile)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|tile| (TileIdx(i as u32), tile)))
    }

    /// Refill `out` with the occupied handles in ascending order.
    pub fn collect_indices(&self, out: &mut Vec<TileIdx>) {
        out.clear();
        out.extend(self.iter().map(|(idx, _)| idx));
    }

    /// Take every tile out, leaving the arena empty.
    pub fn drain(&mut self) -> impl Iterator<Item = Tile> + '_ {
        self.free_list.clear();
        self.occupied_count = 0;
        self.slots.drain(..).flatten()
    }

    /// Raw slot storage for data-parallel passes; vacant slots are `None`.
    #[inline]
    pub(crate) fn slots_mut(&mut self) -> &mut [Option<Tile>] {
        &mut self.slots
    }

    /// Number of slots, occupied or not.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.occupied_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied_count == 0
    }
}
