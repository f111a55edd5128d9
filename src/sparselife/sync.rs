//! Ghost zone synchronization for SparseLife.
//!
//! A tile's ghost zone is gathered from its neighbors' facing borders before
//! the tile writes into its own cells. Gathering only reads neighbors, so any
//! number of gathers may run concurrently as long as no tile is stepping.

use super::arena::TileArena;
use super::tile::{Direction, Neighbors};

/// Neighbor border lines for one tile, indexed by `Direction`.
///
/// Cardinal lines hold `width` or `height` cells; diagonal lines hold the
/// single corner cell. Directions without a neighbor are absent and leave
/// the tile's ghost cells untouched.
#[derive(Clone, Debug, Default)]
pub struct GhostZone {
    lines: [Vec<u8>; 8],
    present: u8,
}

impl GhostZone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every line. Line storage is kept for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.present = 0;
    }

    #[inline]
    pub fn is_present(&self, side: Direction) -> bool {
        self.present & (1 << side.index()) != 0
    }

    #[inline]
    pub fn line(&self, side: Direction) -> Option<&[u8]> {
        self.is_present(side).then(|| self.lines[side.index()].as_slice())
    }

    pub fn set_line(&mut self, side: Direction, cells: &[u8]) {
        let line = &mut self.lines[side.index()];
        line.clear();
        line.extend_from_slice(cells);
        self.present |= 1 << side.index();
    }

    #[inline]
    fn line_mut(&mut self, side: Direction) -> &mut Vec<u8> {
        self.present |= 1 << side.index();
        &mut self.lines[side.index()]
    }
}

/// Gather the ghost zone for a tile whose neighbors are `neighbors`, as of
/// generation `wanted`. Panics if a neighbor handle is stale.
pub fn gather_ghost_zone(
    arena: &TileArena,
    neighbors: &Neighbors,
    wanted: u64,
    out: &mut GhostZone,
) {
    out.clear();
    for side in Direction::ALL {
        let Some(idx) = neighbors[side.index()] else {
            continue;
        };
        let neighbor = arena
            .get(idx)
            .unwrap_or_else(|| panic!("neighbor {idx:?} on {side:?} is not a live tile"));
        neighbor.read_border(side.reflect(), wanted, out.line_mut(side));
    }
}
