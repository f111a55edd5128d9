//! Adjacency index: which tiles currently touch which, in which direction.
//!
//! Tiles are keyed by their origin coordinate and addressed by `TileIdx`
//! handles. Every populated neighbor slot has a mirror on the other side:
//! `A.neighbors[d] == Some(B)` iff `B.neighbors[d.reflect()] == Some(A)`.

use super::arena::TileArena;
use super::tile::{Direction, EMPTY_NEIGHBORS, Neighbors, TileIdx};
use super::tilemap::TileMap;
use crate::error::TopologyError;

#[derive(Clone, Copy, Debug)]
struct Entry {
    coord: (i64, i64),
    neighbors: Neighbors,
}

/// Coordinate-keyed tile topology.
#[derive(Debug, Default)]
pub struct AdjacencyIndex {
    lookup: TileMap,
    /// Indexed by `TileIdx`; `None` for handles not in the index.
    entries: Vec<Option<Entry>>,
}

/// `(dx, dy)` to direction. Panics on `(0, 0)`.
#[inline]
pub fn direction_for_offset(dx: i64, dy: i64) -> Direction {
    Direction::from_offset(dx, dy)
}

#[inline]
pub fn offset_for(direction: Direction) -> (i64, i64) {
    direction.offset()
}

impl AdjacencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    #[inline]
    pub fn query(&self, coord: (i64, i64)) -> Option<TileIdx> {
        self.lookup.get(coord)
    }

    #[inline]
    pub fn contains(&self, coord: (i64, i64)) -> bool {
        self.lookup.contains(coord)
    }

    #[inline]
    fn entry(&self, idx: TileIdx) -> Option<&Entry> {
        self.entries.get(idx.index()).and_then(Option::as_ref)
    }

    #[inline]
    fn entry_mut(&mut self, idx: TileIdx) -> Option<&mut Entry> {
        self.entries.get_mut(idx.index()).and_then(Option::as_mut)
    }

    /// Neighbor slots of an indexed tile.
    #[inline]
    pub fn neighbors(&self, idx: TileIdx) -> Option<&Neighbors> {
        self.entry(idx).map(|e| &e.neighbors)
    }

    /// Origin coordinate of an indexed tile.
    #[inline]
    pub fn coord_of(&self, idx: TileIdx) -> Option<(i64, i64)> {
        self.entry(idx).map(|e| e.coord)
    }

    /// Every indexed tile with its neighbor slots, in handle order.
    pub fn iter(&self) -> impl Iterator<Item = ((i64, i64), TileIdx, &Neighbors)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            e.as_ref()
                .map(|e| (e.coord, TileIdx(i as u32), &e.neighbors))
        })
    }

    fn check_vacant(&self, coord: (i64, i64), idx: TileIdx) -> Result<(), TopologyError> {
        if self.lookup.contains(coord) {
            return Err(TopologyError::DuplicateTile {
                x: coord.0,
                y: coord.1,
            });
        }
        if self.entry(idx).is_some() {
            return Err(TopologyError::HandleInUse { idx });
        }
        Ok(())
    }

    fn insert_unchecked(&mut self, coord: (i64, i64), idx: TileIdx) {
        let i = idx.index();
        if i >= self.entries.len() {
            self.entries.resize(i + 1, None);
        }
        self.entries[i] = Some(Entry {
            coord,
            neighbors: EMPTY_NEIGHBORS,
        });
        self.lookup.insert(coord, idx);
    }

    /// Index a tile with no edges yet.
    pub fn add_tile(&mut self, coord: (i64, i64), idx: TileIdx) -> Result<(), TopologyError> {
        self.check_vacant(coord, idx)?;
        self.insert_unchecked(coord, idx);
        Ok(())
    }

    /// Index a batch of tiles. Nothing is added unless every tile can be.
    pub fn add_tiles(&mut self, batch: &[((i64, i64), TileIdx)]) -> Result<(), TopologyError> {
        let mut seen = TileMap::with_capacity(batch.len());
        for &(coord, idx) in batch {
            self.check_vacant(coord, idx)?;
            if seen.insert(coord, idx).is_some() {
                return Err(TopologyError::DuplicateInBatch {
                    x: coord.0,
                    y: coord.1,
                });
            }
        }
        // Handles repeated within the batch.
        let mut handles: Vec<TileIdx> = batch.iter().map(|&(_, idx)| idx).collect();
        handles.sort_unstable();
        if let Some(pair) = handles.windows(2).find(|w| w[0] == w[1]) {
            return Err(TopologyError::HandleInUse { idx: pair[0] });
        }

        for &(coord, idx) in batch {
            self.insert_unchecked(coord, idx);
        }
        Ok(())
    }

    /// Drop the tile at `coord`, unlinking it from every neighbor and zeroing
    /// the ghost cells on both sides of each removed edge.
    ///
    /// Panics if a neighbor's reflected slot does not point back.
    pub fn remove_tile(
        &mut self,
        coord: (i64, i64),
        arena: &mut TileArena,
    ) -> Result<TileIdx, TopologyError> {
        let idx = self.lookup.get(coord).ok_or(TopologyError::MissingTile {
            x: coord.0,
            y: coord.1,
        })?;
        if self.entry(idx).is_none() {
            return Err(TopologyError::MissingTile {
                x: coord.0,
                y: coord.1,
            });
        }

        for side in Direction::ALL {
            // Re-read each time: a self-loop clears two slots at once.
            let Some(other) = self.neighbors(idx).and_then(|nb| nb[side.index()]) else {
                continue;
            };
            let back = side.reflect();
            let points_back = self
                .neighbors(other)
                .is_some_and(|nb| nb[back.index()] == Some(idx));
            if !points_back {
                panic!(
                    "{}",
                    TopologyError::AsymmetricEdge {
                        x: coord.0,
                        y: coord.1,
                        direction: side,
                    }
                );
            }
            if let Some(entry) = self.entry_mut(other) {
                entry.neighbors[back.index()] = None;
            }
            if let Some(entry) = self.entry_mut(idx) {
                entry.neighbors[side.index()] = None;
            }
            if let Some(tile) = arena.get_mut(other) {
                tile.clear_ghost(back);
            }
            if let Some(tile) = arena.get_mut(idx) {
                tile.clear_ghost(side);
            }
        }

        self.lookup.remove(coord);
        self.entries[idx.index()] = None;
        Ok(idx)
    }

    /// Link `a` to `b` on `direction` (and `b` to `a` on its reflection).
    ///
    /// A tile previously linked in either of those slots loses its
    /// back-reference, so the index stays symmetric.
    pub fn add_edge(
        &mut self,
        a: (i64, i64),
        b: (i64, i64),
        direction: Direction,
    ) -> Result<(), TopologyError> {
        let a_idx = self.lookup.get(a).ok_or(TopologyError::MissingTile { x: a.0, y: a.1 })?;
        let b_idx = self.lookup.get(b).ok_or(TopologyError::MissingTile { x: b.0, y: b.1 })?;
        self.unlink_stale(a_idx, direction, b_idx);
        self.unlink_stale(b_idx, direction.reflect(), a_idx);
        if let Some(entry) = self.entry_mut(a_idx) {
            entry.neighbors[direction.index()] = Some(b_idx);
        }
        if let Some(entry) = self.entry_mut(b_idx) {
            entry.neighbors[direction.reflect().index()] = Some(a_idx);
        }
        Ok(())
    }

    /// Clear the reverse slot of whatever `idx` links to on `side`, unless
    /// that is already `keep`.
    fn unlink_stale(&mut self, idx: TileIdx, side: Direction, keep: TileIdx) {
        let Some(old) = self.neighbors(idx).and_then(|nb| nb[side.index()]) else {
            return;
        };
        if old == keep {
            return;
        }
        if let Some(entry) = self.entry_mut(old) {
            let back = &mut entry.neighbors[side.reflect().index()];
            if *back == Some(idx) {
                *back = None;
            }
        }
    }

    /// Unlink every edge between `a` and `b`. Returns whether any existed.
    pub fn remove_edge(&mut self, a: (i64, i64), b: (i64, i64)) -> Result<bool, TopologyError> {
        let a_idx = self.lookup.get(a).ok_or(TopologyError::MissingTile { x: a.0, y: a.1 })?;
        let b_idx = self.lookup.get(b).ok_or(TopologyError::MissingTile { x: b.0, y: b.1 })?;
        let a_neighbors = self.entry(a_idx).map(|e| e.neighbors).unwrap_or(EMPTY_NEIGHBORS);

        let mut removed = false;
        for side in Direction::ALL {
            if a_neighbors[side.index()] != Some(b_idx) {
                continue;
            }
            let back = side.reflect();
            if self.neighbors(b_idx).and_then(|nb| nb[back.index()]) != Some(a_idx) {
                return Err(TopologyError::AsymmetricEdge {
                    x: a.0,
                    y: a.1,
                    direction: side,
                });
            }
            if let Some(entry) = self.entry_mut(a_idx) {
                entry.neighbors[side.index()] = None;
            }
            if let Some(entry) = self.entry_mut(b_idx) {
                entry.neighbors[back.index()] = None;
            }
            removed = true;
        }
        Ok(removed)
    }

    /// Check that every populated slot is mirrored by its neighbor.
    pub fn verify_symmetry(&self) -> Result<(), TopologyError> {
        for (coord, idx, neighbors) in self.iter() {
            for side in Direction::ALL {
                let Some(other) = neighbors[side.index()] else {
                    continue;
                };
                let mirrored = self
                    .neighbors(other)
                    .is_some_and(|nb| nb[side.reflect().index()] == Some(idx));
                if !mirrored {
                    return Err(TopologyError::AsymmetricEdge {
                        x: coord.0,
                        y: coord.1,
                        direction: side,
                    });
                }
            }
        }
        Ok(())
    }
}
