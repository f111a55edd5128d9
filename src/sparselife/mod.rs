//! SparseLife engine internals and public API.

mod adjacency;
mod arena;
mod dump;
mod engine;
mod slab;
mod sync;
mod tile;
pub(crate) mod tilemap;

pub use adjacency::{AdjacencyIndex, direction_for_offset, offset_for};
pub use arena::TileArena;
pub use dump::{TextTileDump, TileDumpSink};
pub use engine::{SparseGrid, SparseGridConfig, TileView};
pub use slab::{AlignedBuffer, SlabAllocator, TILE_ALIGN};
pub use sync::{GhostZone, gather_ghost_zone};
pub use tile::{Direction, EMPTY_NEIGHBORS, Neighbors, Tile, TileBounds, TileIdx, padded_len};
