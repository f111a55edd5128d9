//! Sparse, self-expanding tiled Conway's Game of Life engine (B3/S23) on a
//! toroidal world.

mod error;
pub mod sparselife;

pub use error::TopologyError;
pub use sparselife::{SparseGrid, SparseGridConfig, TextTileDump, TileDumpSink};
