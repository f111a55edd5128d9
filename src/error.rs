use crate::sparselife::{Direction, TileIdx};

/// Rejected adjacency-index mutations.
///
/// These are returned where a caller can reasonably recover. Corruption found
/// mid-simulation is fatal and surfaces as a panic carrying the same message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("tile ({x}, {y}) is already indexed")]
    DuplicateTile { x: i64, y: i64 },
    #[error("tile ({x}, {y}) appears more than once in the batch")]
    DuplicateInBatch { x: i64, y: i64 },
    #[error("tile handle {idx:?} is already indexed")]
    HandleInUse { idx: TileIdx },
    #[error("no tile at ({x}, {y})")]
    MissingTile { x: i64, y: i64 },
    #[error("edge {direction:?} of tile ({x}, {y}) has no matching reverse edge")]
    AsymmetricEdge {
        x: i64,
        y: i64,
        direction: Direction,
    },
}
