use crate::core::tile::{Contribution, CoordinateOrigin, ParseTileIdError, TileId};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The retried external step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Unpack,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Fetch => f.write_str("fetch"),
            Operation::Unpack => f.write_str("unpack"),
        }
    }
}

/// Every error aborts the merge run; none of them is skipped per tile.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseTileIdError),

    #[error("{operation} of tile {tile} (`{key}`) failed after {attempts} attempts")]
    RetriesExhausted {
        operation: Operation,
        tile: TileId,
        key: String,
        attempts: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("tile {tile} is required but not present in the listing")]
    MissingTile { tile: TileId },

    #[error("malformed `{file}` in tile {tile}: {reason}")]
    Artifact {
        tile: TileId,
        file: &'static str,
        reason: String,
    },

    #[error(
        "contribution {contribution} of tile {tile} covers [{start}, {end}) \
         but the global profile has length {length}"
    )]
    OutOfBounds {
        tile: TileId,
        contribution: Contribution,
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("tile {tile} lies beyond the addressable index range")]
    TileOutOfRange { tile: TileId },

    #[error("tile {tile} lies before the coordinate origin {origin:?}")]
    BeforeOrigin {
        tile: TileId,
        origin: CoordinateOrigin,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not build the fetch worker pool: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
