//! The fetch → unpack → merge pipeline.

pub mod coordinator;
pub mod fetcher;
pub mod merger;

pub use coordinator::{PipelineCoordinator, PipelineStats};
pub use fetcher::{Fetch, FetchedTile, TileFetcher};
pub use merger::{MergeCounts, TileMerger};
