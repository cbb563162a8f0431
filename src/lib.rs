pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod plan;

pub use crate::config::MergeConfig;
pub use crate::core::profile::GlobalProfile;
pub use crate::core::tile::{Contribution, CoordinateOrigin, ParseTileIdError, TileId, TileKind};
pub use crate::error::{Error, Result};
pub use crate::io::archive::{Archive, TarArchive};
pub use crate::io::artifact::{ProfileSlice, TileArtifact};
pub use crate::io::blob::{BlobStore, LocalBlobStore, S3CliBlobStore};
pub use crate::io::sink::{ResultSink, TextFileSink};
pub use crate::pipeline::{PipelineCoordinator, PipelineStats, TileFetcher, TileMerger};
pub use crate::plan::{plan_merge, FetchJob, MergePlan};

use serde::Serialize;
use std::path::Path;

/// Summary of a completed merge run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub tiles_planned: usize,
    pub tiles_merged: usize,
    pub a_contributions: usize,
    pub b_contributions: usize,
    /// Positions whose minimum improved, summed over all contributions.
    pub improved_positions: usize,
    pub length: usize,
    pub origin: CoordinateOrigin,
    /// Positions no tile covered (still `+inf`).
    pub uncovered: usize,
    pub peak_unmerged: usize,
}

impl RunSummary {
    /// Write the summary as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Final profile of a run together with its summary.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub profile: GlobalProfile,
    pub summary: RunSummary,
}

/// High-level facade: list tiles, plan, fetch and merge in one call.
///
/// # Examples
///
/// ```no_run
/// use mp_tiles::{LocalBlobStore, MergeConfig, TarArchive, TileMergeEngine};
///
/// let config = MergeConfig::new(1000, 1000, 4000, true);
/// let engine = TileMergeEngine::new(config, LocalBlobStore::new("/data/tiles"), TarArchive)?;
/// if let Some(outcome) = engine.run("run-42", None)? {
///     assert_eq!(outcome.profile.len(), 4000);
/// }
/// # Ok::<(), mp_tiles::Error>(())
/// ```
pub struct TileMergeEngine<S: BlobStore, A: Archive> {
    config: MergeConfig,
    fetcher: TileFetcher<S, A>,
}

impl<S: BlobStore, A: Archive> TileMergeEngine<S, A> {
    /// Create a new engine; fails if the configuration is invalid.
    pub fn new(config: MergeConfig, store: S, archive: A) -> Result<Self> {
        config.validate()?;
        let fetcher = TileFetcher::new(
            store,
            archive,
            config.scratch_dir.clone(),
            config.fetch_attempts,
        );
        Ok(Self { config, fetcher })
    }

    /// Merge the tiles stored under `prefix`.
    ///
    /// With `requested`, only those tiles are merged and the result covers
    /// their bounding box. Returns `None` when the listing is empty.
    pub fn run(&self, prefix: &str, requested: Option<&[TileId]>) -> Result<Option<MergeOutcome>> {
        let listing = self.fetcher.store().list(prefix)?;
        if listing.is_empty() {
            log::info!("No tiles found under `{}`", prefix);
            return Ok(None);
        }
        log::info!("Found {} tiles under `{}`", listing.len(), prefix);

        let plan = plan_merge(&listing, requested, &self.config)?;
        let tiles_planned = plan.jobs.len();
        let mut merger = TileMerger::new(&self.config, plan.origin, plan.length);
        let stats = PipelineCoordinator::new(
            &self.fetcher,
            self.config.workers,
            self.config.queue_capacity,
        )
        .run(plan.jobs, &mut merger)?;

        let counts = merger.counts();
        let profile = merger.into_profile();
        let summary = RunSummary {
            tiles_planned,
            tiles_merged: stats.merged,
            a_contributions: counts.a_contributions,
            b_contributions: counts.b_contributions,
            improved_positions: counts.improved,
            length: profile.len(),
            origin: plan.origin,
            uncovered: profile.uncovered(),
            peak_unmerged: stats.peak_unmerged,
        };
        if summary.uncovered > 0 {
            log::warn!("{} of {} positions were not covered by any tile", summary.uncovered, summary.length);
        }
        Ok(Some(MergeOutcome { profile, summary }))
    }
}
