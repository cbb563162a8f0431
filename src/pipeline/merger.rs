use crate::config::MergeConfig;
use crate::core::profile::GlobalProfile;
use crate::core::tile::{Contribution, CoordinateOrigin, TileId};
use crate::error::{Error, Result};
use crate::io::artifact::{ProfileSlice, TileArtifact};
use crate::pipeline::fetcher::FetchedTile;
use std::collections::HashSet;

/// Counters for what the merger has folded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub tiles: usize,
    pub a_contributions: usize,
    pub b_contributions: usize,
    /// Positions whose stored minimum improved, summed over all contributions.
    pub improved: usize,
}

/// Folds fetched tiles into the global profile.
///
/// Sole owner of the `GlobalProfile` for the duration of a run.
pub struct TileMerger {
    tile_width: usize,
    tile_height: usize,
    self_join: bool,
    origin: CoordinateOrigin,
    profile: GlobalProfile,
    merged: HashSet<(TileId, Contribution)>,
    counts: MergeCounts,
}

impl TileMerger {
    pub fn new(config: &MergeConfig, origin: CoordinateOrigin, length: usize) -> Self {
        Self {
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            self_join: config.self_join,
            origin,
            profile: GlobalProfile::new(length),
            merged: HashSet::new(),
            counts: MergeCounts::default(),
        }
    }

    pub fn profile(&self) -> &GlobalProfile {
        &self.profile
    }

    pub fn counts(&self) -> MergeCounts {
        self.counts
    }

    pub fn into_profile(self) -> GlobalProfile {
        self.profile
    }

    /// Merge a fetched tile, then delete its scratch directory whatever the outcome.
    pub fn merge(&mut self, fetched: FetchedTile) -> Result<()> {
        let result = TileArtifact::load(fetched.artifact_dir(), fetched.job.tile, fetched.job.kind)
            .and_then(|artifact| self.merge_artifact(&artifact));

        let tile = fetched.job.tile;
        if let Err(e) = fetched.close() {
            log::warn!("Could not remove scratch data of tile {}: {}", tile, e);
        }
        result
    }

    /// Merge every contribution present in `artifact`.
    pub fn merge_artifact(&mut self, artifact: &TileArtifact) -> Result<()> {
        let tile = artifact.tile;
        if let Some(a) = &artifact.a {
            self.apply(tile, Contribution::A, a)?;
        }
        if let Some(b) = &artifact.b {
            if self.self_join && !tile.is_diagonal() {
                self.apply(tile, Contribution::B, b)?;
            } else {
                log::debug!("Ignoring B contribution of tile {}", tile);
            }
        }
        self.counts.tiles += 1;
        Ok(())
    }

    /// Fold one contribution of `tile` into the global profile.
    ///
    /// A is placed at the tile's columns with neighbor indices offset by its
    /// rows; B is the transpose. Returns the number of improved positions.
    /// A contribution already merged this run is skipped.
    pub fn apply(
        &mut self,
        tile: TileId,
        contribution: Contribution,
        slice: &ProfileSlice,
    ) -> Result<usize> {
        if self.merged.contains(&(tile, contribution)) {
            log::warn!("Contribution {} of tile {} already merged; skipping", contribution, tile);
            return Ok(0);
        }

        let row_offset = tile
            .row
            .checked_mul(self.tile_height)
            .ok_or(Error::TileOutOfRange { tile })?;
        let col_offset = tile
            .col
            .checked_mul(self.tile_width)
            .ok_or(Error::TileOutOfRange { tile })?;
        let (anchor, neighbor_base) = match contribution {
            Contribution::A => (
                col_offset.checked_sub(self.origin.true_start_col),
                row_offset.checked_sub(self.origin.true_start_row),
            ),
            Contribution::B => (
                row_offset.checked_sub(self.origin.true_start_row),
                col_offset.checked_sub(self.origin.true_start_col),
            ),
        };
        let (Some(start), Some(index_offset)) = (anchor, neighbor_base) else {
            return Err(Error::BeforeOrigin {
                tile,
                origin: self.origin,
            });
        };

        let end = start
            .checked_add(slice.len())
            .ok_or(Error::TileOutOfRange { tile })?;
        let max_local = slice.indices.iter().copied().max().unwrap_or(0);
        if index_offset.checked_add(max_local).is_none() {
            return Err(Error::TileOutOfRange { tile });
        }
        if end > self.profile.len() {
            return Err(Error::OutOfBounds {
                tile,
                contribution,
                start,
                end,
                length: self.profile.len(),
            });
        }

        let improved = self
            .profile
            .fold(start, &slice.distances, &slice.indices, index_offset);
        self.merged.insert((tile, contribution));
        match contribution {
            Contribution::A => self.counts.a_contributions += 1,
            Contribution::B => self.counts.b_contributions += 1,
        }
        self.counts.improved += improved;
        log::trace!(
            "Tile {} {}: [{}, {}) improved {} positions",
            tile,
            contribution,
            start,
            end,
            improved
        );
        Ok(improved)
    }
}
