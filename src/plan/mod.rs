//! Tile selection and coordinate mapping.
//!
//! Turns a blob listing (and optionally an explicit subset of tiles) into the
//! list of archives to fetch, what each must contribute, and where the merged
//! range starts in global index space.

use crate::config::MergeConfig;
use crate::core::tile::{CoordinateOrigin, TileId, TileKind};
use crate::error::{Error, Result};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// One archive to retrieve and the contributions it must supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub tile: TileId,
    /// Storage key as returned by the blob listing.
    pub key: String,
    pub kind: TileKind,
}

/// Everything the pipeline needs to start a merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub jobs: Vec<FetchJob>,
    pub origin: CoordinateOrigin,
    /// Length of the global profile.
    pub length: usize,
}

/// Index a blob listing by tile. Every key must decode.
pub fn index_listing(listing: &[String]) -> Result<BTreeMap<TileId, String>> {
    let mut tiles = BTreeMap::new();
    for key in listing {
        let tile = TileId::from_key(key)?;
        match tiles.entry(tile) {
            Entry::Vacant(e) => {
                e.insert(key.clone());
            }
            Entry::Occupied(e) => {
                log::warn!(
                    "Tile {} listed twice (`{}` and `{}`); using the first",
                    tile,
                    e.get(),
                    key
                );
            }
        }
    }
    Ok(tiles)
}

/// Build the fetch plan for a merge run.
///
/// Without `requested`, every listed tile is merged: in a self-join,
/// off-diagonal tiles supply both their A and B contributions from one fetch.
/// With `requested`, only those tiles are merged; in a self-join a lower
/// triangular tile `(r, c)` is served by the B contribution of `(c, r)`, so
/// no lower triangular archive is ever fetched.
pub fn plan_merge(
    listing: &[String],
    requested: Option<&[TileId]>,
    config: &MergeConfig,
) -> Result<MergePlan> {
    let keys = index_listing(listing)?;
    let mut needed: BTreeMap<TileId, TileKind> = BTreeMap::new();
    let mut add = |tile: TileId, kind: TileKind| {
        needed
            .entry(tile)
            .and_modify(|k| *k = k.union(kind))
            .or_insert(kind);
    };

    match requested {
        None => {
            for &tile in keys.keys() {
                if !config.self_join || tile.is_diagonal() {
                    add(tile, TileKind::A);
                } else if tile.is_lower() {
                    log::debug!("Tile {} is lower triangular; merging its mirror instead", tile);
                    add(tile.transposed(), TileKind::B);
                } else {
                    add(tile, TileKind::Both);
                }
            }
        }
        Some(tiles) => {
            for &tile in tiles {
                if config.self_join && tile.is_lower() {
                    add(tile.transposed(), TileKind::B);
                } else {
                    add(tile, TileKind::A);
                }
            }
        }
    }

    let (origin, length) = match requested {
        None => (CoordinateOrigin::default(), config.matrix_profile_length),
        Some(_) => bounding_box(&needed, config)?,
    };

    let jobs = needed
        .into_iter()
        .map(|(tile, kind)| {
            let key = keys.get(&tile).ok_or(Error::MissingTile { tile })?;
            Ok(FetchJob {
                tile,
                key: key.clone(),
                kind,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!(
        "Planned {} tiles, origin ({}, {}), length {}",
        jobs.len(),
        origin.true_start_row,
        origin.true_start_col,
        length
    );

    Ok(MergePlan {
        jobs,
        origin,
        length,
    })
}

/// Origin and global length covering the A contributions of a subset merge.
///
/// With no A contribution at all the origin stays at zero and the full
/// requested length is used.
fn bounding_box(
    needed: &BTreeMap<TileId, TileKind>,
    config: &MergeConfig,
) -> Result<(CoordinateOrigin, usize)> {
    let mut bounds: Option<(usize, usize, usize)> = None;
    for (&tile, kind) in needed {
        if !kind.has_a() {
            continue;
        }
        let (row_start, col_start, col_end) =
            tile_extent(tile, config).ok_or(Error::TileOutOfRange { tile })?;
        bounds = Some(match bounds {
            None => (row_start, col_start, col_end),
            Some((min_row, min_col, max_col)) => (
                min_row.min(row_start),
                min_col.min(col_start),
                max_col.max(col_end),
            ),
        });
    }

    Ok(match bounds {
        Some((true_start_row, true_start_col, col_end)) => (
            CoordinateOrigin {
                true_start_row,
                true_start_col,
            },
            col_end - true_start_col,
        ),
        None => (CoordinateOrigin::default(), config.matrix_profile_length),
    })
}

/// First row, first column and one-past-last column of `tile` in element
/// units, or `None` if they do not fit in a `usize`.
fn tile_extent(tile: TileId, config: &MergeConfig) -> Option<(usize, usize, usize)> {
    let row_start = tile.row.checked_mul(config.tile_height)?;
    let col_start = tile.col.checked_mul(config.tile_width)?;
    let col_end = col_start.checked_add(config.tile_width)?;
    Some((row_start, col_start, col_end))
}
