//! Reading the partial profiles of an unpacked tile.

use crate::core::tile::{Contribution, TileId, TileKind};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File names of the distance and index columns for each contribution.
pub fn file_names(contribution: Contribution) -> (&'static str, &'static str) {
    match contribution {
        Contribution::A => ("mpA", "mpiA"),
        Contribution::B => ("B_mp", "B_mpi"),
    }
}

/// A tile-local profile segment: distances and the tile-local neighbor indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSlice {
    pub distances: Vec<f64>,
    pub indices: Vec<usize>,
}

impl ProfileSlice {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// The unpacked contents of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileArtifact {
    pub tile: TileId,
    pub a: Option<ProfileSlice>,
    pub b: Option<ProfileSlice>,
}

impl TileArtifact {
    /// Load the contributions `kind` asks for from an unpacked tile directory.
    ///
    /// Files may sit at the top of `dir` or one directory down, which is how
    /// the tile workers pack them (`result_R_C/mpA`).
    pub fn load(dir: &Path, tile: TileId, kind: TileKind) -> Result<Self> {
        let a = if kind.has_a() {
            Some(load_slice(dir, tile, Contribution::A)?)
        } else {
            None
        };
        let b = if kind.has_b() {
            Some(load_slice(dir, tile, Contribution::B)?)
        } else {
            None
        };
        Ok(Self { tile, a, b })
    }
}

fn load_slice(dir: &Path, tile: TileId, contribution: Contribution) -> Result<ProfileSlice> {
    let (mp_name, mpi_name) = file_names(contribution);
    let distances = parse_column(&find_file(dir, tile, mp_name)?, tile, mp_name, parse_distance)?;
    let indices = parse_column(&find_file(dir, tile, mpi_name)?, tile, mpi_name, parse_index)?;

    if distances.len() != indices.len() {
        return Err(Error::Artifact {
            tile,
            file: mpi_name,
            reason: format!(
                "{} indices for {} distances in `{}`",
                indices.len(),
                distances.len(),
                mp_name
            ),
        });
    }
    Ok(ProfileSlice { distances, indices })
}

fn find_file(dir: &Path, tile: TileId, name: &'static str) -> Result<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == name)
        .map(|e| e.into_path())
        .ok_or_else(|| Error::Artifact {
            tile,
            file: name,
            reason: "file not found in archive".to_string(),
        })
}

fn parse_column<T>(
    path: &Path,
    tile: TileId,
    file: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| {
            parse(line).ok_or_else(|| Error::Artifact {
                tile,
                file,
                reason: format!("line {}: cannot parse `{}`", n + 1, line),
            })
        })
        .collect()
}

fn parse_distance(s: &str) -> Option<f64> {
    s.parse().ok()
}

/// Indices are written as integers, but writers that round-trip through
/// floating point emit `12.0` or `1.2e+01`; accept those when integral.
fn parse_index(s: &str) -> Option<usize> {
    if let Ok(i) = s.parse::<usize>() {
        return Some(i);
    }
    let f: f64 = s.parse().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then_some(f as usize)
}
