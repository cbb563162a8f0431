use crate::error::{Error, Operation, Result};
use crate::io::archive::Archive;
use crate::io::blob::BlobStore;
use crate::plan::FetchJob;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A tile that has been retrieved and unpacked, waiting to be merged.
///
/// Owns its scratch directory; dropping the value removes it.
#[derive(Debug)]
pub struct FetchedTile {
    pub job: FetchJob,
    scratch: TempDir,
    artifact_dir: PathBuf,
}

impl FetchedTile {
    pub fn new(job: FetchJob, scratch: TempDir, artifact_dir: PathBuf) -> Self {
        Self {
            job,
            scratch,
            artifact_dir,
        }
    }

    /// Directory holding the unpacked `mpA`/`mpiA`/`B_mp`/`B_mpi` files.
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Remove the scratch directory, reporting failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        self.scratch.close()
    }
}

/// One unit of fetch work. Implementations are called from many workers at once.
pub trait Fetch: Sync {
    fn fetch(&self, job: &FetchJob) -> Result<FetchedTile>;
}

/// Retrieves a tile archive from a blob store and unpacks it into a private
/// scratch directory.
pub struct TileFetcher<S: BlobStore, A: Archive> {
    store: S,
    archive: A,
    scratch_root: PathBuf,
    attempts: usize,
}

impl<S: BlobStore, A: Archive> TileFetcher<S, A> {
    pub fn new(store: S, archive: A, scratch_root: impl Into<PathBuf>, attempts: usize) -> Self {
        Self {
            store,
            archive,
            scratch_root: scratch_root.into(),
            attempts: attempts.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: BlobStore, A: Archive> Fetch for TileFetcher<S, A> {
    fn fetch(&self, job: &FetchJob) -> Result<FetchedTile> {
        let tile = job.tile;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("tile_{}_{}_", tile.row, tile.col))
            .tempdir_in(&self.scratch_root)?;

        let file_name = job.key.rsplit('/').next().unwrap_or(&job.key);
        let archive_path = scratch.path().join(file_name);
        retry(self.attempts, Operation::Fetch, job, || {
            self.store.fetch(&job.key, &archive_path)
        })?;

        let artifact_dir = scratch.path().join("unpacked");
        retry(self.attempts, Operation::Unpack, job, || {
            // Start every attempt from an empty directory
            if artifact_dir.exists() {
                fs::remove_dir_all(&artifact_dir)?;
            }
            fs::create_dir(&artifact_dir)?;
            self.archive.unpack(&archive_path, &artifact_dir)
        })?;

        if let Err(e) = fs::remove_file(&archive_path) {
            log::warn!("Could not remove archive {}: {}", archive_path.display(), e);
        }

        log::debug!("Fetched tile {} from `{}`", tile, job.key);
        Ok(FetchedTile::new(job.clone(), scratch, artifact_dir))
    }
}

/// Run `op` up to `attempts` times, returning the first success.
///
/// There is no backoff between attempts.
pub(crate) fn retry<T>(
    attempts: usize,
    operation: Operation,
    job: &FetchJob,
    mut op: impl FnMut() -> io::Result<T>,
) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "{} of tile {} failed (attempt {}/{}): {}; will retry",
                    operation,
                    job.tile,
                    attempt,
                    attempts,
                    e
                );
                attempt += 1;
            }
            Err(source) => {
                return Err(Error::RetriesExhausted {
                    operation,
                    tile: job.tile,
                    key: job.key.clone(),
                    attempts,
                    source,
                })
            }
        }
    }
}
