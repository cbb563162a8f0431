//! Persisting the merged profile.

use crate::core::profile::GlobalProfile;
use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const PROFILE_FILE: &str = "full_matrix_profile.txt";
pub const INDEX_FILE: &str = "full_matrix_profile_index.txt";

/// Destination for the final profile once the run has completed.
pub trait ResultSink {
    fn write(&self, profile: &GlobalProfile) -> Result<()>;
}

/// Writes the profile and index as newline-delimited text files.
#[derive(Debug, Clone)]
pub struct TextFileSink {
    dir: PathBuf,
}

impl TextFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }
}

fn write_lines<T: std::fmt::Display>(path: &Path, values: &[T]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(w, "{v}")?;
    }
    w.flush()?;
    Ok(())
}

impl ResultSink for TextFileSink {
    fn write(&self, profile: &GlobalProfile) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_lines(&self.profile_path(), &profile.profile)?;
        write_lines(&self.index_path(), &profile.profile_index)?;
        log::info!(
            "Wrote {} positions to {} and {}",
            profile.len(),
            self.profile_path().display(),
            self.index_path().display()
        );
        Ok(())
    }
}
