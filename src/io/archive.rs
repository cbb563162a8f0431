//! Unpacking of tile archives.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use xz2::read::XzDecoder;

/// Capability to expand a fetched archive into a directory.
pub trait Archive: Send + Sync {
    fn unpack(&self, archive: &Path, dest: &Path) -> io::Result<()>;
}

impl<T: Archive + ?Sized> Archive for &T {
    fn unpack(&self, archive: &Path, dest: &Path) -> io::Result<()> {
        (**self).unpack(archive, dest)
    }
}

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
}

impl Compression {
    /// Guess the compression from the file name.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".xz") || name.ends_with(".txz") {
            Compression::Xz
        } else if name.ends_with(".gz") || name.ends_with(".tgz") {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// Tar archives, optionally xz- or gzip-compressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchive;

impl Archive for TarArchive {
    fn unpack(&self, archive: &Path, dest: &Path) -> io::Result<()> {
        let file = BufReader::new(File::open(archive)?);
        let reader: Box<dyn Read> = match Compression::from_path(archive) {
            Compression::Xz => Box::new(XzDecoder::new(file)),
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::None => Box::new(file),
        };
        tar::Archive::new(reader).unpack(dest)
    }
}
