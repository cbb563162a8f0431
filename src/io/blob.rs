//! Blob-store access: listing tile archives and copying one to local disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use walkdir::WalkDir;

/// Capability to enumerate and retrieve tile archives.
///
/// Implementations are shared by all fetch workers and must be callable
/// concurrently.
pub trait BlobStore: Send + Sync {
    /// Keys of all objects under `prefix`, in a stable order.
    fn list(&self, prefix: &str) -> io::Result<Vec<String>>;

    /// Copy the object at `key` to the local file `dest`.
    fn fetch(&self, key: &str, dest: &Path) -> io::Result<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        (**self).list(prefix)
    }

    fn fetch(&self, key: &str, dest: &Path) -> io::Result<()> {
        (**self).fetch(key, dest)
    }
}

/// A blob store backed by a local directory tree.
///
/// Keys are `/`-separated paths relative to the root.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for LocalBlobStore {
    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let base = self.root.join(prefix);
        if !base.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&base).follow_links(true) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(io::Error::other)?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }

    fn fetch(&self, key: &str, dest: &Path) -> io::Result<()> {
        fs::copy(self.root.join(key), dest).map(|_| ())
    }
}

/// An S3 bucket accessed through the `aws` command-line client.
#[derive(Debug, Clone)]
pub struct S3CliBlobStore {
    bucket: String,
    program: String,
}

impl S3CliBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            program: "aws".to_string(),
        }
    }

    /// Use a different executable in place of `aws`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// Extract object keys from `aws s3 ls --recursive` output.
///
/// Each line is `<date> <time> <size> <key>`; keys may contain spaces.
pub fn parse_s3_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut rest = line.trim_start();
            // date, time, size
            for _ in 0..3 {
                let (_, tail) = rest.split_once(char::is_whitespace)?;
                rest = tail.trim_start();
            }
            (!rest.is_empty()).then(|| rest.to_string())
        })
        .collect()
}

impl BlobStore for S3CliBlobStore {
    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let output = Command::new(&self.program)
            .args(["s3", "ls", "--recursive", &self.url(prefix)])
            .stderr(Stdio::inherit())
            .output()?;
        // `aws s3 ls` exits 1 with no output when nothing matches the prefix
        let no_match = output.status.code() == Some(1) && output.stdout.is_empty();
        if !output.status.success() && !no_match {
            return Err(io::Error::other(format!(
                "`{} s3 ls` exited with {}",
                self.program, output.status
            )));
        }
        Ok(parse_s3_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn fetch(&self, key: &str, dest: &Path) -> io::Result<()> {
        let status = Command::new(&self.program)
            .args(["s3", "cp", "--only-show-errors", &self.url(key)])
            .arg(dest)
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "`{} s3 cp {}` exited with {}",
                self.program,
                self.url(key),
                status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_list_is_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("run/nested")).unwrap();
        fs::write(dir.path().join("run/result_0_1.tar"), b"x").unwrap();
        fs::write(dir.path().join("run/nested/result_0_0.tar"), b"x").unwrap();
        fs::write(dir.path().join("other.tar"), b"x").unwrap();

        let store = LocalBlobStore::new(dir.path());
        let keys = store.list("run").unwrap();
        assert_eq!(keys, vec!["run/nested/result_0_0.tar", "run/result_0_1.tar"]);
    }

    #[test]
    fn test_local_list_missing_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.list("nothing-here").unwrap().is_empty());
    }

    #[test]
    fn test_local_fetch_copies() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tar"), b"payload").unwrap();
        let store = LocalBlobStore::new(dir.path());

        let dest = dir.path().join("copy.tar");
        store.fetch("a.tar", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(store.fetch("missing.tar", &dest).is_err());
    }

    /// Write an executable shell script standing in for the `aws` client.
    #[cfg(unix)]
    fn fake_client(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("aws");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_s3_list_client_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = fake_client(
            dir.path(),
            "echo 'Unable to locate credentials' >&2\nexit 255",
        );
        let store = S3CliBlobStore::new("bucket").with_program(client.to_string_lossy());
        assert!(store.list("run").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_s3_list_no_match_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let client = fake_client(dir.path(), "exit 1");
        let store = S3CliBlobStore::new("bucket").with_program(client.to_string_lossy());
        assert!(store.list("run").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_s3_list_parses_client_output() {
        let dir = tempfile::tempdir().unwrap();
        let client = fake_client(
            dir.path(),
            "echo '2024-01-02 10:11:12    1024 run/result_0_0.tar.xz'",
        );
        let store = S3CliBlobStore::new("bucket").with_program(client.to_string_lossy());
        assert_eq!(store.list("run").unwrap(), vec!["run/result_0_0.tar.xz"]);
    }

    #[test]
    fn test_parse_s3_listing() {
        let out = "2024-01-02 10:11:12    1024 run/result_0_0.tar.xz\n\
                   2024-01-02 10:11:13     512 run/with space_0_1.tar.xz\n\
                   \n";
        assert_eq!(
            parse_s3_listing(out),
            vec!["run/result_0_0.tar.xz", "run/with space_0_1.tar.xz"]
        );
    }
}
