//! Scoped working directory for one upload-to-download cycle.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch space owning extracted pages and the subordinate output
/// directory. Removed on drop; call [`Workdir::keep`] to retain it for
/// download instead.
#[derive(Debug)]
pub struct Workdir {
    dir: TempDir,
}

impl Workdir {
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("receipts_").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "Working directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Shared output directory; repeated conversions against the same
    /// working directory accumulate here.
    pub fn outputs_dir(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    /// Where the downloadable bundle is written.
    pub fn bundle_path(&self) -> PathBuf {
        self.dir.path().join("outputs.zip")
    }

    /// Give up automatic teardown and return the directory path. The
    /// caller becomes responsible for removal.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let workdir = Workdir::create().unwrap();
        let path = workdir.path().to_path_buf();
        assert!(path.exists());

        drop(workdir);
        assert!(!path.exists());
    }

    #[test]
    fn keep_retains_the_directory() {
        let workdir = Workdir::create().unwrap();
        let path = workdir.keep();
        assert!(path.exists());

        std::fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn outputs_and_bundle_live_under_workdir() {
        let workdir = Workdir::create().unwrap();
        assert!(workdir.outputs_dir().starts_with(workdir.path()));
        assert!(workdir.bundle_path().starts_with(workdir.path()));
    }
}
