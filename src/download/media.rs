//! Destination for downloaded audio.

use std::io;
use std::path::{Path, PathBuf};

/// A flat collection of media files addressed by name.
///
/// Implemented by whatever owns the user's media folder. Writes happen on
/// the caller's context after all downloads have been joined.
pub trait MediaLibrary: Send + Sync {
    /// True when a file with this name is already present.
    fn has(&self, file_name: &str) -> impl Future<Output = bool> + Send;

    /// Stores `data` under `file_name`, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the file can't be written.
    fn write(&self, file_name: &str, data: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Where a file with this name is (or would be) stored. Used in error reports.
    fn path_of(&self, file_name: &str) -> PathBuf;
}

/// Media library backed by a plain directory.
#[derive(Debug, Clone)]
pub struct MediaDirectory {
    root: PathBuf,
}

impl MediaDirectory {
    /// Opens `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory can't be created.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MediaLibrary for MediaDirectory {
    async fn has(&self, file_name: &str) -> bool {
        tokio::fs::metadata(self.path_of(file_name))
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    async fn write(&self, file_name: &str, data: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.path_of(file_name), data).await
    }

    fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}
