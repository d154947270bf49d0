use std::io;
use std::path::Path;

use tempfile::TempDir;

/// A private working directory for one `save`. The compressor writes its
/// artifact here, and the whole directory goes away on `release` or drop,
/// whichever comes first.
pub(crate) struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub(crate) async fn create(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new()
            .prefix("s3-image-store-")
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the directory on the blocking pool and waits for it, so the
    /// artifact is gone by the time `save` returns.
    pub(crate) async fn release(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || self.dir.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(path = %path.display(), "failed to remove scratch directory: {err}");
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "scratch cleanup task aborted: {err}");
            }
        }
    }
}
