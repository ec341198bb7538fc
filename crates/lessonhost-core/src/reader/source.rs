//! Where the reader gets artifact bytes from.

use std::io;
use std::path::Path;

use async_trait::async_trait;

/// File access used by [`super::ArtifactReader`].
///
/// The real implementation is [`FsArtifactSource`]; tests substitute sources
/// that report contention or corrupt content on cue.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Current size of the file at `path`.
    async fn probe(&self, path: &Path) -> io::Result<u64>;

    /// Entire content of the file at `path`.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Delete the file at `path`.
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ArtifactSource) {}
};

/// Reads artifacts from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactSource;

#[async_trait]
impl ArtifactSource for FsArtifactSource {
    async fn probe(&self, path: &Path) -> io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_source_probes_reads_and_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.json");
        std::fs::write(&path, b"{}").unwrap();

        let source = FsArtifactSource;
        assert_eq!(source.probe(&path).await.unwrap(), 2);
        assert_eq!(source.read(&path).await.unwrap(), b"{}");
        source.remove(&path).await.unwrap();
        assert_eq!(
            source.probe(&path).await.unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
