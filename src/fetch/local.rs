//! Filesystem artifact fetcher.

use super::{unavailable, ArtifactFetcher};
use crate::error::ZkResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Default artifact root, relative to the working directory.
pub const DEFAULT_BASE_PATH: &str = "resources";

/// Reads `{base_path}/{backend}/{artifact}` from disk.
#[derive(Debug, Clone)]
pub struct LocalFileFetcher {
    base_path: PathBuf,
}

impl LocalFileFetcher {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, backend: &str, artifact: &str) -> PathBuf {
        self.base_path.join(backend).join(artifact)
    }
}

impl Default for LocalFileFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PATH)
    }
}

#[async_trait]
impl ArtifactFetcher for LocalFileFetcher {
    async fn fetch(&self, backend: &str, artifact: &str) -> ZkResult<Vec<u8>> {
        let path = self.resolve(backend, artifact);
        tracing::debug!(path = %path.display(), "reading artifact");

        tokio::fs::read(&path)
            .await
            .map_err(|e| unavailable(backend, artifact, format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZkError;

    #[tokio::test]
    async fn test_reads_backend_scoped_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vm/chacha20")).unwrap();
        std::fs::write(dir.path().join("vm/chacha20/circuit.wasm"), b"\0asm").unwrap();

        let fetcher = LocalFileFetcher::new(dir.path());
        let bytes = fetcher.fetch("vm", "chacha20/circuit.wasm").await.unwrap();
        assert_eq!(bytes, b"\0asm");
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFileFetcher::new(dir.path());

        match fetcher.fetch("native", "pk.chacha20").await {
            Err(ZkError::ArtifactUnavailable {
                backend, artifact, ..
            }) => {
                assert_eq!(backend, "native");
                assert_eq!(artifact, "pk.chacha20");
            }
            other => panic!("expected ArtifactUnavailable, got {:?}", other),
        }
    }
}
