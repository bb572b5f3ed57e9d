//! Artifact retrieval.
//!
//! Proving keys, circuit descriptions and witness-calculator modules are
//! addressed as `{backend}/{artifact}` (e.g. `native/pk.aes256`,
//! `vm/chacha20/circuit.wasm`). Operators only see the [`ArtifactFetcher`]
//! trait; whether bytes come from disk, HTTP, or memory is invisible to them.

mod local;
mod remote;

pub use local::{LocalFileFetcher, DEFAULT_BASE_PATH};
pub use remote::RemoteFileFetcher;

use crate::error::{ZkError, ZkResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Supplies proving/verification artifacts as raw bytes.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch `artifact` for `backend`.
    ///
    /// Fails with [`ZkError::ArtifactUnavailable`] on any transport or storage error.
    async fn fetch(&self, backend: &str, artifact: &str) -> ZkResult<Vec<u8>>;
}

pub(crate) fn unavailable(backend: &str, artifact: &str, reason: impl ToString) -> ZkError {
    ZkError::ArtifactUnavailable {
        backend: backend.to_string(),
        artifact: artifact.to_string(),
        reason: reason.to_string(),
    }
}

/// In-memory fetcher, for embedded artifacts and tests.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    artifacts: RwLock<HashMap<(String, String), Arc<Vec<u8>>>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `{backend}/{artifact}`.
    pub fn insert(&self, backend: &str, artifact: &str, bytes: Vec<u8>) {
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((backend.to_string(), artifact.to_string()), Arc::new(bytes));
    }

    pub fn with(self, backend: &str, artifact: &str, bytes: Vec<u8>) -> Self {
        self.insert(backend, artifact, bytes);
        self
    }
}

#[async_trait]
impl ArtifactFetcher for StaticFetcher {
    async fn fetch(&self, backend: &str, artifact: &str) -> ZkResult<Vec<u8>> {
        let artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
        artifacts
            .get(&(backend.to_string(), artifact.to_string()))
            .map(|bytes| bytes.as_ref().clone())
            .ok_or_else(|| unavailable(backend, artifact, "not registered"))
    }
}
