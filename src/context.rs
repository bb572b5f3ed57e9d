//! Process-scoped proving state.
//!
//! Native libraries can be loaded only once per process, so the runtime that
//! owns them lives here and is shared by every operator built from the same
//! context. Build one context at startup and hand out operators from it.

use crate::algorithm::Cipher;
use crate::fetch::ArtifactFetcher;
use crate::operator::native::{NativeOperator, NativeRuntime};
use crate::operator::vm::witness::DEFAULT_WITNESS_MEMORY_PAGES;
use crate::operator::vm::InProcessOperator;
use crate::operator::{ProvingBackend, ZkOperator};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProverContext {
    fetcher: Arc<dyn ArtifactFetcher>,
    native: Arc<NativeRuntime>,
    witness_memory_pages: u32,
}

impl ProverContext {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>, native: Arc<NativeRuntime>) -> Self {
        Self {
            fetcher,
            native,
            witness_memory_pages: DEFAULT_WITNESS_MEMORY_PAGES,
        }
    }

    pub fn with_witness_memory_pages(mut self, pages: u32) -> Self {
        self.witness_memory_pages = pages;
        self
    }

    pub fn fetcher(&self) -> &Arc<dyn ArtifactFetcher> {
        &self.fetcher
    }

    pub fn native_runtime(&self) -> &Arc<NativeRuntime> {
        &self.native
    }

    /// An operator for `cipher` on `backend`.
    pub fn operator(&self, backend: ProvingBackend, cipher: Cipher) -> Arc<dyn ZkOperator> {
        match backend {
            ProvingBackend::Vm => Arc::new(
                InProcessOperator::new(cipher, Arc::clone(&self.fetcher))
                    .with_memory_pages(self.witness_memory_pages),
            ),
            ProvingBackend::Native => Arc::new(NativeOperator::new(
                cipher,
                Arc::clone(&self.fetcher),
                Arc::clone(&self.native),
            )),
        }
    }
}
