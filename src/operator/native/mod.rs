//! Native backend: a precompiled prover/verifier pair loaded at runtime.
//!
//! The libraries are loaded at most once per process ([`NativeRuntime`]);
//! a load failure is terminal for the process and callers should fall back
//! to the in-process backend (see [`crate::ZkError::is_platform_failure`]).
//!
//! Each cipher must additionally be initialised with its proving key and
//! constraint system (`native/pk.<ext>`, `native/r1cs.<ext>`) before it can
//! prove. Concurrent first use triggers exactly one initialisation; a failed
//! initialisation is reported to every waiter and retried by the next call.

pub mod ffi;
pub mod wire;

use self::ffi::NativeLibrary;
use self::wire::{ProveRequest, ProveResponse, VerifyRequest};
use super::memo::{FailurePolicy, Memo};
use super::{Groth16Proof, ProvingBackend, Witness, WitnessInput, ZkOperator};
use crate::algorithm::Cipher;
use crate::error::ZkResult;
use crate::fetch::ArtifactFetcher;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Default directory holding the native libraries.
pub const DEFAULT_LIBRARY_DIR: &str = "bin/native";

/// Blocking entry points of the native libraries.
///
/// Implemented by [`NativeLibrary`]; tests substitute their own.
pub trait NativeProver: Send + Sync {
    fn init_algorithm(&self, cipher: Cipher, proving_key: &[u8], circuit: &[u8]) -> ZkResult<()>;

    /// Returns the raw prover output (a JSON document).
    fn prove(&self, request: &[u8]) -> ZkResult<Vec<u8>>;

    fn verify(&self, request: &[u8]) -> ZkResult<bool>;
}

pub fn proving_key_artifact(cipher: Cipher) -> String {
    format!("pk.{}", cipher.config().native_ext)
}

pub fn circuit_artifact(cipher: Cipher) -> String {
    format!("r1cs.{}", cipher.config().native_ext)
}

enum LibrarySource {
    Directory(PathBuf),
    Provided(Arc<dyn NativeProver>),
}

/// Process-wide native library state, shared by every [`NativeOperator`].
pub struct NativeRuntime {
    source: LibrarySource,
    library: Memo<Arc<dyn NativeProver>>,
    algorithms: [Memo<()>; 3],
}

impl NativeRuntime {
    /// Runtime that loads the libraries from `library_dir` on first use.
    pub fn new(library_dir: impl Into<PathBuf>) -> Arc<Self> {
        Self::with_source(LibrarySource::Directory(library_dir.into()))
    }

    /// Runtime backed by an already-available prover.
    pub fn with_prover(prover: Arc<dyn NativeProver>) -> Arc<Self> {
        Self::with_source(LibrarySource::Provided(prover))
    }

    fn with_source(source: LibrarySource) -> Arc<Self> {
        Arc::new(Self {
            source,
            library: Memo::new(FailurePolicy::Sticky),
            algorithms: std::array::from_fn(|_| Memo::new(FailurePolicy::Retry)),
        })
    }

    /// Load the libraries, once. A failure sticks for the runtime's lifetime.
    pub async fn library(&self) -> ZkResult<Arc<dyn NativeProver>> {
        let source = match &self.source {
            LibrarySource::Provided(prover) => return Ok(Arc::clone(prover)),
            LibrarySource::Directory(dir) => dir.clone(),
        };
        self.library
            .get_or_init(move || async move {
                let loaded =
                    tokio::task::spawn_blocking(move || NativeLibrary::load(&source)).await?;
                match loaded {
                    Ok(library) => Ok(Arc::new(library) as Arc<dyn NativeProver>),
                    Err(e) => {
                        tracing::warn!(error = %e, "native prover unavailable");
                        Err(e)
                    }
                }
            })
            .await
    }

    /// Make sure `cipher` is initialised, fetching its artifacts if needed.
    pub async fn ensure_algorithm(
        &self,
        cipher: Cipher,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> ZkResult<Arc<dyn NativeProver>> {
        let prover = self.library().await?;
        let init_prover = Arc::clone(&prover);
        self.algorithms[usize::from(cipher.index())]
            .get_or_init(move || async move {
                let backend = ProvingBackend::Native.name();
                let pk_name = proving_key_artifact(cipher);
                let r1cs_name = circuit_artifact(cipher);
                let (proving_key, circuit) = tokio::try_join!(
                    fetcher.fetch(backend, &pk_name),
                    fetcher.fetch(backend, &r1cs_name),
                )?;
                tracing::debug!(
                    %cipher,
                    pk_bytes = proving_key.len(),
                    r1cs_bytes = circuit.len(),
                    "initialising native algorithm"
                );
                tokio::task::spawn_blocking(move || {
                    init_prover.init_algorithm(cipher, &proving_key, &circuit)
                })
                .await??;
                tracing::info!(%cipher, "native algorithm ready");
                Ok(())
            })
            .await?;
        Ok(prover)
    }

    pub fn is_ready(&self, cipher: Cipher) -> bool {
        self.algorithms[usize::from(cipher.index())].peek().is_some()
    }

    /// Forget `cipher`'s initialisation. The libraries stay loaded.
    pub fn release_algorithm(&self, cipher: Cipher) {
        self.algorithms[usize::from(cipher.index())].reset();
    }
}

pub struct NativeOperator {
    cipher: Cipher,
    fetcher: Arc<dyn ArtifactFetcher>,
    runtime: Arc<NativeRuntime>,
}

impl NativeOperator {
    pub fn new(
        cipher: Cipher,
        fetcher: Arc<dyn ArtifactFetcher>,
        runtime: Arc<NativeRuntime>,
    ) -> Self {
        Self {
            cipher,
            fetcher,
            runtime,
        }
    }

    async fn prover(&self) -> ZkResult<Arc<dyn NativeProver>> {
        self.runtime
            .ensure_algorithm(self.cipher, Arc::clone(&self.fetcher))
            .await
    }
}

#[async_trait]
impl ZkOperator for NativeOperator {
    fn backend(&self) -> ProvingBackend {
        ProvingBackend::Native
    }

    fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// The native prover computes its own witness; this only packs the request.
    async fn generate_witness(&self, input: &WitnessInput) -> ZkResult<Witness> {
        let request = ProveRequest::from_witness_input(self.cipher, input)?;
        Ok(Witness::new(request.to_bytes()?))
    }

    async fn groth16_prove(&self, witness: Witness) -> ZkResult<Groth16Proof> {
        let prover = self.prover().await?;
        let request = witness.into_bytes();
        let output = tokio::task::spawn_blocking(move || prover.prove(&request)).await??;
        let response = ProveResponse::decode(&output)?;
        Ok(Groth16Proof {
            proof_json: response.proof_json,
        })
    }

    async fn groth16_verify(&self, public_signals: &[u8], proof: &Groth16Proof) -> ZkResult<bool> {
        let request =
            VerifyRequest::new(self.cipher, &proof.proof_json, public_signals)?.to_bytes()?;
        let prover = self.prover().await?;
        tokio::task::spawn_blocking(move || prover.verify(&request)).await?
    }

    fn release(&self) {
        self.runtime.release_algorithm(self.cipher);
        tracing::debug!(cipher = %self.cipher, "released native algorithm");
    }
}
