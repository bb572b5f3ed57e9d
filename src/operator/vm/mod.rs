//! In-process backend: wasm witness calculator + arkworks Groth16.
//!
//! Artifacts live under the `vm` namespace, one directory per cipher:
//!
//! ```text
//! vm/chacha20/circuit.wasm
//! vm/chacha20/circuit_final.zkey
//! ```
//!
//! Both are fetched lazily on first use and cached until [`release`].
//! Witness calculation and proving are CPU-bound and run on the blocking pool.
//!
//! [`release`]: crate::operator::ZkOperator::release

pub mod groth16;
pub mod witness;

use self::groth16::{CircuitKey, ProofPayload};
use self::witness::{CircuitVm, DEFAULT_WITNESS_MEMORY_PAGES};
use super::memo::{FailurePolicy, Memo};
use super::{Groth16Proof, ProvingBackend, Witness, WitnessInput, ZkOperator};
use crate::algorithm::Cipher;
use crate::error::ZkResult;
use crate::fetch::ArtifactFetcher;
use ark_bn254::Bn254;
use ark_groth16::PreparedVerifyingKey;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const CIRCUIT_FILE: &str = "circuit.wasm";
const ZKEY_FILE: &str = "circuit_final.zkey";

pub fn circuit_artifact(cipher: Cipher) -> String {
    format!("{}/{}", cipher.name(), CIRCUIT_FILE)
}

pub fn zkey_artifact(cipher: Cipher) -> String {
    format!("{}/{}", cipher.name(), ZKEY_FILE)
}

async fn fetch_logged(fetcher: &dyn ArtifactFetcher, artifact: &str) -> ZkResult<Vec<u8>> {
    let bytes = fetcher.fetch(ProvingBackend::Vm.name(), artifact).await?;
    let digest = Sha256::digest(&bytes);
    tracing::debug!(
        artifact,
        size = bytes.len(),
        sha256 = %hex::encode(&digest[..8]),
        "fetched artifact"
    );
    Ok(bytes)
}

pub struct InProcessOperator {
    cipher: Cipher,
    fetcher: Arc<dyn ArtifactFetcher>,
    memory_pages: u32,
    circuit: Memo<Arc<CircuitVm>>,
    key: Arc<Memo<Arc<CircuitKey>>>,
    verifying_key: Memo<Arc<PreparedVerifyingKey<Bn254>>>,
}

impl InProcessOperator {
    pub fn new(cipher: Cipher, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            cipher,
            fetcher,
            memory_pages: DEFAULT_WITNESS_MEMORY_PAGES,
            circuit: Memo::new(FailurePolicy::Retry),
            key: Arc::new(Memo::new(FailurePolicy::Retry)),
            verifying_key: Memo::new(FailurePolicy::Retry),
        }
    }

    /// Linear memory for the witness calculator, in 64 KiB pages.
    pub fn with_memory_pages(mut self, pages: u32) -> Self {
        self.memory_pages = pages;
        self
    }

    async fn circuit(&self) -> ZkResult<Arc<CircuitVm>> {
        let fetcher = Arc::clone(&self.fetcher);
        let artifact = circuit_artifact(self.cipher);
        let pages = self.memory_pages;
        self.circuit
            .get_or_init(move || async move {
                let bytecode = fetch_logged(fetcher.as_ref(), &artifact).await?;
                let vm = tokio::task::spawn_blocking(move || CircuitVm::compile(&bytecode, pages))
                    .await??;
                tracing::debug!(%artifact, memory_pages = pages, "compiled witness calculator");
                Ok(Arc::new(vm))
            })
            .await
    }

    async fn circuit_key(&self) -> ZkResult<Arc<CircuitKey>> {
        load_key(&self.key, Arc::clone(&self.fetcher), self.cipher).await
    }

    async fn verifying_key(&self) -> ZkResult<Arc<PreparedVerifyingKey<Bn254>>> {
        // The closure holds the key memo, not `self`.
        let key = Arc::clone(&self.key);
        let fetcher = Arc::clone(&self.fetcher);
        let cipher = self.cipher;
        self.verifying_key
            .get_or_init(move || async move {
                let key = load_key(&key, fetcher, cipher).await?;
                Ok(Arc::new(key.prepare_verifying_key()))
            })
            .await
    }
}

async fn load_key(
    memo: &Memo<Arc<CircuitKey>>,
    fetcher: Arc<dyn ArtifactFetcher>,
    cipher: Cipher,
) -> ZkResult<Arc<CircuitKey>> {
    memo.get_or_init(move || async move {
        let zkey = fetch_logged(fetcher.as_ref(), &zkey_artifact(cipher)).await?;
        let key = tokio::task::spawn_blocking(move || CircuitKey::from_zkey(&zkey)).await??;
        tracing::info!(%cipher, public_signals = key.public_inputs(), "loaded proving key");
        Ok(Arc::new(key))
    })
    .await
}

#[async_trait]
impl ZkOperator for InProcessOperator {
    fn backend(&self) -> ProvingBackend {
        ProvingBackend::Vm
    }

    fn cipher(&self) -> Cipher {
        self.cipher
    }

    async fn generate_witness(&self, input: &WitnessInput) -> ZkResult<Witness> {
        let vm = self.circuit().await?;
        let input = input.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            vm.calculate(&[
                ("key", input.key.as_slice()),
                ("nonce", input.nonce.as_slice()),
                ("counter", input.counter.as_slice()),
                ("in", input.input.as_slice()),
            ])
        })
        .await??;
        Ok(Witness::new(bytes))
    }

    async fn groth16_prove(&self, witness: Witness) -> ZkResult<Groth16Proof> {
        let key = self.circuit_key().await?;
        let wtns = witness.into_bytes();
        let proof_json = tokio::task::spawn_blocking(move || {
            let assignment = groth16::witness_to_assignment(&wtns)?;
            key.prove_payload(&assignment)?.to_json()
        })
        .await??;
        Ok(Groth16Proof { proof_json })
    }

    async fn groth16_verify(&self, public_signals: &[u8], proof: &Groth16Proof) -> ZkResult<bool> {
        let payload = ProofPayload::from_json(&proof.proof_json)?;
        let proof = payload.proof()?;
        let inputs = groth16::bits_to_scalars(public_signals);
        let vk = self.verifying_key().await?;
        tokio::task::spawn_blocking(move || groth16::verify(&vk, &inputs, &proof)).await?
    }

    fn release(&self) {
        self.circuit.reset();
        self.key.reset();
        self.verifying_key.reset();
        tracing::debug!(cipher = %self.cipher, "released in-process artifacts");
    }
}
