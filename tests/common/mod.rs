// Shared fixtures for integration tests.
//
// `TransparentOperator` stands in for a Groth16 backend: its "proof" carries
// the key in the clear and verification re-derives the plaintext with the
// reference cipher. It is sound enough to exercise everything the protocol
// layer does (padding, counters, bit layout, error mapping) without circuit
// artifacts.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use zk_symmetric::{
    algorithm, Cipher, Groth16Proof, ProvingBackend, Witness, WitnessInput, ZkError, ZkOperator,
    ZkResult,
};

#[derive(Serialize, Deserialize)]
struct TransparentClaim {
    key: Vec<u8>,
    nonce: Vec<u8>,
    counter: u32,
}

pub struct TransparentOperator {
    cipher: Cipher,
    backend: ProvingBackend,
    pub proofs: AtomicUsize,
    pub releases: AtomicUsize,
}

impl TransparentOperator {
    pub fn new(cipher: Cipher) -> Self {
        Self::with_backend(cipher, ProvingBackend::Vm)
    }

    pub fn with_backend(cipher: Cipher, backend: ProvingBackend) -> Self {
        Self {
            cipher,
            backend,
            proofs: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ZkOperator for TransparentOperator {
    fn backend(&self) -> ProvingBackend {
        self.backend
    }

    fn cipher(&self) -> Cipher {
        self.cipher
    }

    async fn generate_witness(&self, input: &WitnessInput) -> ZkResult<Witness> {
        let config = self.cipher.config();
        let claim = TransparentClaim {
            key: config.bits_to_bytes(&input.key).map_err(|e| ZkError::Witness(e.to_string()))?,
            nonce: config.bits_to_bytes(&input.nonce).map_err(|e| ZkError::Witness(e.to_string()))?,
            counter: config
                .deserialize_counter(&input.counter)
                .map_err(|e| ZkError::Witness(e.to_string()))?,
        };
        Ok(Witness::new(serde_json::to_vec(&claim).unwrap()))
    }

    async fn groth16_prove(&self, witness: Witness) -> ZkResult<Groth16Proof> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        let proof_json =
            String::from_utf8(witness.into_bytes()).map_err(|e| ZkError::Prover(e.to_string()))?;
        Ok(Groth16Proof { proof_json })
    }

    async fn groth16_verify(&self, public_signals: &[u8], proof: &Groth16Proof) -> ZkResult<bool> {
        let claim: TransparentClaim = serde_json::from_str(&proof.proof_json)
            .map_err(|e| ZkError::Verification(e.to_string()))?;

        let config = self.cipher.config();
        let chunk = config.chunk_bits();
        let nonce_bits = config.iv_bytes * 8;
        if public_signals.len() != 2 * chunk + nonce_bits + 32 {
            return Err(ZkError::Verification("unexpected public signal count".into()));
        }
        let (out, rest) = public_signals.split_at(chunk);
        let (nonce, rest) = rest.split_at(nonce_bits);
        let (counter, input) = rest.split_at(32);

        let nonce = config.bits_to_bytes(nonce)?;
        let counter = config.deserialize_counter(counter)?;
        if nonce != claim.nonce || counter != claim.counter {
            return Ok(false);
        }

        let ciphertext = config.bits_to_bytes(input)?;
        let expected =
            algorithm::apply_keystream(self.cipher, &claim.key, &nonce, counter, &ciphertext)?;
        Ok(config.bytes_to_bits(&expected)? == out)
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deterministic pseudo-random bytes.
pub fn test_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
