//! Proving operators.
//!
//! A [`ZkOperator`] is the capability set every proving backend exposes:
//! witness generation, Groth16 proving, Groth16 verification and release of
//! backend-held resources. The protocol layer only ever talks to this trait.
//!
//! Two backends implement it:
//! - [`vm::InProcessOperator`] executes the circuit's witness calculator in an
//!   embedded wasm VM and proves with arkworks.
//! - [`native::NativeOperator`] drives a natively compiled prover/verifier pair
//!   loaded at runtime across a C ABI.
//!
//! The backend is chosen when the operator is constructed, never per call.

pub mod memo;
pub mod native;
pub mod vm;

use crate::algorithm::Cipher;
use crate::error::ZkResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use native::{NativeOperator, NativeProver, NativeRuntime};
pub use vm::InProcessOperator;

/// Proving backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvingBackend {
    /// Embedded wasm witness calculator + arkworks Groth16.
    Vm,
    /// Runtime-loaded native prover/verifier libraries.
    Native,
}

impl ProvingBackend {
    pub const ALL: [ProvingBackend; 2] = [ProvingBackend::Vm, ProvingBackend::Native];

    /// Namespace under which the fetcher serves this backend's artifacts.
    pub fn name(self) -> &'static str {
        match self {
            ProvingBackend::Vm => "vm",
            ProvingBackend::Native => "native",
        }
    }
}

impl fmt::Display for ProvingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProvingBackend {
    type Err = crate::error::ZkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProvingBackend::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| crate::error::ZkError::Configuration(format!("unknown backend '{}'", s)))
    }
}

/// Per-chunk circuit inputs, already expanded to bits (one `u8` per bit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessInput {
    pub key: Vec<u8>,
    pub nonce: Vec<u8>,
    pub counter: Vec<u8>,
    /// Ciphertext chunk bits (circuit input `in`).
    pub input: Vec<u8>,
    /// Plaintext chunk bits (circuit output `out`).
    pub output: Vec<u8>,
}

/// Witness bytes. Produced once, consumed by exactly one `groth16_prove` call.
pub struct Witness(Vec<u8>);

impl Witness {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Witness bytes embed the private key; keep them out of logs.
impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Witness({} bytes)", self.0.len())
    }
}

/// Backend-specific serialized Groth16 proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub proof_json: String,
}

/// Uniform proving contract implemented by every backend.
#[async_trait]
pub trait ZkOperator: Send + Sync {
    fn backend(&self) -> ProvingBackend;

    fn cipher(&self) -> Cipher;

    /// Compute the witness for one chunk.
    ///
    /// Fails with [`crate::ZkError::Witness`] on malformed input shapes.
    async fn generate_witness(&self, input: &WitnessInput) -> ZkResult<Witness>;

    /// Prove from a witness, consuming it.
    ///
    /// Proofs may be randomized: equal witnesses need not yield equal bytes.
    async fn groth16_prove(&self, witness: Witness) -> ZkResult<Groth16Proof>;

    /// Check `proof` against the public signal bits.
    ///
    /// Returns `Ok(false)` for a well-formed proof that does not verify and
    /// fails with [`crate::ZkError::Verification`] for a malformed payload.
    async fn groth16_verify(&self, public_signals: &[u8], proof: &Groth16Proof) -> ZkResult<bool>;

    /// Drop cached artifacts and algorithm state. Safe to call repeatedly;
    /// later calls re-acquire lazily. Must not race in-flight proving.
    fn release(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(ProvingBackend::Vm.to_string(), "vm");
        assert_eq!("native".parse::<ProvingBackend>().unwrap(), ProvingBackend::Native);
        assert!("snark".parse::<ProvingBackend>().is_err());
        assert_eq!(serde_json::to_string(&ProvingBackend::Vm).unwrap(), "\"vm\"");
    }

    #[test]
    fn test_witness_debug_hides_contents() {
        let witness = Witness::new(vec![0xAA; 12]);
        assert_eq!(format!("{:?}", witness), "Witness(12 bytes)");
        assert_eq!(witness.len(), 12);
        assert_eq!(witness.into_bytes(), vec![0xAA; 12]);
    }
}
