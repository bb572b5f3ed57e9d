//! zk-symmetric - zero-knowledge proofs of symmetric decryption
//!
//! Proves that a ciphertext chunk decrypts to a revealed plaintext under a
//! key that stays private. Supported ciphers are ChaCha20, AES-256-CTR and
//! AES-128-CTR; proofs are Groth16 over BN254.
//!
//! Two interchangeable proving backends sit behind [`ZkOperator`]:
//! - `vm`: the circuit's wasm witness calculator run in-process, proved
//!   with arkworks.
//! - `native`: precompiled prover/verifier libraries loaded at runtime.
//!
//! ```no_run
//! use zk_symmetric::{Cipher, ProvingBackend, ZkConfig, PrivateInput, PublicInput};
//!
//! # async fn run() -> zk_symmetric::ZkResult<()> {
//! let context = ZkConfig::default().context()?;
//! let operator = context.operator(ProvingBackend::Vm, Cipher::ChaCha20);
//!
//! let private = PrivateInput::new(vec![0u8; 32]);
//! let public = PublicInput { ciphertext: vec![0u8; 64], iv: vec![0u8; 12], offset: 0 };
//! let proof =
//!     zk_symmetric::generate_proof(Cipher::ChaCha20, &private, &public, operator.as_ref()).await?;
//! zk_symmetric::verify_proof(&proof, &public, operator.as_ref()).await?;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod operator;
pub mod protocol;

pub use algorithm::{AlgorithmConfig, Cipher, Endianness};
pub use config::{init_tracing, ZkConfig};
pub use context::ProverContext;
pub use error::{ZkError, ZkResult, INVALID_PROOF_MESSAGE};
pub use fetch::{ArtifactFetcher, LocalFileFetcher, RemoteFileFetcher, StaticFetcher};
pub use operator::{
    Groth16Proof, InProcessOperator, NativeOperator, NativeProver, NativeRuntime, ProvingBackend,
    Witness, WitnessInput, ZkOperator,
};
pub use protocol::{
    generate_proof, generate_witness, public_signals, verify_proof, ChunkWitness, PrivateInput,
    PublicInput, ZkProof,
};
