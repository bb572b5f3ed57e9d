//! Chunk-level proof protocol.
//!
//! A proof covers one chunk of a ciphertext: it shows that the revealed
//! plaintext is the decryption of that chunk under a key the prover does not
//! disclose. The chunk is located by its index in the keystream (`offset`),
//! from which both sides derive the block counter.
//!
//! Public signals are laid out as `out ‖ nonce ‖ counter ‖ in`, all in bits.

use crate::algorithm::Cipher;
use crate::error::{ZkError, ZkResult};
use crate::operator::{ProvingBackend, Witness, WitnessInput, ZkOperator};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The prover's secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateInput {
    pub key: Vec<u8>,
}

impl PrivateInput {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }
}

impl fmt::Debug for PrivateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateInput")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// What both prover and verifier know about the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInput {
    /// At most one chunk; shorter input is zero-padded.
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    /// Chunk index within the keystream.
    pub offset: u32,
}

/// A proof bundle, ready to hand to a verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    pub cipher: Cipher,
    pub backend: ProvingBackend,
    pub proof_json: String,
    /// Revealed plaintext, exactly one chunk long.
    pub plaintext: Vec<u8>,
}

/// Output of [`generate_witness`].
#[derive(Debug)]
pub struct ChunkWitness {
    pub witness: Witness,
    pub plaintext: Vec<u8>,
}

/// Zero-pad `ciphertext` to one chunk.
pub fn padded_chunk(cipher: Cipher, ciphertext: &[u8]) -> ZkResult<Vec<u8>> {
    let chunk_bytes = cipher.config().chunk_bytes();
    if ciphertext.len() > chunk_bytes {
        return Err(ZkError::InvalidInput(format!(
            "ciphertext is {} bytes, a {} chunk holds {}",
            ciphertext.len(),
            cipher,
            chunk_bytes
        )));
    }
    let mut chunk = ciphertext.to_vec();
    chunk.resize(chunk_bytes, 0);
    Ok(chunk)
}

/// Public signal bits for a chunk: `out ‖ nonce ‖ counter ‖ in`.
pub fn public_signals(cipher: Cipher, public: &PublicInput, plaintext: &[u8]) -> ZkResult<Vec<u8>> {
    let config = cipher.config();
    config.check_iv(&public.iv)?;
    let ciphertext = padded_chunk(cipher, &public.ciphertext)?;
    if plaintext.len() != ciphertext.len() {
        return Err(ZkError::InvalidInput(format!(
            "plaintext is {} bytes, expected {}",
            plaintext.len(),
            ciphertext.len()
        )));
    }
    let counter = config.counter_for_chunk(public.offset)?;

    let mut signals = config.bytes_to_bits(plaintext)?;
    signals.extend(config.bytes_to_bits(&public.iv)?);
    signals.extend(config.serialize_counter(counter)?);
    signals.extend(config.bytes_to_bits(&ciphertext)?);
    Ok(signals)
}

fn check_operator(cipher: Cipher, operator: &dyn ZkOperator) -> ZkResult<()> {
    if operator.cipher() != cipher {
        return Err(ZkError::InvalidInput(format!(
            "operator proves {}, not {}",
            operator.cipher(),
            cipher
        )));
    }
    Ok(())
}

/// Decrypt the chunk and compute the circuit witness.
pub async fn generate_witness(
    cipher: Cipher,
    private: &PrivateInput,
    public: &PublicInput,
    operator: &dyn ZkOperator,
) -> ZkResult<ChunkWitness> {
    check_operator(cipher, operator)?;
    let config = cipher.config();
    config.check_key(&private.key)?;
    config.check_iv(&public.iv)?;

    let ciphertext = padded_chunk(cipher, &public.ciphertext)?;
    let counter = config.counter_for_chunk(public.offset)?;
    let plaintext =
        crate::algorithm::apply_keystream(cipher, &private.key, &public.iv, counter, &ciphertext)?;

    let input = WitnessInput {
        key: config.bytes_to_bits(&private.key)?,
        nonce: config.bytes_to_bits(&public.iv)?,
        counter: config.serialize_counter(counter)?,
        input: config.bytes_to_bits(&ciphertext)?,
        output: config.bytes_to_bits(&plaintext)?,
    };

    tracing::debug!(
        %cipher,
        backend = %operator.backend(),
        offset = public.offset,
        counter,
        "generating witness"
    );
    let witness = operator.generate_witness(&input).await?;
    Ok(ChunkWitness { witness, plaintext })
}

/// Produce a proof that `public.ciphertext` decrypts to the returned plaintext.
pub async fn generate_proof(
    cipher: Cipher,
    private: &PrivateInput,
    public: &PublicInput,
    operator: &dyn ZkOperator,
) -> ZkResult<ZkProof> {
    let ChunkWitness { witness, plaintext } =
        generate_witness(cipher, private, public, operator).await?;
    let proof = operator.groth16_prove(witness).await?;

    tracing::info!(
        %cipher,
        backend = %operator.backend(),
        offset = public.offset,
        proof_bytes = proof.proof_json.len(),
        "chunk proof generated"
    );
    Ok(ZkProof {
        cipher,
        backend: operator.backend(),
        proof_json: proof.proof_json,
        plaintext,
    })
}

/// Check `proof` against the public chunk description.
///
/// Fails with [`ZkError::InvalidProof`] when the proof does not verify.
pub async fn verify_proof(
    proof: &ZkProof,
    public: &PublicInput,
    operator: &dyn ZkOperator,
) -> ZkResult<()> {
    check_operator(proof.cipher, operator)?;
    if operator.backend() != proof.backend {
        return Err(ZkError::InvalidInput(format!(
            "proof was made by the {} backend, verifier uses {}",
            proof.backend,
            operator.backend()
        )));
    }

    let signals = public_signals(proof.cipher, public, &proof.plaintext)?;
    let groth16 = crate::operator::Groth16Proof {
        proof_json: proof.proof_json.clone(),
    };
    if !operator.groth16_verify(&signals, &groth16).await? {
        tracing::debug!(cipher = %proof.cipher, offset = public.offset, "proof rejected");
        return Err(ZkError::InvalidProof);
    }
    tracing::debug!(cipher = %proof.cipher, offset = public.offset, "proof verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chacha_public(ciphertext: Vec<u8>) -> PublicInput {
        PublicInput {
            ciphertext,
            iv: (0u8..12).collect(),
            offset: 0,
        }
    }

    #[test]
    fn test_padding() {
        let chunk = padded_chunk(Cipher::Aes128Ctr, &[1, 2, 3]).unwrap();
        assert_eq!(chunk.len(), 64);
        assert_eq!(&chunk[..3], &[1, 2, 3]);
        assert!(chunk[3..].iter().all(|b| *b == 0));

        let err = padded_chunk(Cipher::ChaCha20, &[0; 65]).unwrap_err();
        assert!(matches!(err, ZkError::InvalidInput(_)));
    }

    #[test]
    fn test_public_signal_layout() {
        let public = chacha_public(vec![0xFF; 10]);
        let plaintext = vec![0x01; 64];
        let signals = public_signals(Cipher::ChaCha20, &public, &plaintext).unwrap();

        assert_eq!(signals.len(), 512 + 96 + 32 + 512);
        let config = Cipher::ChaCha20.config();
        assert_eq!(config.bits_to_bytes(&signals[..512]).unwrap(), plaintext);
        assert_eq!(config.bits_to_bytes(&signals[512..608]).unwrap(), public.iv);
        assert_eq!(config.deserialize_counter(&signals[608..640]).unwrap(), 1);
        let ciphertext = config.bits_to_bytes(&signals[640..]).unwrap();
        assert_eq!(&ciphertext[..10], &[0xFF; 10]);
        assert!(ciphertext[10..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_public_signals_reject_bad_plaintext_length() {
        let public = chacha_public(vec![0xFF; 10]);
        let err = public_signals(Cipher::ChaCha20, &public, &[0; 10]).unwrap_err();
        assert!(matches!(err, ZkError::InvalidInput(_)));
    }

    #[test]
    fn test_private_input_debug_is_redacted() {
        let private = PrivateInput::new(vec![0x42; 32]);
        let printed = format!("{:?}", private);
        assert!(!printed.contains("66"));
        assert!(printed.contains("redacted"));
    }
}
