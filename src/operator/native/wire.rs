//! JSON messages exchanged with the native libraries. Binary fields are
//! standard Base64.

use crate::algorithm::Cipher;
use crate::error::{ZkError, ZkResult};
use crate::operator::WitnessInput;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProveRequest {
    pub cipher: Cipher,
    pub key: String,
    pub nonce: String,
    pub counter: u32,
    pub input: String,
}

impl ProveRequest {
    /// Pack circuit inputs. Shapes are checked against the cipher; a mismatch
    /// is a witness error.
    pub fn from_witness_input(cipher: Cipher, input: &WitnessInput) -> ZkResult<Self> {
        let config = cipher.config();
        for (name, bits, expected) in [
            ("key", &input.key, config.key_bytes * 8),
            ("nonce", &input.nonce, config.iv_bytes * 8),
            ("counter", &input.counter, 32),
            ("in", &input.input, config.chunk_bits()),
        ] {
            if bits.len() != expected {
                return Err(ZkError::Witness(format!(
                    "{} input must be {} bits, got {}",
                    name,
                    expected,
                    bits.len()
                )));
            }
        }

        let pack = |bits: &[u8]| {
            config
                .bits_to_bytes(bits)
                .map_err(|e| ZkError::Witness(e.to_string()))
        };
        let counter = config
            .deserialize_counter(&input.counter)
            .map_err(|e| ZkError::Witness(e.to_string()))?;

        Ok(Self {
            cipher,
            key: STANDARD.encode(pack(&input.key)?),
            nonce: STANDARD.encode(pack(&input.nonce)?),
            counter,
            input: STANDARD.encode(pack(&input.input)?),
        })
    }

    pub fn to_bytes(&self) -> ZkResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ZkError::Witness(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProveResponse {
    #[serde(rename = "proofJson")]
    pub proof_json: String,
}

impl ProveResponse {
    pub fn decode(bytes: &[u8]) -> ZkResult<Self> {
        let response: Self = serde_json::from_slice(bytes)
            .map_err(|e| ZkError::Prover(format!("malformed prover output: {}", e)))?;
        if response.proof_json.is_empty() {
            return Err(ZkError::Prover("prover returned an empty proof".to_string()));
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub cipher: Cipher,
    pub proof: String,
    /// Base64 of the packed public signal bits.
    #[serde(rename = "publicSignals")]
    pub public_signals: String,
}

impl VerifyRequest {
    pub fn new(cipher: Cipher, proof: &str, public_signals: &[u8]) -> ZkResult<Self> {
        if proof.is_empty() {
            return Err(ZkError::Verification("empty proof".to_string()));
        }
        let packed = cipher
            .config()
            .bits_to_bytes(public_signals)
            .map_err(|e| ZkError::Verification(format!("public signals: {}", e)))?;
        Ok(Self {
            cipher,
            proof: proof.to_string(),
            public_signals: STANDARD.encode(packed),
        })
    }

    pub fn to_bytes(&self) -> ZkResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ZkError::Verification(e.to_string()))
    }
}
