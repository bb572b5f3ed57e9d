//! Groth16 over BN254 with circom-compatible keys.
//!
//! Proving keys come from `.zkey` files; the witness arrives as a `wtns`
//! container produced by [`super::witness`]. Proofs travel as a small JSON
//! document whose `proof` field is the compressed arkworks encoding.

use super::witness::decode_wtns;
use crate::error::{ZkError, ZkResult};
use ark_bn254::{Bn254, Fr};
use ark_circom::{read_zkey, CircomReduction};
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey};
use ark_relations::r1cs::ConstraintMatrices;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

const PROTOCOL: &str = "groth16";
const CURVE: &str = "bn128";

/// Proving key and constraint system loaded from a circuit's `.zkey`.
pub struct CircuitKey {
    proving_key: ProvingKey<Bn254>,
    matrices: ConstraintMatrices<Fr>,
}

impl CircuitKey {
    pub fn from_zkey(bytes: &[u8]) -> ZkResult<Self> {
        let mut reader = Cursor::new(bytes);
        let (proving_key, matrices) =
            read_zkey(&mut reader).map_err(|e| ZkError::Prover(format!("invalid zkey: {}", e)))?;
        Ok(Self {
            proving_key,
            matrices,
        })
    }

    /// Number of public signals, excluding the constant `1` wire.
    pub fn public_inputs(&self) -> usize {
        self.matrices.num_instance_variables.saturating_sub(1)
    }

    pub fn prepare_verifying_key(&self) -> PreparedVerifyingKey<Bn254> {
        PreparedVerifyingKey::from(self.proving_key.vk.clone())
    }

    /// Prove a full wire assignment. Fresh randomness per call.
    pub fn prove(&self, assignment: &[Fr]) -> ZkResult<Proof<Bn254>> {
        let wires = self.matrices.num_instance_variables + self.matrices.num_witness_variables;
        if assignment.len() != wires {
            return Err(ZkError::Prover(format!(
                "witness has {} elements, circuit has {} wires",
                assignment.len(),
                wires
            )));
        }

        let mut rng = rand::thread_rng();
        let r = Fr::rand(&mut rng);
        let s = Fr::rand(&mut rng);

        Groth16::<Bn254, CircomReduction>::create_proof_with_reduction_and_matrices(
            &self.proving_key,
            r,
            s,
            &self.matrices,
            self.matrices.num_instance_variables,
            self.matrices.num_constraints,
            assignment,
        )
        .map_err(|e| ZkError::Prover(e.to_string()))
    }

    /// Prove and package the proof with the public wires that follow `1`.
    pub fn prove_payload(&self, assignment: &[Fr]) -> ZkResult<ProofPayload> {
        let proof = self.prove(assignment)?;
        let public = assignment.get(1..=self.public_inputs()).ok_or_else(|| {
            ZkError::Prover("witness is shorter than the public inputs".to_string())
        })?;
        ProofPayload::new(&proof, public)
    }
}

/// Decode a `wtns` file into BN254 scalars, rejecting any other field.
pub fn witness_to_assignment(wtns: &[u8]) -> ZkResult<Vec<Fr>> {
    let file = decode_wtns(wtns)?;
    if file.prime != Fr::MODULUS.to_bytes_le() {
        return Err(ZkError::Prover("witness is not over the BN254 scalar field".to_string()));
    }
    Ok(file.elements().map(Fr::from_le_bytes_mod_order).collect())
}

/// Public signal bits as field elements.
pub fn bits_to_scalars(bits: &[u8]) -> Vec<Fr> {
    bits.iter().map(|bit| Fr::from(u64::from(*bit))).collect()
}

pub fn verify(
    vk: &PreparedVerifyingKey<Bn254>,
    public_inputs: &[Fr],
    proof: &Proof<Bn254>,
) -> ZkResult<bool> {
    let expected = vk.vk.gamma_abc_g1.len().saturating_sub(1);
    if public_inputs.len() != expected {
        return Err(ZkError::Verification(format!(
            "circuit has {} public signals, got {}",
            expected,
            public_inputs.len()
        )));
    }
    Groth16::<Bn254>::verify_proof(vk, proof, public_inputs)
        .map_err(|e| ZkError::Verification(e.to_string()))
}

/// JSON proof document exchanged by the in-process backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPayload {
    pub protocol: String,
    pub curve: String,
    /// Base64 of the compressed proof points.
    pub proof: String,
    #[serde(rename = "publicSignals")]
    pub public_signals: Vec<String>,
}

impl ProofPayload {
    pub fn new(proof: &Proof<Bn254>, public_inputs: &[Fr]) -> ZkResult<Self> {
        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ZkError::Prover(format!("serializing proof: {}", e)))?;
        Ok(Self {
            protocol: PROTOCOL.to_string(),
            curve: CURVE.to_string(),
            proof: STANDARD.encode(bytes),
            public_signals: public_inputs.iter().map(|x| x.to_string()).collect(),
        })
    }

    pub fn to_json(&self) -> ZkResult<String> {
        serde_json::to_string(self).map_err(|e| ZkError::Prover(e.to_string()))
    }

    pub fn from_json(json: &str) -> ZkResult<Self> {
        let payload: Self = serde_json::from_str(json)
            .map_err(|e| ZkError::Verification(format!("malformed proof payload: {}", e)))?;
        if payload.protocol != PROTOCOL || payload.curve != CURVE {
            return Err(ZkError::Verification(format!(
                "unsupported proof system {}/{}",
                payload.protocol, payload.curve
            )));
        }
        Ok(payload)
    }

    pub fn proof(&self) -> ZkResult<Proof<Bn254>> {
        let bytes = STANDARD
            .decode(&self.proof)
            .map_err(|e| ZkError::Verification(format!("proof encoding: {}", e)))?;
        Proof::<Bn254>::deserialize_compressed(bytes.as_slice())
            .map_err(|e| ZkError::Verification(format!("proof points: {}", e)))
    }
}
