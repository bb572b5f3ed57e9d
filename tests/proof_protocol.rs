// Integration tests for the chunk proof protocol
//
// These tests verify:
// - Proofs over a partial ChaCha20 chunk reveal the right plaintext and verify
// - Block-cipher chunks are addressed by offset, and a wrong offset is rejected
// - Tampered plaintext or ciphertext fails with InvalidProof
// - Bad key/iv/ciphertext sizes fail with InvalidInput before any proving
// - Cipher and backend mismatches between proof and verifier are rejected

mod common;

use common::{test_bytes, TransparentOperator};
use std::sync::atomic::Ordering;
use zk_symmetric::algorithm::encrypt;
use zk_symmetric::{
    generate_proof, generate_witness, verify_proof, Cipher, PrivateInput, ProvingBackend,
    PublicInput, ZkError, INVALID_PROOF_MESSAGE,
};

#[tokio::test]
async fn test_chacha20_partial_chunk() {
    let cipher = Cipher::ChaCha20;
    let operator = TransparentOperator::new(cipher);
    let key = vec![2u8; 32];
    let iv: Vec<u8> = (0u8..12).collect();
    let plaintext = test_bytes(45, 7);
    let ciphertext = encrypt(cipher, &key, &iv, &plaintext).unwrap();

    let private = PrivateInput::new(key);
    let public = PublicInput {
        ciphertext,
        iv,
        offset: 0,
    };

    let proof = generate_proof(cipher, &private, &public, &operator).await.unwrap();
    assert_eq!(proof.cipher, cipher);
    assert_eq!(proof.backend, ProvingBackend::Vm);
    assert_eq!(proof.plaintext.len(), 64);
    assert_eq!(&proof.plaintext[..45], plaintext.as_slice());
    assert_eq!(operator.proofs.load(Ordering::SeqCst), 1);

    verify_proof(&proof, &public, &operator).await.unwrap();
}

#[tokio::test]
async fn test_aes256_chunk_offsets() {
    let cipher = Cipher::Aes256Ctr;
    let operator = TransparentOperator::new(cipher);
    let key = vec![2u8; 32];
    let iv = vec![3u8; 12];
    let plaintext = test_bytes(5 * 64, 1);
    let ciphertext = encrypt(cipher, &key, &iv, &plaintext).unwrap();

    let private = PrivateInput::new(key);
    let public = PublicInput {
        ciphertext: ciphertext[128..192].to_vec(),
        iv: iv.clone(),
        offset: 2,
    };

    let proof = generate_proof(cipher, &private, &public, &operator).await.unwrap();
    assert_eq!(proof.plaintext, &plaintext[128..192]);
    verify_proof(&proof, &public, &operator).await.unwrap();

    let shifted = PublicInput {
        offset: 3,
        ..public.clone()
    };
    let err = verify_proof(&proof, &shifted, &operator).await.unwrap_err();
    assert_eq!(err, ZkError::InvalidProof);
    assert_eq!(err.to_string(), INVALID_PROOF_MESSAGE);
}

#[tokio::test]
async fn test_every_aes128_chunk_proves() {
    let cipher = Cipher::Aes128Ctr;
    let operator = TransparentOperator::new(cipher);
    let key = test_bytes(16, 5);
    let iv = test_bytes(12, 40);
    let plaintext = test_bytes(4 * 64, 3);
    let ciphertext = encrypt(cipher, &key, &iv, &plaintext).unwrap();
    let private = PrivateInput::new(key);

    for (offset, chunk) in ciphertext.chunks(64).enumerate() {
        let public = PublicInput {
            ciphertext: chunk.to_vec(),
            iv: iv.clone(),
            offset: offset as u32,
        };
        let proof = generate_proof(cipher, &private, &public, &operator).await.unwrap();
        assert_eq!(proof.plaintext, &plaintext[offset * 64..(offset + 1) * 64]);
        verify_proof(&proof, &public, &operator).await.unwrap();
    }
}

#[tokio::test]
async fn test_tampering_is_invalid_proof() {
    let cipher = Cipher::ChaCha20;
    let operator = TransparentOperator::new(cipher);
    let private = PrivateInput::new(vec![2u8; 32]);
    let public = PublicInput {
        ciphertext: test_bytes(64, 11),
        iv: vec![0u8; 12],
        offset: 4,
    };
    let proof = generate_proof(cipher, &private, &public, &operator).await.unwrap();

    let mut zeroed = proof.clone();
    zeroed.plaintext = vec![0u8; 64];
    assert_eq!(
        verify_proof(&zeroed, &public, &operator).await,
        Err(ZkError::InvalidProof)
    );

    let mut other_ciphertext = public.clone();
    other_ciphertext.ciphertext[0] ^= 1;
    assert_eq!(
        verify_proof(&proof, &other_ciphertext, &operator).await,
        Err(ZkError::InvalidProof)
    );

    let mut other_iv = public.clone();
    other_iv.iv[11] = 9;
    assert_eq!(
        verify_proof(&proof, &other_iv, &operator).await,
        Err(ZkError::InvalidProof)
    );
}

#[tokio::test]
async fn test_size_checks_precede_proving() {
    let cipher = Cipher::Aes128Ctr;
    let operator = TransparentOperator::new(cipher);
    let public = PublicInput {
        ciphertext: vec![1u8; 64],
        iv: vec![0u8; 12],
        offset: 0,
    };

    let long_key = PrivateInput::new(vec![0u8; 32]);
    let err = generate_proof(cipher, &long_key, &public, &operator).await.unwrap_err();
    assert!(matches!(err, ZkError::InvalidInput(_)));

    let key = PrivateInput::new(vec![0u8; 16]);
    let short_iv = PublicInput {
        iv: vec![0u8; 8],
        ..public.clone()
    };
    let err = generate_witness(cipher, &key, &short_iv, &operator).await.unwrap_err();
    assert!(matches!(err, ZkError::InvalidInput(_)));

    let oversized = PublicInput {
        ciphertext: vec![1u8; 65],
        ..public.clone()
    };
    let err = generate_proof(cipher, &key, &oversized, &operator).await.unwrap_err();
    assert!(matches!(err, ZkError::InvalidInput(_)));

    let far = PublicInput {
        offset: u32::MAX,
        ..public
    };
    let err = generate_proof(cipher, &key, &far, &operator).await.unwrap_err();
    assert!(matches!(err, ZkError::InvalidInput(_)));

    assert_eq!(operator.proofs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_verifier_must_match_proof() {
    let private = PrivateInput::new(vec![7u8; 32]);
    let public = PublicInput {
        ciphertext: vec![0xAA; 64],
        iv: vec![1u8; 12],
        offset: 1,
    };
    let chacha = TransparentOperator::new(Cipher::ChaCha20);
    let proof = generate_proof(Cipher::ChaCha20, &private, &public, &chacha).await.unwrap();

    let aes = TransparentOperator::new(Cipher::Aes256Ctr);
    assert!(matches!(
        verify_proof(&proof, &public, &aes).await,
        Err(ZkError::InvalidInput(_))
    ));

    let native = TransparentOperator::with_backend(Cipher::ChaCha20, ProvingBackend::Native);
    assert!(matches!(
        verify_proof(&proof, &public, &native).await,
        Err(ZkError::InvalidInput(_))
    ));

    // Proving with an operator for another cipher is refused up front.
    assert!(matches!(
        generate_proof(Cipher::ChaCha20, &private, &public, &aes).await,
        Err(ZkError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_short_plaintext_is_invalid_input() {
    let cipher = Cipher::ChaCha20;
    let operator = TransparentOperator::new(cipher);
    let private = PrivateInput::new(vec![2u8; 32]);
    let public = PublicInput {
        ciphertext: vec![5u8; 20],
        iv: vec![0u8; 12],
        offset: 0,
    };
    let mut proof = generate_proof(cipher, &private, &public, &operator).await.unwrap();
    proof.plaintext.truncate(20);

    assert!(matches!(
        verify_proof(&proof, &public, &operator).await,
        Err(ZkError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_malformed_proof_is_verification_error() {
    let cipher = Cipher::ChaCha20;
    let operator = TransparentOperator::new(cipher);
    let private = PrivateInput::new(vec![2u8; 32]);
    let public = PublicInput {
        ciphertext: vec![5u8; 64],
        iv: vec![0u8; 12],
        offset: 0,
    };
    let mut proof = generate_proof(cipher, &private, &public, &operator).await.unwrap();
    proof.proof_json = "{".to_string();

    assert!(matches!(
        verify_proof(&proof, &public, &operator).await,
        Err(ZkError::Verification(_))
    ));
}

#[test]
fn test_proof_bundle_serializes() {
    let proof = zk_symmetric::ZkProof {
        cipher: Cipher::Aes128Ctr,
        backend: ProvingBackend::Native,
        proof_json: "{}".to_string(),
        plaintext: vec![1, 2, 3],
    };
    let json = serde_json::to_value(&proof).unwrap();
    assert_eq!(json["cipher"], "aes-128-ctr");
    assert_eq!(json["backend"], "native");
    let back: zk_symmetric::ZkProof = serde_json::from_value(json).unwrap();
    assert_eq!(back, proof);
}
