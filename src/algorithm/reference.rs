//! Reference cipher implementations.
//!
//! The circuits prove the keystream of the AEAD constructions the ciphers are
//! deployed in: ChaCha20-Poly1305 (payload keystream starts at block 1) and
//! AES-GCM with a 96-bit IV (payload keystream starts at block 2). Encryption
//! is the AEAD seal with the tag discarded.
//!
//! `ring` has no counter seek, so [`apply_keystream`] drives the raw stream
//! ciphers instead: ChaCha20 seeks to the block, and AES-CTR starts from the
//! counter block `iv ‖ counter` (big-endian, as GCM increments it).

use super::Cipher;
use crate::error::{ZkError, ZkResult};
use aes::{Aes128, Aes256};
use chacha20::ChaCha20;
use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, CHACHA20_POLY1305};

type Aes128Ctr32 = ctr::Ctr32BE<Aes128>;
type Aes256Ctr32 = ctr::Ctr32BE<Aes256>;

fn aead_algorithm(cipher: Cipher) -> &'static ring::aead::Algorithm {
    match cipher {
        Cipher::ChaCha20 => &CHACHA20_POLY1305,
        Cipher::Aes256Ctr => &AES_256_GCM,
        Cipher::Aes128Ctr => &AES_128_GCM,
    }
}

fn seal(cipher: Cipher, key: &[u8], iv: &[u8], buf: &mut [u8]) -> ZkResult<()> {
    let config = cipher.config();
    config.check_key(key)?;
    config.check_iv(iv)?;

    let unbound = UnboundKey::new(aead_algorithm(cipher), key)
        .map_err(|_| ZkError::InvalidInput(format!("{} rejected the key", cipher)))?;
    let key = LessSafeKey::new(unbound);
    let nonce = Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| ZkError::InvalidInput(format!("{} rejected the iv", cipher)))?;

    // Only the keystream is proved; the tag is not part of any public signal.
    let _tag = key
        .seal_in_place_separate_tag(nonce, Aad::empty(), buf)
        .map_err(|_| ZkError::InvalidInput(format!("{} input too long", cipher)))?;
    Ok(())
}

/// Encrypt `plaintext` from the first keystream block.
pub fn encrypt(cipher: Cipher, key: &[u8], iv: &[u8], plaintext: &[u8]) -> ZkResult<Vec<u8>> {
    let mut buf = plaintext.to_vec();
    seal(cipher, key, iv, &mut buf)?;
    Ok(buf)
}

/// XOR `data` with the keystream starting at block `counter`.
///
/// Encryption and decryption are the same operation. The whole of `data` must
/// fit below the 32-bit block counter limit.
pub fn apply_keystream(
    cipher: Cipher,
    key: &[u8],
    iv: &[u8],
    counter: u32,
    data: &[u8],
) -> ZkResult<Vec<u8>> {
    let config = cipher.config();
    config.check_key(key)?;
    config.check_iv(iv)?;
    if counter < config.start_counter {
        return Err(ZkError::InvalidInput(format!(
            "counter {} precedes the {} keystream start {}",
            counter, cipher, config.start_counter
        )));
    }
    let blocks = data.len().div_ceil(config.block_bytes) as u64;
    if u64::from(counter) + blocks.saturating_sub(1) > u64::from(u32::MAX) {
        return Err(ZkError::InvalidInput(format!(
            "{} bytes from counter {} run past the 32-bit block counter",
            data.len(),
            counter
        )));
    }

    let mut buf = data.to_vec();
    match cipher {
        Cipher::ChaCha20 => {
            let mut stream = ChaCha20::new_from_slices(key, iv)
                .map_err(|_| ZkError::InvalidInput(format!("{} rejected the key", cipher)))?;
            stream
                .try_seek(u64::from(counter) * config.block_bytes as u64)
                .map_err(|_| keystream_exhausted(cipher, counter))?;
            stream
                .try_apply_keystream(&mut buf)
                .map_err(|_| keystream_exhausted(cipher, counter))?;
        }
        Cipher::Aes256Ctr => counter_mode::<Aes256Ctr32>(cipher, key, iv, counter, &mut buf)?,
        Cipher::Aes128Ctr => counter_mode::<Aes128Ctr32>(cipher, key, iv, counter, &mut buf)?,
    }
    Ok(buf)
}

fn counter_mode<C: KeyIvInit + StreamCipher>(
    cipher: Cipher,
    key: &[u8],
    iv: &[u8],
    counter: u32,
    buf: &mut [u8],
) -> ZkResult<()> {
    let mut block = [0u8; 16];
    block[..12].copy_from_slice(iv);
    block[12..].copy_from_slice(&counter.to_be_bytes());
    let mut stream = C::new_from_slices(key, &block)
        .map_err(|_| ZkError::InvalidInput(format!("{} rejected the key", cipher)))?;
    stream
        .try_apply_keystream(buf)
        .map_err(|_| keystream_exhausted(cipher, counter))
}

fn keystream_exhausted(cipher: Cipher, counter: u32) -> ZkError {
    ZkError::InvalidInput(format!("{} keystream exhausted at counter {}", cipher, counter))
}
