//! Algorithm registry for the supported symmetric ciphers.
//!
//! Every cipher maps to a static [`AlgorithmConfig`] describing how one proof
//! chunk is sized, how bytes are expanded into the bit sequences the circuits
//! consume, and where the reference keystream starts.
//!
//! ## Registry
//!
//! | cipher        | index | words x bits | key | iv | start counter | blocks/chunk | endianness |
//! |---------------|-------|--------------|-----|----|---------------|--------------|------------|
//! | `chacha20`    | 0     | 16 x 32      | 32  | 12 | 1             | 1            | little     |
//! | `aes-256-ctr` | 1     | 64 x 8       | 32  | 12 | 2             | 4            | big        |
//! | `aes-128-ctr` | 2     | 64 x 8       | 16  | 12 | 2             | 4            | big        |
//!
//! The index is baked into the native library's dispatch table; adding a
//! cipher needs a coordinated index on both sides.

pub mod codec;
pub mod reference;

#[cfg(test)]
mod proptests;

use crate::error::{ZkError, ZkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use codec::{bits_to_bytes, bytes_to_bits};
pub use reference::{apply_keystream, encrypt};

/// A supported symmetric cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cipher {
    #[serde(rename = "chacha20")]
    ChaCha20,
    #[serde(rename = "aes-256-ctr")]
    Aes256Ctr,
    #[serde(rename = "aes-128-ctr")]
    Aes128Ctr,
}

/// Bit ordering used when a byte buffer is expanded for the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Bytes are read as little-endian words (ChaCha20 circuit).
    Little,
    /// Bytes are read in order (AES circuits).
    Big,
}

/// Static per-cipher configuration.
#[derive(Debug)]
pub struct AlgorithmConfig {
    pub cipher: Cipher,
    /// Index in the native library's dispatch table.
    pub index: u8,
    pub name: &'static str,
    /// Number of circuit words in one chunk.
    pub chunk_words: usize,
    /// Width of one circuit word.
    pub word_bits: usize,
    pub key_bytes: usize,
    pub iv_bytes: usize,
    /// First block counter of the reference cipher's keystream.
    pub start_counter: u32,
    pub blocks_per_chunk: u32,
    pub block_bytes: usize,
    pub endianness: Endianness,
    /// Filename extension of the native backend's artifacts.
    pub native_ext: &'static str,
}

static CHACHA20: AlgorithmConfig = AlgorithmConfig {
    cipher: Cipher::ChaCha20,
    index: 0,
    name: "chacha20",
    chunk_words: 16,
    word_bits: 32,
    key_bytes: 32,
    iv_bytes: 12,
    start_counter: 1,
    blocks_per_chunk: 1,
    block_bytes: 64,
    endianness: Endianness::Little,
    native_ext: "chacha20",
};

static AES_256_CTR: AlgorithmConfig = AlgorithmConfig {
    cipher: Cipher::Aes256Ctr,
    index: 1,
    name: "aes-256-ctr",
    chunk_words: 64,
    word_bits: 8,
    key_bytes: 32,
    iv_bytes: 12,
    start_counter: 2,
    blocks_per_chunk: 4,
    block_bytes: 16,
    endianness: Endianness::Big,
    native_ext: "aes256",
};

static AES_128_CTR: AlgorithmConfig = AlgorithmConfig {
    cipher: Cipher::Aes128Ctr,
    index: 2,
    name: "aes-128-ctr",
    chunk_words: 64,
    word_bits: 8,
    key_bytes: 16,
    iv_bytes: 12,
    start_counter: 2,
    blocks_per_chunk: 4,
    block_bytes: 16,
    endianness: Endianness::Big,
    native_ext: "aes128",
};

impl Cipher {
    pub const ALL: [Cipher; 3] = [Cipher::ChaCha20, Cipher::Aes256Ctr, Cipher::Aes128Ctr];

    pub fn config(self) -> &'static AlgorithmConfig {
        match self {
            Cipher::ChaCha20 => &CHACHA20,
            Cipher::Aes256Ctr => &AES_256_CTR,
            Cipher::Aes128Ctr => &AES_128_CTR,
        }
    }

    pub fn index(self) -> u8 {
        self.config().index
    }

    pub fn name(self) -> &'static str {
        self.config().name
    }

    pub fn from_index(index: u8) -> Option<Cipher> {
        Cipher::ALL.into_iter().find(|c| c.index() == index)
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cipher {
    type Err = ZkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cipher::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ZkError::Configuration(format!("unknown cipher '{}'", s)))
    }
}

impl AlgorithmConfig {
    /// Width of one proof chunk in bits.
    pub fn chunk_bits(&self) -> usize {
        self.chunk_words * self.word_bits
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bits() / 8
    }

    pub fn word_bytes(&self) -> usize {
        self.word_bits / 8
    }

    pub fn bytes_to_bits(&self, bytes: &[u8]) -> ZkResult<Vec<u8>> {
        codec::bytes_to_bits(self.endianness, self.word_bits, bytes)
    }

    pub fn bits_to_bytes(&self, bits: &[u8]) -> ZkResult<Vec<u8>> {
        codec::bits_to_bytes(self.endianness, self.word_bits, bits)
    }

    /// Block counter at which chunk `offset` starts.
    ///
    /// Offsets address whole chunks only.
    pub fn counter_for_chunk(&self, offset: u32) -> ZkResult<u32> {
        offset
            .checked_mul(self.blocks_per_chunk)
            .and_then(|blocks| blocks.checked_add(self.start_counter))
            .ok_or_else(|| {
                ZkError::InvalidInput(format!(
                    "chunk offset {} overflows the {} block counter",
                    offset, self.name
                ))
            })
    }

    /// Counter as circuit bits: four bytes in the cipher's endianness, expanded.
    pub fn serialize_counter(&self, counter: u32) -> ZkResult<Vec<u8>> {
        let bytes = match self.endianness {
            Endianness::Little => counter.to_le_bytes(),
            Endianness::Big => counter.to_be_bytes(),
        };
        self.bytes_to_bits(&bytes)
    }

    pub fn deserialize_counter(&self, bits: &[u8]) -> ZkResult<u32> {
        let bytes: [u8; 4] = self.bits_to_bytes(bits)?.try_into().map_err(|b: Vec<u8>| {
            ZkError::Configuration(format!("counter must be 32 bits, got {} bytes", b.len()))
        })?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn check_key(&self, key: &[u8]) -> ZkResult<()> {
        if key.len() != self.key_bytes {
            return Err(ZkError::InvalidInput(format!(
                "key must be {} bytes for {}, got {}",
                self.key_bytes,
                self.name,
                key.len()
            )));
        }
        Ok(())
    }

    pub fn check_iv(&self, iv: &[u8]) -> ZkResult<()> {
        if iv.len() != self.iv_bytes {
            return Err(ZkError::InvalidInput(format!(
                "iv must be {} bytes for {}, got {}",
                self.iv_bytes,
                self.name,
                iv.len()
            )));
        }
        Ok(())
    }

    /// Reference encryption of `plaintext` from the start of the keystream.
    pub fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> ZkResult<Vec<u8>> {
        reference::encrypt(self.cipher, key, iv, plaintext)
    }
}
