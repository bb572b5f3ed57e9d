//! Byte <-> bit codec consumed by the circuits.
//!
//! A buffer is split into words of `word_bits` bits. Each word is assembled
//! from its bytes in the cipher's endianness and emitted most-significant bit
//! first. With 8-bit words the endianness is irrelevant and the expansion is
//! plain bytewise MSB-first.
//!
//! Bits are represented as `u8` values restricted to 0 and 1.

use super::Endianness;
use crate::error::{ZkError, ZkResult};

fn check_word_bits(word_bits: usize) -> ZkResult<usize> {
    if word_bits == 0 || word_bits % 8 != 0 || word_bits > 64 {
        return Err(ZkError::Configuration(format!(
            "unsupported word width {} bits",
            word_bits
        )));
    }
    Ok(word_bits / 8)
}

/// Expand `bytes` into a flat bit sequence.
pub fn bytes_to_bits(endianness: Endianness, word_bits: usize, bytes: &[u8]) -> ZkResult<Vec<u8>> {
    let word_bytes = check_word_bits(word_bits)?;
    if bytes.len() % word_bytes != 0 {
        return Err(ZkError::Configuration(format!(
            "buffer of {} bytes is not a multiple of the {}-bit word",
            bytes.len(),
            word_bits
        )));
    }

    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for word in bytes.chunks(word_bytes) {
        let value = match endianness {
            Endianness::Little => word.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64),
            Endianness::Big => word.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        };
        for i in (0..word_bits).rev() {
            bits.push(((value >> i) & 1) as u8);
        }
    }

    Ok(bits)
}

/// Pack a flat bit sequence back into bytes. Exact inverse of [`bytes_to_bits`].
pub fn bits_to_bytes(endianness: Endianness, word_bits: usize, bits: &[u8]) -> ZkResult<Vec<u8>> {
    let word_bytes = check_word_bits(word_bits)?;
    if bits.len() % word_bits != 0 {
        return Err(ZkError::Configuration(format!(
            "{} bits is not a multiple of the {}-bit word",
            bits.len(),
            word_bits
        )));
    }

    let mut bytes = Vec::with_capacity(bits.len() / 8);
    for word in bits.chunks(word_bits) {
        let mut value = 0u64;
        for &bit in word {
            if bit > 1 {
                return Err(ZkError::Configuration(format!("bit value {} is not 0 or 1", bit)));
            }
            value = (value << 1) | bit as u64;
        }
        let be = value.to_be_bytes();
        let word_be = &be[be.len() - word_bytes..];
        match endianness {
            Endianness::Little => bytes.extend(word_be.iter().rev()),
            Endianness::Big => bytes.extend_from_slice(word_be),
        }
    }

    Ok(bytes)
}
