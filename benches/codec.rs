//! Benchmarks for the chunk codec and reference keystream
//!
//! Both run once per proof on the prover and once per verification, so they
//! should stay far below the cost of proving itself.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use zk_symmetric::algorithm::apply_keystream;
use zk_symmetric::{public_signals, Cipher, PublicInput};

fn benchmark_codec(c: &mut Criterion) {
    let chunk: Vec<u8> = (0..64u8).collect();

    for cipher in [Cipher::ChaCha20, Cipher::Aes128Ctr] {
        let config = cipher.config();
        let bits = config.bytes_to_bits(&chunk).expect("encode failed");

        c.bench_function(&format!("bytes_to_bits/{}", cipher), |b| {
            b.iter(|| config.bytes_to_bits(black_box(&chunk)))
        });
        c.bench_function(&format!("bits_to_bytes/{}", cipher), |b| {
            b.iter(|| config.bits_to_bytes(black_box(&bits)))
        });
    }
}

fn benchmark_keystream(c: &mut Criterion) {
    let chunk = vec![0xA5u8; 64];
    let key = [7u8; 32];
    let iv = [1u8; 12];

    for offset in [0u32, 1024] {
        let counter = Cipher::Aes256Ctr
            .config()
            .counter_for_chunk(offset)
            .expect("counter overflow");
        c.bench_function(&format!("apply_keystream/aes-256-ctr/offset={}", offset), |b| {
            b.iter(|| apply_keystream(Cipher::Aes256Ctr, &key, &iv, black_box(counter), &chunk))
        });
    }
}

fn benchmark_public_signals(c: &mut Criterion) {
    let public = PublicInput {
        ciphertext: vec![0x5A; 64],
        iv: vec![0u8; 12],
        offset: 3,
    };
    let plaintext = vec![0x11u8; 64];

    c.bench_function("public_signals/chacha20", |b| {
        b.iter(|| public_signals(Cipher::ChaCha20, black_box(&public), black_box(&plaintext)))
    });
}

criterion_group!(
    benches,
    benchmark_codec,
    benchmark_keystream,
    benchmark_public_signals
);
criterion_main!(benches);
