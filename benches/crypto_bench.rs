use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keyswitch::core::crypto::{self, KdfParams, Key, SecretMaterial};
use std::time::Duration;

/// Generate a payload of given size.
fn generate_payload(size: usize) -> Vec<u8> {
    vec![b'x'; size]
}

/// Benchmark encrypt/decrypt roundtrip with varying payload sizes.
fn bench_encrypt_decrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypt_decrypt");
    group.sample_size(50);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let key = Key::generate();
    let sizes = [32, 256, 1024, 4096, 16384];

    for size in sizes {
        let payload = generate_payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            BenchmarkId::new("roundtrip", format!("{}B", size)),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let sealed = crypto::encrypt(black_box(&key), black_box(payload)).unwrap();
                    let opened = crypto::decrypt(&key, black_box(&sealed), "bench").unwrap();
                    black_box(opened);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark Argon2id key derivation at the default and a light cost.
fn bench_derive_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_key");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    let secret = SecretMaterial::new("bench-master-key").unwrap();
    let salt = crypto::generate_salt();
    let light = KdfParams {
        memory_kib: 8 * 1024,
        iterations: 1,
        parallelism: 1,
    };

    for (name, params) in [("default", KdfParams::default()), ("light", light)] {
        group.bench_with_input(BenchmarkId::new("argon2id", name), &params, |b, params| {
            b.iter(|| {
                let key = crypto::derive_key(black_box(&secret), black_box(&salt), params).unwrap();
                black_box(key);
            });
        });
    }

    group.finish();
}

/// Benchmark wrapping a content key under a key-encryption key.
fn bench_wrap_key(c: &mut Criterion) {
    let kek = Key::generate();
    let cek = Key::generate();
    c.bench_function("wrap_unwrap", |b| {
        b.iter(|| {
            let wrapped = crypto::wrap_key(black_box(&kek), black_box(&cek)).unwrap();
            let unwrapped = crypto::unwrap_key(&kek, &wrapped).unwrap();
            black_box(unwrapped);
        });
    });
}

criterion_group!(benches, bench_encrypt_decrypt, bench_derive_key, bench_wrap_key);
criterion_main!(benches);
