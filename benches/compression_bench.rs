use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dvpl::{Mode, TraversalOptions};
use std::fs;

fn bench_container(c: &mut Criterion) {
    let zeros = vec![0u8; 1024 * 1024];
    let text: Vec<u8> = b"terrain: sand\nlod: 3\n".iter().copied().cycle().take(1024 * 1024).collect();
    let packed = dvpl::compress(&text).unwrap();

    c.bench_function("compress_1mb_zeros", |b| b.iter(|| dvpl::compress(black_box(&zeros))));
    c.bench_function("compress_1mb_text", |b| b.iter(|| dvpl::compress(black_box(&text))));
    c.bench_function("decompress_1mb_text", |b| b.iter(|| dvpl::decompress(black_box(&packed))));
    c.bench_function("verify_1mb_text", |b| b.iter(|| dvpl::verify(black_box(&packed))));
}

fn bench_verify_tree(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let data = vec![42u8; 64 * 1024];
    for i in 0..32 {
        fs::write(dir.path().join(format!("file_{i}.bin.dvpl")), dvpl::compress(&data).unwrap()).unwrap();
    }
    let opts = TraversalOptions::new(Mode::Verify);

    c.bench_function("verify_tree_32x64k", |b| {
        b.iter(|| dvpl::process(black_box(dir.path()), &opts).unwrap())
    });
}

criterion_group!(benches, bench_container, bench_verify_tree);
criterion_main!(benches);
