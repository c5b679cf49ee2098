use criterion::{black_box, criterion_group, criterion_main, Criterion};

use undertone_core::{embed, encode_rgba, extract, EmbedOptions};

fn carrier(width: u16, height: u16) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(4242);
    let rgba: Vec<u8> =
        (0..usize::from(width) * usize::from(height) * 4).map(|_| rng.u8(..)).collect();
    encode_rgba(&rgba, width, height, 90, &[], None).unwrap()
}

fn bench_embed(c: &mut Criterion) {
    let cover = carrier(512, 512);
    let message = "a short message that fits comfortably";

    c.bench_function("embed_512x512", |b| {
        b.iter(|| embed(black_box(&cover), black_box(message), &EmbedOptions::default()).unwrap())
    });
}

fn bench_extract(c: &mut Criterion) {
    let cover = carrier(512, 512);
    let message = "a short message that fits comfortably";
    let stego = embed(&cover, message, &EmbedOptions::default()).unwrap();

    c.bench_function("extract_512x512", |b| {
        b.iter(|| extract(black_box(&stego.image_bytes), Some(message.len())).unwrap())
    });
}

criterion_group!(benches, bench_embed, bench_extract);
criterion_main!(benches);
