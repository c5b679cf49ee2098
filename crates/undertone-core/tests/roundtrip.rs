//! End-to-end pipeline tests on synthetic carriers.

use undertone_core::jpeg::parser::parse;
use undertone_core::jpeg::ZIGZAG_TO_NATURAL;
use undertone_core::stego;
use undertone_core::{embed, encode_rgba, extract, EmbedOptions, Error};

/// Noise carrier: random pixels keep plenty of AC coefficients alive.
fn carrier(width: u16, height: u16, quality: u8, seed: u64) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let rgba: Vec<u8> =
        (0..usize::from(width) * usize::from(height) * 4).map(|_| rng.u8(..)).collect();
    encode_rgba(&rgba, width, height, quality, &[], None).unwrap()
}

#[test]
fn hello_world_roundtrip() {
    let cover = carrier(128, 128, 90, 42);
    let message = "Hello, world!";

    let output = embed(&cover, message, &EmbedOptions::default()).unwrap();
    let recovered = extract(&output.image_bytes, Some(13)).unwrap();

    assert_eq!(recovered, message);
}

#[test]
fn longer_message_with_forced_quality() {
    let cover = carrier(256, 256, 85, 7);
    let message = "A considerably longer payload that spans many blocks. \
                   It still has to come back byte for byte.";

    let options = EmbedOptions { quality: Some(70), ..EmbedOptions::default() };
    let output = embed(&cover, message, &options).unwrap();
    assert_eq!(output.stats.quality_used, 70);

    let recovered = extract(&output.image_bytes, Some(message.len())).unwrap();
    assert_eq!(recovered, message);
}

#[test]
fn unicode_payload_roundtrip() {
    let cover = carrier(128, 128, 90, 13);
    let message = "tajné zprávy — 秘密のメッセージ — 🤫";

    let output = embed(&cover, message, &EmbedOptions::default()).unwrap();
    let recovered = extract(&output.image_bytes, Some(message.len())).unwrap();

    assert_eq!(recovered, message);
}

#[test]
fn stats_are_consistent() {
    let cover = carrier(128, 128, 90, 99);
    let message = "stats";

    let output = embed(&cover, message, &EmbedOptions::default()).unwrap();

    assert_eq!(output.stats.coefficients_used, message.len() * 8);
    assert_eq!(output.stats.original_size, cover.len());
    assert_eq!(output.stats.final_size, output.image_bytes.len());
    assert!((25..=95).contains(&output.stats.quality_used));
}

#[test]
fn preserve_quality_floors_at_the_estimate() {
    let cover = carrier(128, 128, 95, 5);
    let estimated = undertone_core::analyze(&parse(&cover).unwrap(), None).estimated_quality;

    let options = EmbedOptions {
        quality: Some(30),
        preserve_quality: true,
        ..EmbedOptions::default()
    };
    let output = embed(&cover, "floor", &options).unwrap();

    assert!(
        output.stats.quality_used >= estimated,
        "used {} but estimated {estimated}",
        output.stats.quality_used
    );
}

#[test]
fn tiny_carrier_has_insufficient_capacity() {
    let cover = carrier(16, 16, 50, 3);
    let message = "this message cannot possibly fit into a 16x16 carrier at low quality \
                   because there are far too few usable coefficients in four blocks";

    match embed(&cover, message, &EmbedOptions::default()) {
        Err(Error::InsufficientCapacity { embedded, message_len }) => {
            assert_eq!(message_len, message.len());
            assert!(embedded < message_len);
        }
        other => panic!("expected InsufficientCapacity, got {other:?}"),
    }
}

#[test]
fn capacity_estimate_matches_selector() {
    let cover = carrier(128, 128, 90, 21);
    let jpeg = parse(&cover).unwrap();
    let estimate = stego::capacity(&jpeg);

    // Recount with the public selector
    let luma = jpeg.luma();
    let mut usable = 0usize;
    for row in 0..luma.blocks_per_column {
        for col in 0..luma.blocks_per_line {
            let block = luma.block(row, col);
            for k in 1..64 {
                if stego::is_usable(k, block[ZIGZAG_TO_NATURAL[k]]) {
                    usable += 1;
                }
            }
        }
    }

    assert_eq!(estimate.usable_coefficients, usable);
    assert_eq!(estimate.capacity_bytes, usable / 8);
    assert_eq!(estimate.total_coefficients, 16 * 16 * 64);
    assert!(estimate.weighted_estimate_bytes <= estimate.plain_estimate_bytes);
}

#[test]
fn selector_positions_survive_the_reencode() {
    let cover = carrier(96, 96, 90, 17);
    let message = "selector symmetry across the full pipeline";

    let positions = |jpeg: &undertone_core::Jpeg| {
        let luma = jpeg.luma();
        let mut out = Vec::new();
        for row in 0..luma.blocks_per_column {
            for col in 0..luma.blocks_per_line {
                let block = luma.block(row, col);
                for k in 1..64 {
                    if stego::is_usable(k, block[ZIGZAG_TO_NATURAL[k]]) {
                        out.push((row, col, k));
                    }
                }
            }
        }
        out
    };

    let mut jpeg = parse(&cover).unwrap();
    let table = *jpeg.quant_table_for(jpeg.luma()).unwrap();
    stego::embed_message(jpeg.luma_mut(), &table, message.as_bytes()).unwrap();
    let embedded_positions = positions(&jpeg);

    let metadata = undertone_core::EncoderMetadata::new(
        jpeg.quant_tables[0].unwrap(),
        jpeg.quant_tables[1].unwrap(),
    );
    let bytes = undertone_core::encode_from_quantized(&jpeg, &metadata, 80).unwrap();
    let reparsed = parse(&bytes).unwrap();

    assert_eq!(positions(&reparsed), embedded_positions);
}

#[test]
fn embedding_is_repeatable_on_stego_output() {
    let cover = carrier(128, 128, 90, 31);

    let first = embed(&cover, "first message", &EmbedOptions::default()).unwrap();
    assert_eq!(extract(&first.image_bytes, Some(13)).unwrap(), "first message");

    let second = embed(&first.image_bytes, "second passes", &EmbedOptions::default()).unwrap();
    assert_eq!(extract(&second.image_bytes, Some(13)).unwrap(), "second passes");
}

#[test]
fn metadata_rides_along() {
    let mut rng = fastrand::Rng::with_seed(77);
    let rgba: Vec<u8> = (0..96usize * 96 * 4).map(|_| rng.u8(..)).collect();
    let exif = vec![0x49, 0x49, 0x2A, 0x00, 8, 0, 0, 0];
    let cover = encode_rgba(&rgba, 96, 96, 90, &[b"holiday shot".to_vec()], Some(&exif)).unwrap();

    let output = embed(&cover, "metadata", &EmbedOptions::default()).unwrap();
    let jpeg = parse(&output.image_bytes).unwrap();

    assert_eq!(jpeg.comments, vec![b"holiday shot".to_vec()]);
    assert_eq!(jpeg.exif.as_deref(), Some(exif.as_slice()));
}

#[test]
fn rendered_pixels_have_frame_geometry() {
    let cover = carrier(50, 34, 85, 55);
    let jpeg = parse(&cover).unwrap();
    let pixels = jpeg.pixels().unwrap();

    assert_eq!(pixels.width, 50);
    assert_eq!(pixels.height, 34);
    assert_eq!(pixels.data.len(), 50 * 34 * pixels.color_space.bytes_per_pixel());
}

#[test]
fn extract_without_length_uses_the_heuristic() {
    let cover = carrier(128, 128, 90, 61);
    // No embedded message; the call still walks the heuristic length.
    // Whatever comes back must have the advisory size (or fail UTF-8
    // validation, which is also acceptable for random LSBs).
    let jpeg = parse(&cover).unwrap();
    let advisory = stego::capacity(&jpeg);
    match extract(&cover, None) {
        Ok(text) => assert_eq!(
            text.len(),
            advisory.plain_estimate_bytes.min(advisory.capacity_bytes)
        ),
        Err(Error::InvalidUtf8) => {}
        Err(other) => panic!("unexpected error {other:?}"),
    }
}
