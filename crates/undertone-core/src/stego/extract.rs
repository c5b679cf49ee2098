//! Message extraction.

use log::debug;

use super::is_usable;
use crate::error::{Error, Result};
use crate::jpeg::parser::Component;
use crate::jpeg::ZIGZAG_TO_NATURAL;

/// Read `expected_len` bytes back out of the luminance grid.
///
/// Walks the same order as the embedder (row-major blocks, ascending
/// zigzag position), taking the magnitude LSB of every coefficient the
/// shared selector accepts and packing bits MSB-first.
pub fn extract_message(luma: &Component, expected_len: usize) -> Result<Vec<u8>> {
    let rows = luma.blocks_per_column;
    let cols = luma.blocks_per_line;

    let mut message = Vec::with_capacity(expected_len);
    let mut current = 0u8;
    let mut bits = 0u8;

    if expected_len == 0 {
        return Ok(message);
    }

    for row in 0..rows {
        for col in 0..cols {
            let block = luma.block(row, col);
            for k in 1..64 {
                let coefficient = block[ZIGZAG_TO_NATURAL[k]];
                if !is_usable(k, coefficient) {
                    continue;
                }

                current = (current << 1) | (coefficient.unsigned_abs() & 1) as u8;
                bits += 1;
                if bits == 8 {
                    message.push(current);
                    current = 0;
                    bits = 0;
                    if message.len() == expected_len {
                        debug!("extracted {} bytes", message.len());
                        return Ok(message);
                    }
                }
            }
        }
    }

    Err(Error::ExtractionIncomplete { extracted: message.len(), expected: expected_len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::embed_message;

    fn test_component(blocks: Vec<[i16; 64]>, cols: usize) -> Component {
        let rows = blocks.len() / cols;
        Component {
            id: 1,
            horizontal_sampling: 1,
            vertical_sampling: 1,
            quant_table_index: 0,
            dc_table_index: 0,
            ac_table_index: 0,
            blocks_per_line: cols,
            blocks_per_column: rows,
            grid_width: cols,
            grid_height: rows,
            blocks,
        }
    }

    fn noisy_blocks(count: usize, seed: u64) -> Vec<[i16; 64]> {
        let mut rng = fastrand::Rng::with_seed(seed);
        (0..count)
            .map(|_| {
                let mut block = [0i16; 64];
                block[0] = rng.i16(-500..500);
                for slot in block.iter_mut().skip(1) {
                    *slot = match rng.usize(0..10) {
                        0..=5 => 0,
                        6..=7 => rng.i16(-2..=2),
                        8 => rng.i16(-10..=10),
                        _ => rng.i16(-50..=50),
                    };
                }
                block
            })
            .collect()
    }

    #[test]
    fn roundtrips_through_coefficients() {
        let mut component = test_component(noisy_blocks(128, 21), 16);
        let message = b"The quick brown fox jumps over the lazy dog";

        embed_message(&mut component, &[16; 64], message).unwrap();
        let extracted = extract_message(&component, message.len()).unwrap();

        assert_eq!(extracted, message);
    }

    #[test]
    fn roundtrips_all_byte_values() {
        let mut component = test_component(noisy_blocks(512, 22), 16);
        let message: Vec<u8> = (0..=255).collect();

        embed_message(&mut component, &[16; 64], &message).unwrap();
        let extracted = extract_message(&component, message.len()).unwrap();

        assert_eq!(extracted, message);
    }

    #[test]
    fn zero_length_reads_nothing() {
        let component = test_component(noisy_blocks(4, 23), 2);
        assert_eq!(extract_message(&component, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn too_short_carrier_is_incomplete() {
        let mut block = [0i16; 64];
        block[ZIGZAG_TO_NATURAL[1]] = 2;
        let component = test_component(vec![block; 4], 2);

        // 4 usable coefficients cannot produce even one byte
        match extract_message(&component, 3) {
            Err(Error::ExtractionIncomplete { extracted, expected }) => {
                assert_eq!(extracted, 0);
                assert_eq!(expected, 3);
            }
            other => panic!("expected ExtractionIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn selector_visits_identical_positions_in_both_directions() {
        let mut component = test_component(noisy_blocks(64, 24), 8);

        let collect_positions = |component: &Component| {
            let mut positions = Vec::new();
            for row in 0..component.blocks_per_column {
                for col in 0..component.blocks_per_line {
                    let block = component.block(row, col);
                    for k in 1..64 {
                        if is_usable(k, block[ZIGZAG_TO_NATURAL[k]]) {
                            positions.push((row, col, k));
                        }
                    }
                }
            }
            positions
        };

        let before = collect_positions(&component);
        embed_message(&mut component, &[16; 64], b"selector symmetry check").unwrap();
        let after = collect_positions(&component);

        assert_eq!(before, after, "embedding must not change the selected set");
    }
}
