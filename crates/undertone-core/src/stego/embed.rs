//! Message embedding.

use log::debug;

use super::is_usable;
use crate::error::{Error, Result};
use crate::jpeg::parser::Component;
use crate::jpeg::ZIGZAG_TO_NATURAL;

/// Statistics from a completed embed.
#[derive(Debug, Clone, Copy)]
pub struct EmbedReport {
    /// Coefficients whose LSB now carries a payload bit.
    pub coefficients_used: usize,
    /// Coefficients the traversal looked at (usable or not).
    pub coefficients_visited: usize,
    /// Mean perceptual weight (inverse quantizer step) of the used
    /// coefficients. Reported for inspection only; the selector does
    /// not consult weights.
    pub mean_weight: f32,
}

/// Write `message` into the luminance grid, MSB-first within each byte.
///
/// Traversal is row-major over `(row, col)` up to the emitted block
/// counts, then ascending zigzag position 1..=63 inside each block.
/// The extractor walks the identical order.
///
/// Returns `InsufficientCapacity` (with the count of fully embedded
/// bytes) when the carrier runs out of usable coefficients.
pub fn embed_message(
    luma: &mut Component,
    qtable: &[u16; 64],
    message: &[u8],
) -> Result<EmbedReport> {
    let total_bits = message.len() * 8;
    let rows = luma.blocks_per_column;
    let cols = luma.blocks_per_line;

    let mut bit_index = 0usize;
    let mut visited = 0usize;
    let mut weight_sum = 0f32;

    'blocks: for row in 0..rows {
        for col in 0..cols {
            let block = luma.block_mut(row, col);
            for k in 1..64 {
                if bit_index >= total_bits {
                    break 'blocks;
                }
                let index = ZIGZAG_TO_NATURAL[k];
                visited += 1;
                let coefficient = block[index];
                if !is_usable(k, coefficient) {
                    continue;
                }

                let byte = message[bit_index / 8];
                let bit = (byte >> (7 - (bit_index % 8))) & 1;
                block[index] = set_magnitude_lsb(coefficient, bit);
                weight_sum += 1.0 / f32::from(qtable[index].max(1));
                bit_index += 1;
            }
        }
    }

    if bit_index < total_bits {
        return Err(Error::InsufficientCapacity {
            embedded: bit_index / 8,
            message_len: message.len(),
        });
    }

    debug!(
        "embedded {} bytes into {} coefficients ({} visited)",
        message.len(),
        bit_index,
        visited
    );

    Ok(EmbedReport {
        coefficients_used: bit_index,
        coefficients_visited: visited,
        mean_weight: if bit_index > 0 { weight_sum / bit_index as f32 } else { 0.0 },
    })
}

/// Set the low bit of the magnitude, preserving the sign. With the
/// selector's magnitude floor of 2 this can never zero a coefficient.
#[inline]
fn set_magnitude_lsb(coefficient: i16, bit: u8) -> i16 {
    let magnitude = (coefficient.unsigned_abs() & !1) | u16::from(bit);
    if coefficient < 0 {
        -(magnitude as i16)
    } else {
        magnitude as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn lsb_setter_preserves_sign_and_magnitude_floor() {
        assert_eq!(set_magnitude_lsb(4, 1), 5);
        assert_eq!(set_magnitude_lsb(5, 0), 4);
        assert_eq!(set_magnitude_lsb(-4, 1), -5);
        assert_eq!(set_magnitude_lsb(-5, 0), -4);
        assert_eq!(set_magnitude_lsb(2, 0), 2);
        assert_eq!(set_magnitude_lsb(-2, 1), -3);
    }

    #[test]
    fn embeds_bits_msb_first() {
        // One block with usable coefficients at zigzag 1..=8
        let mut block = [0i16; 64];
        for k in 1..=8 {
            block[ZIGZAG_TO_NATURAL[k]] = 4;
        }
        let mut component = test_component(vec![block], 1);

        embed_message(&mut component, &[16; 64], &[0b1010_0011]).unwrap();

        let bits: Vec<i16> = (1..=8)
            .map(|k| component.blocks[0][ZIGZAG_TO_NATURAL[k]] & 1)
            .collect();
        assert_eq!(bits, vec![1, 0, 1, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn dc_and_small_coefficients_are_untouched() {
        let mut component = test_component(noisy_blocks(64, 9), 8);
        let before = component.blocks.clone();

        embed_message(&mut component, &[16; 64], b"payload").unwrap();

        for (block, original) in component.blocks.iter().zip(before.iter()) {
            assert_eq!(block[0], original[0], "DC must not change");
            for k in 1..64 {
                let index = ZIGZAG_TO_NATURAL[k];
                if !is_usable(k, original[index]) {
                    assert_eq!(block[index], original[index]);
                } else {
                    assert!((i32::from(block[index]) - i32::from(original[index])).abs() <= 1);
                    assert_eq!(block[index].signum(), original[index].signum());
                }
            }
        }
    }

    #[test]
    fn capacity_exhaustion_reports_embedded_bytes() {
        // 2 usable coefficients per block, 4 blocks: one byte fits,
        // the second does not
        let mut block = [0i16; 64];
        block[ZIGZAG_TO_NATURAL[1]] = 3;
        block[ZIGZAG_TO_NATURAL[2]] = -3;
        let mut component = test_component(vec![block; 4], 2);

        let result = embed_message(&mut component, &[16; 64], b"ab");
        match result {
            Err(Error::InsufficientCapacity { embedded, message_len }) => {
                assert_eq!(embedded, 1);
                assert_eq!(message_len, 2);
            }
            other => panic!("expected InsufficientCapacity, got {other:?}"),
        }
    }

    #[test]
    fn empty_message_is_a_no_op() {
        let mut component = test_component(noisy_blocks(4, 10), 2);
        let before = component.blocks.clone();
        let report = embed_message(&mut component, &[16; 64], b"").unwrap();
        assert_eq!(report.coefficients_used, 0);
        assert_eq!(component.blocks, before);
    }
}
