//! Coefficient-level message embedding.
//!
//! Payload bits ride in the least-significant bit of the magnitude of
//! selected luminance AC coefficients. Both directions share one
//! selector predicate and one traversal order; the expected payload
//! length travels out-of-band, no framing or checksum is stored in the
//! image.

mod embed;
mod extract;

pub use embed::{embed_message, EmbedReport};
pub use extract::extract_message;

use crate::jpeg::parser::Jpeg;

/// The selector shared by embedding and extraction.
///
/// A coefficient at zigzag position `k` is usable iff it is an AC
/// coefficient with magnitude at least 2. Keeping the magnitude off 1
/// means flipping the low bit can never zero a coefficient, so the
/// selection is stable across a re-encode.
///
/// Any change here breaks recovery of every previously embedded image.
#[inline]
pub fn is_usable(k: usize, coefficient: i16) -> bool {
    k >= 1 && coefficient.unsigned_abs() >= 2
}

/// Advisory capacity figures for a parsed carrier.
#[derive(Debug, Clone, Copy)]
pub struct CapacityEstimate {
    /// Coefficients in the traversed luminance grid.
    pub total_coefficients: usize,
    /// Coefficients the selector accepts right now.
    pub usable_coefficients: usize,
    /// Exact byte capacity with the current coefficients.
    pub capacity_bytes: usize,
    /// Heuristic estimate at a 10% usability assumption.
    pub plain_estimate_bytes: usize,
    /// Heuristic estimate at the conservative 5% assumption used by the
    /// perceptually weighted variant.
    pub weighted_estimate_bytes: usize,
}

/// Count capacity over the emitted luminance grid.
pub fn capacity(jpeg: &Jpeg) -> CapacityEstimate {
    let luma = jpeg.luma();
    let rows = luma.blocks_per_column;
    let cols = luma.blocks_per_line;

    let mut usable = 0usize;
    for row in 0..rows {
        for col in 0..cols {
            let block = luma.block(row, col);
            for k in 1..64 {
                if is_usable(k, block[crate::jpeg::ZIGZAG_TO_NATURAL[k]]) {
                    usable += 1;
                }
            }
        }
    }

    let total = rows * cols * 64;
    CapacityEstimate {
        total_coefficients: total,
        usable_coefficients: usable,
        capacity_bytes: usable / 8,
        plain_estimate_bytes: total / 10 / 8,
        weighted_estimate_bytes: total / 20 / 8,
    }
}
