//! Quantization tables and per-quality scaling.
//!
//! Base tables are the Annex K (Clause K.1) samples of Recommendation
//! ITU-T T.81, stored in natural (row-major) order. The scaling rule is
//! the classic IJG mapping from a 1..=100 quality to a percentage scale
//! factor.

use super::ZIGZAG_TO_NATURAL;

/// Annex K luminance base table (quality 50), natural order.
#[rustfmt::skip]
pub const LUMA_BASE: [u16; 64] = [
    16, 11, 10, 16,  24,  40,  51,  61,
    12, 12, 14, 19,  26,  58,  60,  55,
    14, 13, 16, 24,  40,  57,  69,  56,
    14, 17, 22, 29,  51,  87,  80,  62,
    18, 22, 37, 56,  68, 109, 103,  77,
    24, 35, 55, 64,  81, 104, 113,  92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103,  99,
];

/// Annex K chrominance base table (quality 50), natural order.
#[rustfmt::skip]
pub const CHROMA_BASE: [u16; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// AAN scale factors for the forward DCT divisor table.
const AASF: [f32; 8] = [
    1.0, 1.387_039_845, 1.306_562_965, 1.175_875_602,
    1.0, 0.785_694_958, 0.541_196_100, 0.275_899_379,
];

/// Percentage scale factor for a 1..=100 quality.
pub fn scale_factor(quality: u8) -> u32 {
    let quality = u32::from(quality.clamp(1, 100));
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

/// Scale a source table to a target quality, entries clamped to 1..=255.
pub fn scale_table(base: &[u16; 64], quality: u8) -> [u16; 64] {
    let sf = scale_factor(quality);
    let mut table = [0u16; 64];
    for (out, &entry) in table.iter_mut().zip(base.iter()) {
        *out = ((u32::from(entry) * sf + 50) / 100).clamp(1, 255) as u16;
    }
    table
}

/// Forward-DCT divisors for a quantization table in natural order.
///
/// `fdtbl[i] = 1 / (q[i] * aasf[row] * aasf[col] * 8)`; multiplying a
/// raw AAN forward DCT output by this both descales and quantizes.
pub fn fdct_divisors(table: &[u16; 64]) -> [f32; 64] {
    let mut divisors = [0f32; 64];
    let mut i = 0;
    for row in 0..8 {
        for col in 0..8 {
            divisors[i] = 1.0 / (f32::from(table[i]) * AASF[row] * AASF[col] * 8.0);
            i += 1;
        }
    }
    divisors
}

/// Quantization state for one encode call.
pub struct QuantTables {
    /// Scaled luminance table, natural order.
    pub luma: [u16; 64],
    /// Scaled chrominance table, natural order.
    pub chroma: [u16; 64],
    /// Forward-DCT divisors for the luminance table.
    pub luma_divisors: [f32; 64],
    /// Forward-DCT divisors for the chrominance table.
    pub chroma_divisors: [f32; 64],
}

/// Build the scaled tables and divisor tables for a quality level.
pub fn build_tables(quality: u8) -> QuantTables {
    let luma = scale_table(&LUMA_BASE, quality);
    let chroma = scale_table(&CHROMA_BASE, quality);
    let luma_divisors = fdct_divisors(&luma);
    let chroma_divisors = fdct_divisors(&chroma);
    QuantTables { luma, chroma, luma_divisors, chroma_divisors }
}

/// Reorder a natural-order table into the zigzag order used on the wire.
pub fn to_zigzag(table: &[u16; 64]) -> [u16; 64] {
    let mut out = [0u16; 64];
    for (zz, out_entry) in out.iter_mut().enumerate() {
        *out_entry = table[ZIGZAG_TO_NATURAL[zz]];
    }
    out
}
