//! Fixed-point inverse DCT.
//!
//! 8x8 two-pass integer IDCT with constants scaled by 2^12, operating on
//! a dequantized workspace. Rows (or columns) whose AC entries are all
//! zero take a fast path that replicates the scaled DC value.

use super::Block;

const SQRT_2: i32 = 5793; // sqrt(2)
const HALF_SQRT_2: i32 = 2896; // sqrt(2) / 2
const COS_1: i32 = 4017; // cos(pi/16)
const SIN_1: i32 = 799; // sin(pi/16)
const COS_3: i32 = 3406; // cos(3*pi/16)
const SIN_3: i32 = 2276; // sin(3*pi/16)
const COS_6: i32 = 1567; // cos(6*pi/16)
const SIN_6: i32 = 3784; // sin(6*pi/16)

/// Dequantize a coefficient block and run the inverse DCT, producing
/// level-shifted 8-bit samples in row-major order.
pub fn dequantize_and_idct(block: &Block, qtable: &[u16; 64], output: &mut [u8; 64]) {
    let mut p = [0i32; 64];
    for (i, slot) in p.iter_mut().enumerate() {
        *slot = i32::from(block[i]) * i32::from(qtable[i]);
    }

    // Rows
    for row in 0..8 {
        let offset = row * 8;
        idct_1d(&mut p, offset, 1, Pass::Rows);
    }

    // Columns
    for col in 0..8 {
        idct_1d(&mut p, col, 8, Pass::Columns);
    }

    // Descale to 8-bit samples around a 128 level shift
    for (out, &v) in output.iter_mut().zip(p.iter()) {
        *out = (128 + ((v + 8) >> 4)).clamp(0, 255) as u8;
    }
}

enum Pass {
    Rows,
    Columns,
}

/// One 8-point IDCT over `p[offset + k*stride]` for `k` in 0..8.
///
/// The row pass keeps 4 extra bits of precision which the column pass
/// consumes, hence the different rounding constants per pass.
fn idct_1d(p: &mut [i32; 64], offset: usize, stride: usize, pass: Pass) {
    let at = |k: usize| offset + k * stride;
    let p0 = p[at(0)];
    let p1 = p[at(1)];
    let p2 = p[at(2)];
    let p3 = p[at(3)];
    let p4 = p[at(4)];
    let p5 = p[at(5)];
    let p6 = p[at(6)];
    let p7 = p[at(7)];

    // AC-free fast path: replicate the scaled DC value
    if p1 | p2 | p3 | p4 | p5 | p6 | p7 == 0 {
        let t = match pass {
            Pass::Rows => (SQRT_2 * p0 + 512) >> 10,
            Pass::Columns => (SQRT_2 * p0 + 8192) >> 14,
        };
        for k in 0..8 {
            p[at(k)] = t;
        }
        return;
    }

    // Stage 4
    let (mut v0, mut v1, mut v4, mut v7, mut v5, mut v6);
    match pass {
        Pass::Rows => {
            v0 = (SQRT_2 * p0 + 128) >> 8;
            v1 = (SQRT_2 * p4 + 128) >> 8;
            v4 = (HALF_SQRT_2 * (p1 - p7) + 128) >> 8;
            v7 = (HALF_SQRT_2 * (p1 + p7) + 128) >> 8;
            v5 = p3 << 4;
            v6 = p5 << 4;
        }
        Pass::Columns => {
            v0 = (SQRT_2 * p0 + 2048) >> 12;
            v1 = (SQRT_2 * p4 + 2048) >> 12;
            v4 = (HALF_SQRT_2 * (p1 - p7) + 2048) >> 12;
            v7 = (HALF_SQRT_2 * (p1 + p7) + 2048) >> 12;
            v5 = p3;
            v6 = p5;
        }
    }
    let mut v2 = p2;
    let mut v3 = p6;

    // Stage 3
    v0 = (v0 + v1 + 1) >> 1;
    v1 = v0 - v1;
    let t = (v2 * SIN_6 + v3 * COS_6 + 2048) >> 12;
    v2 = (v2 * COS_6 - v3 * SIN_6 + 2048) >> 12;
    v3 = t;
    v4 = (v4 + v6 + 1) >> 1;
    v6 = v4 - v6;
    v7 = (v7 + v5 + 1) >> 1;
    v5 = v7 - v5;

    // Stage 2
    v0 = (v0 + v3 + 1) >> 1;
    v3 = v0 - v3;
    v1 = (v1 + v2 + 1) >> 1;
    v2 = v1 - v2;
    let t = (v4 * SIN_3 + v7 * COS_3 + 2048) >> 12;
    v4 = (v4 * COS_3 - v7 * SIN_3 + 2048) >> 12;
    v7 = t;
    let t = (v5 * SIN_1 + v6 * COS_1 + 2048) >> 12;
    v5 = (v5 * COS_1 - v6 * SIN_1 + 2048) >> 12;
    v6 = t;

    // Stage 1
    p[at(0)] = v0 + v7;
    p[at(7)] = v0 - v7;
    p[at(1)] = v1 + v6;
    p[at(6)] = v1 - v6;
    p[at(2)] = v2 + v5;
    p[at(5)] = v2 - v5;
    p[at(3)] = v3 + v4;
    p[at(4)] = v3 - v4;
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT_Q: [u16; 64] = [1; 64];

    #[test]
    fn zero_block_decodes_to_mid_gray() {
        let block: Block = [0; 64];
        let mut out = [0u8; 64];
        dequantize_and_idct(&block, &FLAT_Q, &mut out);
        assert_eq!(out, [128u8; 64]);
    }

    #[test]
    fn dc_only_block_is_flat() {
        let mut block: Block = [0; 64];
        block[0] = 64; // spatial shift of 64/8 = 8
        let mut out = [0u8; 64];
        dequantize_and_idct(&block, &FLAT_Q, &mut out);

        let first = out[0];
        assert!(out.iter().all(|&s| s == first), "DC-only block must be uniform");
        assert!((i32::from(first) - 136).abs() <= 1, "got {first}");
    }

    #[test]
    fn dc_saturates_to_black_and_white() {
        let mut block: Block = [0; 64];
        block[0] = 8 * 300; // far above the 255 ceiling
        let mut out = [0u8; 64];
        dequantize_and_idct(&block, &FLAT_Q, &mut out);
        assert!(out.iter().all(|&s| s == 255));

        block[0] = -8 * 300;
        dequantize_and_idct(&block, &FLAT_Q, &mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn quantization_table_scales_the_dc() {
        let mut block: Block = [0; 64];
        block[0] = 16;
        let mut q = [1u16; 64];
        q[0] = 4;
        let mut out_fine = [0u8; 64];
        let mut out_coarse = [0u8; 64];
        dequantize_and_idct(&block, &FLAT_Q, &mut out_fine);
        dequantize_and_idct(&block, &q, &mut out_coarse);
        // Same coefficient dequantized 4x larger moves 4x further from gray
        let fine = i32::from(out_fine[0]) - 128;
        let coarse = i32::from(out_coarse[0]) - 128;
        assert!((coarse - fine * 4).abs() <= 2, "fine={fine} coarse={coarse}");
    }
}
