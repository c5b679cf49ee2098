//! Forward DCT and quantization.
//!
//! Float AAN butterflies (the same decomposition the inverse transform
//! uses, run forward); the divisor table from [`super::quant`] folds the
//! AAN output scaling and the quantization divide into one multiply.
//! Only the raw-pixel encode path uses this; re-encoding an existing
//! JPEG keeps the quantized coefficients untouched.

use super::Block;

const C4: f32 = 0.707106781; // cos(4*pi/16)
const C6: f32 = 0.382683433; // cos(6*pi/16)
const Q2C6: f32 = 0.541196100; // sqrt(2) * cos(6*pi/16)
const Q2C2: f32 = 1.306562965; // sqrt(2) * cos(2*pi/16)

/// Transform one block of level-shifted samples and quantize with the
/// divisor table. Returns coefficients in natural order.
pub fn forward_dct_quantize(samples: &[f32; 64], divisors: &[f32; 64]) -> Block {
    let mut data = *samples;

    // Rows
    for row in 0..8 {
        fdct_1d(&mut data, row * 8, 1);
    }
    // Columns
    for col in 0..8 {
        fdct_1d(&mut data, col, 8);
    }

    let mut block: Block = [0; 64];
    for (i, out) in block.iter_mut().enumerate() {
        let scaled = data[i] * divisors[i];
        // Round half away from zero
        *out = if scaled > 0.0 { (scaled + 0.5) as i16 } else { (scaled - 0.5) as i16 };
    }
    block
}

/// One 8-point forward DCT over `data[offset + k*stride]`.
fn fdct_1d(data: &mut [f32; 64], offset: usize, stride: usize) {
    let at = |k: usize| offset + k * stride;
    let d0 = data[at(0)];
    let d1 = data[at(1)];
    let d2 = data[at(2)];
    let d3 = data[at(3)];
    let d4 = data[at(4)];
    let d5 = data[at(5)];
    let d6 = data[at(6)];
    let d7 = data[at(7)];

    let tmp0 = d0 + d7;
    let tmp7 = d0 - d7;
    let tmp1 = d1 + d6;
    let tmp6 = d1 - d6;
    let tmp2 = d2 + d5;
    let tmp5 = d2 - d5;
    let tmp3 = d3 + d4;
    let tmp4 = d3 - d4;

    // Even part
    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    data[at(0)] = tmp10 + tmp11;
    data[at(4)] = tmp10 - tmp11;

    let z1 = (tmp12 + tmp13) * C4;
    data[at(2)] = tmp13 + z1;
    data[at(6)] = tmp13 - z1;

    // Odd part
    let tmp10 = tmp4 + tmp5;
    let tmp11 = tmp5 + tmp6;
    let tmp12 = tmp6 + tmp7;

    let z5 = (tmp10 - tmp12) * C6;
    let z2 = Q2C6 * tmp10 + z5;
    let z4 = Q2C2 * tmp12 + z5;
    let z3 = tmp11 * C4;

    let z11 = tmp7 + z3;
    let z13 = tmp7 - z3;

    data[at(5)] = z13 + z2;
    data[at(3)] = z13 - z2;
    data[at(1)] = z11 + z4;
    data[at(7)] = z11 - z4;
}
