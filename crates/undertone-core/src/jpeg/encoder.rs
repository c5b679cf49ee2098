//! Baseline JPEG emission.
//!
//! Re-encodes a parsed frame from its (possibly mutated) quantized
//! blocks, or compresses raw RGBA pixels. Output is always a baseline,
//! non-subsampled (1x1) three-component YCbCr stream using the Annex
//! K.3 Huffman tables; chroma grids smaller than the luma grid are
//! upsampled by block replication.
//!
//! Re-encoding never rescales coefficients: the quantization tables in
//! the metadata go into DQT verbatim while the block data is emitted
//! as-is. Rescaling would silently flip embedded magnitude bits.

use log::debug;

use crate::error::{Error, Result};
use crate::jpeg::color::rgb_to_ycbcr;
use crate::jpeg::fdct::forward_dct_quantize;
use crate::jpeg::huffman::{
    bitcode, category, standard_tables, BitWriter, HuffmanEncoder,
};
use crate::jpeg::marker::Marker;
use crate::jpeg::parser::{Component, Jpeg};
use crate::jpeg::{quant, Block, ZIGZAG_TO_NATURAL};

/// Everything the emitter writes besides the coefficient data.
#[derive(Debug, Clone)]
pub struct EncoderMetadata {
    /// Luminance quantization table, natural order; written to DQT
    /// selector 0 verbatim.
    pub luma_table: [u16; 64],
    /// Chrominance quantization table, natural order; DQT selector 1.
    pub chroma_table: [u16; 64],
    pub comments: Vec<Vec<u8>>,
    /// APP1 payload after the "Exif\0\0" identifier.
    pub exif: Option<Vec<u8>>,
}

impl EncoderMetadata {
    /// Metadata with the given tables and nothing else.
    pub fn new(luma_table: [u16; 64], chroma_table: [u16; 64]) -> Self {
        EncoderMetadata { luma_table, chroma_table, comments: Vec::new(), exif: None }
    }

    /// Carry the comments and EXIF of a parsed image.
    pub fn with_metadata_from(mut self, jpeg: &Jpeg) -> Self {
        self.comments = jpeg.comments.clone();
        self.exif = jpeg.exif.clone();
        self
    }
}

/// Re-encode a parsed JPEG from its quantized blocks.
///
/// The luminance grid is emitted at `ceil(w/8) x ceil(h/8)` blocks;
/// chroma components are upsampled by block replication. `quality` is
/// informational here (the tables in `metadata` already reflect it).
pub fn encode_from_quantized(
    jpeg: &Jpeg,
    metadata: &EncoderMetadata,
    quality: u8,
) -> Result<Vec<u8>> {
    let frame = &jpeg.frame;
    let component_count = frame.components.len();
    if component_count != 1 && component_count != 3 {
        return Err(Error::UnsupportedMode { mode: "four-component re-encode" });
    }

    let cols = usize::from(frame.width).div_ceil(8);
    let rows = usize::from(frame.height).div_ceil(8);
    let luma = &frame.components[0];
    if luma.blocks_per_line < cols || luma.blocks_per_column < rows {
        // The embedding order is defined over the emitted luma grid, so
        // a luminance plane below full resolution cannot round-trip
        return Err(Error::UnsupportedMode { mode: "subsampled luminance" });
    }

    debug!(
        "re-encoding {}x{} ({} blocks) at quality {}",
        frame.width,
        frame.height,
        rows * cols,
        quality
    );

    let mut out = Vec::with_capacity(rows * cols * 48 + 1024);
    write_headers(&mut out, frame.width, frame.height, metadata);

    let [dc_luma_raw, ac_luma_raw, dc_chroma_raw, ac_chroma_raw] = standard_tables();
    let dc_luma = HuffmanEncoder::from_table(&dc_luma_raw)?;
    let ac_luma = HuffmanEncoder::from_table(&ac_luma_raw)?;
    let dc_chroma = HuffmanEncoder::from_table(&dc_chroma_raw)?;
    let ac_chroma = HuffmanEncoder::from_table(&ac_chroma_raw)?;

    let zero_block: Block = [0; 64];
    let cb = frame.components.get(1).map(|c| (c, replication(c, cols, rows)));
    let cr = frame.components.get(2).map(|c| (c, replication(c, cols, rows)));

    let mut writer = BitWriter::with_capacity(rows * cols * 24);
    let mut predictors = [0i16; 3];

    for row in 0..rows {
        for col in 0..cols {
            encode_block(&mut writer, luma.block(row, col), &dc_luma, &ac_luma, &mut predictors[0])?;

            for (slot, chroma) in [&cb, &cr].into_iter().enumerate() {
                let block = match chroma {
                    Some((component, (fx, fy))) => {
                        let src_row = (row / fy).min(component.blocks_per_column - 1);
                        let src_col = (col / fx).min(component.blocks_per_line - 1);
                        component.block(src_row, src_col)
                    }
                    None => &zero_block,
                };
                encode_block(&mut writer, block, &dc_chroma, &ac_chroma, &mut predictors[1 + slot])?;
            }
        }
    }

    out.extend_from_slice(&writer.into_bytes());
    put_marker(&mut out, Marker::EOI);
    Ok(out)
}

/// Compress RGBA pixels to a baseline JPEG.
///
/// The alpha channel is ignored. Edge blocks clamp-repeat the border
/// pixels.
pub fn encode_rgba(
    rgba: &[u8],
    width: u16,
    height: u16,
    quality: u8,
    comments: &[Vec<u8>],
    exif: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let w = usize::from(width);
    let h = usize::from(height);
    if w == 0 || h == 0 || rgba.len() != w * h * 4 {
        return Err(Error::InvalidStructure {
            reason: format!("RGBA buffer is {} bytes, expected {}", rgba.len(), w * h * 4),
        });
    }

    let quality = quality.clamp(1, 100);
    let tables = quant::build_tables(quality);
    let metadata = EncoderMetadata {
        luma_table: tables.luma,
        chroma_table: tables.chroma,
        comments: comments.to_vec(),
        exif: exif.map(|e| e.to_vec()),
    };

    let cols = w.div_ceil(8);
    let rows = h.div_ceil(8);
    let mut out = Vec::with_capacity(rows * cols * 48 + 1024);
    write_headers(&mut out, width, height, &metadata);

    let [dc_luma_raw, ac_luma_raw, dc_chroma_raw, ac_chroma_raw] = standard_tables();
    let dc_luma = HuffmanEncoder::from_table(&dc_luma_raw)?;
    let ac_luma = HuffmanEncoder::from_table(&ac_luma_raw)?;
    let dc_chroma = HuffmanEncoder::from_table(&dc_chroma_raw)?;
    let ac_chroma = HuffmanEncoder::from_table(&ac_chroma_raw)?;

    let mut writer = BitWriter::with_capacity(rows * cols * 24);
    let mut predictors = [0i16; 3];
    let mut y_block = [0f32; 64];
    let mut cb_block = [0f32; 64];
    let mut cr_block = [0f32; 64];

    for block_row in 0..rows {
        for block_col in 0..cols {
            for sy in 0..8 {
                for sx in 0..8 {
                    let px = (block_col * 8 + sx).min(w - 1);
                    let py = (block_row * 8 + sy).min(h - 1);
                    let i = (py * w + px) * 4;
                    let (y, cb, cr) = rgb_to_ycbcr(rgba[i], rgba[i + 1], rgba[i + 2]);
                    y_block[sy * 8 + sx] = y;
                    cb_block[sy * 8 + sx] = cb;
                    cr_block[sy * 8 + sx] = cr;
                }
            }

            let y_q = forward_dct_quantize(&y_block, &tables.luma_divisors);
            encode_block(&mut writer, &y_q, &dc_luma, &ac_luma, &mut predictors[0])?;
            let cb_q = forward_dct_quantize(&cb_block, &tables.chroma_divisors);
            encode_block(&mut writer, &cb_q, &dc_chroma, &ac_chroma, &mut predictors[1])?;
            let cr_q = forward_dct_quantize(&cr_block, &tables.chroma_divisors);
            encode_block(&mut writer, &cr_q, &dc_chroma, &ac_chroma, &mut predictors[2])?;
        }
    }

    out.extend_from_slice(&writer.into_bytes());
    put_marker(&mut out, Marker::EOI);
    Ok(out)
}

/// Blocks-per-axis replication factor for coercing a chroma grid to the
/// emitted 1x1 sampling.
fn replication(component: &Component, target_cols: usize, target_rows: usize) -> (usize, usize) {
    let fx = ((target_cols as f64 / component.blocks_per_line as f64).round() as usize).max(1);
    let fy = ((target_rows as f64 / component.blocks_per_column as f64).round() as usize).max(1);
    (fx, fy)
}

/// Emit one block: DC difference as category + bitcode, ACs run-length
/// coded in zigzag order with ZRL for 16-zero runs and a trailing EOB
/// unless position 63 is occupied.
fn encode_block(
    writer: &mut BitWriter,
    block: &Block,
    dc: &HuffmanEncoder,
    ac: &HuffmanEncoder,
    predictor: &mut i16,
) -> Result<()> {
    let dc_value = block[0];
    let diff = dc_value.wrapping_sub(*predictor);
    *predictor = dc_value;

    let size = category(diff);
    writer.write_symbol(size, dc)?;
    if size > 0 {
        writer.write_bits(bitcode(diff), size);
    }

    let mut zero_run = 0u8;
    for k in 1..64 {
        let value = block[ZIGZAG_TO_NATURAL[k]];
        if value == 0 {
            zero_run += 1;
            continue;
        }
        while zero_run >= 16 {
            writer.write_symbol(0xF0, ac)?; // ZRL
            zero_run -= 16;
        }
        let size = category(value);
        writer.write_symbol((zero_run << 4) | size, ac)?;
        writer.write_bits(bitcode(value), size);
        zero_run = 0;
    }
    if zero_run > 0 {
        writer.write_symbol(0x00, ac)?; // EOB
    }

    Ok(())
}

fn put_marker(out: &mut Vec<u8>, marker: Marker) {
    out.push(0xFF);
    out.push(marker.to_u8());
}

fn put_segment(out: &mut Vec<u8>, marker: Marker, payload: &[u8]) {
    put_marker(out, marker);
    let length = (payload.len() + 2) as u16;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(payload);
}

/// Everything from SOI through the SOS header.
fn write_headers(out: &mut Vec<u8>, width: u16, height: u16, metadata: &EncoderMetadata) {
    put_marker(out, Marker::SOI);

    // APP0 JFIF: version 1.1, aspect-ratio density 1x1, no thumbnail
    let mut app0 = Vec::with_capacity(14);
    app0.extend_from_slice(b"JFIF\0");
    app0.extend_from_slice(&[0x01, 0x01, 0x00]);
    app0.extend_from_slice(&1u16.to_be_bytes());
    app0.extend_from_slice(&1u16.to_be_bytes());
    app0.extend_from_slice(&[0x00, 0x00]);
    put_segment(out, Marker::APP(0), &app0);

    if let Some(exif) = &metadata.exif {
        let mut app1 = Vec::with_capacity(6 + exif.len());
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(exif);
        put_segment(out, Marker::APP(1), &app1);
    }

    for comment in &metadata.comments {
        put_segment(out, Marker::COM, comment);
    }

    // DQT: two 8-bit tables, selectors 0 and 1, zigzag order
    let mut dqt = Vec::with_capacity(130);
    dqt.push(0x00);
    for &v in &quant::to_zigzag(&metadata.luma_table) {
        dqt.push(v.min(255) as u8);
    }
    dqt.push(0x01);
    for &v in &quant::to_zigzag(&metadata.chroma_table) {
        dqt.push(v.min(255) as u8);
    }
    put_segment(out, Marker::DQT, &dqt);

    // SOF0: precision 8, three 1x1-sampled components
    let mut sof = Vec::with_capacity(15);
    sof.push(8);
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.push(3);
    sof.extend_from_slice(&[1, 0x11, 0]);
    sof.extend_from_slice(&[2, 0x11, 1]);
    sof.extend_from_slice(&[3, 0x11, 1]);
    put_segment(out, Marker::SOF(0), &sof);

    // DHT: the four Annex K.3 tables in one segment
    let tables = standard_tables();
    let mut dht = Vec::with_capacity(4 + 16 * 4 + 12 * 2 + 162 * 2);
    for (class_id, table) in
        [0x00u8, 0x10, 0x01, 0x11].into_iter().zip(tables.iter())
    {
        dht.push(class_id);
        dht.extend_from_slice(&table.code_lengths);
        dht.extend_from_slice(&table.values);
    }
    put_segment(out, Marker::DHT, &dht);

    // SOS: Y uses tables 0/0, chroma 1/1; full spectral range
    let sos = [3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 63, 0];
    put_segment(out, Marker::SOS, &sos);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::parser::parse;

    fn noise_rgba(width: u16, height: u16, seed: u64) -> Vec<u8> {
        let mut rng = fastrand::Rng::with_seed(seed);
        (0..usize::from(width) * usize::from(height) * 4).map(|_| rng.u8(..)).collect()
    }

    #[test]
    fn emitted_stream_has_framing() {
        let rgba = noise_rgba(16, 16, 7);
        let jpeg = encode_rgba(&rgba, 16, 16, 80, &[], None).unwrap();

        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
        assert!(jpeg.ends_with(&[0xFF, 0xD9]));
        // JFIF identifier right after APP0's length field
        assert_eq!(&jpeg[6..11], b"JFIF\0");
    }

    #[test]
    fn parser_accepts_own_output() {
        let rgba = noise_rgba(33, 17, 11);
        let bytes = encode_rgba(&rgba, 33, 17, 75, &[], None).unwrap();
        let jpeg = parse(&bytes).unwrap();

        assert_eq!(jpeg.frame.width, 33);
        assert_eq!(jpeg.frame.height, 17);
        assert_eq!(jpeg.frame.components.len(), 3);
        assert!(!jpeg.frame.progressive);
        // 33x17 → 5x3 blocks per component
        let luma = jpeg.luma();
        assert_eq!(luma.blocks_per_line, 5);
        assert_eq!(luma.blocks_per_column, 3);

        // The written DQT round-trips through the zigzag
        let tables = quant::build_tables(75);
        assert_eq!(jpeg.quant_tables[0], Some(tables.luma));
        assert_eq!(jpeg.quant_tables[1], Some(tables.chroma));
    }

    #[test]
    fn reencode_preserves_quantized_blocks() {
        let rgba = noise_rgba(40, 24, 23);
        let bytes = encode_rgba(&rgba, 40, 24, 85, &[], None).unwrap();
        let jpeg = parse(&bytes).unwrap();

        let metadata = EncoderMetadata::new(
            jpeg.quant_tables[0].unwrap(),
            jpeg.quant_tables[1].unwrap(),
        );
        let reencoded = encode_from_quantized(&jpeg, &metadata, 85).unwrap();
        let jpeg2 = parse(&reencoded).unwrap();

        assert_eq!(jpeg2.frame.width, jpeg.frame.width);
        assert_eq!(jpeg2.frame.height, jpeg.frame.height);
        for (a, b) in jpeg.frame.components.iter().zip(jpeg2.frame.components.iter()) {
            assert_eq!(a.blocks_per_line, b.blocks_per_line);
            assert_eq!(a.blocks_per_column, b.blocks_per_column);
            for row in 0..a.blocks_per_column {
                for col in 0..a.blocks_per_line {
                    assert_eq!(a.block(row, col), b.block(row, col), "block ({row},{col})");
                }
            }
        }
    }

    #[test]
    fn comments_and_exif_survive() {
        let rgba = noise_rgba(16, 16, 3);
        let exif = vec![0x4D, 0x4D, 0x00, 0x2A, 0, 0, 0, 8];
        let bytes = encode_rgba(
            &rgba,
            16,
            16,
            80,
            &[b"made with undertone".to_vec()],
            Some(&exif),
        )
        .unwrap();
        let jpeg = parse(&bytes).unwrap();

        assert_eq!(jpeg.comments, vec![b"made with undertone".to_vec()]);
        assert_eq!(jpeg.exif.as_deref(), Some(exif.as_slice()));
        assert!(jpeg.jfif.is_some());
    }

    #[test]
    fn block_emission_formats_runs() {
        let [dc_raw, ac_raw, _, _] = standard_tables();
        let dc = HuffmanEncoder::from_table(&dc_raw).unwrap();
        let ac = HuffmanEncoder::from_table(&ac_raw).unwrap();

        // A block whose only nonzero sits at zigzag 63: 62 zeros ahead
        // of it become 3 ZRLs plus a run of 14, and no EOB follows
        let mut block: Block = [0; 64];
        block[ZIGZAG_TO_NATURAL[63]] = 1;
        let mut writer = BitWriter::new();
        let mut predictor = 0;
        encode_block(&mut writer, &block, &dc, &ac, &mut predictor).unwrap();

        let mut expected = BitWriter::new();
        expected.write_symbol(0, &dc).unwrap();
        for _ in 0..3 {
            expected.write_symbol(0xF0, &ac).unwrap();
        }
        expected.write_symbol((14 << 4) | 1, &ac).unwrap();
        expected.write_bits(1, 1);
        assert_eq!(writer.into_bytes(), expected.into_bytes());

        // With the coefficient at 62 instead, an EOB closes the block
        let mut block: Block = [0; 64];
        block[ZIGZAG_TO_NATURAL[62]] = 1;
        let mut writer = BitWriter::new();
        let mut predictor = 0;
        encode_block(&mut writer, &block, &dc, &ac, &mut predictor).unwrap();

        let mut expected = BitWriter::new();
        expected.write_symbol(0, &dc).unwrap();
        for _ in 0..3 {
            expected.write_symbol(0xF0, &ac).unwrap();
        }
        expected.write_symbol((13 << 4) | 1, &ac).unwrap();
        expected.write_bits(1, 1);
        expected.write_symbol(0x00, &ac).unwrap();
        assert_eq!(writer.into_bytes(), expected.into_bytes());
    }
}
