//! Sequential (baseline) scan decoding.

use super::{expect_restart, lookup, ScanInfo};
use crate::error::{Error, Result};
use crate::jpeg::huffman::{BitReader, HuffmanLookup};
use crate::jpeg::parser::Frame;
use crate::jpeg::{Block, ZIGZAG_TO_NATURAL};

/// Decode a baseline scan, interleaved or single-component.
pub(crate) fn decode(
    frame: &mut Frame,
    dc_lookups: &[Option<HuffmanLookup>; 4],
    ac_lookups: &[Option<HuffmanLookup>; 4],
    data: &[u8],
    scan: &ScanInfo,
    restart_interval: usize,
) -> Result<()> {
    let mut reader = BitReader::new(data);
    let mut predictors = vec![0i16; scan.component_indices.len()];

    if scan.component_indices.len() == 1 {
        // Non-interleaved: the MCU is a single block and iteration
        // covers only the blocks inside the image
        let component = &mut frame.components[scan.component_indices[0]];
        let dc = lookup(dc_lookups, component.dc_table_index, "DC")?;
        let ac = lookup(ac_lookups, component.ac_table_index, "AC")?;

        let mut count = 0usize;
        for row in 0..component.blocks_per_column {
            for col in 0..component.blocks_per_line {
                if restart_interval > 0 && count > 0 && count % restart_interval == 0 {
                    expect_restart(&mut reader)?;
                    predictors[0] = 0;
                }
                decode_block(
                    &mut reader,
                    component.block_mut(row, col),
                    dc,
                    ac,
                    &mut predictors[0],
                )?;
                count += 1;
            }
        }
        return Ok(());
    }

    let mcus = frame.mcus_per_line * frame.mcus_per_column;
    for mcu in 0..mcus {
        if restart_interval > 0 && mcu > 0 && mcu % restart_interval == 0 {
            expect_restart(&mut reader)?;
            predictors.fill(0);
        }

        let mcu_row = mcu / frame.mcus_per_line;
        let mcu_col = mcu % frame.mcus_per_line;

        for (slot, &index) in scan.component_indices.iter().enumerate() {
            let component = &mut frame.components[index];
            let dc = lookup(dc_lookups, component.dc_table_index, "DC")?;
            let ac = lookup(ac_lookups, component.ac_table_index, "AC")?;
            let h = usize::from(component.horizontal_sampling);
            let v = usize::from(component.vertical_sampling);

            for vb in 0..v {
                for hb in 0..h {
                    let row = mcu_row * v + vb;
                    let col = mcu_col * h + hb;
                    let grid_width = component.grid_width;
                    decode_block(
                        &mut reader,
                        &mut component.blocks[row * grid_width + col],
                        dc,
                        ac,
                        &mut predictors[slot],
                    )?;
                }
            }
        }
    }

    Ok(())
}

/// Decode one 8x8 block: DC difference, then run-length coded ACs.
/// Coefficients land in natural order through the zigzag permutation.
fn decode_block(
    reader: &mut BitReader,
    block: &mut Block,
    dc: &HuffmanLookup,
    ac: &HuffmanLookup,
    predictor: &mut i16,
) -> Result<()> {
    block.fill(0);

    let category = reader.decode_symbol(dc)?;
    if category > 11 {
        return Err(Error::InvalidHuffmanCode { offset: reader.position() });
    }
    let diff = reader.receive_extend(category)?;
    *predictor = predictor.wrapping_add(diff);
    block[0] = *predictor;

    let mut k = 1;
    while k < 64 {
        let rs = reader.decode_symbol(ac)?;
        let size = rs & 0x0F;
        let run = rs >> 4;

        if size == 0 {
            if run == 0 {
                break; // EOB
            }
            if run == 15 {
                k += 16; // ZRL
                continue;
            }
            return Err(Error::InvalidHuffmanCode { offset: reader.position() });
        }

        k += usize::from(run);
        if k >= 64 {
            return Err(Error::InvalidHuffmanCode { offset: reader.position() });
        }
        block[ZIGZAG_TO_NATURAL[k]] = reader.receive_extend(size)?;
        k += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::huffman::{standard_tables, BitWriter, HuffmanEncoder, HuffmanLookup};

    fn std_lookups() -> (HuffmanLookup, HuffmanLookup, HuffmanEncoder, HuffmanEncoder) {
        let [dc_raw, ac_raw, _, _] = standard_tables();
        (
            HuffmanLookup::from_table(&dc_raw).unwrap(),
            HuffmanLookup::from_table(&ac_raw).unwrap(),
            HuffmanEncoder::from_table(&dc_raw).unwrap(),
            HuffmanEncoder::from_table(&ac_raw).unwrap(),
        )
    }

    #[test]
    fn all_zero_block() {
        let (dc, ac, dc_enc, ac_enc) = std_lookups();

        // DC category 0 followed by EOB
        let mut writer = BitWriter::new();
        writer.write_symbol(0, &dc_enc).unwrap();
        writer.write_symbol(0x00, &ac_enc).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut block: Block = [1; 64];
        let mut predictor = 0i16;
        decode_block(&mut reader, &mut block, &dc, &ac, &mut predictor).unwrap();

        assert_eq!(block, [0i16; 64]);
        assert_eq!(predictor, 0);
    }

    #[test]
    fn dc_difference_accumulates() {
        let (dc, ac, dc_enc, ac_enc) = std_lookups();

        let mut writer = BitWriter::new();
        for diff in [5i16, -3] {
            let size = crate::jpeg::huffman::category(diff);
            writer.write_symbol(size, &dc_enc).unwrap();
            writer.write_bits(crate::jpeg::huffman::bitcode(diff), size);
            writer.write_symbol(0x00, &ac_enc).unwrap();
        }
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut block: Block = [0; 64];
        let mut predictor = 0i16;

        decode_block(&mut reader, &mut block, &dc, &ac, &mut predictor).unwrap();
        assert_eq!(block[0], 5);
        decode_block(&mut reader, &mut block, &dc, &ac, &mut predictor).unwrap();
        assert_eq!(block[0], 2, "second DC is predictor 5 plus diff -3");
    }

    #[test]
    fn ac_run_lengths_and_zigzag_placement() {
        let (dc, ac, dc_enc, ac_enc) = std_lookups();

        // DC 0; run of 2 zeros then amplitude 7 at zigzag position 3;
        // ZRL; amplitude -1 at zigzag position 20; EOB
        let mut writer = BitWriter::new();
        writer.write_symbol(0, &dc_enc).unwrap();
        writer.write_symbol((2 << 4) | 3, &ac_enc).unwrap();
        writer.write_bits(7, 3);
        writer.write_symbol(0xF0, &ac_enc).unwrap();
        writer.write_symbol(1, &ac_enc).unwrap();
        writer.write_bits(0, 1); // bitcode(-1)
        writer.write_symbol(0x00, &ac_enc).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut block: Block = [0; 64];
        let mut predictor = 0i16;
        decode_block(&mut reader, &mut block, &dc, &ac, &mut predictor).unwrap();

        assert_eq!(block[ZIGZAG_TO_NATURAL[3]], 7);
        assert_eq!(block[ZIGZAG_TO_NATURAL[20]], -1);
        let nonzero = block.iter().filter(|&&c| c != 0).count();
        assert_eq!(nonzero, 2);
    }

    #[test]
    fn overlong_run_is_invalid() {
        let (dc, ac, dc_enc, ac_enc) = std_lookups();

        // DC 0, three ZRLs (position 49), then a run of 15 that lands
        // past position 63
        let mut writer = BitWriter::new();
        writer.write_symbol(0, &dc_enc).unwrap();
        for _ in 0..3 {
            writer.write_symbol(0xF0, &ac_enc).unwrap();
        }
        writer.write_symbol((15 << 4) | 1, &ac_enc).unwrap();
        writer.write_bits(1, 1);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut block: Block = [0; 64];
        let mut predictor = 0i16;
        let result = decode_block(&mut reader, &mut block, &dc, &ac, &mut predictor);
        assert!(matches!(result, Err(Error::InvalidHuffmanCode { .. })));
    }
}
