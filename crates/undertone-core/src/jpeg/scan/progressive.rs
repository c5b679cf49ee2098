//! Progressive scan decoding.
//!
//! A progressive frame spreads each block over several scans: DC first,
//! DC refinements, then AC bands with successive approximation. Every
//! scan folds more bits into the same coefficient grids, so after the
//! last scan the grids hold exactly what a baseline decode would have
//! produced.

use super::{expect_restart, lookup, ScanInfo};
use crate::error::{Error, Result};
use crate::jpeg::huffman::{BitReader, HuffmanLookup};
use crate::jpeg::parser::Frame;
use crate::jpeg::{Block, ZIGZAG_TO_NATURAL};

pub(crate) fn decode(
    frame: &mut Frame,
    dc_lookups: &[Option<HuffmanLookup>; 4],
    ac_lookups: &[Option<HuffmanLookup>; 4],
    data: &[u8],
    scan: &ScanInfo,
    restart_interval: usize,
) -> Result<()> {
    if scan.spectral_start == 0 {
        decode_dc_scan(frame, dc_lookups, data, scan, restart_interval)
    } else {
        decode_ac_scan(frame, ac_lookups, data, scan, restart_interval)
    }
}

/// DC scans cover all components of the scan interleaved, like a
/// baseline scan restricted to coefficient 0.
fn decode_dc_scan(
    frame: &mut Frame,
    dc_lookups: &[Option<HuffmanLookup>; 4],
    data: &[u8],
    scan: &ScanInfo,
    restart_interval: usize,
) -> Result<()> {
    let mut reader = BitReader::new(data);
    let mut predictors = vec![0i16; scan.component_indices.len()];
    let refining = scan.approx_high > 0;
    let al = scan.approx_low;

    if scan.component_indices.len() == 1 {
        let component = &mut frame.components[scan.component_indices[0]];
        let dc = if refining {
            None
        } else {
            Some(lookup(dc_lookups, component.dc_table_index, "DC")?)
        };

        let mut count = 0usize;
        for row in 0..component.blocks_per_column {
            for col in 0..component.blocks_per_line {
                if restart_interval > 0 && count > 0 && count % restart_interval == 0 {
                    expect_restart(&mut reader)?;
                    predictors[0] = 0;
                }
                let block = component.block_mut(row, col);
                match dc {
                    Some(table) => decode_dc_first(&mut reader, block, table, &mut predictors[0], al)?,
                    None => decode_dc_refine(&mut reader, block, al)?,
                }
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
            let table = if refining {
                None
            } else {
                Some(lookup(dc_lookups, component.dc_table_index, "DC")?)
            };
            let h = usize::from(component.horizontal_sampling);
            let v = usize::from(component.vertical_sampling);

            for vb in 0..v {
                for hb in 0..h {
                    let row = mcu_row * v + vb;
                    let col = mcu_col * h + hb;
                    let grid_width = component.grid_width;
                    let block = &mut component.blocks[row * grid_width + col];
                    match table {
                        Some(table) => {
                            decode_dc_first(&mut reader, block, table, &mut predictors[slot], al)?
                        }
                        None => decode_dc_refine(&mut reader, block, al)?,
                    }
                }
            }
        }
    }

    Ok(())
}

/// AC scans are always non-interleaved: one component, one band.
fn decode_ac_scan(
    frame: &mut Frame,
    ac_lookups: &[Option<HuffmanLookup>; 4],
    data: &[u8],
    scan: &ScanInfo,
    restart_interval: usize,
) -> Result<()> {
    if scan.component_indices.len() != 1 {
        return Err(Error::InvalidStructure {
            reason: "interleaved AC scan in progressive frame".to_string(),
        });
    }

    let mut reader = BitReader::new(data);
    let component = &mut frame.components[scan.component_indices[0]];
    let ac = lookup(ac_lookups, component.ac_table_index, "AC")?;
    let ss = usize::from(scan.spectral_start);
    let se = usize::from(scan.spectral_end);
    let refining = scan.approx_high > 0;
    let al = scan.approx_low;
    let mut eob_run = 0u32;

    let mut count = 0usize;
    for row in 0..component.blocks_per_column {
        for col in 0..component.blocks_per_line {
            if restart_interval > 0 && count > 0 && count % restart_interval == 0 {
                expect_restart(&mut reader)?;
                eob_run = 0;
            }
            let block = component.block_mut(row, col);
            if refining {
                decode_ac_refine(&mut reader, block, ac, ss, se, al, &mut eob_run)?;
            } else {
                decode_ac_first(&mut reader, block, ac, ss, se, al, &mut eob_run)?;
            }
            count += 1;
        }
    }

    Ok(())
}

fn decode_dc_first(
    reader: &mut BitReader,
    block: &mut Block,
    table: &HuffmanLookup,
    predictor: &mut i16,
    al: u8,
) -> Result<()> {
    let category = reader.decode_symbol(table)?;
    if category > 11 {
        return Err(Error::InvalidHuffmanCode { offset: reader.position() });
    }
    let diff = if category == 0 { 0 } else { reader.receive_extend(category)? };
    *predictor = predictor.wrapping_add(diff);
    block[0] = predictor.wrapping_shl(u32::from(al));
    Ok(())
}

fn decode_dc_refine(reader: &mut BitReader, block: &mut Block, al: u8) -> Result<()> {
    if reader.read_bit()? == 1 {
        block[0] |= 1i16.wrapping_shl(u32::from(al));
    }
    Ok(())
}

fn decode_ac_first(
    reader: &mut BitReader,
    block: &mut Block,
    table: &HuffmanLookup,
    ss: usize,
    se: usize,
    al: u8,
    eob_run: &mut u32,
) -> Result<()> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }

    let mut k = ss;
    while k <= se {
        let rs = reader.decode_symbol(table)?;
        let size = rs & 0x0F;
        let run = rs >> 4;

        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            // EOBn: this block is done and the next 2^run - 1 (+ extra
            // bits) blocks have no coefficients in this band
            *eob_run = (1 << run) - 1;
            if run > 0 {
                *eob_run += u32::from(reader.read_bits(run)?);
            }
            break;
        }

        k += usize::from(run);
        if k > se {
            return Err(Error::InvalidHuffmanCode { offset: reader.position() });
        }
        let value = reader.receive_extend(size)?;
        block[ZIGZAG_TO_NATURAL[k]] = value.wrapping_shl(u32::from(al));
        k += 1;
    }

    Ok(())
}

fn decode_ac_refine(
    reader: &mut BitReader,
    block: &mut Block,
    table: &HuffmanLookup,
    ss: usize,
    se: usize,
    al: u8,
    eob_run: &mut u32,
) -> Result<()> {
    let bit = 1i16.wrapping_shl(u32::from(al));

    if *eob_run > 0 {
        *eob_run -= 1;
        refine_non_zeroes(reader, block, ss, se, 64, bit)?;
        return Ok(());
    }

    let mut k = ss;
    while k <= se {
        let rs = reader.decode_symbol(table)?;
        let size = rs & 0x0F;
        let run = rs >> 4;

        let mut zero_run = usize::from(run);
        let mut value = 0i16;
        match size {
            0 => {
                if run != 15 {
                    *eob_run = (1 << run) - 1;
                    if run > 0 {
                        *eob_run += u32::from(reader.read_bits(run)?);
                    }
                    // Refine every remaining nonzero in the band
                    zero_run = 64;
                }
            }
            1 => {
                value = if reader.read_bit()? == 1 { bit } else { -bit };
            }
            _ => return Err(Error::InvalidHuffmanCode { offset: reader.position() }),
        }

        k = refine_non_zeroes(reader, block, k, se, zero_run, bit)?;
        if value != 0 {
            block[ZIGZAG_TO_NATURAL[k]] = value;
        }
        k += 1;
    }

    Ok(())
}

/// Walk the band from `start`, refining already-nonzero coefficients
/// and counting down `zero_run` zero-history positions. Returns the
/// position where the walk stopped (a zero slot for the new value, or
/// the band end).
fn refine_non_zeroes(
    reader: &mut BitReader,
    block: &mut Block,
    start: usize,
    end: usize,
    mut zero_run: usize,
    bit: i16,
) -> Result<usize> {
    for k in start..=end {
        let index = ZIGZAG_TO_NATURAL[k];
        if block[index] == 0 {
            if zero_run == 0 {
                return Ok(k);
            }
            zero_run -= 1;
        } else if reader.read_bit()? == 1 && block[index] & bit == 0 {
            if block[index] >= 0 {
                block[index] += bit;
            } else {
                block[index] -= bit;
            }
        }
    }
    Ok(end)
}
