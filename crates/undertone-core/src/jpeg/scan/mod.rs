//! Entropy-coded scan decoding.
//!
//! Decodes scan data into per-component coefficient grids without
//! dequantization or IDCT, so the quantized values can be mutated and
//! re-encoded losslessly.

mod baseline;
mod progressive;

use crate::error::{Error, Result};
use crate::jpeg::huffman::{BitReader, HuffmanLookup, HuffmanTable};
use crate::jpeg::parser::Frame;

/// Parameters of one SOS scan.
#[derive(Debug, Clone)]
pub(crate) struct ScanInfo {
    /// Indices into `frame.components`, in scan order.
    pub component_indices: Vec<usize>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approx_high: u8,
    pub approx_low: u8,
}

/// Decode one scan into the frame's coefficient grids.
pub(crate) fn decode_scan(
    frame: &mut Frame,
    dc_tables: &[Option<HuffmanTable>; 4],
    ac_tables: &[Option<HuffmanTable>; 4],
    data: &[u8],
    scan: &ScanInfo,
    restart_interval: u16,
) -> Result<()> {
    let mut dc_lookups: [Option<HuffmanLookup>; 4] = [None, None, None, None];
    let mut ac_lookups: [Option<HuffmanLookup>; 4] = [None, None, None, None];
    for (slot, table) in dc_lookups.iter_mut().zip(dc_tables.iter()) {
        if let Some(table) = table {
            *slot = Some(HuffmanLookup::from_table(table)?);
        }
    }
    for (slot, table) in ac_lookups.iter_mut().zip(ac_tables.iter()) {
        if let Some(table) = table {
            *slot = Some(HuffmanLookup::from_table(table)?);
        }
    }

    let restart_interval = usize::from(restart_interval);
    if frame.progressive {
        progressive::decode(frame, &dc_lookups, &ac_lookups, data, scan, restart_interval)
    } else {
        baseline::decode(frame, &dc_lookups, &ac_lookups, data, scan, restart_interval)
    }
}

/// Fetch a built lookup table or fail with the table's role.
pub(crate) fn lookup<'a>(
    lookups: &'a [Option<HuffmanLookup>; 4],
    index: u8,
    class: &str,
) -> Result<&'a HuffmanLookup> {
    lookups[usize::from(index)].as_ref().ok_or_else(|| Error::InvalidStructure {
        reason: format!("missing {class} Huffman table {index}"),
    })
}

/// Consume the RST marker expected at a restart boundary.
pub(crate) fn expect_restart(reader: &mut BitReader) -> Result<()> {
    match reader.take_marker() {
        Some(m) if (0xD0..=0xD7).contains(&m) => Ok(()),
        Some(m) => Err(Error::UnexpectedMarker { marker: m, offset: reader.position() }),
        None => Err(Error::UnexpectedEof { offset: reader.position() }),
    }
}
