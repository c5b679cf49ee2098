//! JPEG parsing.
//!
//! Walks the marker stream, collects the tables and metadata needed for
//! re-encoding, and decodes every scan into per-component grids of
//! quantized coefficient blocks. Keeping the quantized blocks (instead
//! of discarding them after the IDCT) is what the embedding layer
//! operates on.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::jpeg::color::{self, Pixels};
use crate::jpeg::huffman::HuffmanTable;
use crate::jpeg::marker::Marker;
use crate::jpeg::scan::{self, ScanInfo};
use crate::jpeg::{Block, ZIGZAG_TO_NATURAL};
use crate::options::ParserOptions;

/// JFIF (APP0) header fields.
#[derive(Debug, Clone)]
pub struct JfifHeader {
    pub major: u8,
    pub minor: u8,
    pub density_units: u8,
    pub x_density: u16,
    pub y_density: u16,
}

/// Adobe (APP14) header fields. The transform flag drives the color
/// interpretation of 3- and 4-component frames.
#[derive(Debug, Clone)]
pub struct AdobeHeader {
    pub version: u8,
    pub flags0: u16,
    pub flags1: u16,
    pub transform: u8,
}

/// One frame component and its decoded coefficient grid.
///
/// The grid is padded out to whole MCUs (`grid_width` x `grid_height`
/// blocks); `blocks_per_line` / `blocks_per_column` are the counts that
/// actually cover the image and are the bounds every consumer iterates.
#[derive(Debug, Clone)]
pub struct Component {
    pub id: u8,
    pub horizontal_sampling: u8,
    pub vertical_sampling: u8,
    pub quant_table_index: u8,
    pub dc_table_index: u8,
    pub ac_table_index: u8,
    pub blocks_per_line: usize,
    pub blocks_per_column: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub blocks: Vec<Block>,
}

impl Component {
    /// Coefficient block at a grid position, natural order.
    #[inline]
    pub fn block(&self, row: usize, col: usize) -> &Block {
        &self.blocks[row * self.grid_width + col]
    }

    #[inline]
    pub fn block_mut(&mut self, row: usize, col: usize) -> &mut Block {
        &mut self.blocks[row * self.grid_width + col]
    }
}

/// Frame header (SOF) plus derived MCU geometry.
#[derive(Debug, Clone)]
pub struct Frame {
    pub precision: u8,
    pub width: u16,
    pub height: u16,
    pub progressive: bool,
    pub max_h: u8,
    pub max_v: u8,
    pub mcus_per_line: usize,
    pub mcus_per_column: usize,
    pub components: Vec<Component>,
}

/// A fully parsed JPEG: frame, coefficient grids, tables and metadata.
#[derive(Debug, Clone)]
pub struct Jpeg {
    pub frame: Frame,
    /// Quantization tables in natural order, indexed by table id.
    pub quant_tables: [Option<[u16; 64]>; 4],
    pub dc_tables: [Option<HuffmanTable>; 4],
    pub ac_tables: [Option<HuffmanTable>; 4],
    pub restart_interval: u16,
    pub jfif: Option<JfifHeader>,
    pub adobe: Option<AdobeHeader>,
    /// Raw APP1 payload after the "Exif\0\0" identifier.
    pub exif: Option<Vec<u8>>,
    pub comments: Vec<Vec<u8>>,
}

impl Jpeg {
    /// The luminance component (first in the frame).
    pub fn luma(&self) -> &Component {
        &self.frame.components[0]
    }

    pub fn luma_mut(&mut self) -> &mut Component {
        &mut self.frame.components[0]
    }

    /// Quantization table referenced by a component.
    pub fn quant_table_for(&self, component: &Component) -> Option<&[u16; 64]> {
        self.quant_tables[usize::from(component.quant_table_index)].as_ref()
    }

    /// Render the frame to pixels (IDCT + upsampling + color convert).
    pub fn pixels(&self) -> Result<Pixels> {
        color::render(self)
    }
}

/// Parse a JPEG with default options.
pub fn parse(data: &[u8]) -> Result<Jpeg> {
    parse_with_options(data, &ParserOptions::default())
}

/// Parse a JPEG with explicit resource limits and strictness.
pub fn parse_with_options(data: &[u8], options: &ParserOptions) -> Result<Jpeg> {
    Parser::new(data, options).parse()
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    options: &'a ParserOptions,
    /// Bytes charged against the memory budget; scoped to this call.
    allocated_bytes: usize,
    frame: Option<Frame>,
    quant_tables: [Option<[u16; 64]>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    restart_interval: u16,
    jfif: Option<JfifHeader>,
    adobe: Option<AdobeHeader>,
    exif: Option<Vec<u8>>,
    comments: Vec<Vec<u8>>,
    scans_decoded: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8], options: &'a ParserOptions) -> Self {
        Parser {
            data,
            pos: 0,
            options,
            allocated_bytes: 0,
            frame: None,
            quant_tables: [None, None, None, None],
            dc_tables: [None, None, None, None],
            ac_tables: [None, None, None, None],
            restart_interval: 0,
            jfif: None,
            adobe: None,
            exif: None,
            comments: Vec::new(),
            scans_decoded: 0,
        }
    }

    fn parse(mut self) -> Result<Jpeg> {
        if self.data.len() < 2 || self.data[0] != 0xFF || self.data[1] != 0xD8 {
            return Err(Error::MissingSoi);
        }
        self.pos = 2;

        loop {
            let marker = match self.read_marker() {
                Ok(marker) => marker,
                Err(Error::UnexpectedEof { offset }) => {
                    if self.scans_decoded > 0 {
                        warn!("missing EOI marker");
                        break;
                    }
                    if self.frame.is_none() {
                        // Cut off before any frame header: report the
                        // frame as absent, not the truncation
                        break;
                    }
                    return Err(Error::UnexpectedEof { offset });
                }
                Err(e) => return Err(e),
            };

            match marker {
                Marker::EOI => break,

                Marker::SOF(0) | Marker::SOF(1) => self.parse_sof(false)?,
                Marker::SOF(2) => self.parse_sof(true)?,
                Marker::SOF(3) | Marker::SOF(7) | Marker::SOF(11) | Marker::SOF(15) => {
                    return Err(Error::UnsupportedMode { mode: "lossless" });
                }
                Marker::SOF(9) | Marker::SOF(10) | Marker::SOF(13) | Marker::SOF(14) => {
                    return Err(Error::UnsupportedMode { mode: "arithmetic coding" });
                }
                Marker::SOF(_) => {
                    return Err(Error::UnsupportedMode { mode: "differential" });
                }
                Marker::DAC => return Err(Error::UnsupportedMode { mode: "arithmetic coding" }),
                Marker::DHP | Marker::EXP => {
                    return Err(Error::UnsupportedMode { mode: "hierarchical" });
                }

                Marker::DQT => self.parse_dqt()?,
                Marker::DHT => self.parse_dht()?,
                Marker::DRI => self.parse_dri()?,
                Marker::SOS => self.parse_scan()?,

                Marker::APP(0) => self.parse_app0()?,
                Marker::APP(1) => self.parse_app1()?,
                Marker::APP(14) => self.parse_app14()?,
                Marker::APP(n) => {
                    let payload = self.segment(Marker::APP(n))?;
                    debug!("skipping APP{n} segment ({} bytes)", payload.len());
                }
                Marker::COM => {
                    let payload = self.segment(Marker::COM)?;
                    self.comments.push(payload.to_vec());
                }
                Marker::DNL => {
                    let _ = self.segment(Marker::DNL)?;
                }

                Marker::SOI | Marker::TEM | Marker::RST(_) => {
                    return Err(Error::UnexpectedMarker {
                        marker: marker.to_u8(),
                        offset: self.pos,
                    });
                }
            }
        }

        let frame = self.frame.ok_or(Error::MissingSof)?;
        if self.scans_decoded == 0 {
            return Err(Error::InvalidStructure { reason: "no scan data before EOI".to_string() });
        }

        Ok(Jpeg {
            frame,
            quant_tables: self.quant_tables,
            dc_tables: self.dc_tables,
            ac_tables: self.ac_tables,
            restart_interval: self.restart_interval,
            jfif: self.jfif,
            adobe: self.adobe,
            exif: self.exif,
            comments: self.comments,
        })
    }

    /// Charge an allocation against the per-call memory budget.
    fn charge(&mut self, bytes: usize) -> Result<()> {
        self.allocated_bytes = self.allocated_bytes.saturating_add(bytes);
        if self.allocated_bytes > self.options.max_memory_bytes {
            return Err(Error::ResourceLimitExceeded {
                requested: self.allocated_bytes,
                limit: self.options.max_memory_bytes,
            });
        }
        Ok(())
    }

    /// Advance to the next marker. Fill bytes are skipped; garbage
    /// between segments is scanned over.
    fn read_marker(&mut self) -> Result<Marker> {
        loop {
            while self.pos < self.data.len() && self.data[self.pos] != 0xFF {
                self.pos += 1;
            }
            while self.pos < self.data.len() && self.data[self.pos] == 0xFF {
                self.pos += 1;
            }
            let offset = self.pos;
            let byte =
                *self.data.get(self.pos).ok_or(Error::UnexpectedEof { offset })?;
            self.pos += 1;
            if byte == 0x00 {
                // Stray stuffing outside entropy data; keep scanning
                continue;
            }
            return Marker::from_u8(byte).ok_or(Error::UnknownMarker { marker: byte, offset });
        }
    }

    /// Read a marker segment's payload (length-prefixed).
    fn segment(&mut self, marker: Marker) -> Result<&'a [u8]> {
        let offset = self.pos;
        if self.pos + 2 > self.data.len() {
            return Err(Error::TruncatedSegment { marker: marker.to_u8(), offset });
        }
        let length =
            usize::from(u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]));
        if length < 2 {
            return Err(Error::InvalidStructure {
                reason: format!("segment length {length} too small"),
            });
        }
        let end = self.pos + length;
        if end > self.data.len() {
            return Err(Error::TruncatedSegment { marker: marker.to_u8(), offset });
        }
        let payload = &self.data[self.pos + 2..end];
        self.pos = end;
        Ok(payload)
    }

    fn parse_app0(&mut self) -> Result<()> {
        let payload = self.segment(Marker::APP(0))?;
        if payload.len() >= 14 && &payload[0..5] == b"JFIF\0" {
            self.jfif = Some(JfifHeader {
                major: payload[5],
                minor: payload[6],
                density_units: payload[7],
                x_density: u16::from_be_bytes([payload[8], payload[9]]),
                y_density: u16::from_be_bytes([payload[10], payload[11]]),
            });
        }
        Ok(())
    }

    fn parse_app1(&mut self) -> Result<()> {
        let payload = self.segment(Marker::APP(1))?;
        if payload.len() > 6 && &payload[0..5] == b"Exif\0" {
            self.charge(payload.len() - 6)?;
            self.exif = Some(payload[6..].to_vec());
        }
        Ok(())
    }

    fn parse_app14(&mut self) -> Result<()> {
        let payload = self.segment(Marker::APP(14))?;
        if payload.len() >= 12 && &payload[0..6] == b"Adobe\0" {
            self.adobe = Some(AdobeHeader {
                version: payload[6],
                flags0: u16::from_be_bytes([payload[7], payload[8]]),
                flags1: u16::from_be_bytes([payload[9], payload[10]]),
                transform: payload[11],
            });
        }
        Ok(())
    }

    fn parse_dqt(&mut self) -> Result<()> {
        let offset = self.pos;
        let payload = self.segment(Marker::DQT)?;
        let mut pos = 0;

        while pos < payload.len() {
            let pq_tq = payload[pos];
            let precision = pq_tq >> 4;
            let id = pq_tq & 0x0F;
            pos += 1;

            if id > 3 {
                return Err(Error::InvalidStructure {
                    reason: format!("invalid quantization table id {id}"),
                });
            }
            let entry_size = if precision == 0 { 1 } else { 2 };
            if pos + 64 * entry_size > payload.len() {
                return Err(Error::TruncatedSegment { marker: Marker::DQT.to_u8(), offset });
            }

            // Wire order is zigzag; store natural
            let mut values = [0u16; 64];
            for zz in 0..64 {
                let value = if precision == 0 {
                    u16::from(payload[pos])
                } else {
                    u16::from_be_bytes([payload[pos], payload[pos + 1]])
                };
                values[ZIGZAG_TO_NATURAL[zz]] = value;
                pos += entry_size;
            }

            self.charge(128)?;
            self.quant_tables[usize::from(id)] = Some(values);
        }

        Ok(())
    }

    fn parse_dht(&mut self) -> Result<()> {
        let offset = self.pos;
        let payload = self.segment(Marker::DHT)?;
        let mut pos = 0;

        while pos < payload.len() {
            let tc_th = payload[pos];
            let class = tc_th >> 4;
            let id = tc_th & 0x0F;
            pos += 1;

            if class > 1 || id > 3 {
                return Err(Error::InvalidStructure {
                    reason: format!("invalid Huffman table class {class} id {id}"),
                });
            }
            if pos + 16 > payload.len() {
                return Err(Error::TruncatedSegment { marker: Marker::DHT.to_u8(), offset });
            }

            let mut code_lengths = [0u8; 16];
            code_lengths.copy_from_slice(&payload[pos..pos + 16]);
            pos += 16;

            let total: usize = code_lengths.iter().map(|&n| usize::from(n)).sum();
            if pos + total > payload.len() {
                return Err(Error::TruncatedSegment { marker: Marker::DHT.to_u8(), offset });
            }
            self.charge(16 + total)?;

            let table = HuffmanTable { code_lengths, values: payload[pos..pos + total].to_vec() };
            pos += total;

            if class == 0 {
                self.dc_tables[usize::from(id)] = Some(table);
            } else {
                self.ac_tables[usize::from(id)] = Some(table);
            }
        }

        Ok(())
    }

    fn parse_dri(&mut self) -> Result<()> {
        let offset = self.pos;
        let payload = self.segment(Marker::DRI)?;
        if payload.len() < 2 {
            return Err(Error::TruncatedSegment { marker: Marker::DRI.to_u8(), offset });
        }
        self.restart_interval = u16::from_be_bytes([payload[0], payload[1]]);
        debug!("restart interval {}", self.restart_interval);
        Ok(())
    }

    fn parse_sof(&mut self, progressive: bool) -> Result<()> {
        let offset = self.pos;
        let payload = self.segment(Marker::SOF(if progressive { 2 } else { 0 }))?;
        if self.frame.is_some() {
            return Err(Error::InvalidStructure { reason: "multiple frame headers".to_string() });
        }
        if payload.len() < 6 {
            return Err(Error::TruncatedSegment { marker: 0xC0, offset });
        }

        let precision = payload[0];
        if precision != 8 {
            return Err(Error::UnsupportedMode { mode: "12-bit precision" });
        }

        let height = u16::from_be_bytes([payload[1], payload[2]]);
        let width = u16::from_be_bytes([payload[3], payload[4]]);
        if width == 0 || height == 0 {
            return Err(Error::InvalidStructure { reason: "zero frame dimension".to_string() });
        }
        let pixels = usize::from(width) * usize::from(height);
        if pixels > self.options.max_resolution_pixels {
            return Err(Error::ResourceLimitExceeded {
                requested: pixels,
                limit: self.options.max_resolution_pixels,
            });
        }

        let component_count = usize::from(payload[5]);
        if component_count == 0 || payload.len() < 6 + component_count * 3 {
            return Err(Error::TruncatedSegment { marker: 0xC0, offset });
        }

        let mut components = Vec::with_capacity(component_count);
        for i in 0..component_count {
            let base = 6 + i * 3;
            let sampling = payload[base + 1];
            let h = sampling >> 4;
            let v = sampling & 0x0F;
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(Error::InvalidSamplingFactor { factor: sampling });
            }
            components.push(Component {
                id: payload[base],
                horizontal_sampling: h,
                vertical_sampling: v,
                quant_table_index: payload[base + 2],
                dc_table_index: 0,
                ac_table_index: 0,
                blocks_per_line: 0,
                blocks_per_column: 0,
                grid_width: 0,
                grid_height: 0,
                blocks: Vec::new(),
            });
        }

        let max_h = components.iter().map(|c| c.horizontal_sampling).max().unwrap_or(1);
        let max_v = components.iter().map(|c| c.vertical_sampling).max().unwrap_or(1);
        let mcus_per_line = ceil_div(usize::from(width), 8 * usize::from(max_h));
        let mcus_per_column = ceil_div(usize::from(height), 8 * usize::from(max_v));

        let mut grid_bytes = 0usize;
        for component in &mut components {
            let h = usize::from(component.horizontal_sampling);
            let v = usize::from(component.vertical_sampling);
            component.blocks_per_line =
                ceil_div(ceil_div(usize::from(width), 8) * h, usize::from(max_h));
            component.blocks_per_column =
                ceil_div(ceil_div(usize::from(height), 8) * v, usize::from(max_v));
            component.grid_width = mcus_per_line * h;
            component.grid_height = mcus_per_column * v;
            grid_bytes = grid_bytes
                .saturating_add(component.grid_width * component.grid_height * 64 * 2);
        }
        self.charge(grid_bytes)?;
        for component in &mut components {
            component.blocks = vec![[0i16; 64]; component.grid_width * component.grid_height];
        }

        debug!(
            "{}x{} {} frame, {} components, {}x{} MCUs",
            width,
            height,
            if progressive { "progressive" } else { "baseline" },
            components.len(),
            mcus_per_line,
            mcus_per_column
        );

        self.frame = Some(Frame {
            precision,
            width,
            height,
            progressive,
            max_h,
            max_v,
            mcus_per_line,
            mcus_per_column,
            components,
        });
        Ok(())
    }

    fn parse_scan(&mut self) -> Result<()> {
        let payload = self.segment(Marker::SOS)?;
        let scan = {
            let frame = self.frame.as_mut().ok_or(Error::MissingSof)?;

            if payload.is_empty() {
                return Err(Error::InvalidStructure { reason: "empty SOS header".to_string() });
            }
            let component_count = usize::from(payload[0]);
            if component_count == 0 || payload.len() < 1 + component_count * 2 + 3 {
                return Err(Error::InvalidStructure { reason: "short SOS header".to_string() });
            }

            let mut indices = Vec::with_capacity(component_count);
            for i in 0..component_count {
                let base = 1 + i * 2;
                let component_id = payload[base];
                let tables = payload[base + 1];
                let index = frame
                    .components
                    .iter()
                    .position(|c| c.id == component_id)
                    .ok_or_else(|| Error::InvalidStructure {
                        reason: format!("scan references unknown component {component_id}"),
                    })?;
                frame.components[index].dc_table_index = tables >> 4;
                frame.components[index].ac_table_index = tables & 0x0F;
                indices.push(index);
            }

            let base = 1 + component_count * 2;
            let spectral_start = payload[base];
            let spectral_end = payload[base + 1];
            let approx = payload[base + 2];
            if spectral_start > 63 || spectral_end > 63 || spectral_start > spectral_end {
                return Err(Error::InvalidStructure {
                    reason: format!("invalid spectral range {spectral_start}..{spectral_end}"),
                });
            }

            ScanInfo {
                component_indices: indices,
                spectral_start,
                spectral_end,
                approx_high: approx >> 4,
                approx_low: approx & 0x0F,
            }
        };

        let entropy = self.entropy_slice();
        let frame = self.frame.as_mut().ok_or(Error::MissingSof)?;
        match scan::decode_scan(
            frame,
            &self.dc_tables,
            &self.ac_tables,
            entropy,
            &scan,
            self.restart_interval,
        ) {
            Ok(()) => {}
            Err(e) if self.options.tolerant && e.is_entropy() => {
                warn!("tolerant mode: keeping partial scan after {e}");
            }
            Err(e) => return Err(e),
        }
        self.scans_decoded += 1;
        Ok(())
    }

    /// Slice the entropy-coded data of the current scan: everything up
    /// to the next marker that is neither stuffing nor a restart.
    fn entropy_slice(&mut self) -> &'a [u8] {
        let data = self.data;
        let start = self.pos;
        let mut i = start;
        while i + 1 < data.len() {
            if data[i] != 0xFF {
                i += 1;
            } else {
                match data[i + 1] {
                    0x00 => i += 2,
                    0xFF => i += 1,
                    0xD0..=0xD7 => i += 2,
                    _ => break,
                }
            }
        }
        if i + 1 >= data.len() {
            i = data.len();
        }
        self.pos = i;
        &data[start..i]
    }
}

#[inline]
fn ceil_div(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}
