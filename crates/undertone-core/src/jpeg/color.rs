//! Color space conversion and the pixel rendering path.
//!
//! The embedding pipeline never leaves the coefficient domain; pixel
//! output exists for callers that want to preview a carrier and for the
//! raw-pixel encode path. Component planes are upsampled to the frame
//! resolution by nearest neighbor.

use crate::error::{Error, Result};
use crate::jpeg::idct::dequantize_and_idct;
use crate::jpeg::parser::{Component, Jpeg};

/// Color layout of rendered pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// One byte per pixel.
    Grayscale,
    /// Three bytes per pixel.
    Rgb,
    /// Four bytes per pixel.
    Cmyk,
}

impl ColorSpace {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorSpace::Grayscale => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

/// Rendered image data.
#[derive(Debug, Clone)]
pub struct Pixels {
    pub width: u16,
    pub height: u16,
    pub color_space: ColorSpace,
    pub data: Vec<u8>,
}

/// Convert one RGB pixel to YCbCr (BT.601), returning the luma already
/// level-shifted by -128 so the triple can feed the forward DCT.
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = f32::from(r);
    let g = f32::from(g);
    let b = f32::from(b);
    let y = 0.299 * r + 0.587 * g + 0.114 * b - 128.0;
    let cb = -0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y, cb, cr)
}

/// Convert one YCbCr pixel to RGB with 16-bit fixed point.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = (i32::from(y) << 16) + 32768;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    let r = y + 91881 * cr;
    let g = y - 22554 * cb - 46802 * cr;
    let b = y + 116130 * cb;

    (clamp8(r >> 16), clamp8(g >> 16), clamp8(b >> 16))
}

#[inline]
fn clamp8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

struct Plane {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

/// Run the IDCT over every block of a component, producing its sample
/// plane at the component's own resolution.
fn component_plane(component: &Component, qtable: &[u16; 64]) -> Plane {
    let width = component.blocks_per_line * 8;
    let height = component.blocks_per_column * 8;
    let mut data = vec![0u8; width * height];
    let mut samples = [0u8; 64];

    for row in 0..component.blocks_per_column {
        for col in 0..component.blocks_per_line {
            dequantize_and_idct(component.block(row, col), qtable, &mut samples);
            for y in 0..8 {
                let dst = (row * 8 + y) * width + col * 8;
                data[dst..dst + 8].copy_from_slice(&samples[y * 8..y * 8 + 8]);
            }
        }
    }

    Plane { width, height, data }
}

/// Decode the frame to pixels: IDCT, nearest-neighbor upsampling and
/// color conversion keyed off the component count and the Adobe
/// transform flag.
pub fn render(jpeg: &Jpeg) -> Result<Pixels> {
    let frame = &jpeg.frame;
    let width = usize::from(frame.width);
    let height = usize::from(frame.height);
    let max_h = usize::from(frame.max_h);
    let max_v = usize::from(frame.max_v);

    let mut planes = Vec::with_capacity(frame.components.len());
    for component in &frame.components {
        let qtable = jpeg.quant_tables[usize::from(component.quant_table_index)]
            .as_ref()
            .ok_or_else(|| Error::InvalidStructure {
                reason: format!(
                    "component {} references missing quantization table {}",
                    component.id, component.quant_table_index
                ),
            })?;
        planes.push(component_plane(component, qtable));
    }

    let sample = |ci: usize, x: usize, y: usize| -> u8 {
        let component = &frame.components[ci];
        let plane = &planes[ci];
        let sx = (x * usize::from(component.horizontal_sampling) / max_h).min(plane.width - 1);
        let sy = (y * usize::from(component.vertical_sampling) / max_v).min(plane.height - 1);
        plane.data[sy * plane.width + sx]
    };

    match frame.components.len() {
        1 => {
            let mut data = Vec::with_capacity(width * height);
            for y in 0..height {
                for x in 0..width {
                    data.push(sample(0, x, y));
                }
            }
            Ok(Pixels { width: frame.width, height: frame.height, color_space: ColorSpace::Grayscale, data })
        }
        3 => {
            // Adobe transform 0 marks component data that is already RGB
            let already_rgb = jpeg.adobe.as_ref().map(|a| a.transform == 0).unwrap_or(false);
            let mut data = Vec::with_capacity(width * height * 3);
            for y in 0..height {
                for x in 0..width {
                    let c0 = sample(0, x, y);
                    let c1 = sample(1, x, y);
                    let c2 = sample(2, x, y);
                    let (r, g, b) =
                        if already_rgb { (c0, c1, c2) } else { ycbcr_to_rgb(c0, c1, c2) };
                    data.push(r);
                    data.push(g);
                    data.push(b);
                }
            }
            Ok(Pixels { width: frame.width, height: frame.height, color_space: ColorSpace::Rgb, data })
        }
        4 => {
            // Adobe transform 2 is YCCK; anything else is raw CMYK
            let ycck = jpeg.adobe.as_ref().map(|a| a.transform == 2).unwrap_or(false);
            let mut data = Vec::with_capacity(width * height * 4);
            for y in 0..height {
                for x in 0..width {
                    let c0 = sample(0, x, y);
                    let c1 = sample(1, x, y);
                    let c2 = sample(2, x, y);
                    let k = sample(3, x, y);
                    let (c, m, ye) = if ycck {
                        let (r, g, b) = ycbcr_to_rgb(c0, c1, c2);
                        (255 - r, 255 - g, 255 - b)
                    } else {
                        (c0, c1, c2)
                    };
                    data.push(c);
                    data.push(m);
                    data.push(ye);
                    data.push(k);
                }
            }
            Ok(Pixels { width: frame.width, height: frame.height, color_space: ColorSpace::Cmyk, data })
        }
        n => Err(Error::InvalidStructure { reason: format!("unsupported component count {n}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_gray() {
        assert_eq!(ycbcr_to_rgb(0, 128, 128), (0, 0, 0));
        assert_eq!(ycbcr_to_rgb(128, 128, 128), (128, 128, 128));
        assert_eq!(ycbcr_to_rgb(255, 128, 128), (255, 255, 255));
    }

    #[test]
    fn primaries_roundtrip_within_tolerance() {
        for (r, g, b) in [
            (255u8, 0u8, 0u8),
            (0, 255, 0),
            (0, 0, 255),
            (255, 255, 255),
            (0, 0, 0),
            (12, 200, 90),
        ] {
            let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
            let y8 = (y + 128.0).round().clamp(0.0, 255.0) as u8;
            let cb8 = (cb + 128.0).round().clamp(0.0, 255.0) as u8;
            let cr8 = (cr + 128.0).round().clamp(0.0, 255.0) as u8;
            let (r2, g2, b2) = ycbcr_to_rgb(y8, cb8, cr8);
            assert!(
                (i32::from(r) - i32::from(r2)).abs() <= 2
                    && (i32::from(g) - i32::from(g2)).abs() <= 2
                    && (i32::from(b) - i32::from(b2)).abs() <= 2,
                "({r},{g},{b}) came back as ({r2},{g2},{b2})"
            );
        }
    }

    #[test]
    fn gray_has_neutral_chroma() {
        for v in [0u8, 64, 128, 255] {
            let (y, cb, cr) = rgb_to_ycbcr(v, v, v);
            assert!((y - (f32::from(v) - 128.0)).abs() < 0.5);
            assert!(cb.abs() < 0.5);
            assert!(cr.abs() < 0.5);
        }
    }
}
