//! Source quality estimation and re-encode quality selection.
//!
//! The estimate reads the luminance quantization table back through the
//! standard scaling curve; the recommendation layers simple heuristics
//! (source fidelity, high-frequency activity, an optional size target)
//! on top and produces the adapted tables the encoder writes verbatim.

use std::fmt;

use log::debug;

use crate::jpeg::parser::Jpeg;
use crate::jpeg::quant::{self, CHROMA_BASE, LUMA_BASE};
use crate::jpeg::ZIGZAG_TO_NATURAL;

/// Number of luminance blocks sampled for high-frequency activity.
const HF_SAMPLE_BLOCKS: usize = 512;

/// First zigzag position counted as "high frequency".
const HF_START: usize = 32;

/// Label for how the recommended quality was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SizeOptimized,
    QualityOptimized,
    DetailPreserving,
    ArtifactMinimizing,
    Adaptive,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strategy::SizeOptimized => "size-optimized",
            Strategy::QualityOptimized => "quality-optimized",
            Strategy::DetailPreserving => "detail-preserving",
            Strategy::ArtifactMinimizing => "artifact-minimizing",
            Strategy::Adaptive => "adaptive",
        };
        f.write_str(label)
    }
}

/// Result of analyzing a parsed image.
#[derive(Debug, Clone)]
pub struct QualityAnalysis {
    /// Source quality read back from the luminance table (1..=100).
    pub estimated_quality: u8,
    /// Quality the re-encoder should use (25..=95).
    pub recommended_quality: u8,
    pub avg_quant_luma: f32,
    pub max_quant_luma: u16,
    pub avg_quant_chroma: f32,
    /// Mean absolute coefficient sum over zigzag positions 32..63,
    /// sampled across luminance blocks.
    pub hf_activity: f32,
    pub strategy: Strategy,
    /// Source luminance table rescaled to the recommended quality.
    pub luma_table: [u16; 64],
    /// Source chrominance table rescaled to the recommended quality.
    pub chroma_table: [u16; 64],
}

/// Analyze a parsed image and pick re-encoding parameters.
pub fn analyze(jpeg: &Jpeg, max_file_size: Option<usize>) -> QualityAnalysis {
    let luma_table = jpeg
        .quant_table_for(jpeg.luma())
        .copied()
        .unwrap_or(LUMA_BASE);
    let chroma_table = jpeg
        .frame
        .components
        .get(1)
        .and_then(|c| jpeg.quant_table_for(c))
        .copied()
        .unwrap_or(CHROMA_BASE);

    let avg_quant_luma = luma_table.iter().map(|&v| f32::from(v)).sum::<f32>() / 64.0;
    let max_quant_luma = luma_table.iter().copied().max().unwrap_or(1);
    let avg_quant_chroma = chroma_table.iter().map(|&v| f32::from(v)).sum::<f32>() / 64.0;

    // Invert the scaling curve around the Annex K table: an average of
    // 1 reads as quality 100, the base table's own average as 50
    let base_max = f32::from(LUMA_BASE.iter().copied().max().unwrap_or(121));
    let estimate = (100.0 - (avg_quant_luma - 1.0) / (base_max - 1.0) * 50.0).clamp(1.0, 100.0);
    let estimated_quality = estimate.round() as u8;

    let hf_activity = high_frequency_activity(jpeg);

    let high_quality = estimated_quality > 70 && max_quant_luma < 50;
    let has_fine_details = hf_activity > 10.0;

    let mut recommended = i32::from(if high_quality {
        estimated_quality.saturating_sub(10).max(75)
    } else if estimated_quality < 40 {
        estimated_quality.saturating_add(5).max(30)
    } else {
        estimated_quality
    });
    if has_fine_details {
        recommended += 5;
    }

    let mut strategy = if has_fine_details {
        Strategy::DetailPreserving
    } else if estimated_quality < 40 {
        Strategy::ArtifactMinimizing
    } else {
        Strategy::Adaptive
    };

    // A size target is compared against the uncompressed RGB footprint
    if let Some(target) = max_file_size {
        let raw_size = usize::from(jpeg.frame.width) * usize::from(jpeg.frame.height) * 3;
        if target < raw_size / 20 {
            recommended -= 20;
            strategy = Strategy::SizeOptimized;
        } else if target < raw_size / 10 {
            recommended -= 10;
            strategy = Strategy::SizeOptimized;
        } else if target > raw_size / 2 {
            recommended += 10;
            strategy = Strategy::QualityOptimized;
        }
    }

    let recommended_quality = recommended.clamp(25, 95) as u8;

    debug!(
        "quality analysis: estimate {estimated_quality}, hf {hf_activity:.1}, \
         recommended {recommended_quality} ({strategy})"
    );

    QualityAnalysis {
        estimated_quality,
        recommended_quality,
        avg_quant_luma,
        max_quant_luma,
        avg_quant_chroma,
        hf_activity,
        strategy,
        luma_table: quant::scale_table(&luma_table, recommended_quality),
        chroma_table: quant::scale_table(&chroma_table, recommended_quality),
    }
}

/// Mean absolute coefficient magnitude in the high-frequency band,
/// over a bounded sample of luminance blocks spread across the image.
fn high_frequency_activity(jpeg: &Jpeg) -> f32 {
    let luma = jpeg.luma();
    let rows = luma.blocks_per_column;
    let cols = luma.blocks_per_line;
    let total = rows * cols;
    if total == 0 {
        return 0.0;
    }

    let step = (total / HF_SAMPLE_BLOCKS).max(1);
    let mut sampled = 0usize;
    let mut sum = 0u64;
    let mut index = 0usize;
    while index < total {
        let block = luma.block(index / cols, index % cols);
        for &zz in &ZIGZAG_TO_NATURAL[HF_START..] {
            sum += u64::from(block[zz].unsigned_abs());
        }
        sampled += 1;
        index += step;
    }

    sum as f32 / sampled as f32
}
