//! High-level embed and extract operations.
//!
//! `embed` runs the whole pipeline: parse, pick a re-encode quality,
//! write the payload into the luminance coefficients and emit a fresh
//! baseline JPEG. `extract` parses and reads the payload back.

use log::debug;

use crate::error::{Error, Result};
use crate::jpeg::encoder::{encode_from_quantized, EncoderMetadata};
use crate::jpeg::parser::parse;
use crate::jpeg::quant::{self, CHROMA_BASE, LUMA_BASE};
use crate::options::EmbedOptions;
use crate::quality;
use crate::stego;

/// Statistics reported alongside an embedded image.
#[derive(Debug, Clone, Copy)]
pub struct EmbedStats {
    /// Coefficients carrying payload bits.
    pub coefficients_used: usize,
    /// Size of the input image in bytes.
    pub original_size: usize,
    /// Size of the produced image in bytes.
    pub final_size: usize,
    /// Quality the output was labeled with.
    pub quality_used: u8,
}

/// Result of a successful embed.
#[derive(Debug, Clone)]
pub struct EmbedOutput {
    pub image_bytes: Vec<u8>,
    pub stats: EmbedStats,
}

/// Hide `message` (UTF-8) inside `image`, returning the re-encoded
/// JPEG.
pub fn embed(image: &[u8], message: &str, options: &EmbedOptions) -> Result<EmbedOutput> {
    let mut jpeg = parse(image)?;

    let analysis = quality::analyze(&jpeg, options.max_file_size);
    let mut quality_used = options.quality.unwrap_or(analysis.recommended_quality).clamp(1, 100);
    if options.preserve_quality {
        quality_used = quality_used.max(analysis.estimated_quality);
    }
    debug!(
        "embedding {} message bytes, quality {} (estimated {}, {})",
        message.len(),
        quality_used,
        analysis.estimated_quality,
        analysis.strategy
    );

    // Adapted tables are written to DQT as-is; the coefficients below
    // are never rescaled to match them
    let source_luma = jpeg.quant_table_for(jpeg.luma()).copied().unwrap_or(LUMA_BASE);
    let source_chroma = jpeg
        .frame
        .components
        .get(1)
        .and_then(|c| jpeg.quant_table_for(c))
        .copied()
        .unwrap_or(CHROMA_BASE);
    let metadata = EncoderMetadata {
        luma_table: quant::scale_table(&source_luma, quality_used),
        chroma_table: quant::scale_table(&source_chroma, quality_used),
        comments: jpeg.comments.clone(),
        exif: jpeg.exif.clone(),
    };

    let report = stego::embed_message(jpeg.luma_mut(), &source_luma, message.as_bytes())?;
    let image_bytes = encode_from_quantized(&jpeg, &metadata, quality_used)?;

    Ok(EmbedOutput {
        stats: EmbedStats {
            coefficients_used: report.coefficients_used,
            original_size: image.len(),
            final_size: image_bytes.len(),
            quality_used,
        },
        image_bytes,
    })
}

/// Recover a message from `image`.
///
/// `expected_len` is the payload byte length the embedder was given.
/// Without it, the advisory capacity heuristic guesses a length; that
/// guess recovers garbage tails and exists for exploration only.
pub fn extract(image: &[u8], expected_len: Option<usize>) -> Result<String> {
    let jpeg = parse(image)?;

    let length = match expected_len {
        Some(length) => length,
        None => {
            let estimate = stego::capacity(&jpeg);
            estimate.plain_estimate_bytes.min(estimate.capacity_bytes)
        }
    };

    let payload = stego::extract_message(jpeg.luma(), length)?;
    String::from_utf8(payload).map_err(|_| Error::InvalidUtf8)
}
