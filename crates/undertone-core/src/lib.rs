//! Steganography for baseline JPEG images at the DCT coefficient level.
//!
//! Payloads are hidden in the least-significant bit of quantized
//! luminance AC coefficient magnitudes and survive the full
//! decode→modify→encode→decode round trip because the embedder and the
//! extractor traverse the exact same coefficient positions in the same
//! order.
//!
//! # High-level API
//!
//! ```ignore
//! use undertone_core::{embed, extract, EmbedOptions};
//!
//! let cover = std::fs::read("cover.jpg")?;
//! let output = embed(&cover, "meet at noon", &EmbedOptions::default())?;
//! std::fs::write("stego.jpg", &output.image_bytes)?;
//!
//! let stego = std::fs::read("stego.jpg")?;
//! let message = extract(&stego, Some("meet at noon".len()))?;
//! ```
//!
//! # Low-level API
//!
//! The codec pieces are public for callers that want coefficient
//! access:
//!
//! ```ignore
//! use undertone_core::jpeg::{encoder, parser};
//!
//! let mut jpeg = parser::parse(&cover)?;
//! undertone_core::stego::embed_message(jpeg.luma_mut(), &table, b"payload")?;
//! let bytes = encoder::encode_from_quantized(&jpeg, &metadata, 80)?;
//! ```

pub mod error;
pub mod jpeg;
pub mod ops;
pub mod options;
pub mod quality;
pub mod stego;

pub use error::{Error, Result};
pub use jpeg::encoder::{encode_from_quantized, encode_rgba, EncoderMetadata};
pub use jpeg::parser::{parse, parse_with_options, Jpeg};
pub use ops::{embed, extract, EmbedOutput, EmbedStats};
pub use options::{EmbedOptions, ParserOptions};
pub use quality::{analyze, QualityAnalysis, Strategy};
