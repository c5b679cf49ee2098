//! Error types for parsing, re-encoding and embedding.

use std::fmt;
use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the codec and the embedding pipeline.
///
/// Parser errors are fatal to the current call; nothing is retried
/// internally. Resource-limit errors leave the process healthy, the
/// accounting counter is scoped to a single parse call.
#[derive(Error)]
pub enum Error {
    /// Input does not start with the SOI marker.
    #[error("not a JPEG file (missing SOI marker)")]
    MissingSoi,

    /// No frame header was seen before the scan or the end of the image.
    #[error("no frame header (SOF) found")]
    MissingSof,

    /// A marker byte outside the recognized set.
    #[error("unknown marker 0xFF{marker:02X} at offset {offset}")]
    UnknownMarker { marker: u8, offset: usize },

    /// A segment claimed more payload than the file contains.
    #[error("truncated segment for marker 0xFF{marker:02X} at offset {offset}")]
    TruncatedSegment { marker: u8, offset: usize },

    /// Arithmetic coding, hierarchical mode, lossless mode or 12-bit
    /// precision.
    #[error("unsupported JPEG mode: {mode}")]
    UnsupportedMode { mode: &'static str },

    /// Component sampling factor outside 1..=4.
    #[error("invalid sampling factor {factor}")]
    InvalidSamplingFactor { factor: u8 },

    /// Entropy-coded data did not match any Huffman code.
    #[error("invalid Huffman code near offset {offset}")]
    InvalidHuffmanCode { offset: usize },

    /// Ran out of bytes mid-structure.
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// A marker interrupted the entropy-coded segment mid-symbol.
    #[error("unexpected marker 0xFF{marker:02X} inside entropy data at offset {offset}")]
    UnexpectedMarker { marker: u8, offset: usize },

    /// An allocation or the frame resolution went over the configured
    /// budget.
    #[error("resource limit exceeded: requested {requested}, limit {limit}")]
    ResourceLimitExceeded { requested: usize, limit: usize },

    /// The carrier ran out of usable coefficients while embedding.
    #[error("insufficient capacity: embedded {embedded} of {message_len} message bytes")]
    InsufficientCapacity { embedded: usize, message_len: usize },

    /// The carrier ran out of usable coefficients while extracting.
    #[error("extraction incomplete: recovered {extracted} of {expected} bytes")]
    ExtractionIncomplete { extracted: usize, expected: usize },

    /// The extracted payload is not valid UTF-8.
    #[error("embedded payload is not valid UTF-8")]
    InvalidUtf8,

    /// A structurally invalid segment payload.
    #[error("invalid JPEG structure: {reason}")]
    InvalidStructure { reason: String },
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Display for Debug so unwrap() shows user-friendly messages
        write!(f, "{self}")
    }
}

impl Error {
    /// True for failures that only corrupt the entropy-coded data, not
    /// the surrounding structure. Tolerant parsing may skip past these.
    pub(crate) fn is_entropy(&self) -> bool {
        matches!(
            self,
            Error::InvalidHuffmanCode { .. }
                | Error::UnexpectedEof { .. }
                | Error::UnexpectedMarker { .. }
        )
    }
}
