//! Configuration for parsing and embedding.

/// Resource and strictness knobs for the parser.
///
/// The memory budget is charged by every large allocation the parser
/// makes (block grids, table storage) and is scoped to a single parse
/// call; there is no global state.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Upper bound on bytes the parser may allocate for decoded state.
    pub max_memory_bytes: usize,
    /// Upper bound on `width * height` of the frame.
    pub max_resolution_pixels: usize,
    /// When set, an entropy decode failure mid-scan keeps the blocks
    /// decoded so far instead of failing the whole parse. Structural
    /// errors stay fatal.
    pub tolerant: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_memory_bytes: 512 * 1024 * 1024,
            max_resolution_pixels: 100_000_000,
            tolerant: false,
        }
    }
}

/// Options accepted by the embed orchestrator.
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    /// Forces the re-encode quality (1..=100). When unset the quality
    /// analyzer picks one.
    pub quality: Option<u8>,
    /// Floor the chosen quality at the estimated source quality.
    pub preserve_quality: bool,
    /// Target output size hint; biases the quality chooser.
    pub max_file_size: Option<usize>,
}
