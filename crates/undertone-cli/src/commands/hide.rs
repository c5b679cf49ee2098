use std::fs;
use std::path::PathBuf;

use clap::Args;
use undertone_core::EmbedOptions;

use crate::CliResult;

/// Hides a text message in a baseline JPEG image
#[derive(Args, Debug)]
pub struct HideArgs {
    /// Cover JPEG image, used readonly.
    #[arg(short = 'i', long = "in", value_name = "image", required = true)]
    pub image: PathBuf,

    /// The stego image will be stored as this file
    #[arg(short = 'o', long = "out", value_name = "output image", required = true)]
    pub write_to_file: PathBuf,

    /// A text message that will be hidden
    #[arg(short, long, value_name = "text message", required = true)]
    pub message: String,

    /// Re-encode quality (1-100); picked automatically when omitted
    #[arg(long, value_name = "quality", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Never drop below the estimated quality of the cover
    #[arg(long)]
    pub preserve_quality: bool,

    /// Target output size hint in bytes
    #[arg(long, value_name = "bytes")]
    pub max_file_size: Option<usize>,
}

impl HideArgs {
    pub fn run(self) -> CliResult<()> {
        let cover = fs::read(&self.image)?;

        let options = EmbedOptions {
            quality: self.quality,
            preserve_quality: self.preserve_quality,
            max_file_size: self.max_file_size,
        };
        let output = undertone_core::embed(&cover, &self.message, &options)?;

        fs::write(&self.write_to_file, &output.image_bytes)?;

        println!(
            "hidden {} bytes in {} coefficients ({} -> {} bytes, quality {})",
            self.message.len(),
            output.stats.coefficients_used,
            output.stats.original_size,
            output.stats.final_size,
            output.stats.quality_used,
        );
        println!("remember the message length: unveil needs --length {}", self.message.len());
        Ok(())
    }
}
