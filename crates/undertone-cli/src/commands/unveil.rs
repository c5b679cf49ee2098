use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::CliResult;

/// Recovers a hidden text message from a stego JPEG
#[derive(Args, Debug)]
pub struct UnveilArgs {
    /// Stego JPEG image, used readonly.
    #[arg(short = 'i', long = "in", value_name = "image", required = true)]
    pub image: PathBuf,

    /// Message length in bytes, as reported by hide
    #[arg(short, long, value_name = "bytes")]
    pub length: Option<usize>,

    /// Write the message to a file instead of stdout
    #[arg(short = 'o', long = "out", value_name = "output file")]
    pub write_to_file: Option<PathBuf>,
}

impl UnveilArgs {
    pub fn run(self) -> CliResult<()> {
        let stego = fs::read(&self.image)?;
        let message = undertone_core::extract(&stego, self.length)?;

        match &self.write_to_file {
            Some(path) => fs::write(path, message.as_bytes())?,
            None => println!("{message}"),
        }
        Ok(())
    }
}
