use std::fs;
use std::path::PathBuf;

use clap::Args;
use undertone_core::jpeg::parser::parse;
use undertone_core::{analyze, stego};

use crate::CliResult;

/// Shows carrier properties: geometry, quality estimate and capacity
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// JPEG image, used readonly.
    #[arg(short = 'i', long = "in", value_name = "image", required = true)]
    pub image: PathBuf,

    /// Also dump the quantization tables
    #[arg(long)]
    pub tables: bool,
}

impl InspectArgs {
    pub fn run(self) -> CliResult<()> {
        let data = fs::read(&self.image)?;
        let jpeg = parse(&data)?;

        println!("{}", self.image.display());
        println!(
            "  {}x{} pixels, {} ({} components)",
            jpeg.frame.width,
            jpeg.frame.height,
            if jpeg.frame.progressive { "progressive" } else { "baseline" },
            jpeg.frame.components.len(),
        );
        for component in &jpeg.frame.components {
            println!(
                "  component {}: sampling {}x{}, {}x{} blocks, quant table {}",
                component.id,
                component.horizontal_sampling,
                component.vertical_sampling,
                component.blocks_per_line,
                component.blocks_per_column,
                component.quant_table_index,
            );
        }
        if let Some(jfif) = &jpeg.jfif {
            println!("  JFIF {}.{}", jfif.major, jfif.minor);
        }
        if jpeg.exif.is_some() {
            println!("  EXIF present");
        }
        for comment in &jpeg.comments {
            println!("  comment: {}", String::from_utf8_lossy(comment));
        }

        let analysis = analyze(&jpeg, None);
        println!(
            "  estimated quality {}, recommended re-encode {} ({})",
            analysis.estimated_quality, analysis.recommended_quality, analysis.strategy,
        );
        println!("  high-frequency activity {:.1}", analysis.hf_activity);

        let capacity = stego::capacity(&jpeg);
        println!(
            "  capacity: {} bytes exact ({} usable coefficients), {} plain / {} weighted estimate",
            capacity.capacity_bytes,
            capacity.usable_coefficients,
            capacity.plain_estimate_bytes,
            capacity.weighted_estimate_bytes,
        );

        if self.tables {
            for (id, table) in jpeg.quant_tables.iter().enumerate() {
                if let Some(table) = table {
                    println!("  quantization table {id}:");
                    print!("{}", ascii_table(table));
                }
            }
        }

        Ok(())
    }
}

/// Format a natural-order table as an 8x8 grid.
fn ascii_table(values: &[u16; 64]) -> String {
    let mut out = String::new();
    for row in 0..8 {
        out.push_str("   ");
        for col in 0..8 {
            out.push_str(&format!(" {:4}", values[row * 8 + col]));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_table_is_eight_rows() {
        let table = [16u16; 64];
        let rendered = ascii_table(&table);
        assert_eq!(rendered.lines().count(), 8);
        assert!(rendered.contains("  16"));
    }
}
