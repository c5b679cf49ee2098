use clap::Parser;

mod cli;
mod commands;

use cli::{CliArgs, Commands};
use commands::CliError;

pub type CliResult<T> = std::result::Result<T, CliError>;

fn main() {
    env_logger::init();

    let args = CliArgs::parse();
    let result = match args.command {
        Commands::Hide(hide) => hide.run(),
        Commands::Unveil(unveil) => unveil.run(),
        Commands::Inspect(inspect) => inspect.run(),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }
}
