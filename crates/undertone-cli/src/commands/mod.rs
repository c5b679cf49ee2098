pub mod hide;
pub mod inspect;
pub mod unveil;

use thiserror::Error;
use undertone_core::Error as CoreError;

/// CLI-level error: core failures plus file I/O.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code: 2 unrecognized input, 3 insufficient
    /// capacity, 4 extraction failed, 5 resource limit.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(CoreError::InsufficientCapacity { .. }) => 3,
            CliError::Core(CoreError::ExtractionIncomplete { .. })
            | CliError::Core(CoreError::InvalidUtf8) => 4,
            CliError::Core(CoreError::ResourceLimitExceeded { .. }) => 5,
            CliError::Core(_) => 2,
            CliError::Io(_) => 1,
        }
    }
}
