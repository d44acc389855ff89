use std::path::PathBuf;

use clap::Parser;

/// Prints information about WebP image.
#[derive(Debug, Parser)]
#[non_exhaustive]
pub struct InfoArgs {
    /// Input file
    pub input: PathBuf,
    /// Treat recoverable anomalies of the input as errors
    #[arg(long)]
    pub strict: bool,
}
