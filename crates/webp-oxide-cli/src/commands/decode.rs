use std::path::PathBuf;

use clap::Parser;
use webp_oxide::OutputColorMode;

#[derive(Debug, Parser)]
#[non_exhaustive]
pub struct DecodeArgs {
    /// Output file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Input file
    pub input: PathBuf,
    /// Format to output
    #[arg(value_enum, short = 'f', long, default_value_t = OutputFormat::Png)]
    pub output_format: OutputFormat,
    /// Pixel layout to decode to; RGBA if the image has alpha, RGB otherwise if not specified
    #[arg(value_enum, long)]
    pub mode: Option<ColorMode>,
    /// Treat recoverable anomalies of the input as errors
    #[arg(long)]
    pub strict: bool,
    /// Upsample chroma with nearest neighbor instead of bilinear filter
    #[arg(long)]
    pub nearest_upsampling: bool,
    /// Maximum number of pixels of the image
    #[arg(long)]
    pub max_pixels: Option<u64>,
    /// Approximate memory limit, in bytes
    #[arg(long)]
    pub max_memory: Option<usize>,
    /// Number of parallelism to use
    #[arg(short = 'j', long = "threads")]
    pub num_threads: Option<usize>,
    /// Number of repetitions, used for benchmarking
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub num_reps: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// PNG, 8-bit RGB or RGBA.
    Png,
    /// Decoded pixels without any header.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Argb,
    RgbaPremultiplied,
    BgraPremultiplied,
    ArgbPremultiplied,
    Rgb565,
    Rgba4444,
    Rgba4444Premultiplied,
}

impl From<ColorMode> for OutputColorMode {
    fn from(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Rgb => Self::Rgb,
            ColorMode::Bgr => Self::Bgr,
            ColorMode::Rgba => Self::Rgba,
            ColorMode::Bgra => Self::Bgra,
            ColorMode::Argb => Self::Argb,
            ColorMode::RgbaPremultiplied => Self::RgbaPremultiplied,
            ColorMode::BgraPremultiplied => Self::BgraPremultiplied,
            ColorMode::ArgbPremultiplied => Self::ArgbPremultiplied,
            ColorMode::Rgb565 => Self::Rgb565,
            ColorMode::Rgba4444 => Self::Rgba4444,
            ColorMode::Rgba4444Premultiplied => Self::Rgba4444Premultiplied,
        }
    }
}
