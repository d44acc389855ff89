pub mod decode;
pub mod info;

pub use decode::DecodeArgs;
pub use info::InfoArgs;

#[derive(Debug, clap::Parser)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub subcommand: Option<Subcommands>,
    #[command(flatten)]
    pub decode: Option<DecodeArgs>,
    #[command(flatten)]
    pub globals: GlobalArgs,
}

#[derive(Debug, clap::Args)]
#[non_exhaustive]
pub struct GlobalArgs {
    /// Print debug information; can be repeated.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Do not print logs to console.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommands {
    /// Decode WebP image (assumed if no subcommand is specified).
    #[command(short_flag = 'd')]
    Decode(DecodeArgs),
    /// Print information about WebP image.
    #[command(short_flag = 'I', long_flag = "info")]
    Info(InfoArgs),
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn decode_is_default() {
        let args = Args::try_parse_from(["webp-oxide", "input.webp", "-o", "out.png"]).unwrap();
        assert!(args.subcommand.is_none());
        let decode = args.decode.unwrap();
        assert_eq!(decode.input.to_str(), Some("input.webp"));
        assert_eq!(decode.output.unwrap().to_str(), Some("out.png"));
        assert!(!decode.strict);
    }

    #[test]
    fn decode_flags() {
        let args = Args::try_parse_from([
            "webp-oxide",
            "decode",
            "--threads",
            "4",
            "--strict",
            "--mode",
            "bgra-premultiplied",
            "--nearest-upsampling",
            "--max-pixels",
            "1000",
            "input.webp",
        ])
        .unwrap();
        let Some(Subcommands::Decode(decode)) = args.subcommand else {
            panic!("expected decode subcommand");
        };
        assert_eq!(decode.num_threads, Some(4));
        assert!(decode.strict);
        assert_eq!(decode.mode, Some(decode::ColorMode::BgraPremultiplied));
        assert!(decode.nearest_upsampling);
        assert_eq!(decode.max_pixels, Some(1000));
    }

    #[test]
    fn info_flag() {
        let args = Args::try_parse_from(["webp-oxide", "--info", "input.webp", "-v"]).unwrap();
        assert!(matches!(args.subcommand, Some(Subcommands::Info(_))));
        assert_eq!(args.globals.verbose, 1);
    }
}
