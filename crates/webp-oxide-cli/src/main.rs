use clap::Parser;
use webp_oxide_cli::{Args, Subcommands};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> std::process::ExitCode {
    let Args {
        subcommand,
        globals,
        decode,
    } = Args::parse();

    if !globals.quiet {
        let filter = match globals.verbose {
            0 => tracing::level_filters::LevelFilter::INFO,
            1 => tracing::level_filters::LevelFilter::DEBUG,
            2.. => tracing::level_filters::LevelFilter::TRACE,
        };
        let env_filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(filter.into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::ACTIVE)
            .with_env_filter(env_filter)
            .init();
    }

    let result = match (subcommand, decode) {
        (Some(Subcommands::Decode(args)), _) | (None, Some(args)) => {
            webp_oxide_cli::decode::handle_decode(args)
        }
        (Some(Subcommands::Info(args)), _) => webp_oxide_cli::info::handle_info(args),
        (None, None) => Err(webp_oxide_cli::Error::NoInput),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}
