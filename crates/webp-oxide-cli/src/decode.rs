use std::time::Duration;

use webp_oxide::{DecodedImage, DecoderOptions, OutputColorMode, UpsamplingFilter, WebpImage};

use crate::commands::decode::*;
use crate::{Error, Result, output};

pub fn handle_decode(args: DecodeArgs) -> Result<()> {
    let _guard = tracing::trace_span!("Handle decode subcommand").entered();

    let buf = std::fs::read(&args.input).map_err(Error::ReadInput)?;
    let pool = crate::create_thread_pool(args.num_threads);

    let build_options = |mode: OutputColorMode| {
        let mut builder = DecoderOptions::builder()
            .pool(pool.clone())
            .output_color_mode(mode)
            .strict_mode(args.strict);
        if args.nearest_upsampling {
            builder = builder.upsampling(UpsamplingFilter::Nearest);
        }
        if let Some(max_pixels) = args.max_pixels {
            builder = builder.max_pixels(max_pixels);
        }
        if let Some(max_memory) = args.max_memory {
            builder = builder.max_memory_bytes(max_memory);
        }
        builder.build()
    };

    let options = build_options(args.mode.map(Into::into).unwrap_or(OutputColorMode::Rgba));
    let mut image = WebpImage::parse(&buf, &options)?;
    if args.mode.is_none() && !image.has_alpha() {
        tracing::debug!("Image has no alpha, decoding to RGB");
        image = WebpImage::parse(&buf, &build_options(OutputColorMode::Rgb))?;
    }

    tracing::info!(
        "Image dimension: {}x{} ({:?})",
        image.width(),
        image.height(),
        image.kind()
    );
    let mps = (image.width() as u64 * image.height() as u64) as f64 / 1e6;

    let num_reps = args.num_reps.unwrap_or(1);
    if num_reps > 1 {
        tracing::info!("Running {num_reps} repetitions");
    }
    let mut durations = Vec::with_capacity(num_reps as usize);
    let mut decoded = None;
    for _ in 0..num_reps {
        let (result, elapsed) = run_once(&image)?;
        durations.push(elapsed);
        decoded = Some(result);
    }
    report_durations(&durations, mps);

    let Some(decoded) = decoded else {
        return Ok(());
    };
    let Some(output_path) = &args.output else {
        tracing::info!("No output path specified, skipping output encoding");
        return Ok(());
    };

    tracing::debug!(output_format = ?args.output_format, "Encoding output");
    let file = std::fs::File::create(output_path).map_err(Error::WriteImage)?;
    let writer = std::io::BufWriter::new(file);
    let result = match args.output_format {
        OutputFormat::Png => output::write_png(writer, &decoded),
        OutputFormat::Raw => output::write_raw(writer, &decoded),
    };
    result.map_err(Error::WriteImage)?;

    Ok(())
}

fn run_once(image: &WebpImage) -> Result<(DecodedImage, Duration)> {
    let decode_start = std::time::Instant::now();
    let decoded = image.decode()?;
    Ok((decoded, decode_start.elapsed()))
}

fn report_durations(durations: &[Duration], mps: f64) {
    let [.., last] = durations else {
        return;
    };
    if durations.len() == 1 {
        let elapsed_seconds = last.as_secs_f64();
        tracing::info!(
            "Took {:.2} ms ({:.2} MP/s)",
            elapsed_seconds * 1000.0,
            mps / elapsed_seconds
        );
        return;
    }

    let mut min = f64::INFINITY;
    let mut max = 0f64;
    let mut log_sum = 0f64;
    for elapsed in durations {
        let secs = elapsed.as_secs_f64();
        min = min.min(secs);
        max = max.max(secs);
        log_sum += secs.ln();
    }
    let geomean = (log_sum / durations.len() as f64).exp();

    tracing::info!(
        "Geomean: {:.3} ms ({:.3} MP/s)",
        geomean * 1000.0,
        mps / geomean
    );
    tracing::info!(
        "Range: [{:.3} ms, {:.3} ms] ([{:.3} MP/s, {:.3} MP/s])",
        min * 1000.0,
        max * 1000.0,
        mps / max,
        mps / min,
    );
}
