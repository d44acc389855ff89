use webp_oxide::{DecoderOptions, ImageKind, WebpImage, WebpThreadPool};

use crate::{Error, Result, commands::info::*};

pub fn handle_info(args: InfoArgs) -> Result<()> {
    let _guard = tracing::trace_span!("Handle info subcommand").entered();

    let buf = std::fs::read(&args.input).map_err(Error::ReadInput)?;
    let options = DecoderOptions::builder()
        .pool(WebpThreadPool::none())
        .strict_mode(args.strict)
        .build();
    let image = WebpImage::parse(&buf, &options)?;
    let header = image.header();
    let container = image.container();

    let kind = match header.kind {
        ImageKind::Lossy => "lossy",
        ImageKind::Lossless => "lossless",
    };
    println!("WebP image ({kind}, {:?})", container.kind());
    println!("  Image dimension: {}x{}", header.width, header.height);
    if header.has_alpha {
        print!("  Has alpha");
        match container.alpha() {
            Some(alpha) if header.kind == ImageKind::Lossy => {
                println!(" (ALPH chunk, {} bytes)", alpha.data().len());
            }
            _ => println!(),
        }
    }
    if let Some(icc) = image.icc_profile() {
        println!("  ICC profile: {} bytes", icc.len());
    }

    if let Some(extended) = image.extended_header() {
        let flags = extended.flags;
        println!("  Extended format, feature flags 0x{:02x}", flags.bits());
        for (present, name) in [
            (flags.has_icc(), "ICC profile"),
            (flags.has_alpha(), "alpha"),
            (flags.has_exif(), "Exif metadata"),
            (flags.has_xmp(), "XMP metadata"),
        ] {
            if present {
                println!("    {name}");
            }
        }
    }

    let image_chunk = container.image_chunk();
    println!(
        "  Image data: {:?} chunk at byte {}, {} bytes",
        image_chunk.chunk_type(),
        image_chunk.offset(),
        image_chunk.data().len()
    );
    for (ty, size) in container.aux_chunks() {
        println!("  Skipped chunk {ty:?}: {size} bytes");
    }

    Ok(())
}
