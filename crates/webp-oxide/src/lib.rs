//! webp-oxide is a WebP still image decoder written in pure Rust. It's internally organized into a
//! few small crates. This crate acts as a blanket and provides a simple interface made from those
//! crates to decode the actual image.
//!
//! # Decoding an image
//!
//! The simplest way is [`decode`], which parses the headers and decodes pixels in one call:
//!
//! ```no_run
//! use webp_oxide::{DecoderOptions, OutputColorMode};
//!
//! # fn main() -> webp_oxide::Result<()> {
//! # let buf = Vec::<u8>::new();
//! let options = DecoderOptions::builder()
//!     .output_color_mode(OutputColorMode::Rgb)
//!     .build();
//! let image = webp_oxide::decode(&buf, &options)?;
//! assert_eq!(image.buf.len(), image.stride() * image.height as usize);
//! # Ok(())
//! # }
//! ```
//!
//! Headers can be inspected before decoding with [`WebpImage::parse`]. Resource limits are checked
//! at this point, so oversized images are rejected before anything is allocated:
//!
//! ```no_run
//! # use webp_oxide::{DecoderOptions, WebpImage};
//! # fn main() -> webp_oxide::Result<()> {
//! # let buf = Vec::<u8>::new();
//! let options = DecoderOptions::default();
//! let image = WebpImage::parse(&buf, &options)?;
//! println!("{}x{}, {:?}", image.width(), image.height(), image.kind());
//! let decoded = image.decode()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Multithreading
//!
//! Decoding is split into tiles which run on a Rayon thread pool if the `rayon` feature is
//! enabled, which is the default. Output doesn't depend on the number of threads. Set
//! [`max_worker_threads`][DecoderOptionsBuilder::max_worker_threads] to 1 to decode on the calling
//! thread.
//!
//! # Integration with `image`
//!
//! With the `image` feature, [`integration::WebpDecoder`] implements `image::ImageDecoder`.
//!
//! # Cancellation
//!
//! Pass a [`CancellationToken`] to the options, and call
//! [`cancel`][CancellationToken::cancel] from another thread. Tiles which haven't started are
//! skipped and decoding returns [`Error::Cancelled`].
use webp_bitstream::{BitstreamKind, ChunkType, Container, ContainerParser};
use webp_grid::AllocTracker;
use webp_lossless::LosslessHeader;
use webp_render::{RenderOptions, Scheduler, render_lossless, render_lossy};
use webp_vp8::{FrameTag, Vp8Frame};

mod error;
mod header;
pub mod integration;
mod options;

pub use error::{Error, Result};
pub use header::{ExtendedHeader, FeatureFlags, ImageHeader, ImageKind};
pub use options::{
    DEFAULT_MAX_MEMORY_BYTES, DEFAULT_MAX_PIXELS, DecoderOptions, DecoderOptionsBuilder,
};
pub use webp_render::{CancellationToken, OutputColorMode, UpsamplingFilter};
pub use webp_threadpool::WebpThreadPool;

/// Offset of the `VP8X` payload in an extended format file.
const VP8X_PAYLOAD_OFFSET: usize = 20;

/// Parses the headers of `buf` and decodes the image.
pub fn decode(buf: &[u8], options: &DecoderOptions) -> Result<DecodedImage> {
    WebpImage::parse(buf, options)?.decode()
}

/// WebP image with its headers parsed, ready to be decoded.
#[derive(Debug)]
pub struct WebpImage<'buf> {
    container: Container<'buf>,
    header: ImageHeader,
    extended: Option<ExtendedHeader>,
    options: DecoderOptions,
}

/// Decoded pixels, `stride()` bytes per row without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub color_mode: OutputColorMode,
    pub buf: Vec<u8>,
}

impl DecodedImage {
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.color_mode.bytes_per_pixel()
    }
}

impl<'buf> WebpImage<'buf> {
    /// Parses the container and image headers of `buf`.
    ///
    /// Fails with [`Error::ResourceLimit`] if the image exceeds the limits in `options`.
    pub fn parse(buf: &'buf [u8], options: &DecoderOptions) -> Result<Self> {
        let _guard = tracing::trace_span!("Parse WebP headers", len = buf.len()).entered();
        let strict = options.strict_mode();

        let extended = if BitstreamKind::detect(buf) == BitstreamKind::Riff {
            peek_extended_header(buf, options)?
        } else {
            None
        };

        let container = ContainerParser::new().strict(strict).parse(buf)?;
        let image = container.image_chunk();
        let (kind, width, height, stream_alpha) = if image.chunk_type() == ChunkType::VP8L {
            let header = LosslessHeader::parse(image.data(), image.offset())?;
            (
                ImageKind::Lossless,
                header.width,
                header.height,
                header.alpha_is_used,
            )
        } else {
            let tag = FrameTag::parse(image.data(), image.offset())?;
            if !tag.show_frame {
                if strict {
                    return Err(Error::corrupt_header(image.offset(), "frame is not shown"));
                }
                tracing::warn!("Decoding VP8 frame marked as hidden");
            }
            (
                ImageKind::Lossy,
                tag.width as u32,
                tag.height as u32,
                container.alpha().is_some(),
            )
        };

        if let Some(extended) = &extended {
            if extended.canvas_width != width || extended.canvas_height != height {
                tracing::debug!(
                    canvas_width = extended.canvas_width,
                    canvas_height = extended.canvas_height,
                    width,
                    height,
                    "Canvas size mismatch"
                );
                return Err(Error::corrupt_header(
                    VP8X_PAYLOAD_OFFSET + 4,
                    "canvas size doesn't match image size",
                ));
            }
        }
        check_resource_limit(width, height, options)?;

        let features = extended.map(|e| e.flags).unwrap_or_default();
        if kind == ImageKind::Lossless && container.alpha().is_some() {
            tracing::debug!("Ignoring ALPH chunk of lossless image");
        }
        let header = ImageHeader {
            width,
            height,
            kind,
            has_alpha: stream_alpha || features.has_alpha(),
            features,
        };
        tracing::debug!(?header, "Parsed image header");

        Ok(Self {
            container,
            header,
            extended,
            options: options.clone(),
        })
    }

    #[inline]
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.header.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.header.height
    }

    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.header.has_alpha
    }

    #[inline]
    pub fn kind(&self) -> ImageKind {
        self.header.kind
    }

    /// Returns the `VP8X` header if the file is in the extended format.
    #[inline]
    pub fn extended_header(&self) -> Option<&ExtendedHeader> {
        self.extended.as_ref()
    }

    /// Returns the embedded ICC profile, if any.
    #[inline]
    pub fn icc_profile(&self) -> Option<&'buf [u8]> {
        self.container.icc().map(|chunk| chunk.data())
    }

    /// Returns the located chunks of the file.
    #[inline]
    pub fn container(&self) -> &Container<'buf> {
        &self.container
    }

    /// Decodes pixels in the output color mode of the options.
    pub fn decode(&self) -> Result<DecodedImage> {
        let ImageHeader { width, height, .. } = self.header;
        let max_memory = self.options.max_memory_bytes();
        self.decode_inner()
            .map_err(|e| e.with_image_size(width, height, max_memory))
    }

    fn decode_inner(&self) -> Result<DecodedImage> {
        let ImageHeader {
            width,
            height,
            kind,
            ..
        } = self.header;
        let options = &self.options;
        let color_mode = options.output_color_mode();
        let _guard = tracing::trace_span!("Decode WebP image", width, height, ?kind).entered();

        let tracker = AllocTracker::with_limit(options.max_memory_bytes());
        let scheduler = Scheduler::new(options.pool(), options.cancellation());
        scheduler.check_cancelled()?;
        let render_options = RenderOptions {
            color_mode,
            upsampling: options.upsampling(),
            ..Default::default()
        };

        let image = self.container.image_chunk();
        let buffer = match kind {
            ImageKind::Lossy => {
                let frame = Vp8Frame::parse(image.data(), image.offset())?;
                let alpha = if color_mode.has_alpha() {
                    self.decode_alpha(&tracker)?
                } else {
                    None
                };
                render_lossy(
                    frame,
                    alpha.as_deref(),
                    &scheduler,
                    Some(&tracker),
                    &render_options,
                )?
            }
            ImageKind::Lossless => {
                let image =
                    webp_lossless::decode_image(image.data(), image.offset(), Some(&tracker))?;
                render_lossless(&image, &scheduler, Some(&tracker), &render_options)?
            }
        };

        Ok(DecodedImage {
            width,
            height,
            color_mode,
            buf: buffer.into_vec(),
        })
    }

    fn decode_alpha(&self, tracker: &AllocTracker) -> Result<Option<Vec<u8>>> {
        let Some(chunk) = self.container.alpha() else {
            return Ok(None);
        };

        let _guard = tracing::trace_span!("Decode alpha", len = chunk.data().len()).entered();
        let alpha = webp_lossless::decode_alpha(
            chunk.data(),
            chunk.offset(),
            self.header.width as usize,
            self.header.height as usize,
            self.options.strict_mode(),
            Some(tracker),
        )?;
        Ok(Some(alpha))
    }
}

/// Reads `VP8X` before locating chunks.
///
/// Animated files have no image chunk at the top level, and an oversized canvas must be rejected
/// even if the rest of the file is missing.
fn peek_extended_header(buf: &[u8], options: &DecoderOptions) -> Result<Option<ExtendedHeader>> {
    if buf.get(12..16) != Some(&b"VP8X"[..]) {
        return Ok(None);
    }
    let Some(&[s0, s1, s2, s3]) = buf.get(16..20) else {
        return Err(Error::TruncatedStream {
            offset: Some(buf.len()),
            tile: None,
            source: None,
        });
    };
    if u32::from_le_bytes([s0, s1, s2, s3]) as usize != ExtendedHeader::SIZE {
        return Err(Error::corrupt_header(16, "VP8X payload must be 10 bytes"));
    }
    let Some(data) = buf.get(VP8X_PAYLOAD_OFFSET..VP8X_PAYLOAD_OFFSET + ExtendedHeader::SIZE)
    else {
        return Err(Error::TruncatedStream {
            offset: Some(buf.len()),
            tile: None,
            source: None,
        });
    };

    let header = ExtendedHeader::parse(data, VP8X_PAYLOAD_OFFSET, options.strict_mode())?;
    if header.flags.is_animated() {
        tracing::debug!("Animated image");
        return Err(Error::UnsupportedFormat {
            reason: "animation is not supported",
        });
    }
    check_resource_limit(header.canvas_width, header.canvas_height, options)?;
    if !header.canvas_area_is_valid() {
        return Err(Error::corrupt_header(
            VP8X_PAYLOAD_OFFSET + 4,
            "canvas area exceeds 32 bits",
        ));
    }
    Ok(Some(header))
}

fn check_resource_limit(width: u32, height: u32, options: &DecoderOptions) -> Result<()> {
    let pixels = width as u64 * height as u64;
    if pixels > options.max_pixels() {
        tracing::debug!(width, height, max_pixels = options.max_pixels(), "Too many pixels");
        return Err(Error::ResourceLimit {
            width,
            height,
            limit: options.max_pixels(),
        });
    }

    let bytes = pixels * options.output_color_mode().bytes_per_pixel() as u64;
    let max_memory = options.max_memory_bytes() as u64;
    if bytes > max_memory {
        tracing::debug!(width, height, bytes, max_memory, "Output exceeds memory limit");
        return Err(Error::ResourceLimit {
            width,
            height,
            limit: max_memory,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn riff(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = b"WEBP".to_vec();
        for (ty, data) in chunks {
            body.extend_from_slice(*ty);
            body.extend_from_slice(&(data.len() as u32).to_le_bytes());
            body.extend_from_slice(data);
            if data.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend(body);
        out
    }

    fn vp8x(flags: u8, width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![flags, 0, 0, 0];
        data.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
        data.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
        data
    }

    fn lossless_header(width: u32, height: u32, alpha: bool) -> Vec<u8> {
        let bits = (width - 1) | ((height - 1) << 14) | ((alpha as u32) << 28);
        let mut out = vec![0x2f];
        out.extend_from_slice(&bits.to_le_bytes());
        out
    }

    fn options() -> DecoderOptions {
        DecoderOptions::builder().max_worker_threads(1).build()
    }

    #[test]
    fn raw_lossless_header() {
        let buf = lossless_header(17, 33, true);
        let image = WebpImage::parse(&buf, &options()).unwrap();
        assert_eq!(image.kind(), ImageKind::Lossless);
        assert_eq!((image.width(), image.height()), (17, 33));
        assert!(image.has_alpha());
        assert!(image.extended_header().is_none());
    }

    #[test]
    fn extended_lossless_header() {
        let buf = riff(&[
            (b"VP8X", &vp8x(FeatureFlags::ICC, 250, 7)),
            (b"ICCP", &[0; 3]),
            (b"VP8L", &lossless_header(250, 7, false)),
        ]);
        let image = WebpImage::parse(&buf, &options()).unwrap();
        assert_eq!((image.width(), image.height()), (250, 7));
        assert!(!image.has_alpha());
        assert!(image.header().features.has_icc());
        assert_eq!(image.icc_profile(), Some(&[0u8; 3][..]));
        assert_eq!(image.extended_header().unwrap().canvas_width, 250);
    }

    #[test]
    fn canvas_mismatch() {
        let buf = riff(&[
            (b"VP8X", &vp8x(0, 251, 7)),
            (b"VP8L", &lossless_header(250, 7, false)),
        ]);
        let err = WebpImage::parse(&buf, &options()).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }

    #[test]
    fn animation_is_unsupported() {
        let buf = riff(&[
            (b"VP8X", &vp8x(FeatureFlags::ANIMATION, 16, 16)),
            (b"ANIM", &[0; 6]),
        ]);
        let err = WebpImage::parse(&buf, &options()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn huge_canvas_is_rejected() {
        let buf = riff(&[
            (b"VP8X", &vp8x(0, 100000, 100000)),
            (b"VP8L", &lossless_header(1, 1, false)),
        ]);
        let err = WebpImage::parse(&buf, &options()).unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimit {
                width: 100000,
                height: 100000,
                limit: DEFAULT_MAX_PIXELS,
            }
        ));
    }

    #[test]
    fn memory_limit_applies_to_output() {
        let buf = lossless_header(100, 100, false);
        let options = DecoderOptions::builder()
            .max_worker_threads(1)
            .max_memory_bytes(100 * 100 * 3)
            .build();
        let err = WebpImage::parse(&buf, &options).unwrap_err();
        assert!(matches!(err, Error::ResourceLimit { limit: 30000, .. }));

        let options = DecoderOptions::builder()
            .max_worker_threads(1)
            .max_memory_bytes(100 * 100 * 3)
            .output_color_mode(OutputColorMode::Rgb)
            .build();
        assert!(WebpImage::parse(&buf, &options).is_ok());
    }

    #[test]
    fn unknown_signature() {
        let err = WebpImage::parse(b"GIF89a\0\0\0\0\0\0", &options()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn decode_lossless() {
        let (width, height) = (5u32, 3u32);
        let rgba = (0..width * height * 4).map(|v| (v * 13) as u8).collect::<Vec<_>>();
        let encoded = webp::Encoder::from_rgba(&rgba, width, height).encode_lossless();

        let options = DecoderOptions::builder()
            .max_worker_threads(1)
            .output_color_mode(OutputColorMode::Rgba)
            .build();
        let image = decode(&encoded, &options).unwrap();
        assert_eq!((image.width, image.height), (width, height));
        assert_eq!(image.stride(), 20);
        assert_eq!(image.buf, rgba);
    }

    #[test]
    fn pre_cancelled() {
        let encoded = webp::Encoder::from_rgb(&[128; 16 * 16 * 3], 16, 16).encode(75.0);
        let token = CancellationToken::new();
        token.cancel();
        let options = DecoderOptions::builder()
            .max_worker_threads(1)
            .cancellation(token)
            .build();
        let image = WebpImage::parse(&encoded, &options).unwrap();
        assert!(matches!(image.decode(), Err(Error::Cancelled)));
    }
}
