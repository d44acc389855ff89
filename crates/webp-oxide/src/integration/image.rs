use std::io::prelude::*;

use image::error::{DecodingError, ImageFormatHint, LimitError, LimitErrorKind};
use image::{ColorType, ImageError, ImageFormat, ImageResult};

use crate::{
    DecoderOptions, DecoderOptionsBuilder, Error, ImageHeader, OutputColorMode, WebpImage,
    WebpThreadPool,
};

/// WebP decoder which implements [`image::ImageDecoder`].
///
/// Images with alpha are decoded as `Rgba8`, and others as `Rgb8`.
pub struct WebpDecoder {
    buf: Vec<u8>,
    header: ImageHeader,
    icc: Option<Vec<u8>>,
    builder: DecoderOptionsBuilder,
}

impl WebpDecoder {
    /// Reads the whole image from `reader`, and parses its headers.
    pub fn new<R: Read>(reader: R) -> ImageResult<Self> {
        let builder = DecoderOptions::builder().pool(WebpThreadPool::default());
        Self::with_options(reader, builder)
    }

    /// Same as [`new`][Self::new], with custom options. The output color mode is overridden.
    ///
    /// Set a thread pool in `builder` so that it is shared between parsing and decoding.
    pub fn with_options<R: Read>(mut reader: R, builder: DecoderOptionsBuilder) -> ImageResult<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(ImageError::IoError)?;

        let options = builder.clone().build();
        let image = WebpImage::parse(&buf, &options).map_err(into_image_error)?;
        let header = *image.header();
        let icc = image.icc_profile().map(<[u8]>::to_vec);
        drop(image);

        let mode = if header.has_alpha {
            OutputColorMode::Rgba
        } else {
            OutputColorMode::Rgb
        };
        Ok(Self {
            buf,
            header,
            icc,
            builder: builder.output_color_mode(mode),
        })
    }

    fn read_image_inner(self, buf: &mut [u8]) -> ImageResult<()> {
        let options = self.builder.build();
        let decoded = crate::decode(&self.buf, &options).map_err(into_image_error)?;
        assert_eq!(
            buf.len(),
            decoded.buf.len(),
            "output buffer doesn't match the image size"
        );
        buf.copy_from_slice(&decoded.buf);
        Ok(())
    }
}

impl image::ImageDecoder for WebpDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    fn color_type(&self) -> ColorType {
        if self.header.has_alpha {
            ColorType::Rgba8
        } else {
            ColorType::Rgb8
        }
    }

    fn icc_profile(&mut self) -> ImageResult<Option<Vec<u8>>> {
        Ok(self.icc.clone())
    }

    fn read_image(self, buf: &mut [u8]) -> ImageResult<()>
    where
        Self: Sized,
    {
        self.read_image_inner(buf)
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        (*self).read_image_inner(buf)
    }

    fn set_limits(&mut self, limits: image::Limits) -> ImageResult<()> {
        limits.check_dimensions(self.header.width, self.header.height)?;
        if let Some(max_alloc) = limits.max_alloc {
            let max_memory = usize::try_from(max_alloc).unwrap_or(usize::MAX);
            self.builder = self.builder.clone().max_memory_bytes(max_memory);
        }
        Ok(())
    }
}

fn into_image_error(err: Error) -> ImageError {
    match err {
        Error::ResourceLimit { .. } => {
            ImageError::Limits(LimitError::from_kind(LimitErrorKind::InsufficientMemory))
        }
        Error::UnsupportedFormat { .. } => ImageError::Unsupported(
            image::error::UnsupportedError::from_format_and_kind(
                ImageFormatHint::Exact(ImageFormat::WebP),
                image::error::UnsupportedErrorKind::GenericFeature(err.to_string()),
            ),
        ),
        err => ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Exact(ImageFormat::WebP),
            err,
        )),
    }
}
