use webp_grid::AllocTracker;
use webp_lossless::LosslessImage;
use webp_vp8::Vp8Frame;

use crate::{
    OutputColorMode, Result, UpsamplingFilter,
    assemble::{Band, PixelBuffer, premultiply, write_argb_rows, write_yuv_rows},
    schedule::{Dependency, Scheduler, TaskGraph, TileGrid},
    vp8::{DEFAULT_TILE_WIDTH, decode_frame},
};

/// Parameters of rendering, other than the thread pool and memory limit.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub color_mode: OutputColorMode,
    pub upsampling: UpsamplingFilter,
    /// Width of VP8 tiles in macroblocks.
    pub tile_width: usize,
    /// Height of output row bands converted by a single task.
    pub band_height: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color_mode: OutputColorMode::default(),
            upsampling: UpsamplingFilter::default(),
            tile_width: DEFAULT_TILE_WIDTH,
            band_height: 16,
        }
    }
}

/// Decodes a VP8 frame and converts it to the output color mode.
///
/// `alpha` has one sample per pixel if the image has an alpha plane.
pub fn render_lossy(
    frame: Vp8Frame<'_>,
    alpha: Option<&[u8]>,
    scheduler: &Scheduler,
    tracker: Option<&AllocTracker>,
    options: &RenderOptions,
) -> Result<PixelBuffer> {
    let image = decode_frame(frame, scheduler, tracker, options.tile_width)?;
    let _guard = tracing::trace_span!("Convert YUV", mode = ?options.color_mode).entered();
    convert_bands(image.width, image.height, scheduler, tracker, options, |band| {
        write_yuv_rows(band, &image, alpha, options.upsampling)
    })
}

/// Converts a decoded lossless image to the output color mode.
pub fn render_lossless(
    image: &LosslessImage,
    scheduler: &Scheduler,
    tracker: Option<&AllocTracker>,
    options: &RenderOptions,
) -> Result<PixelBuffer> {
    let _guard = tracing::trace_span!("Convert ARGB", mode = ?options.color_mode).entered();
    let width = image.width() as usize;
    let height = image.height() as usize;
    convert_bands(width, height, scheduler, tracker, options, |band| {
        write_argb_rows(band, image.pixels())
    })
}

fn convert_bands(
    width: usize,
    height: usize,
    scheduler: &Scheduler,
    tracker: Option<&AllocTracker>,
    options: &RenderOptions,
    write_band: impl Fn(&mut Band) + Sync,
) -> Result<PixelBuffer> {
    scheduler.check_cancelled()?;
    let mut buffer = PixelBuffer::new(width, height, options.color_mode, tracker)?;
    let band_height = options.band_height.max(1);

    let grid = TileGrid::new(width, height, width.max(1), band_height, Dependency::Independent);
    let bands = buffer.bands(band_height);
    if !bands.is_empty() {
        let graph = TaskGraph::from_tile_grid(&grid, bands);
        scheduler.run(graph, |_, mut band| {
            write_band(&mut band);
            premultiply(&mut band);
            Ok(())
        })?;
    }
    Ok(buffer)
}
