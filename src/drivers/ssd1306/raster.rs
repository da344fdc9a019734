//! Image and animation normalization for the 1-bit panel.
//!
//! Any raster source is reduced in three fixed steps: nearest-neighbor
//! resample to panel resolution, grayscale, threshold at 128. Animations
//! additionally go through disposal-aware compositing so partial and
//! transparent frames are rendered against the accumulated canvas, never
//! in isolation.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, GrayImage, RgbaImage};

use super::framebuffer::FrameBuffer;
use crate::errors::DisplayError;

/// Grayscale intensity from which a pixel is lit.
pub const ON_THRESHOLD: u8 = 128;

/// Substitute delay for frames that declare none.
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Converts a grayscale image into a panel-sized frame buffer.
pub fn normalize(src: &GrayImage, width: u32, height: u32) -> FrameBuffer {
    let resized;
    let src = if src.dimensions() == (width, height) {
        src
    } else {
        resized = resize_nearest(src, width, height);
        &resized
    };

    let mut fb = FrameBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            fb.set_pixel(x, y, src.get_pixel(x, y).0[0] >= ON_THRESHOLD);
        }
    }
    fb
}

/// Rounding nearest-neighbor resample, chosen for speed on constrained
/// hardware over interpolation quality.
fn resize_nearest(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = src.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let sx = ((x * src_w + width / 2) / width).min(src_w - 1);
        let sy = ((y * src_h + height / 2) / height).min(src_h - 1);
        *src.get_pixel(sx, sy)
    })
}

/// Decodes a still image from disk.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, DisplayError> {
    image::open(path.as_ref()).map_err(|e| DisplayError::UnsupportedFormat(e.to_string()))
}

/// Per-frame instruction on how to prepare the canvas for the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// Leave the canvas as composited.
    None,
    /// Clear to background before compositing the next frame.
    RestoreBackground,
}

/// One animation frame, possibly smaller than the logical screen.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub left: u32,
    pub top: u32,
    pub delay: Duration,
    pub disposal: Disposal,
}

/// An ordered sequence of frames with playback metadata.
///
/// Frames are a stateful accumulation: frame N+1 is composited onto the
/// result of frame N unless frame N's disposal rule says otherwise.
#[derive(Debug, Clone)]
pub struct Animation {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame>,
    /// Number of playback cycles; 0 plays forever.
    pub loop_count: u16,
}

impl Animation {
    /// Decodes a GIF stream into an [`Animation`].
    pub fn from_gif(reader: impl Read) -> Result<Self, DisplayError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options
            .read_info(reader)
            .map_err(|e| DisplayError::UnsupportedFormat(e.to_string()))?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        let loop_count = match decoder.repeat() {
            gif::Repeat::Infinite => 0,
            gif::Repeat::Finite(n) => n,
        };

        let mut frames = Vec::new();
        while let Some(frame) = decoder
            .read_next_frame()
            .map_err(|e| DisplayError::UnsupportedFormat(e.to_string()))?
        {
            let image = RgbaImage::from_raw(
                u32::from(frame.width),
                u32::from(frame.height),
                frame.buffer.to_vec(),
            )
            .ok_or_else(|| DisplayError::UnsupportedFormat("truncated frame data".into()))?;

            let delay = if frame.delay == 0 {
                DEFAULT_FRAME_DELAY
            } else {
                // GIF delays count in 10 ms units.
                Duration::from_millis(u64::from(frame.delay) * 10)
            };

            frames.push(Frame {
                image,
                left: u32::from(frame.left),
                top: u32::from(frame.top),
                delay,
                disposal: match frame.dispose {
                    gif::DisposalMethod::Background => Disposal::RestoreBackground,
                    _ => Disposal::None,
                },
            });
        }

        if frames.is_empty() {
            return Err(DisplayError::UnsupportedFormat(
                "animation has no frames".into(),
            ));
        }

        Ok(Self {
            width,
            height,
            frames,
            loop_count,
        })
    }

    /// Loads and decodes a GIF file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DisplayError> {
        let file = std::fs::File::open(path.as_ref())
            .map_err(|e| DisplayError::UnsupportedFormat(e.to_string()))?;
        Self::from_gif(file)
    }

    /// Composites every frame against the accumulated canvas.
    ///
    /// Returns one full grayscale canvas per frame together with its
    /// presentation delay; the caller normalizes each canvas before the
    /// write so partial frames render against prior content.
    pub fn compose(&self) -> Vec<(GrayImage, Duration)> {
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, image::Rgba([0, 0, 0, 255]));
        let mut composed = Vec::with_capacity(self.frames.len());

        for (idx, frame) in self.frames.iter().enumerate() {
            if idx > 0 && self.frames[idx - 1].disposal == Disposal::RestoreBackground {
                canvas = RgbaImage::from_pixel(self.width, self.height, image::Rgba([0, 0, 0, 255]));
            }

            overlay(&mut canvas, frame);

            let gray = DynamicImage::ImageRgba8(canvas.clone()).into_luma8();
            composed.push((gray, frame.delay));
        }

        composed
    }
}

/// Draws a frame over the canvas at its offset, skipping transparent
/// pixels.
fn overlay(canvas: &mut RgbaImage, frame: &Frame) {
    for (x, y, pixel) in frame.image.enumerate_pixels() {
        if pixel.0[3] < ON_THRESHOLD {
            continue;
        }

        let dx = frame.left + x;
        let dy = frame.top + y;
        if dx < canvas.width() && dy < canvas.height() {
            canvas.put_pixel(dx, dy, image::Rgba([pixel.0[0], pixel.0[1], pixel.0[2], 255]));
        }
    }
}
