//! High-level panel operations over the shared bus.
//!
//! All drawing funnels through one framebuffer blit so the bus traffic
//! per refresh is fixed: one window command followed by sixteen 64-byte
//! data bursts. The panel mutex keeps one render in flight at a time and
//! makes hardware scrolling and framebuffer writes mutually exclusive.

use std::sync::Arc;
use std::time::Duration;

use embedded_graphics::{
    Drawable,
    geometry::{Point, Size},
    mono_font::{MonoTextStyle, ascii::FONT_7X13},
    pixelcolor::BinaryColor,
    primitives::{Primitive, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use image::DynamicImage;
use log::debug;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::framebuffer::FrameBuffer;
use super::protocol::{Command, ScrollDirection, ScrollRate, data_packet};
use super::raster::{self, Animation};
use crate::bus::{BusTransport, DISPLAY_ADDR};
use crate::errors::DisplayError;

pub const PANEL_WIDTH: u32 = 128;
pub const PANEL_HEIGHT: u32 = 64;

/// Framebuffer bytes per data burst.
const DATA_CHUNK: usize = 64;

/// FONT_7X13 advance and glyph height.
const GLYPH_ADVANCE: i32 = 7;
const GLYPH_HEIGHT: u32 = 13;

/// x coordinate that horizontally centers `text` on the panel.
pub fn centered_x(text: &str) -> i32 {
    // Characters, not bytes: multi-byte labels occupy one cell per glyph.
    let text_width = text.chars().count() as i32 * GLYPH_ADVANCE;
    ((PANEL_WIDTH as i32 - text_width) / 2).max(0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OledOptions {
    /// Flip the panel left-to-right for mirrored enclosures.
    pub mirror_horizontal: bool,
}

/// Frame pacing during animation playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTiming {
    /// Honor each frame's own delay.
    Native,
    /// Hold every frame for the same fixed duration.
    Fixed(Duration),
}

struct PanelState {
    scrolling: bool,
}

/// A 128x64 monochrome panel behind the shared bus.
pub struct Oled {
    bus: Arc<dyn BusTransport>,
    mirror_horizontal: bool,
    panel: Mutex<PanelState>,
}

impl Oled {
    pub fn new(bus: Arc<dyn BusTransport>, options: OledOptions) -> Self {
        Self {
            bus,
            mirror_horizontal: options.mirror_horizontal,
            panel: Mutex::new(PanelState { scrolling: false }),
        }
    }

    /// Runs the power-on sequence and leaves the panel on and blank.
    pub async fn init(&self) -> Result<(), DisplayError> {
        debug!("initializing display at 0x{DISPLAY_ADDR:02x}");
        self.command(&Command::Init {
            mirror_horizontal: self.mirror_horizontal,
        })
        .await?;
        self.clear().await
    }

    async fn command(&self, command: &Command) -> Result<(), DisplayError> {
        self.bus.write(DISPLAY_ADDR, &command.to_bytes()).await?;
        Ok(())
    }

    /// Writes a full frame, stopping any hardware scroll first.
    pub async fn blit(&self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        let mut panel = self.panel.lock().await;
        self.blit_locked(&mut panel, frame).await
    }

    async fn blit_locked(
        &self,
        panel: &mut PanelState,
        frame: &FrameBuffer,
    ) -> Result<(), DisplayError> {
        if panel.scrolling {
            self.command(&Command::DeactivateScroll).await?;
            panel.scrolling = false;
        }

        self.command(&Command::DrawWindow {
            column_start: 0,
            column_end: PANEL_WIDTH as u8 - 1,
            page_start: 0,
            page_end: frame.page_count() as u8 - 1,
        })
        .await?;

        for chunk in frame.data().chunks(DATA_CHUNK) {
            self.bus.write(DISPLAY_ADDR, &data_packet(chunk)).await?;
        }
        Ok(())
    }

    /// Blanks the panel without powering it off.
    pub async fn clear(&self) -> Result<(), DisplayError> {
        self.blit(&FrameBuffer::new(PANEL_WIDTH, PANEL_HEIGHT)).await
    }

    pub async fn set_contrast(&self, contrast: u8) -> Result<(), DisplayError> {
        self.command(&Command::SetContrast(contrast)).await
    }

    pub async fn invert(&self, inverted: bool) -> Result<(), DisplayError> {
        self.command(&Command::Invert(inverted)).await
    }

    /// Renders a still image normalized to panel resolution.
    pub async fn draw_image(&self, image: &DynamicImage) -> Result<(), DisplayError> {
        let frame = raster::normalize(&image.to_luma8(), PANEL_WIDTH, PANEL_HEIGHT);
        self.blit(&frame).await
    }

    /// Renders a line of text on a blank frame.
    pub async fn draw_text(&self, text: &str, x: i32, y: i32) -> Result<(), DisplayError> {
        let mut frame = FrameBuffer::new(PANEL_WIDTH, PANEL_HEIGHT);
        render_text(&mut frame, text, x, y);
        self.blit(&frame).await
    }

    /// Renders text over an image, clearing the glyph background so the
    /// label stays legible on busy artwork.
    pub async fn draw_image_with_text(
        &self,
        image: &DynamicImage,
        text: &str,
        x: i32,
        y: i32,
    ) -> Result<(), DisplayError> {
        let mut frame = raster::normalize(&image.to_luma8(), PANEL_WIDTH, PANEL_HEIGHT);
        render_text(&mut frame, text, x, y);
        self.blit(&frame).await
    }

    /// Plays an animation, holding the panel for the whole run.
    ///
    /// A loop count of zero plays until `cancel` fires; cancellation is
    /// observed before every frame and during every inter-frame delay.
    pub async fn draw_animation(
        &self,
        animation: &Animation,
        timing: FrameTiming,
        cancel: &CancellationToken,
    ) -> Result<(), DisplayError> {
        self.play(animation, None, timing, cancel).await
    }

    /// Plays an animation with a label overlaid on every frame.
    pub async fn draw_animation_with_text(
        &self,
        animation: &Animation,
        text: &str,
        x: i32,
        y: i32,
        timing: FrameTiming,
        cancel: &CancellationToken,
    ) -> Result<(), DisplayError> {
        self.play(animation, Some((text, x, y)), timing, cancel).await
    }

    async fn play(
        &self,
        animation: &Animation,
        label: Option<(&str, i32, i32)>,
        timing: FrameTiming,
        cancel: &CancellationToken,
    ) -> Result<(), DisplayError> {
        let composed = animation.compose();
        let mut panel = self.panel.lock().await;

        let mut cycles_left = animation.loop_count;
        loop {
            for (canvas, native_delay) in &composed {
                if cancel.is_cancelled() {
                    return Ok(());
                }

                let mut frame = raster::normalize(canvas, PANEL_WIDTH, PANEL_HEIGHT);
                if let Some((text, x, y)) = label {
                    render_text(&mut frame, text, x, y);
                }
                self.blit_locked(&mut panel, &frame).await?;

                let delay = match timing {
                    FrameTiming::Native => *native_delay,
                    FrameTiming::Fixed(fixed) => fixed,
                };
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if animation.loop_count != 0 {
                cycles_left -= 1;
                if cycles_left == 0 {
                    return Ok(());
                }
            }
        }
    }

    /// Starts hardware scrolling over the pages covering the given line
    /// range. The panel scrolls on its own until the next draw or an
    /// explicit [`Oled::stop_scroll`].
    pub async fn scroll(
        &self,
        direction: ScrollDirection,
        rate: ScrollRate,
        start_line: u8,
        end_line: u8,
    ) -> Result<(), DisplayError> {
        if start_line >= end_line || end_line > PANEL_HEIGHT as u8 {
            return Err(DisplayError::InvalidScrollRange {
                start: start_line,
                end: end_line,
                height: PANEL_HEIGHT as u8,
            });
        }

        let mut panel = self.panel.lock().await;
        self.command(&Command::DeactivateScroll).await?;
        self.command(&Command::SetupScroll {
            direction,
            rate,
            page_start: start_line / 8,
            page_end: (end_line - 1) / 8,
        })
        .await?;
        self.command(&Command::ActivateScroll).await?;
        panel.scrolling = true;
        Ok(())
    }

    pub async fn stop_scroll(&self) -> Result<(), DisplayError> {
        let mut panel = self.panel.lock().await;
        if panel.scrolling {
            self.command(&Command::DeactivateScroll).await?;
            panel.scrolling = false;
        }
        Ok(())
    }
}

fn render_text(frame: &mut FrameBuffer, text: &str, x: i32, y: i32) {
    let background = Rectangle::new(
        Point::new(x, y),
        Size::new(text.chars().count() as u32 * GLYPH_ADVANCE as u32, GLYPH_HEIGHT),
    );
    let Ok(()) = background
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
        .draw(frame);

    let style = MonoTextStyle::new(&FONT_7X13, BinaryColor::On);
    let Ok(_) = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(frame);
}
