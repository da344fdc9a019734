//! 1-bit page-addressed frame buffer.
//!
//! The SSD1306 groups rows into pages of eight: the byte at
//! `page * width + x` holds pixels `(x, page*8 .. page*8+8)`, least
//! significant bit on top. The buffer is created per render operation
//! and never shared between concurrent renders.

use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Size};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let pages = height.div_ceil(8);
        Self {
            width,
            height,
            buf: vec![0; (pages * width) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn page_count(&self) -> u32 {
        self.height.div_ceil(8)
    }

    /// Raw page-major bytes, ready for a data burst.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Sets one pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = ((y / 8) * self.width + x) as usize;
        let bit = 1 << (y % 8);
        if on {
            self.buf[idx] |= bit;
        } else {
            self.buf[idx] &= !bit;
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }

        let idx = ((y / 8) * self.width + x) as usize;
        self.buf[idx] & (1 << (y % 8)) != 0
    }

    /// Switches every pixel off.
    pub fn clear(&mut self) {
        self.buf.fill(0);
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}
