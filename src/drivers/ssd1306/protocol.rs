//! SSD1306 command set.
//!
//! Every bus write to the panel starts with a control byte: 0x00 for
//! commands, 0x40 for frame data. [`Command::to_bytes`] produces the
//! full wire packet including the control byte.

/// Command bytes from the SSD1306 datasheet.
#[allow(dead_code)]
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const NORMAL_DISPLAY: u8 = 0xA6;
    pub const INVERTED_DISPLAY: u8 = 0xA7;
    pub const DISPLAY_RAM_CONTENT: u8 = 0xA4;
    pub const SET_MEMORY_MODE: u8 = 0x20;
    pub const SET_COLUMN_ADDRESS: u8 = 0x21;
    pub const SET_PAGE_ADDRESS: u8 = 0x22;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
    pub const SEG_REMAP_NORMAL: u8 = 0xA0;
    pub const SEG_REMAP_REVERSE: u8 = 0xA1;
    pub const COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const SCROLL_RIGHT: u8 = 0x26;
    pub const SCROLL_LEFT: u8 = 0x27;
    pub const SCROLL_VERTICAL_RIGHT: u8 = 0x29;
    pub const SCROLL_VERTICAL_LEFT: u8 = 0x2A;
    pub const DEACTIVATE_SCROLL: u8 = 0x2E;
    pub const ACTIVATE_SCROLL: u8 = 0x2F;
}

const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

/// Hardware scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Left,
    Right,
    UpLeft,
    UpRight,
}

/// Scroll step interval in display frames.
///
/// The panel encodes the interval as a 3-bit code that is not monotonic
/// in the frame count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRate {
    Frames2,
    Frames3,
    Frames4,
    Frames5,
    Frames25,
    Frames64,
    Frames128,
    Frames256,
}

impl ScrollRate {
    pub fn code(self) -> u8 {
        match self {
            ScrollRate::Frames5 => 0b000,
            ScrollRate::Frames64 => 0b001,
            ScrollRate::Frames128 => 0b010,
            ScrollRate::Frames256 => 0b011,
            ScrollRate::Frames3 => 0b100,
            ScrollRate::Frames4 => 0b101,
            ScrollRate::Frames25 => 0b110,
            ScrollRate::Frames2 => 0b111,
        }
    }
}

/// One panel command with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Full power-on initialization.
    Init { mirror_horizontal: bool },
    SetContrast(u8),
    Invert(bool),
    /// Column and page window for the next data burst.
    DrawWindow {
        column_start: u8,
        column_end: u8,
        page_start: u8,
        page_end: u8,
    },
    SetupScroll {
        direction: ScrollDirection,
        rate: ScrollRate,
        page_start: u8,
        page_end: u8,
    },
    ActivateScroll,
    DeactivateScroll,
}

impl Command {
    /// Encodes the command as a complete wire packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![CONTROL_COMMAND];
        match *self {
            Command::Init { mirror_horizontal } => {
                let seg_remap = if mirror_horizontal {
                    cmd::SEG_REMAP_NORMAL
                } else {
                    cmd::SEG_REMAP_REVERSE
                };
                bytes.extend_from_slice(&[
                    cmd::DISPLAY_OFF,
                    cmd::SET_CLOCK_DIV,
                    0x80,
                    cmd::SET_MUX_RATIO,
                    0x3F,
                    cmd::SET_DISPLAY_OFFSET,
                    0x00,
                    cmd::SET_START_LINE,
                    cmd::SET_CHARGE_PUMP,
                    0x14,
                    cmd::SET_MEMORY_MODE,
                    0x00, // horizontal addressing
                    seg_remap,
                    cmd::COM_SCAN_DEC,
                    cmd::SET_COM_PINS,
                    0x12,
                    cmd::SET_CONTRAST,
                    0xCF,
                    cmd::SET_PRECHARGE,
                    0xF1,
                    cmd::SET_VCOM_DETECT,
                    0x40,
                    cmd::DISPLAY_RAM_CONTENT,
                    cmd::NORMAL_DISPLAY,
                    cmd::DISPLAY_ON,
                ]);
            }
            Command::SetContrast(level) => bytes.extend_from_slice(&[cmd::SET_CONTRAST, level]),
            Command::Invert(on) => bytes.push(if on {
                cmd::INVERTED_DISPLAY
            } else {
                cmd::NORMAL_DISPLAY
            }),
            Command::DrawWindow {
                column_start,
                column_end,
                page_start,
                page_end,
            } => bytes.extend_from_slice(&[
                cmd::SET_COLUMN_ADDRESS,
                column_start,
                column_end,
                cmd::SET_PAGE_ADDRESS,
                page_start,
                page_end,
            ]),
            Command::SetupScroll {
                direction,
                rate,
                page_start,
                page_end,
            } => match direction {
                ScrollDirection::Right | ScrollDirection::Left => bytes.extend_from_slice(&[
                    if direction == ScrollDirection::Right {
                        cmd::SCROLL_RIGHT
                    } else {
                        cmd::SCROLL_LEFT
                    },
                    0x00,
                    page_start,
                    rate.code(),
                    page_end,
                    0x00,
                    0xFF,
                ]),
                ScrollDirection::UpRight | ScrollDirection::UpLeft => bytes.extend_from_slice(&[
                    if direction == ScrollDirection::UpRight {
                        cmd::SCROLL_VERTICAL_RIGHT
                    } else {
                        cmd::SCROLL_VERTICAL_LEFT
                    },
                    0x00,
                    page_start,
                    rate.code(),
                    page_end,
                    0x01, // one row of vertical offset per step
                ]),
            },
            Command::ActivateScroll => bytes.push(cmd::ACTIVATE_SCROLL),
            Command::DeactivateScroll => bytes.push(cmd::DEACTIVATE_SCROLL),
        }
        bytes
    }
}

/// Wraps one chunk of frame data in a data packet.
pub fn data_packet(chunk: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(chunk.len() + 1);
    bytes.push(CONTROL_DATA);
    bytes.extend_from_slice(chunk);
    bytes
}
