use crate::constants::{OSD_MAX_TEXT_LEN, OSD_TRUNCATED_LEN};
use crate::error::CameraError;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use zerocopy::byteorder::big_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Resolution register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum ImageSize {
    #[strum(to_string = "640x480")]
    Vga = 0x00,
    #[strum(to_string = "320x240")]
    Qvga = 0x11,
    #[strum(to_string = "160x120")]
    Qqvga = 0x22,
    #[strum(to_string = "1024x768")]
    Xga = 0x33,
    #[strum(to_string = "1280x720")]
    Hd720 = 0x44,
    #[strum(to_string = "1280x960")]
    Sxga = 0x55,
    #[strum(to_string = "1920x1080")]
    Hd1080 = 0x66,

    #[num_enum(catch_all)]
    #[strum(to_string = "unknown")]
    Unknown(u8),
}

impl ImageSize {
    /// Register bank byte of the write-register prefix. Sizes from 1024x768
    /// up live in bank 0x05.
    pub fn register_bank(self) -> u8 {
        if u8::from(self) < u8::from(ImageSize::Xga) { 0x04 } else { 0x05 }
    }
}

/// Supported serial speeds and their SET_PORT divisor codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum BaudRate {
    #[strum(to_string = "9600")]
    B9600 = 9_600,
    #[strum(to_string = "19200")]
    B19200 = 19_200,
    #[strum(to_string = "38400")]
    B38400 = 38_400,
    #[strum(to_string = "57600")]
    B57600 = 57_600,
    #[strum(to_string = "115200")]
    B115200 = 115_200,
}

impl BaudRate {
    pub fn from_bps(bps: u32) -> Result<Self, CameraError> {
        BaudRate::try_from(bps).map_err(|_| CameraError::UnsupportedBaudRate(bps))
    }

    pub fn as_bps(self) -> u32 {
        self.into()
    }

    /// The two rate bytes sent after `0x03, 0x01` in a SET_PORT command.
    pub fn divisor_code(self) -> [u8; 2] {
        match self {
            BaudRate::B9600 => [0xAE, 0xC8],
            BaudRate::B19200 => [0x56, 0xE4],
            BaudRate::B38400 => [0x2A, 0xF2],
            BaudRate::B57600 => [0x1C, 0x1C],
            BaudRate::B115200 => [0x0D, 0xA6],
        }
    }
}

/// Pan/tilt/zoom window of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ptz {
    pub rotation: u16,
    pub horizontal: u16,
    pub pan: u16,
    pub tilt: u16,
}

/// GET_ZOOM reply: image dimensions followed by the PTZ window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PtzReport {
    pub width: u16,
    pub height: u16,
    pub ptz: Ptz,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PtzReportRaw {
    pub width: U16,
    pub height: U16,
    pub rotation: U16,
    pub horizontal: U16,
    pub pan: U16,
    pub tilt: U16,
}

impl From<PtzReportRaw> for PtzReport {
    fn from(raw: PtzReportRaw) -> Self {
        Self {
            width: raw.width.get(),
            height: raw.height.get(),
            ptz: Ptz {
                rotation: raw.rotation.get(),
                horizontal: raw.horizontal.get(),
                pan: raw.pan.get(),
                tilt: raw.tilt.get(),
            },
        }
    }
}

/// SET_ZOOM argument block (9 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PtzRequestRaw {
    pub len: u8,
    pub rotation: U16,
    pub horizontal: U16,
    pub pan: U16,
    pub tilt: U16,
}

impl From<Ptz> for PtzRequestRaw {
    fn from(ptz: Ptz) -> Self {
        Self {
            len: 0x08,
            rotation: U16::new(ptz.rotation),
            horizontal: U16::new(ptz.horizontal),
            pan: U16::new(ptz.pan),
            tilt: U16::new(ptz.tilt),
        }
    }
}

/// Position byte of an OSD_ADD_CHAR command.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OsdPosition {
    pub y: B4,
    pub x: B2,
    #[skip]
    unused: B2,
}

impl OsdPosition {
    /// Out-of-range coordinates are masked to the field widths.
    pub fn at(x: u8, y: u8) -> Self {
        OsdPosition::new().with_y(y & 0x0F).with_x(x & 0x03)
    }
}

/// Map an ASCII character to the camera's OSD glyph table.
/// Digits are 0..=9, upper case 10..=35, lower case 36..=61. Anything else
/// is passed through unchanged.
pub fn osd_glyph(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'Z' => c - b'A' + 10,
        b'a'..=b'z' => c - b'a' + 36,
        _ => c,
    }
}

/// Build the OSD_ADD_CHAR argument block: length, length - 1, position, glyphs.
pub fn encode_osd_text(x: u8, y: u8, text: &str) -> Result<Vec<u8>, CameraError> {
    let mut glyphs: Vec<u8> = text.bytes().map(osd_glyph).collect();
    if glyphs.len() > OSD_MAX_TEXT_LEN {
        glyphs.truncate(OSD_TRUNCATED_LEN);
    }
    if glyphs.is_empty() {
        return Err(CameraError::InvalidArgument("OSD text must not be empty".to_string()));
    }

    let len = glyphs.len() as u8;
    let mut args = Vec::with_capacity(3 + glyphs.len());
    args.push(len);
    args.push(len - 1);
    args.push(OsdPosition::at(x, y).into_bytes()[0]);
    args.extend_from_slice(&glyphs);
    Ok(args)
}
