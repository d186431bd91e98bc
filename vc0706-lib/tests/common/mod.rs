//! Common test utilities: a simulated VC0706 behind a fake transport

// Allow unused items since this is a shared module used across multiple test
// files - not all items are used in every test file
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;

pub use bytes::Bytes;
pub use vc0706_lib::command::{FrameControl, Opcode};
pub use vc0706_lib::error::{CameraError, TransportError};
pub use vc0706_lib::frame::{FrameReadRequest, FrameState};
pub use vc0706_lib::settings::{BaudRate, ImageSize, Ptz, PtzReport};
pub use vc0706_lib::transport::{Delay, Transport};
pub use vc0706_lib::{CameraConfig, VC0706};
use zerocopy::FromBytes;

/// Firmware string reported by GEN_VERSION
pub const VERSION: &str = "VC0703 1.00";

/// Corruption applied to the next reply the simulator produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    WrongSerial,
    WrongOpcode,
    BadStatus,
    Silent,
    /// Keep only this many bytes of the reply
    Truncate(usize),
}

/// A VC0706 model: parses every frame written to it and queues the reply the
/// real camera would send.
pub struct SimulatedCamera {
    pub serial: u8,
    pub image: Vec<u8>,
    pub frozen: bool,
    pub baud_rate: Option<u32>,
    pub image_size: u8,
    pub compression: u8,
    pub downsize: u8,
    pub motion_enabled: bool,
    pub tv_out: bool,
    pub osd: Vec<u8>,
    pub ptz: [u16; 4],
    /// Frames received from the host, one entry per write
    pub commands: Vec<Vec<u8>>,
    pub faults: VecDeque<Fault>,
    /// Number of upcoming READ_FBUF replies to cut short
    pub short_chunks: usize,
    /// Deliver bytes only on every `gap + 1`-th availability poll
    pub gap: Option<usize>,
    /// Frame length to report instead of the image size
    pub reported_len: Option<u32>,
    rx: VecDeque<u8>,
    polls: usize,
}

impl SimulatedCamera {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            serial: 0,
            image,
            frozen: false,
            baud_rate: None,
            image_size: 0x11,
            compression: 0x36,
            downsize: 0x00,
            motion_enabled: false,
            tv_out: false,
            osd: Vec::new(),
            ptz: [0x0280, 0x01E0, 0x0010, 0x0020],
            commands: Vec::new(),
            faults: VecDeque::new(),
            short_chunks: 0,
            gap: None,
            reported_len: None,
            rx: VecDeque::new(),
            polls: 0,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push_back(fault);
        self
    }

    /// Queue stray bytes as if left over from an earlier exchange
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Queue the unsolicited motion notification
    pub fn notify_motion(&mut self) {
        self.rx.extend([0x76, self.serial, 0x39, 0x00]);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn bytes_written(&self) -> usize {
        self.commands.iter().map(Vec::len).sum()
    }

    fn ack(&self, opcode: u8) -> Vec<u8> {
        vec![0x76, self.serial, opcode, 0x00, 0x00]
    }

    fn data(&self, opcode: u8, payload: &[u8]) -> Vec<u8> {
        let mut reply = vec![0x76, self.serial, opcode, 0x00, payload.len() as u8];
        reply.extend_from_slice(payload);
        reply
    }

    fn respond(&mut self, frame: &[u8]) -> Vec<u8> {
        if frame.len() < 3 || frame[0] != 0x56 {
            return Vec::new();
        }
        let opcode = frame[2];
        let args = &frame[3..];

        match Opcode::from(opcode) {
            Opcode::Reset | Opcode::MotionControl | Opcode::MotionStatus | Opcode::SetPort => self.ack(opcode),
            Opcode::SetZoom => {
                for (slot, pair) in self.ptz.iter_mut().zip(args[1..9].chunks(2)) {
                    *slot = u16::from_be_bytes([pair[0], pair[1]]);
                }
                self.ack(opcode)
            }
            Opcode::GenVersion => self.data(opcode, VERSION.as_bytes()),
            Opcode::FrameBufferControl => {
                match FrameControl::from(args[1]) {
                    FrameControl::Resume => self.frozen = false,
                    _ => self.frozen = true,
                }
                self.ack(opcode)
            }
            Opcode::GetFrameBufferLength => {
                let length = self.reported_len.unwrap_or(self.image.len() as u32);
                self.data(opcode, &length.to_be_bytes())
            }
            Opcode::ReadFrameBuffer => {
                let request = FrameReadRequest::read_from_bytes(args).expect("13-byte frame read request");
                let start = (request.offset.get() as usize).min(self.image.len());
                let end = (start + request.length.get() as usize).min(self.image.len());
                let mut reply = self.ack(opcode);
                if self.short_chunks > 0 {
                    self.short_chunks -= 1;
                    let half = start + (end - start) / 2;
                    reply.extend_from_slice(&self.image[start..half]);
                    return reply;
                }
                reply.extend_from_slice(&self.image[start..end]);
                reply.extend(self.ack(opcode));
                reply
            }
            Opcode::ReadData => {
                let value = if args[1..] == [0x01, 0x01, 0x12, 0x04] {
                    self.compression
                } else {
                    self.image_size
                };
                self.data(opcode, &[value])
            }
            Opcode::WriteData => {
                let value = args[args.len() - 1];
                if args[1..5] == [0x01, 0x01, 0x12, 0x04] {
                    self.compression = value;
                } else {
                    self.image_size = value;
                }
                self.ack(opcode)
            }
            Opcode::DownsizeControl => {
                self.downsize = args[1];
                self.ack(opcode)
            }
            Opcode::DownsizeStatus => self.data(opcode, &[self.downsize]),
            Opcode::CommMotionControl => {
                self.motion_enabled = args[1] != 0;
                self.ack(opcode)
            }
            Opcode::CommMotionStatus => self.data(opcode, &[self.motion_enabled as u8]),
            Opcode::TvOutControl => {
                self.tv_out = args[1] != 0;
                self.ack(opcode)
            }
            Opcode::OsdAddChar => {
                self.osd = args.to_vec();
                self.ack(opcode)
            }
            Opcode::GetZoom => {
                let mut payload = Vec::new();
                payload.extend_from_slice(&640u16.to_be_bytes());
                payload.extend_from_slice(&480u16.to_be_bytes());
                for value in self.ptz {
                    payload.extend_from_slice(&value.to_be_bytes());
                }
                // Real replies carry 11 payload bytes
                payload.truncate(11);
                self.data(opcode, &payload)
            }
            _ => vec![0x76, self.serial, opcode, 0x03, 0x00],
        }
    }

    fn apply_fault(reply: &mut Vec<u8>, fault: Fault) {
        match fault {
            Fault::WrongSerial => reply[1] = reply[1].wrapping_add(1),
            Fault::WrongOpcode => reply[2] = reply[2].wrapping_add(1),
            Fault::BadStatus => reply[3] = 0x01,
            Fault::Silent => reply.clear(),
            Fault::Truncate(len) => reply.truncate(len),
        }
    }
}

impl Transport for SimulatedCamera {
    fn begin(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.baud_rate = Some(baud_rate);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.commands.push(bytes.to_vec());
        let mut reply = self.respond(bytes);
        if let Some(fault) = self.faults.pop_front() {
            Self::apply_fault(&mut reply, fault);
        }
        self.rx.extend(reply);
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        self.polls += 1;
        if let Some(gap) = self.gap {
            if self.polls % (gap + 1) != 0 {
                return Ok(0);
            }
        }
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        self.rx
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "simulated camera has no data").into())
    }
}

/// Counts idle units instead of sleeping
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub units: usize,
}

impl Delay for CountingDelay {
    fn idle(&mut self) {
        self.units += 1;
    }
}

pub type SimCamera = VC0706<SimulatedCamera, CountingDelay>;

pub fn camera(sim: SimulatedCamera) -> SimCamera {
    VC0706::with_delay(sim, CountingDelay::default())
}

/// Deterministic JPEG-looking payload of `len` bytes
pub fn fake_jpeg(len: usize) -> Vec<u8> {
    let mut image: Vec<u8> = (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8).collect();
    if len >= 4 {
        image[..2].copy_from_slice(&[0xFF, 0xD8]);
        image[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
    }
    image
}
