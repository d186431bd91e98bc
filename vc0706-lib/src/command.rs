//! Command framing and reply validation for the VC0706 wire protocol.
//!
//! A command is `0x56, serial, opcode, args...`. Every reply starts with
//! `0x76, serial, opcode, status` where a status of `0x00` means success,
//! followed by opcode-specific payload.

use crate::constants::{COMMAND_PREFIX, REPLY_HEADER_SIZE, REPLY_PREFIX, STATUS_OK};
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};

/// Command opcodes understood by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    GenVersion = 0x11,
    SetPort = 0x24,
    Reset = 0x26,
    ReadData = 0x30,
    WriteData = 0x31,
    ReadFrameBuffer = 0x32,
    GetFrameBufferLength = 0x34,
    FrameBufferControl = 0x36,
    CommMotionControl = 0x37,
    CommMotionStatus = 0x38,
    CommMotionDetected = 0x39,
    MotionControl = 0x42,
    MotionStatus = 0x43,
    TvOutControl = 0x44,
    OsdAddChar = 0x45,
    SetZoom = 0x52,
    GetZoom = 0x53,
    DownsizeControl = 0x54,
    DownsizeStatus = 0x55,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Sub-commands of `Opcode::FrameBufferControl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum FrameControl {
    StopCurrentFrame = 0x00,
    StopNextFrame = 0x01,
    Step = 0x02,
    Resume = 0x03,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Build the wire bytes of a command.
pub fn encode_command(serial_number: u8, opcode: Opcode, args: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(3 + args.len());
    frame.put_u8(COMMAND_PREFIX);
    frame.put_u8(serial_number);
    frame.put_u8(opcode.into());
    frame.extend_from_slice(args);
    frame.freeze()
}

/// Check the four header bytes of a reply against the command that produced it.
pub fn verify_header(reply: &[u8], serial_number: u8, opcode: Opcode) -> bool {
    if reply.len() < REPLY_HEADER_SIZE {
        return false;
    }
    reply[0] == REPLY_PREFIX
        && reply[1] == serial_number
        && reply[2] == u8::from(opcode)
        && reply[3] == STATUS_OK
}
