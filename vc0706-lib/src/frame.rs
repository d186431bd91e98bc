//! Frame buffer session: freeze the current frame, measure it, and page the
//! JPEG bytes out in bounded chunks.
//!
//! The camera never signals the end of a frame. The session tracks a cursor
//! into the frozen buffer and refuses any read that would run past the length
//! reported by `frame_length`.

use crate::command::{FrameControl, Opcode};
use crate::constants::{MAX_CHUNK_SIZE, REPLY_PAYLOAD_OFFSET};
use crate::device::VC0706;
use crate::error::CameraError;
use crate::transport::{Delay, Transport};
use bytes::Bytes;
use strum_macros::Display;
use tracing::{debug, info, warn};
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

const FRAME_LENGTH_REPLY_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum FrameState {
    /// Camera is producing live frames
    #[default]
    Streaming,
    /// A frame is latched and the cursor is at its start
    Frozen,
    /// Chunks of the latched frame are being read
    Draining,
}

/// READ_FBUF argument block (13 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameReadRequest {
    pub len: u8,
    /// 0x00 selects the current frame
    pub frame: u8,
    /// 0x0A requests data over the UART
    pub mode: u8,
    pub offset: U32,
    pub length: U32,
    pub delay: U16,
}

impl FrameReadRequest {
    pub fn new(offset: u32, length: u8, delay: u16) -> Self {
        Self {
            len: 0x0C,
            frame: 0x00,
            mode: 0x0A,
            offset: U32::new(offset),
            length: U32::new(length as u32),
            delay: U16::new(delay),
        }
    }
}

impl<T: Transport, D: Delay> VC0706<T, D> {
    /// Send a frame buffer control command and track the resulting state
    pub fn frame_buffer_control(&mut self, control: FrameControl) -> Result<(), CameraError> {
        let freezes = !matches!(control, FrameControl::Resume);
        if freezes {
            self.frame_ptr = 0;
            self.frame_len = None;
        }

        self.run_command(Opcode::FrameBufferControl, &[0x01, control.into()], 5, true)?;

        self.frame_state = if freezes {
            FrameState::Frozen
        } else {
            self.frame_len = None;
            FrameState::Streaming
        };
        debug!(?control, state = %self.frame_state, "Frame buffer control");
        Ok(())
    }

    /// Latch the current frame and rewind the cursor
    pub fn take_picture(&mut self) -> Result<(), CameraError> {
        info!("Taking picture");
        self.frame_buffer_control(FrameControl::StopCurrentFrame)
    }

    /// Release the latched frame and go back to live video
    pub fn resume_video(&mut self) -> Result<(), CameraError> {
        info!("Resuming video");
        self.frame_buffer_control(FrameControl::Resume)
    }

    /// Size in bytes of the frame buffer. Remembered as the read limit when a
    /// frame is latched.
    pub fn frame_length(&mut self) -> Result<u32, CameraError> {
        self.run_command(Opcode::GetFrameBufferLength, &[0x01, 0x00], FRAME_LENGTH_REPLY_LEN, true)?;

        let bytes = &self.buffer()[REPLY_PAYLOAD_OFFSET..FRAME_LENGTH_REPLY_LEN];
        let length = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if self.frame_state != FrameState::Streaming {
            self.frame_len = Some(length);
        }
        info!(length, "Frame buffer length");
        Ok(length)
    }

    /// Read the next `n` bytes of the latched frame and advance the cursor.
    ///
    /// Rejected before anything is sent when no frame is latched, the length
    /// is unknown, `n` is outside `1..=MAX_CHUNK_SIZE`, or the chunk would run
    /// past the end of the frame.
    pub fn read_chunk(&mut self, n: u8) -> Result<Bytes, CameraError> {
        if self.frame_state == FrameState::Streaming {
            return Err(CameraError::NotFrozen);
        }
        let length = self.frame_len.ok_or(CameraError::FrameLengthUnknown)?;
        if n == 0 || n > MAX_CHUNK_SIZE {
            return Err(CameraError::ChunkSize {
                requested: n,
                max: MAX_CHUNK_SIZE,
            });
        }
        let offset = self.frame_ptr;
        if offset as u64 + n as u64 > length as u64 {
            return Err(CameraError::FrameBounds {
                offset,
                requested: n as u32,
                length,
            });
        }

        // The camera answers with header, data, then the header again. A flush
        // here would throw the burst away.
        let request = FrameReadRequest::new(offset % length, n, self.timing().device_delay);
        self.run_command(Opcode::ReadFrameBuffer, request.as_bytes(), REPLY_PAYLOAD_OFFSET, false)?;

        let wanted = n as usize;
        let expected = wanted + REPLY_PAYLOAD_OFFSET;
        let received = self.read_response(expected, self.timing().chunk_timeout)?;
        if received < wanted {
            warn!(offset, wanted, received, "Frame data burst cut short");
            return Err(CameraError::Timeout {
                opcode: Opcode::ReadFrameBuffer,
                expected,
                received,
            });
        }
        if received < expected {
            debug!(received, expected, "Frame data trailer incomplete");
        }

        let chunk = Bytes::copy_from_slice(&self.buffer()[..wanted]);
        self.frame_ptr += n as u32;
        self.frame_state = FrameState::Draining;
        Ok(chunk)
    }

    /// Byte offset of the next chunk within the latched frame
    pub fn frame_cursor(&self) -> u32 {
        self.frame_ptr
    }

    pub fn frame_state(&self) -> FrameState {
        self.frame_state
    }

    /// Bytes left to read, once the frame length is known
    pub fn frame_remaining(&self) -> Option<u32> {
        self.frame_len.map(|len| len.saturating_sub(self.frame_ptr))
    }
}
