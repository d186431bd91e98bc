use crate::command::Opcode;
use std::io;
use thiserror::Error;

/// Failure of the byte channel underneath the protocol. Always fatal.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport used before begin()")]
    NotOpen,
}

/// The primary error type for the `vc0706-lib` library.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Timeout waiting for reply to {opcode:?}: expected {expected} bytes, got {received}")]
    Timeout {
        opcode: Opcode,
        expected: usize,
        received: usize,
    },

    #[error("Invalid reply to {opcode:?}: header {header:02x?}")]
    InvalidResponse { opcode: Opcode, header: Vec<u8> },

    #[error("Chunk of {requested} bytes at offset {offset} runs past frame length {length}")]
    FrameBounds { offset: u32, requested: u32, length: u32 },

    #[error("Chunk size {requested} out of range 1..={max}")]
    ChunkSize { requested: u8, max: u8 },

    #[error("Frame buffer is not frozen. Take a picture first")]
    NotFrozen,

    #[error("Frame length unknown. Query frame_length() after taking a picture")]
    FrameLengthUnknown,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl CameraError {
    /// Timeouts and rejected replies. The operation may be retried after a flush.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::Timeout { .. } | CameraError::InvalidResponse { .. })
    }
}
