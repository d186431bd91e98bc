use crate::command::{Opcode, encode_command, verify_header};
use crate::config::{CameraConfig, Timing};
use crate::constants::{
    ACTIVATE_MOTION, CAMERA_BUFFER_SIZE, FLUSH_SIZE, MOTION_CONTROL, REPLY_HEADER_SIZE, REPLY_PAYLOAD_OFFSET,
    UART_MOTION,
};
use crate::error::CameraError;
use crate::frame::FrameState;
use crate::settings::{BaudRate, ImageSize, Ptz, PtzReport, PtzReportRaw, PtzRequestRaw, encode_osd_text};
use crate::transport::{Delay, ThreadDelay, Transport};
use bytes::Bytes;
use num_enum::FromPrimitive;
use tracing::{debug, info, warn};
use zerocopy::IntoBytes;

// Reply lengths, header included
const ACK_LEN: usize = 5;
const REGISTER_REPLY_LEN: usize = 6;
const PTZ_REPLY_LEN: usize = 16;

// Register sub-addresses for READ_DATA / WRITE_DATA
const IMAGE_SIZE_REGISTER: [u8; 3] = [0x01, 0x00, 0x19];
const COMPRESSION_REGISTER: [u8; 4] = [0x01, 0x01, 0x12, 0x04];

/// Represents a session with a VC0706 camera on a serial transport.
///
/// Every command overwrites the receive buffer in place, so a reply must be
/// fully consumed before the next call.
pub struct VC0706<T, D = ThreadDelay> {
    transport: T,
    delay: D,
    serial_number: u8,
    timing: Timing,
    buffer: [u8; CAMERA_BUFFER_SIZE],
    buffer_len: usize,
    pub(crate) frame_state: FrameState,
    pub(crate) frame_ptr: u32,
    pub(crate) frame_len: Option<u32>,
}

impl<T: Transport> VC0706<T, ThreadDelay> {
    /// Create a session with default timing and serial number 0
    pub fn new(transport: T) -> Self {
        Self::with_delay(transport, ThreadDelay::default())
    }

    /// Create a session whose idle unit and timeouts come from `config`
    pub fn from_config(transport: T, config: &CameraConfig) -> Self {
        Self::with_config(transport, ThreadDelay::new(config.idle_unit()), config)
    }
}

impl<T: Transport, D: Delay> VC0706<T, D> {
    pub fn with_delay(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            serial_number: 0,
            timing: Timing::default(),
            buffer: [0; CAMERA_BUFFER_SIZE],
            buffer_len: 0,
            frame_state: FrameState::Streaming,
            frame_ptr: 0,
            frame_len: None,
        }
    }

    pub fn with_config(transport: T, delay: D, config: &CameraConfig) -> Self {
        let mut camera = Self::with_delay(transport, delay);
        camera.serial_number = config.serial_number;
        camera.timing = Timing::from(config);
        camera
    }

    pub fn serial_number(&self) -> u8 {
        self.serial_number
    }

    pub fn set_serial_number(&mut self, serial_number: u8) {
        self.serial_number = serial_number;
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Bytes captured by the most recent read
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.buffer_len]
    }

    /// Number of bytes captured by the most recent read
    pub fn available(&self) -> usize {
        self.buffer_len
    }

    /// Open the transport at `baud_rate` and soft-reset the camera
    pub fn begin(&mut self, baud_rate: u32) -> Result<(), CameraError> {
        self.transport.begin(baud_rate)?;
        self.reset()
    }

    /// Re-open the transport at `baud_rate` without talking to the camera,
    /// e.g. after `set_baud_rate`.
    pub fn reopen(&mut self, baud_rate: u32) -> Result<(), CameraError> {
        info!(baud_rate, "Reopening transport");
        self.transport.begin(baud_rate)?;
        Ok(())
    }

    // --- Command engine ---

    /// Frame and write a command. No reply is read.
    pub fn send_command(&mut self, opcode: Opcode, args: &[u8]) -> Result<(), CameraError> {
        let frame = encode_command(self.serial_number, opcode, args);
        debug!(bytes = hex::encode(&frame), "Serial Write");
        self.transport.write(&frame)?;
        Ok(())
    }

    /// Poll the transport until `expected` bytes arrive or `timeout` consecutive
    /// idle polls pass. Any byte resets the idle count. Returns the number of
    /// bytes captured into the buffer.
    pub fn read_response(&mut self, expected: usize, timeout: u16) -> Result<usize, CameraError> {
        let expected = expected.min(CAMERA_BUFFER_SIZE);
        let mut idle: u16 = 0;
        self.buffer_len = 0;

        while idle != timeout && self.buffer_len != expected {
            if self.transport.bytes_available()? == 0 {
                self.delay.idle();
                idle += 1;
                continue;
            }
            idle = 0;
            self.buffer[self.buffer_len] = self.transport.read_byte()?;
            self.buffer_len += 1;
        }

        if self.buffer_len > 0 {
            debug!(bytes = hex::encode(self.buffer()), "Serial Read");
        }
        Ok(self.buffer_len)
    }

    /// Check the captured reply header against `opcode` and the session serial number
    pub fn verify_response(&self, opcode: Opcode) -> bool {
        verify_header(self.buffer(), self.serial_number, opcode)
    }

    /// Best-effort drain of stale bytes left by an earlier exchange
    pub fn flush_input(&mut self) -> Result<usize, CameraError> {
        let drained = self.read_response(FLUSH_SIZE, self.timing.flush_timeout)?;
        if drained > 0 {
            debug!(drained, "Discarded stale bytes");
        }
        Ok(drained)
    }

    /// Send a command and wait for a validated reply of exactly `response_len`
    /// bytes, which is left in the buffer. With `flush` set, stale input is
    /// drained first.
    pub fn run_command(
        &mut self,
        opcode: Opcode,
        args: &[u8],
        response_len: usize,
        flush: bool,
    ) -> Result<(), CameraError> {
        if flush {
            self.flush_input()?;
        }

        self.send_command(opcode, args)?;

        let received = self.read_response(response_len, self.timing.response_timeout)?;
        if received != response_len {
            warn!(?opcode, expected = response_len, received, "Reply timed out");
            return Err(CameraError::Timeout {
                opcode,
                expected: response_len,
                received,
            });
        }

        if !self.verify_response(opcode) {
            let header = self.buffer()[..REPLY_HEADER_SIZE.min(received)].to_vec();
            warn!(?opcode, header = hex::encode(&header), "Reply rejected");
            return Err(CameraError::InvalidResponse { opcode, header });
        }
        Ok(())
    }

    fn reply_byte(&self, index: usize) -> u8 {
        self.buffer[index]
    }

    // --- Device commands ---

    /// Soft reset the camera
    pub fn reset(&mut self) -> Result<(), CameraError> {
        info!("Resetting camera");
        self.run_command(Opcode::Reset, &[0x00], ACK_LEN, true)
    }

    /// Firmware version string, e.g. "VC0703 1.00"
    pub fn get_version(&mut self) -> Result<String, CameraError> {
        self.send_command(Opcode::GenVersion, &[0x01])?;
        let received = self.read_response(CAMERA_BUFFER_SIZE, self.timing.response_timeout)?;
        if received < REPLY_PAYLOAD_OFFSET {
            return Err(CameraError::Timeout {
                opcode: Opcode::GenVersion,
                expected: REPLY_PAYLOAD_OFFSET,
                received,
            });
        }
        if !self.verify_response(Opcode::GenVersion) {
            return Err(CameraError::InvalidResponse {
                opcode: Opcode::GenVersion,
                header: self.buffer()[..REPLY_HEADER_SIZE].to_vec(),
            });
        }

        let version = String::from_utf8_lossy(&self.buffer()[REPLY_PAYLOAD_OFFSET..]);
        Ok(version.trim_end_matches('\0').trim().to_string())
    }

    pub fn tv_on(&mut self) -> Result<(), CameraError> {
        self.run_command(Opcode::TvOutControl, &[0x01, 0x01], ACK_LEN, true)
    }

    pub fn tv_off(&mut self) -> Result<(), CameraError> {
        self.run_command(Opcode::TvOutControl, &[0x01, 0x00], ACK_LEN, true)
    }

    pub fn get_image_size(&mut self) -> Result<ImageSize, CameraError> {
        let mut args = vec![0x04, 0x04];
        args.extend_from_slice(&IMAGE_SIZE_REGISTER);
        self.run_command(Opcode::ReadData, &args, REGISTER_REPLY_LEN, true)?;
        Ok(ImageSize::from_primitive(self.reply_byte(5)))
    }

    /// Takes effect after the next `reset`.
    pub fn set_image_size(&mut self, size: ImageSize) -> Result<(), CameraError> {
        info!(%size, "Setting image size");
        let mut args = vec![0x05, size.register_bank()];
        args.extend_from_slice(&IMAGE_SIZE_REGISTER);
        args.push(size.into());
        self.run_command(Opcode::WriteData, &args, ACK_LEN, true)
    }

    pub fn get_downsize(&mut self) -> Result<u8, CameraError> {
        self.run_command(Opcode::DownsizeStatus, &[0x00], REGISTER_REPLY_LEN, true)?;
        Ok(self.reply_byte(5))
    }

    pub fn set_downsize(&mut self, downsize: u8) -> Result<(), CameraError> {
        self.run_command(Opcode::DownsizeControl, &[0x01, downsize], ACK_LEN, true)
    }

    pub fn get_compression(&mut self) -> Result<u8, CameraError> {
        let mut args = vec![0x04];
        args.extend_from_slice(&COMPRESSION_REGISTER);
        self.run_command(Opcode::ReadData, &args, REGISTER_REPLY_LEN, true)?;
        Ok(self.reply_byte(5))
    }

    pub fn set_compression(&mut self, compression: u8) -> Result<(), CameraError> {
        let mut args = vec![0x05];
        args.extend_from_slice(&COMPRESSION_REGISTER);
        args.push(compression);
        self.run_command(Opcode::WriteData, &args, ACK_LEN, true)
    }

    pub fn set_motion_status(&mut self, x: u8, d1: u8, d2: u8) -> Result<(), CameraError> {
        self.run_command(Opcode::MotionControl, &[0x03, x, d1, d2], ACK_LEN, true)
    }

    /// Query motion register `x`. The camera answers with a bare acknowledgement.
    pub fn get_motion_status(&mut self, x: u8) -> Result<(), CameraError> {
        self.run_command(Opcode::MotionStatus, &[0x01, x], ACK_LEN, true)
    }

    /// Route motion reports to the UART, then switch detection on or off
    pub fn set_motion_detect(&mut self, enabled: bool) -> Result<(), CameraError> {
        info!(enabled, "Setting motion detection");
        self.set_motion_status(MOTION_CONTROL, UART_MOTION, ACTIVATE_MOTION)?;
        self.run_command(Opcode::CommMotionControl, &[0x01, enabled as u8], ACK_LEN, true)
    }

    pub fn get_motion_detect(&mut self) -> Result<bool, CameraError> {
        self.run_command(Opcode::CommMotionStatus, &[0x00], REGISTER_REPLY_LEN, true)?;
        Ok(self.reply_byte(5) != 0)
    }

    /// Wait for the unsolicited motion notification. Sends nothing.
    /// `Ok(false)` when no notification arrived within the response budget.
    pub fn motion_detected(&mut self) -> Result<bool, CameraError> {
        let received = self.read_response(REPLY_HEADER_SIZE, self.timing.response_timeout)?;
        if received != REPLY_HEADER_SIZE {
            return Ok(false);
        }
        if !self.verify_response(Opcode::CommMotionDetected) {
            return Err(CameraError::InvalidResponse {
                opcode: Opcode::CommMotionDetected,
                header: self.buffer().to_vec(),
            });
        }
        info!("Motion detected");
        Ok(true)
    }

    pub fn get_ptz(&mut self) -> Result<PtzReport, CameraError> {
        self.run_command(Opcode::GetZoom, &[0x00], PTZ_REPLY_LEN, true)?;

        // The 16-byte reply ends one byte short of the six fields
        let mut fields = [0u8; 12];
        let payload = &self.buffer()[REPLY_PAYLOAD_OFFSET..];
        fields[..payload.len()].copy_from_slice(payload);
        let raw: PtzReportRaw = zerocopy::transmute!(fields);
        Ok(PtzReport::from(raw))
    }

    pub fn set_ptz(&mut self, ptz: Ptz) -> Result<(), CameraError> {
        let request = PtzRequestRaw::from(ptz);
        self.run_command(Opcode::SetZoom, request.as_bytes(), ACK_LEN, true)
    }

    /// Overlay text at column `x` (0..=3), row `y` (0..=15). Text longer than
    /// 14 characters is cut to 13.
    pub fn osd(&mut self, x: u8, y: u8, text: &str) -> Result<(), CameraError> {
        let args = encode_osd_text(x, y, text)?;
        self.run_command(Opcode::OsdAddChar, &args, ACK_LEN, true)
    }

    /// Ask the camera to switch serial speed. Any non-empty reply is returned
    /// raw and unvalidated; the caller must `reopen` the transport at the new rate.
    pub fn set_baud_rate(&mut self, rate: BaudRate) -> Result<Bytes, CameraError> {
        info!(%rate, "Changing camera baud rate");
        let [hi, lo] = rate.divisor_code();
        self.send_command(Opcode::SetPort, &[0x03, 0x01, hi, lo])?;
        let received = self.read_response(CAMERA_BUFFER_SIZE, self.timing.response_timeout)?;
        if received == 0 {
            return Err(CameraError::Timeout {
                opcode: Opcode::SetPort,
                expected: REPLY_PAYLOAD_OFFSET,
                received,
            });
        }
        Ok(Bytes::copy_from_slice(self.buffer()))
    }
}
