use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_TIMEOUT, DEFAULT_DEVICE_DELAY, DEFAULT_FLUSH_TIMEOUT,
    DEFAULT_RESPONSE_TIMEOUT,
};
use crate::error::CameraError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Session and timing parameters for a camera.
///
/// Timeouts are counted in idle-poll units: consecutive polls that found no
/// byte waiting. One unit lasts `idle_unit_us` when driven by `ThreadDelay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Serial number the camera echoes in every reply
    pub serial_number: u8,
    pub baud_rate: u32,
    pub response_timeout: u16,
    pub flush_timeout: u16,
    pub chunk_timeout: u16,
    /// Inter-byte delay the camera applies while bursting frame data
    pub device_delay: u16,
    pub chunk_size: u8,
    /// Attempts per chunk after the first, used by `capture_image`
    pub chunk_retries: u32,
    pub idle_unit_us: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            serial_number: 0,
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            device_delay: DEFAULT_DEVICE_DELAY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_retries: 3,
            idle_unit_us: 1_000,
        }
    }
}

impl CameraConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CameraError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn idle_unit(&self) -> Duration {
        Duration::from_micros(self.idle_unit_us)
    }
}

/// The subset of `CameraConfig` the command engine consults on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub response_timeout: u16,
    pub flush_timeout: u16,
    pub chunk_timeout: u16,
    pub device_delay: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

impl From<&CameraConfig> for Timing {
    fn from(config: &CameraConfig) -> Self {
        Self {
            response_timeout: config.response_timeout,
            flush_timeout: config.flush_timeout,
            chunk_timeout: config.chunk_timeout,
            device_delay: config.device_delay,
        }
    }
}
