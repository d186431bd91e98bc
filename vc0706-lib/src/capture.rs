//! Whole-image capture on top of the frame buffer session, and output naming.

use crate::device::VC0706;
use crate::error::CameraError;
use crate::transport::{Delay, Transport};
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// Pre-allocation ceiling; larger frames grow the buffer as chunks arrive
const MAX_PREALLOC: u32 = 1 << 20;

/// Freeze a frame and read all of it.
///
/// Chunks are `chunk_size` bytes, the last one shortened to what is left. A
/// chunk that times out or comes back malformed is retried after a flush, up
/// to `retries` extra attempts. The frame is left latched; call
/// `resume_video` afterwards.
pub fn capture_image<T: Transport, D: Delay>(
    camera: &mut VC0706<T, D>,
    chunk_size: u8,
    retries: u32,
) -> Result<Bytes, CameraError> {
    camera.take_picture()?;
    let length = camera.frame_length()?;
    let mut image = BytesMut::with_capacity(length.min(MAX_PREALLOC) as usize);

    while let Some(remaining) = camera.frame_remaining().filter(|&r| r > 0) {
        let n = remaining.min(chunk_size as u32) as u8;
        let mut attempt = 0;
        let chunk = loop {
            match camera.read_chunk(n) {
                Ok(chunk) => break chunk,
                Err(e) if e.is_recoverable() && attempt < retries => {
                    attempt += 1;
                    warn!(offset = camera.frame_cursor(), attempt, error = %e, "Retrying chunk");
                    camera.flush_input()?;
                }
                Err(e) => return Err(e),
            }
        };
        image.extend_from_slice(&chunk);
    }

    info!(bytes = image.len(), "Image captured");
    Ok(image.freeze())
}

/// Next free `<prefix>NNNNN.jpg` in `dir`, numbered one past the highest
/// existing file with that prefix.
pub fn next_photo_path(dir: impl AsRef<Path>, prefix: &str) -> Result<PathBuf, CameraError> {
    let dir = dir.as_ref();
    let mut next = 0u32;

    if dir.exists() {
        for entry in std::fs::read_dir(dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let number = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(".jpg"))
                .and_then(|digits| digits.parse::<u32>().ok());
            if let Some(number) = number {
                let after = number.checked_add(1).ok_or_else(|| {
                    CameraError::InvalidArgument(format!("photo numbering exhausted in {:?}", dir))
                })?;
                next = next.max(after);
            }
        }
    }

    Ok(dir.join(format!("{prefix}{next:05}.jpg")))
}
