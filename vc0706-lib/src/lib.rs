pub mod capture;
pub mod command;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod frame;
pub mod settings;
pub mod transport;


// Re-export the VC0706 struct for easy access
pub use capture::{capture_image, next_photo_path};
pub use command::{FrameControl, Opcode};
pub use config::{CameraConfig, Timing};
pub use device::VC0706;
pub use error::{CameraError, TransportError};
pub use frame::FrameState;
pub use settings::{BaudRate, ImageSize, Ptz, PtzReport};
pub use transport::{Delay, SerialTransport, ThreadDelay, Transport};
