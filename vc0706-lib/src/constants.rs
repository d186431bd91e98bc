// Protocol constants for the VC0706

/// First byte of every command sent to the camera
pub const COMMAND_PREFIX: u8 = 0x56;

/// First byte of every reply from the camera
pub const REPLY_PREFIX: u8 = 0x76;

/// Status byte of a successful reply
pub const STATUS_OK: u8 = 0x00;

/// Size of the reply header checked by validation (prefix, serial, opcode, status)
pub const REPLY_HEADER_SIZE: usize = 4;

/// Size of the header preceding reply payload (validated header + length byte)
pub const REPLY_PAYLOAD_OFFSET: usize = 5;

/// Capacity of the receive buffer (100 bytes)
pub const CAMERA_BUFFER_SIZE: usize = 100;

/// Largest frame buffer chunk that fits in the receive buffer with its 5-byte trailer
pub const MAX_CHUNK_SIZE: u8 = (CAMERA_BUFFER_SIZE - REPLY_PAYLOAD_OFFSET) as u8;

/// Number of bytes drained by the pre-command flush
pub const FLUSH_SIZE: usize = CAMERA_BUFFER_SIZE;

/// Default idle-poll budget for a command reply
pub const DEFAULT_RESPONSE_TIMEOUT: u16 = 200;

/// Default idle-poll budget for the pre-command flush
pub const DEFAULT_FLUSH_TIMEOUT: u16 = 10;

/// Default idle-poll budget for the data burst of a frame buffer read
pub const DEFAULT_CHUNK_TIMEOUT: u16 = 10;

/// Default device-side delay parameter of a frame buffer read
pub const DEFAULT_DEVICE_DELAY: u16 = 10;

/// Default chunk size used when paging through the frame buffer
pub const DEFAULT_CHUNK_SIZE: u8 = 32;

/// Default baud rate of the camera after power-up
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

/// OSD text longer than this is truncated
pub const OSD_MAX_TEXT_LEN: usize = 14;

/// Length OSD text is truncated to when it exceeds `OSD_MAX_TEXT_LEN`
pub const OSD_TRUNCATED_LEN: usize = 13;

/// Motion control register selector for `set_motion_status`
pub const MOTION_CONTROL: u8 = 0x00;

/// Motion reporting over UART
pub const UART_MOTION: u8 = 0x01;

/// Motion detection enabled
pub const ACTIVATE_MOTION: u8 = 0x01;
