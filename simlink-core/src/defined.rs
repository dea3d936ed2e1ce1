use std::time::Duration;

/// The default timeout of a blocking receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The protocol version announced in the `Hello` handshake.
pub const PROTOCOL_VERSION: &str = "v1.4";

/// The size of the length prefix of a frame.
pub const FRAME_HEADER_SIZE: usize = size_of::<u32>();

/// The largest payload accepted in a single frame.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;
