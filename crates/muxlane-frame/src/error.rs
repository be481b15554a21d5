/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A length field carries a value that is neither a valid payload
    /// length nor a recognized sentinel.
    #[error("invalid length field: {0}")]
    InvalidLength(i32),

    /// A bundle ended before its `-2` terminator was read.
    #[error("bundle truncated ({remaining} trailing bytes)")]
    TruncatedBundle { remaining: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
