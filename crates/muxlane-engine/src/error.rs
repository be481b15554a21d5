use muxlane_frame::FrameError;

/// Errors raised by the multiplexer/demultiplexer engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(&'static str),

    /// A stream index outside the configured range.
    #[error("unknown stream index {0}")]
    UnknownStream(u32),

    /// The local consumer withdrew interest in this stream.
    #[error("stream {stream} aborted by consumer")]
    StreamAborted { stream: u32 },

    /// A duplicate or missing frame was detected; ordering guarantees for
    /// this stream are lost.
    #[error("stream {stream} desynchronized (duplicate or missing frame)")]
    Desynchronized { stream: u32 },

    /// The physical channel was lost; every stream on the engine fails.
    #[error("channel lost")]
    ChannelLost,

    /// The peer sent more frames than its credit window allows. This is a
    /// protocol violation by the sender and is fatal to the whole engine.
    #[error("sender overloaded stream {stream} beyond its credit window")]
    SenderOverload { stream: u32 },

    /// Wire-level framing error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
