//! Collaborator seams between the engines and the owning application.
//!
//! The engines never hold channel resources themselves; payloads and frames
//! cross these trait boundaries. Implementations are injected at engine
//! construction and called from engine-internal threads, so they must be
//! `Send + Sync`.

use bytes::Bytes;

/// Send-side collaborator: payload source and frame sink.
pub trait OutboundDirector: Send + Sync {
    /// Hand the next application payload for `stream` to the scheduler, or
    /// `None` once the stream has no more data.
    ///
    /// Called from the scheduling thread. Implementations must not block
    /// indefinitely against application shutdown: an application tearing
    /// down is expected to make this return `None`.
    fn take_payload(&self, stream: u32) -> Option<Bytes>;

    /// Ship one encoded data frame on the channel.
    ///
    /// An error terminates the scheduling loop: the engine marks every
    /// stream finished and `run()` returns `ChannelLost`.
    fn send_frame(&self, frame: Bytes) -> std::io::Result<()>;

    /// The receiver released `stream`; no more frames will be sent for it.
    /// Notification only.
    fn on_stream_aborted(&self, stream: u32);
}

/// Receive-side collaborator: ticket sink.
pub trait InboundDirector: Send + Sync {
    /// Ship one encoded ticket frame back to the sender.
    ///
    /// Errors are logged and swallowed by the engine; a dead channel is
    /// reported to the engine separately via `kill_all`.
    fn send_ticket(&self, ticket: Bytes) -> std::io::Result<()>;
}

impl<D: OutboundDirector + ?Sized> OutboundDirector for std::sync::Arc<D> {
    fn take_payload(&self, stream: u32) -> Option<Bytes> {
        (**self).take_payload(stream)
    }

    fn send_frame(&self, frame: Bytes) -> std::io::Result<()> {
        (**self).send_frame(frame)
    }

    fn on_stream_aborted(&self, stream: u32) {
        (**self).on_stream_aborted(stream)
    }
}

impl<D: InboundDirector + ?Sized> InboundDirector for std::sync::Arc<D> {
    fn send_ticket(&self, ticket: Bytes) -> std::io::Result<()> {
        (**self).send_ticket(ticket)
    }
}
