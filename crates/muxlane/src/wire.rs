//! Ready-made Director implementations over `std::io` byte channels.
//!
//! The engines only speak through Director seams; this module supplies the
//! common wiring: application producers hand payloads to a per-stream
//! [`PayloadQueue`], [`WireOutbound`] feeds the multiplexer from those
//! queues and ships frames through a [`FrameWriter`], and [`WireInbound`]
//! ships the demultiplexer's tickets back the other way.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use muxlane_engine::{BlockingQueue, InboundDirector, OutboundDirector};
use muxlane_frame::{FrameError, FrameWriter};

/// Blocking handoff between an application producer and the scheduler.
///
/// `push` always succeeds; the scheduler blocks on an empty queue. Call
/// [`close`](Self::close) when the producer is done — it wakes a scheduler
/// waiting for this stream and makes it emit the end-of-stream marker, so
/// the scheduling thread is never stuck against application shutdown.
pub struct PayloadQueue {
    inner: BlockingQueue<Option<Bytes>>,
}

impl PayloadQueue {
    fn new() -> Self {
        Self {
            inner: BlockingQueue::new(),
        }
    }

    /// Hand one payload to the scheduler.
    pub fn push(&self, payload: impl Into<Bytes>) {
        self.inner.push(Some(payload.into()));
    }

    /// Signal end-of-stream. Payloads pushed after this are never sent.
    pub fn close(&self) {
        self.inner.push(None);
    }

    /// Number of payloads waiting for the scheduler.
    pub fn backlog(&self) -> usize {
        self.inner.len()
    }
}

/// Send-side Director over a byte channel: per-stream payload queues in,
/// data frames out.
pub struct WireOutbound<W> {
    writer: Mutex<FrameWriter<W>>,
    queues: Vec<Arc<PayloadQueue>>,
}

impl<W: Write + Send> WireOutbound<W> {
    /// Wrap a data-channel writer for `streams` logical streams.
    pub fn new(writer: W, streams: u32) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::new(writer)),
            queues: (0..streams).map(|_| Arc::new(PayloadQueue::new())).collect(),
        }
    }

    /// The producer handle for one stream.
    ///
    /// # Panics
    /// Panics if `stream` is out of range.
    pub fn queue(&self, stream: u32) -> Arc<PayloadQueue> {
        Arc::clone(&self.queues[stream as usize])
    }
}

impl<W: Write + Send> OutboundDirector for WireOutbound<W> {
    fn take_payload(&self, stream: u32) -> Option<Bytes> {
        self.queues[stream as usize].inner.pop()
    }

    fn send_frame(&self, frame: Bytes) -> std::io::Result<()> {
        self.writer
            .lock()
            .send_raw(&frame)
            .map_err(frame_to_io_error)
    }

    fn on_stream_aborted(&self, stream: u32) {
        debug!(stream, "receiver released stream");
    }
}

/// Receive-side Director over a byte channel: tickets out.
pub struct WireInbound<W> {
    writer: Mutex<FrameWriter<W>>,
}

impl<W: Write + Send> WireInbound<W> {
    /// Wrap a ticket-channel writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::new(writer)),
        }
    }
}

impl<W: Write + Send> InboundDirector for WireInbound<W> {
    fn send_ticket(&self, ticket: Bytes) -> std::io::Result<()> {
        self.writer
            .lock()
            .send_raw(&ticket)
            .map_err(frame_to_io_error)
    }
}

fn frame_to_io_error(err: FrameError) -> std::io::Error {
    match err {
        FrameError::Io(io) => io,
        FrameError::ConnectionClosed => std::io::Error::from(std::io::ErrorKind::BrokenPipe),
        other => std::io::Error::other(other.to_string()),
    }
}
