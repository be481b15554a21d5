use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_data_frame, encode_ticket, Ticket};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one data frame (blocking).
    pub fn send_data(&mut self, stream: u32, seq: u32, bundle: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_data_frame(stream, seq, bundle, &mut self.buf)?;
        self.write_buffered()
    }

    /// Encode and send one ticket frame (blocking).
    pub fn send_ticket(&mut self, ticket: Ticket) -> Result<()> {
        self.buf.clear();
        encode_ticket(ticket, &mut self.buf);
        self.write_buffered()
    }

    /// Send pre-encoded frame bytes (blocking).
    pub fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(frame);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
