use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_data_frame, decode_ticket, DataFrame, Ticket, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
/// One reader serves one wire channel: the data channel (use
/// [`read_data_frame`](Self::read_data_frame)) or the ticket channel (use
/// [`read_ticket`](Self::read_ticket)); the two frame kinds never share a
/// channel.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload: usize,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with the default payload limit.
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    /// Create a new frame reader with an explicit payload limit.
    pub fn with_max_payload(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload,
        }
    }

    /// Read the next complete data frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_data_frame(&mut self) -> Result<DataFrame> {
        loop {
            if let Some(frame) = decode_data_frame(&mut self.buf, self.max_payload)? {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// Read the next complete ticket frame (blocking).
    pub fn read_ticket(&mut self) -> Result<Ticket> {
        loop {
            if let Some(ticket) = decode_ticket(&mut self.buf)? {
                return Ok(ticket);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        self.buf.extend_from_slice(&chunk[..read]);
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
