use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Data frame header: stream (4) + sequence (4) + length (4) = 12 bytes.
pub const DATA_HEADER_SIZE: usize = 12;

/// Ticket frame: stream (4) + ceiling (4) = 8 bytes.
pub const TICKET_SIZE: usize = 8;

/// Default maximum bundle payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Ticket ceiling that releases a stream (stop sending).
pub const RELEASE_CEILING: i32 = -1;

/// A data frame: one bundle for one logical stream.
#[derive(Debug, Clone)]
pub struct DataFrame {
    /// The logical stream this bundle belongs to.
    pub stream: u32,
    /// Packet sequence number, 1-based and contiguous per stream.
    pub seq: u32,
    /// The bundle bytes.
    pub payload: Bytes,
}

impl DataFrame {
    /// Create a new data frame.
    pub fn new(stream: u32, seq: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            seq,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        DATA_HEADER_SIZE + self.payload.len()
    }
}

/// A credit ticket: permission for the sender to transmit frames with
/// sequence numbers up to `ceiling` on `stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub stream: u32,
    pub ceiling: i32,
}

impl Ticket {
    /// A credit grant raising the stream's send ceiling.
    pub fn grant(stream: u32, ceiling: u32) -> Self {
        Self {
            stream,
            ceiling: ceiling as i32,
        }
    }

    /// A release ticket: the receiver wants no further frames.
    pub fn release(stream: u32) -> Self {
        Self {
            stream,
            ceiling: RELEASE_CEILING,
        }
    }

    /// True if this ticket releases the stream rather than granting credit.
    pub fn is_release(&self) -> bool {
        self.ceiling <= 0
    }
}

/// Encode a data frame into the wire format.
///
/// Wire format (all fields big-endian):
/// ```text
/// ┌─────────────┬──────────────┬────────────┬──────────────────┐
/// │ Stream (4B) │ Sequence (4B)│ Length (4B)│ Bundle payload   │
/// └─────────────┴──────────────┴────────────┴──────────────────┘
/// ```
pub fn encode_data_frame(stream: u32, seq: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > i32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: i32::MAX as usize,
        });
    }
    dst.reserve(DATA_HEADER_SIZE + payload.len());
    dst.put_u32(stream);
    dst.put_u32(seq);
    dst.put_i32(payload.len() as i32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a data frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_data_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<DataFrame>> {
    if src.len() < DATA_HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let stream = i32::from_be_bytes(src[0..4].try_into().unwrap());
    let seq = i32::from_be_bytes(src[4..8].try_into().unwrap());
    let payload_len = i32::from_be_bytes(src[8..12].try_into().unwrap());

    if stream < 0 {
        return Err(FrameError::InvalidLength(stream));
    }
    if seq < 0 {
        return Err(FrameError::InvalidLength(seq));
    }
    if payload_len < 0 {
        return Err(FrameError::InvalidLength(payload_len));
    }
    let payload_len = payload_len as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = DATA_HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(DATA_HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(DataFrame {
        stream: stream as u32,
        seq: seq as u32,
        payload,
    }))
}

/// Encode a ticket frame into the wire format.
pub fn encode_ticket(ticket: Ticket, dst: &mut BytesMut) {
    dst.reserve(TICKET_SIZE);
    dst.put_u32(ticket.stream);
    dst.put_i32(ticket.ceiling);
}

/// Decode a ticket frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete ticket yet.
pub fn decode_ticket(src: &mut BytesMut) -> Result<Option<Ticket>> {
    if src.len() < TICKET_SIZE {
        return Ok(None);
    }

    let stream = i32::from_be_bytes(src[0..4].try_into().unwrap());
    if stream < 0 {
        return Err(FrameError::InvalidLength(stream));
    }
    let ceiling = i32::from_be_bytes(src[4..8].try_into().unwrap());
    src.advance(TICKET_SIZE);

    Ok(Some(Ticket {
        stream: stream as u32,
        ceiling,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"bundle bytes";

        encode_data_frame(3, 17, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), DATA_HEADER_SIZE + payload.len());

        let frame = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.stream, 3);
        assert_eq!(frame.seq, 17);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn data_frame_fields_are_big_endian() {
        let mut buf = BytesMut::new();
        encode_data_frame(1, 2, b"x", &mut buf).unwrap();

        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 2]);
        assert_eq!(&buf[8..12], &[0, 0, 0, 1]);
        assert_eq!(&buf[12..], b"x");
    }

    #[test]
    fn incomplete_header_needs_more_data() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 1, 0, 0][..]);
        let result = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn incomplete_payload_needs_more_data() {
        let mut buf = BytesMut::new();
        encode_data_frame(0, 1, b"hello", &mut buf).unwrap();
        buf.truncate(DATA_HEADER_SIZE + 2);

        let result = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn zero_length_payload_is_valid() {
        let mut buf = BytesMut::new();
        encode_data_frame(0, 1, b"", &mut buf).unwrap();

        let frame = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.seq, 1);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn negative_length_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(0);
        buf.put_u32(1);
        buf.put_i32(-5);

        let result = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidLength(-5))));
    }

    #[test]
    fn negative_stream_rejected() {
        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        buf.put_u32(1);
        buf.put_i32(0);

        let result = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidLength(-1))));
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(0);
        buf.put_u32(1);
        buf.put_i32(1024 * 1024);

        let result = decode_data_frame(&mut buf, 16);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn multiple_data_frames() {
        let mut buf = BytesMut::new();
        encode_data_frame(0, 1, b"first", &mut buf).unwrap();
        encode_data_frame(1, 1, b"second", &mut buf).unwrap();

        let f1 = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let f2 = decode_data_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!((f1.stream, f1.payload.as_ref()), (0, b"first".as_ref()));
        assert_eq!((f2.stream, f2.payload.as_ref()), (1, b"second".as_ref()));
        assert!(buf.is_empty());
    }

    #[test]
    fn ticket_roundtrip() {
        let mut buf = BytesMut::new();
        encode_ticket(Ticket::grant(2, 12), &mut buf);
        assert_eq!(buf.len(), TICKET_SIZE);

        let ticket = decode_ticket(&mut buf).unwrap().unwrap();
        assert_eq!(ticket, Ticket::grant(2, 12));
        assert!(!ticket.is_release());
    }

    #[test]
    fn release_ticket_roundtrip() {
        let mut buf = BytesMut::new();
        encode_ticket(Ticket::release(5), &mut buf);

        let ticket = decode_ticket(&mut buf).unwrap().unwrap();
        assert_eq!(ticket.stream, 5);
        assert_eq!(ticket.ceiling, RELEASE_CEILING);
        assert!(ticket.is_release());
    }

    #[test]
    fn partial_ticket_needs_more_data() {
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(decode_ticket(&mut buf).unwrap().is_none());
    }

    #[test]
    fn frame_wire_size() {
        let frame = DataFrame::new(0, 1, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), DATA_HEADER_SIZE + 4);
    }
}
