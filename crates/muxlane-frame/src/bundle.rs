//! Bundle aggregation and scanning.
//!
//! A bundle is the payload of one data frame: a run of
//! `(innerLen, innerPayload)` records closed by a `-2` terminator. A record
//! length of `-1` (no payload bytes) marks end-of-stream; the terminator is
//! still written after it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Inner record length marking end-of-stream.
pub const END_OF_STREAM: i32 = -1;

/// Inner record length terminating every bundle.
pub const END_OF_BUNDLE: i32 = -2;

/// One inner record of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerRecord {
    /// One application payload.
    Payload(Bytes),
    /// The peer has no more application data for this stream.
    EndOfStream,
}

/// Accumulates application payloads into one bundle, bounded by a byte
/// budget.
///
/// The budget is a soft limit: a bundle is "full" once its accumulated
/// payload bytes exceed the budget, but the record that crossed the line is
/// kept, so at least one record always fits even when oversized.
#[derive(Debug)]
pub struct BundleWriter {
    buf: BytesMut,
    budget: usize,
    payload_bytes: usize,
    records: usize,
}

impl BundleWriter {
    /// Create a writer with the given per-bundle byte budget.
    pub fn new(budget: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(budget.min(64 * 1024) + 16),
            budget,
            payload_bytes: 0,
            records: 0,
        }
    }

    /// Append one application payload record.
    pub fn push(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > i32::MAX as usize {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: i32::MAX as usize,
            });
        }
        self.buf.reserve(4 + payload.len());
        self.buf.put_i32(payload.len() as i32);
        self.buf.put_slice(payload);
        self.payload_bytes += payload.len();
        self.records += 1;
        Ok(())
    }

    /// Append the end-of-stream marker.
    pub fn push_end_of_stream(&mut self) {
        self.buf.put_i32(END_OF_STREAM);
        self.records += 1;
    }

    /// True once accumulated payload bytes exceed the budget.
    pub fn is_full(&self) -> bool {
        self.payload_bytes > self.budget
    }

    /// Number of records written so far (end-of-stream counts as one).
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Terminate the bundle and return its wire bytes.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_i32(END_OF_BUNDLE);
        self.buf.freeze()
    }
}

/// Scans the inner records of a received bundle.
#[derive(Debug)]
pub struct BundleReader {
    buf: Bytes,
    done: bool,
}

impl BundleReader {
    /// Create a reader over one bundle's wire bytes.
    pub fn new(bundle: Bytes) -> Self {
        Self {
            buf: bundle,
            done: false,
        }
    }

    /// Read the next inner record.
    ///
    /// Returns `Ok(None)` at the `-2` terminator. Truncated or malformed
    /// bundles produce a [`FrameError`].
    pub fn next_record(&mut self) -> Result<Option<InnerRecord>> {
        if self.done {
            return Ok(None);
        }
        if self.buf.len() < 4 {
            return Err(FrameError::TruncatedBundle {
                remaining: self.buf.len(),
            });
        }

        let len = self.buf.get_i32();
        match len {
            END_OF_BUNDLE => {
                self.done = true;
                Ok(None)
            }
            END_OF_STREAM => Ok(Some(InnerRecord::EndOfStream)),
            n if n >= 0 => {
                let n = n as usize;
                if self.buf.len() < n {
                    return Err(FrameError::TruncatedBundle {
                        remaining: self.buf.len(),
                    });
                }
                Ok(Some(InnerRecord::Payload(self.buf.split_to(n))))
            }
            other => Err(FrameError::InvalidLength(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_payload_records() {
        let mut writer = BundleWriter::new(1024);
        writer.push(b"alpha").unwrap();
        writer.push(b"beta").unwrap();
        let wire = writer.finish();

        let mut reader = BundleReader::new(wire);
        assert_eq!(
            reader.next_record().unwrap(),
            Some(InnerRecord::Payload(Bytes::from_static(b"alpha")))
        );
        assert_eq!(
            reader.next_record().unwrap(),
            Some(InnerRecord::Payload(Bytes::from_static(b"beta")))
        );
        assert_eq!(reader.next_record().unwrap(), None);
        // Idempotent after the terminator.
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn end_of_stream_marker() {
        let mut writer = BundleWriter::new(1024);
        writer.push(b"last").unwrap();
        writer.push_end_of_stream();
        let wire = writer.finish();

        let mut reader = BundleReader::new(wire);
        assert!(matches!(
            reader.next_record().unwrap(),
            Some(InnerRecord::Payload(_))
        ));
        assert_eq!(reader.next_record().unwrap(), Some(InnerRecord::EndOfStream));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn empty_bundle_is_just_terminator() {
        let writer = BundleWriter::new(1024);
        let wire = writer.finish();
        assert_eq!(wire.len(), 4);

        let mut reader = BundleReader::new(wire);
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn zero_length_payload_record() {
        let mut writer = BundleWriter::new(1024);
        writer.push(b"").unwrap();
        let wire = writer.finish();

        let mut reader = BundleReader::new(wire);
        assert_eq!(
            reader.next_record().unwrap(),
            Some(InnerRecord::Payload(Bytes::new()))
        );
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn budget_is_soft() {
        let mut writer = BundleWriter::new(8);
        assert!(!writer.is_full());
        writer.push(b"12345").unwrap();
        assert!(!writer.is_full());
        writer.push(b"6789a").unwrap();
        // 10 bytes > budget 8: full, but both records were kept.
        assert!(writer.is_full());
        assert_eq!(writer.record_count(), 2);
    }

    #[test]
    fn oversized_single_record_is_kept() {
        let mut writer = BundleWriter::new(4);
        writer.push(b"way past the budget").unwrap();
        assert!(writer.is_full());

        let mut reader = BundleReader::new(writer.finish());
        assert!(matches!(
            reader.next_record().unwrap(),
            Some(InnerRecord::Payload(p)) if p.as_ref() == b"way past the budget"
        ));
    }

    #[test]
    fn truncated_bundle_detected() {
        let mut writer = BundleWriter::new(1024);
        writer.push(b"payload").unwrap();
        let wire = writer.finish();
        let cut = wire.slice(0..wire.len() - 6);

        let mut reader = BundleReader::new(cut);
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, FrameError::TruncatedBundle { .. }));
    }

    #[test]
    fn missing_terminator_detected() {
        let mut buf = BytesMut::new();
        buf.put_i32(3);
        buf.put_slice(b"abc");

        let mut reader = BundleReader::new(buf.freeze());
        assert!(matches!(
            reader.next_record().unwrap(),
            Some(InnerRecord::Payload(_))
        ));
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, FrameError::TruncatedBundle { remaining: 0 }));
    }

    #[test]
    fn unknown_negative_length_rejected() {
        let mut buf = BytesMut::new();
        buf.put_i32(-7);

        let mut reader = BundleReader::new(buf.freeze());
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(-7)));
    }
}
