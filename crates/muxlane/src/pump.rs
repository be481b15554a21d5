//! Delivery loops feeding channel bytes into the engines.
//!
//! Each pump owns the read side of one channel and runs on its own thread:
//! the delivery pump moves data frames into a [`Demultiplexer`], the ticket
//! pump moves credit tickets into a [`Multiplexer`]. A clean close of the
//! channel ends the pump with `Ok(())` and leaves teardown policy to the
//! owner; any other failure tears the engine down before returning.

use std::io::Read;

use tracing::{debug, warn};

use muxlane_engine::{Demultiplexer, EngineError, InboundDirector, Multiplexer, OutboundDirector};
use muxlane_frame::{FrameError, FrameReader};

/// Read data frames until the channel closes and deliver them in sequence.
///
/// Returns `Ok(())` on a clean end-of-channel. The demultiplexer is left
/// as-is in that case: streams that already saw their end-of-stream marker
/// drain normally, and the owner decides whether to `kill_all` the rest.
/// Any decode or transport error marks every stream `ChannelLost` first.
pub fn run_delivery_pump<R, D>(
    reader: &mut FrameReader<R>,
    demux: &Demultiplexer<D>,
) -> Result<(), EngineError>
where
    R: Read,
    D: InboundDirector,
{
    loop {
        let frame = match reader.read_data_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                debug!("data channel closed, delivery pump exiting");
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "data channel failed, tearing down receive side");
                demux.kill_all();
                return Err(err.into());
            }
        };

        if let Err(err) = demux.on_frame(frame) {
            warn!(error = %err, "frame delivery failed, tearing down receive side");
            demux.kill_all();
            return Err(err);
        }
    }
}

/// Read credit tickets until the channel closes and apply them to the sender.
///
/// Returns `Ok(())` on a clean end-of-channel without touching the
/// multiplexer; a ticket channel going quiet is not by itself fatal to
/// in-flight sends. Any other failure calls `kill_all` before returning.
pub fn run_ticket_pump<R, D>(
    reader: &mut FrameReader<R>,
    mux: &Multiplexer<D>,
) -> Result<(), EngineError>
where
    R: Read,
    D: OutboundDirector,
{
    loop {
        let ticket = match reader.read_ticket() {
            Ok(ticket) => ticket,
            Err(FrameError::ConnectionClosed) => {
                debug!("ticket channel closed, ticket pump exiting");
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "ticket channel failed, tearing down send side");
                mux.kill_all();
                return Err(err.into());
            }
        };

        if let Err(err) = mux.on_ticket(ticket) {
            warn!(error = %err, "ticket rejected, tearing down send side");
            mux.kill_all();
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    use bytes::{Bytes, BytesMut};

    use muxlane_engine::MuxConfig;
    use muxlane_frame::{encode_ticket, BundleWriter, FrameWriter, Ticket};

    use super::*;

    struct NullInbound;

    impl InboundDirector for NullInbound {
        fn send_ticket(&self, _ticket: Bytes) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn bundle(payloads: &[&[u8]], end: bool) -> Bytes {
        let mut writer = BundleWriter::new(usize::MAX);
        for p in payloads {
            writer.push(p).unwrap();
        }
        if end {
            writer.push_end_of_stream();
        }
        writer.finish()
    }

    #[test]
    fn delivery_pump_feeds_demux_and_exits_on_close() {
        let (tx, rx) = UnixStream::pair().unwrap();
        let demux = Arc::new(Demultiplexer::new(MuxConfig::new(1), NullInbound).unwrap());

        let pump = {
            let demux = Arc::clone(&demux);
            thread::spawn(move || {
                let mut reader = FrameReader::new(rx);
                run_delivery_pump(&mut reader, &demux)
            })
        };

        let mut writer = FrameWriter::new(tx);
        writer.send_data(0, 1, &bundle(&[b"hello"], false)).unwrap();
        writer.send_data(0, 2, &bundle(&[], true)).unwrap();
        drop(writer);

        assert_eq!(demux.take(0).unwrap().unwrap().as_ref(), b"hello");
        assert_eq!(demux.take(0).unwrap(), None);
        pump.join().unwrap().unwrap();
    }

    #[test]
    fn delivery_pump_kills_streams_on_garbage() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        let demux = Arc::new(Demultiplexer::new(MuxConfig::new(1), NullInbound).unwrap());

        let pump = {
            let demux = Arc::clone(&demux);
            thread::spawn(move || {
                let mut reader = FrameReader::new(rx);
                run_delivery_pump(&mut reader, &demux)
            })
        };

        // Negative frame length is never valid on the wire.
        tx.write_all(&(-9i32).to_be_bytes()).unwrap();
        tx.write_all(&1i32.to_be_bytes()).unwrap();
        tx.write_all(&(-5i32).to_be_bytes()).unwrap();
        drop(tx);

        assert!(pump.join().unwrap().is_err());
        assert!(matches!(demux.take(0), Err(EngineError::ChannelLost)));
    }

    #[test]
    fn delivery_failure_wakes_blocked_consumers() {
        let (tx, rx) = UnixStream::pair().unwrap();
        let demux = Arc::new(Demultiplexer::new(MuxConfig::new(1), NullInbound).unwrap());

        let consumer = {
            let demux = Arc::clone(&demux);
            thread::spawn(move || demux.take(0))
        };

        let pump = {
            let demux = Arc::clone(&demux);
            thread::spawn(move || {
                let mut reader = FrameReader::new(rx);
                run_delivery_pump(&mut reader, &demux)
            })
        };

        // A frame for a stream the engine was never configured with.
        let mut writer = FrameWriter::new(tx);
        writer.send_data(5, 1, &bundle(&[b"stray"], false)).unwrap();

        assert!(matches!(
            pump.join().unwrap(),
            Err(EngineError::UnknownStream(5))
        ));
        assert!(matches!(
            consumer.join().unwrap(),
            Err(EngineError::ChannelLost)
        ));
    }

    #[test]
    fn ticket_pump_applies_grants_then_exits_on_close() {
        struct OneShot;

        impl OutboundDirector for OneShot {
            fn take_payload(&self, _stream: u32) -> Option<Bytes> {
                None
            }

            fn send_frame(&self, _frame: Bytes) -> std::io::Result<()> {
                Ok(())
            }

            fn on_stream_aborted(&self, _stream: u32) {}
        }

        let (mut tx, rx) = UnixStream::pair().unwrap();
        let mux = Arc::new(Multiplexer::new(MuxConfig::new(1), OneShot).unwrap());

        let pump = {
            let mux = Arc::clone(&mux);
            thread::spawn(move || {
                let mut reader = FrameReader::new(rx);
                run_ticket_pump(&mut reader, &mux)
            })
        };

        let mut buf = BytesMut::new();
        encode_ticket(Ticket::grant(0, 20), &mut buf);
        encode_ticket(Ticket::release(0), &mut buf);
        tx.write_all(&buf).unwrap();
        drop(tx);

        pump.join().unwrap().unwrap();
        assert_eq!(mux.stats().finished_streams, 1);
    }
}
