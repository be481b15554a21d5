//! Receive-side engine: validates per-stream ordering, buffers bundles,
//! hands decoded payloads to consumers, and grants credit back to the
//! sender.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use muxlane_frame::{
    decode_data_frame, encode_ticket, BundleReader, DataFrame, FrameError, InnerRecord, Ticket,
};

use crate::config::MuxConfig;
use crate::director::InboundDirector;
use crate::error::{EngineError, Result};
use crate::queue::BlockingQueue;
use crate::state::{RecvState, Terminal};

/// One entry of a stream's bundle queue.
#[derive(Debug)]
enum BundleSlot {
    /// A stored, not-yet-decoded bundle.
    Bundle { seq: u32, payload: Bytes },
    /// Sentinel injected on terminal transitions to release a parked
    /// consumer; carries no data.
    Wakeup,
}

struct RecvStream {
    state: Mutex<RecvState>,
    bundles: BlockingQueue<BundleSlot>,
    /// Decoded payloads; `None` is the end-of-stream marker.
    decoded: Mutex<VecDeque<Option<Bytes>>>,
}

/// Diagnostic counters for the receive side. Not part of the correctness
/// surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub frames_received: u64,
    pub late_frames: u64,
    pub tickets_sent: u64,
}

/// The receive-side engine.
///
/// [`on_frame`](Self::on_frame) is driven by the transport's delivery path
/// (single-threaded per connection); [`take`](Self::take) and
/// [`abort`](Self::abort) may be called concurrently from arbitrary
/// consumer threads.
pub struct Demultiplexer<D> {
    director: D,
    config: MuxConfig,
    streams: Vec<RecvStream>,
    frames_received: AtomicU64,
    late_frames: AtomicU64,
    tickets_sent: AtomicU64,
}

impl<D: InboundDirector> Demultiplexer<D> {
    /// Create the engine with `blocking_factor` frames of initial credit
    /// outstanding per stream.
    pub fn new(config: MuxConfig, director: D) -> Result<Self> {
        config.validate()?;

        let streams = (0..config.streams)
            .map(|_| RecvStream {
                state: Mutex::new(RecvState::new(config.blocking_factor, config.grant_step())),
                bundles: BlockingQueue::new(),
                decoded: Mutex::new(VecDeque::new()),
            })
            .collect();

        Ok(Self {
            director,
            config,
            streams,
            frames_received: AtomicU64::new(0),
            late_frames: AtomicU64::new(0),
            tickets_sent: AtomicU64::new(0),
        })
    }

    /// Number of configured streams.
    pub fn stream_count(&self) -> u32 {
        self.config.streams
    }

    /// Accept one decoded data frame from the delivery path.
    ///
    /// Frames for terminal streams are dropped as harmless late arrivals.
    /// A sequence mismatch desynchronizes the stream (release ticket sent,
    /// error surfaces at the next `take`). A sender running past its credit
    /// window is a protocol violation fatal to the whole engine:
    /// every stream is marked channel-lost and `SenderOverload` is
    /// returned to the transport owner.
    pub fn on_frame(&self, frame: DataFrame) -> Result<()> {
        let stream = frame.stream;
        let s = self
            .streams
            .get(stream as usize)
            .ok_or(EngineError::UnknownStream(stream))?;

        {
            let mut st = s.state.lock();
            if st.terminal.is_some() {
                drop(st);
                self.late_frames.fetch_add(1, Ordering::Relaxed);
                trace!(stream, seq = frame.seq, "late frame for terminal stream dropped");
                return Ok(());
            }

            if frame.seq != st.expected_seq {
                warn!(
                    stream,
                    seq = frame.seq,
                    expected = st.expected_seq,
                    "sequence violation; desynchronizing stream"
                );
                st.set_terminal(Terminal::Desynchronized);
                drop(st);
                s.bundles.push(BundleSlot::Wakeup);
                self.ship_ticket(Ticket::release(stream));
                return Ok(());
            }

            st.expected_seq += 1;
            st.buffered += 1;
            if st.buffered > self.config.blocking_factor {
                let buffered = st.buffered;
                drop(st);
                warn!(
                    stream,
                    buffered,
                    window = self.config.blocking_factor,
                    "sender ignored credit window; failing engine"
                );
                self.kill_all();
                return Err(EngineError::SenderOverload { stream });
            }
        }

        s.bundles.push(BundleSlot::Bundle {
            seq: frame.seq,
            payload: frame.payload,
        });
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Decode raw frame bytes and feed them to [`on_frame`](Self::on_frame).
    pub fn on_frame_bytes(&self, bytes: Bytes) -> Result<()> {
        let mut buf = BytesMut::from(bytes.as_ref());
        match decode_data_frame(&mut buf, usize::MAX)? {
            Some(frame) => self.on_frame(frame),
            None => Err(EngineError::Frame(FrameError::ConnectionClosed)),
        }
    }

    /// Blocking consumer call: the next payload for `stream`, or `Ok(None)`
    /// once the stream has cleanly ended.
    ///
    /// Fails with the stream's terminal condition after an abort, a
    /// desynchronization, or channel loss. A consumer blocked here is
    /// released by any terminal transition on the stream.
    pub fn take(&self, stream: u32) -> Result<Option<Bytes>> {
        let s = self
            .streams
            .get(stream as usize)
            .ok_or(EngineError::UnknownStream(stream))?;

        loop {
            let terminal = { s.state.lock().terminal };
            if let Some(terminal) = terminal {
                // Leave one wakeup behind for the next parked waiter. A
                // waiter can only park on an empty queue, so a single
                // sentinel suffices and repeated polls of a terminal
                // stream do not grow the queue.
                if s.bundles.is_empty() {
                    s.bundles.push(BundleSlot::Wakeup);
                }
                return match terminal {
                    Terminal::Ended => Ok(None),
                    Terminal::Aborted => Err(EngineError::StreamAborted { stream }),
                    Terminal::Desynchronized => Err(EngineError::Desynchronized { stream }),
                    Terminal::ChannelLost => Err(EngineError::ChannelLost),
                };
            }

            let entry = s.decoded.lock().pop_front();
            if let Some(entry) = entry {
                match entry {
                    Some(payload) => return Ok(Some(payload)),
                    None => {
                        s.state.lock().set_terminal(Terminal::Ended);
                        s.bundles.push(BundleSlot::Wakeup);
                        debug!(stream, "stream ended");
                        return Ok(None);
                    }
                }
            }

            match s.bundles.pop() {
                BundleSlot::Wakeup => continue,
                BundleSlot::Bundle { seq, payload } => {
                    {
                        let mut st = s.state.lock();
                        st.buffered -= 1;
                    }
                    self.unbundle(stream, seq, payload)?;
                }
            }
        }
    }

    /// Consumer gives up on `stream`: wake blocked waiters and tell the
    /// sender to stop. Idempotent.
    pub fn abort(&self, stream: u32) -> Result<()> {
        let s = self
            .streams
            .get(stream as usize)
            .ok_or(EngineError::UnknownStream(stream))?;

        let newly = { s.state.lock().set_terminal(Terminal::Aborted) };
        if newly {
            debug!(stream, "stream aborted by consumer");
            s.bundles.push(BundleSlot::Wakeup);
            self.ship_ticket(Ticket::release(stream));
        }
        Ok(())
    }

    /// The physical channel is gone: fail every stream and wake every
    /// blocked consumer. Idempotent.
    pub fn kill_all(&self) {
        let mut newly = 0u32;
        for s in &self.streams {
            if s.state.lock().set_terminal(Terminal::ChannelLost) {
                s.bundles.push(BundleSlot::Wakeup);
                newly += 1;
            }
        }
        if newly > 0 {
            debug!(streams = newly, "channel lost; streams failed");
        }
    }

    /// Snapshot of the diagnostic counters.
    pub fn stats(&self) -> DemuxStats {
        DemuxStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            late_frames: self.late_frames.load(Ordering::Relaxed),
            tickets_sent: self.tickets_sent.load(Ordering::Relaxed),
        }
    }

    /// Decode one bundle into the stream's payload queue and grant credit
    /// if this bundle sits at the stream's grant point.
    ///
    /// The grant bookkeeping advances even when the bundle carries the
    /// end-of-stream marker; only the ticket send is suppressed then (the
    /// sender already knows to stop).
    fn unbundle(&self, stream: u32, seq: u32, payload: Bytes) -> Result<()> {
        let s = &self.streams[stream as usize];

        let mut reader = BundleReader::new(payload);
        let mut saw_end = false;
        {
            let mut decoded = s.decoded.lock();
            loop {
                match reader.next_record()? {
                    Some(InnerRecord::Payload(p)) => decoded.push_back(Some(p)),
                    Some(InnerRecord::EndOfStream) => {
                        decoded.push_back(None);
                        saw_end = true;
                        break;
                    }
                    None => break,
                }
            }
        }

        let grant = {
            let mut st = s.state.lock();
            if seq == st.grant_point {
                let new_ceiling = seq + self.config.blocking_factor;
                st.ceiling = new_ceiling;
                st.grant_point += self.config.grant_step();
                if saw_end {
                    None
                } else {
                    Some(new_ceiling)
                }
            } else {
                None
            }
        };

        if let Some(ceiling) = grant {
            trace!(stream, ceiling, "granting credit");
            self.ship_ticket(Ticket::grant(stream, ceiling));
        }
        Ok(())
    }

    fn ship_ticket(&self, ticket: Ticket) {
        let mut wire = BytesMut::new();
        encode_ticket(ticket, &mut wire);
        match self.director.send_ticket(wire.freeze()) {
            Ok(()) => {
                self.tickets_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(stream = ticket.stream, error = %err, "ticket send failed");
            }
        }
    }
}
