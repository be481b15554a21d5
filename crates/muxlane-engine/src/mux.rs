//! Send-side engine: bundles application payloads and schedules streams
//! according to receiver-granted credit.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::BytesMut;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use muxlane_frame::{encode_data_frame, BundleWriter, Ticket};

use crate::config::MuxConfig;
use crate::director::OutboundDirector;
use crate::error::{EngineError, Result};
use crate::queue::BlockingQueue;
use crate::state::SendStream;

/// One ready-queue entry: a stream holding `credits` sendable frames.
#[derive(Debug, Clone, Copy)]
struct ReadyEntry {
    stream: u32,
    credits: u32,
}

/// Diagnostic counters for the send side. Not part of the correctness
/// surface; counters may lag each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxStats {
    pub frames_sent: u64,
    pub stale_grants: u64,
    pub finished_streams: u32,
}

/// The send-side engine.
///
/// One dedicated thread drives [`run`](Self::run); it is the only thread
/// that pulls payloads and ships frames. [`grant`](Self::grant) and
/// [`kill_all`](Self::kill_all) may be called concurrently from the
/// transport's delivery path and the owning application.
pub struct Multiplexer<D> {
    director: D,
    config: MuxConfig,
    bundle_budget: usize,
    ready: BlockingQueue<ReadyEntry>,
    streams: Vec<Mutex<SendStream>>,
    finished: AtomicUsize,
    frames_sent: AtomicU64,
    stale_grants: AtomicU64,
}

impl<D: OutboundDirector> Multiplexer<D> {
    /// Create the engine. Every stream starts with `blocking_factor`
    /// frames of credit.
    pub fn new(config: MuxConfig, director: D) -> Result<Self> {
        config.validate()?;

        let ready = BlockingQueue::new();
        let mut streams = Vec::with_capacity(config.streams as usize);
        for stream in 0..config.streams {
            streams.push(Mutex::new(SendStream::new(config.blocking_factor)));
            ready.push(ReadyEntry {
                stream,
                credits: config.blocking_factor,
            });
        }

        Ok(Self {
            director,
            bundle_budget: config.bundle_budget(),
            config,
            ready,
            streams,
            finished: AtomicUsize::new(0),
            frames_sent: AtomicU64::new(0),
            stale_grants: AtomicU64::new(0),
        })
    }

    /// Number of configured streams.
    pub fn stream_count(&self) -> u32 {
        self.config.streams
    }

    /// The scheduling loop. Call from one dedicated thread.
    ///
    /// Pops ready-queue entries and sends bundles until every stream is
    /// finished. Under contention (queue non-empty after the pop) a stream
    /// sends a single frame and goes to the back of the queue; with the
    /// queue to itself it bursts through its whole credit.
    ///
    /// Returns `Err(ChannelLost)` if the Director fails to ship a frame;
    /// every stream is marked finished first.
    pub fn run(&self) -> Result<()> {
        loop {
            if self.all_finished() {
                debug!("all streams finished; scheduler exiting");
                return Ok(());
            }

            let entry = self.ready.pop();
            let contended = !self.ready.is_empty();

            if self.is_finished(entry.stream) {
                // Dummy wakeup or credit that arrived after termination.
                continue;
            }

            if contended {
                self.send_bundle(entry.stream)?;
                if entry.credits > 1 && !self.is_finished(entry.stream) {
                    self.ready.push(ReadyEntry {
                        stream: entry.stream,
                        credits: entry.credits - 1,
                    });
                }
            } else {
                let mut credits = entry.credits;
                while credits > 0 {
                    self.send_bundle(entry.stream)?;
                    if self.is_finished(entry.stream) {
                        break;
                    }
                    credits -= 1;
                }
            }
        }
    }

    /// Apply a decoded ticket frame.
    pub fn on_ticket(&self, ticket: Ticket) -> Result<()> {
        self.grant(ticket.stream, ticket.ceiling)
    }

    /// Apply a credit grant (or, for `new_ceiling <= 0`, a stream release).
    ///
    /// A release marks the stream finished, notifies the Director, and
    /// injects a dummy ready-queue entry so a parked scheduler observes the
    /// change. Grants that do not raise the stored ceiling are counted and
    /// ignored; grants for finished streams are silently ignored.
    pub fn grant(&self, stream: u32, new_ceiling: i32) -> Result<()> {
        if stream >= self.config.streams {
            return Err(EngineError::UnknownStream(stream));
        }

        if new_ceiling <= 0 {
            let released = {
                let mut st = self.streams[stream as usize].lock();
                if st.finished {
                    false
                } else {
                    st.finished = true;
                    true
                }
            };
            if released {
                debug!(stream, "stream released by receiver");
                self.finished.fetch_add(1, Ordering::AcqRel);
                self.director.on_stream_aborted(stream);
                self.ready.push(ReadyEntry { stream, credits: 1 });
            }
            return Ok(());
        }

        let new_ceiling = new_ceiling as u32;
        let delta = {
            let mut st = self.streams[stream as usize].lock();
            if st.finished {
                trace!(stream, "credit grant for finished stream ignored");
                return Ok(());
            }
            if new_ceiling > st.ceiling {
                let delta = new_ceiling - st.ceiling;
                st.ceiling = new_ceiling;
                Some(delta)
            } else {
                None
            }
        };

        match delta {
            Some(credits) => {
                trace!(stream, ceiling = new_ceiling, credits, "credit granted");
                self.ready.push(ReadyEntry { stream, credits });
            }
            None => {
                self.stale_grants.fetch_add(1, Ordering::Relaxed);
                trace!(stream, ceiling = new_ceiling, "stale credit grant ignored");
            }
        }
        Ok(())
    }

    /// Terminate every stream (channel gone). Idempotent.
    pub fn kill_all(&self) {
        for stream in 0..self.config.streams {
            let newly = {
                let mut st = self.streams[stream as usize].lock();
                if st.finished {
                    false
                } else {
                    st.finished = true;
                    true
                }
            };
            if newly {
                self.finished.fetch_add(1, Ordering::AcqRel);
                self.director.on_stream_aborted(stream);
            }
        }
        // Wake a scheduler parked on an empty ready queue.
        self.ready.push(ReadyEntry {
            stream: 0,
            credits: 0,
        });
    }

    /// Snapshot of the diagnostic counters.
    pub fn stats(&self) -> MuxStats {
        MuxStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            stale_grants: self.stale_grants.load(Ordering::Relaxed),
            finished_streams: self.finished.load(Ordering::Acquire) as u32,
        }
    }

    fn all_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire) as u32 >= self.config.streams
    }

    fn is_finished(&self, stream: u32) -> bool {
        self.streams[stream as usize].lock().finished
    }

    /// Build and ship one bundle for `stream`, consuming one frame of
    /// credit. A `None` payload ends the stream; the end-of-stream bundle
    /// is still transmitted.
    fn send_bundle(&self, stream: u32) -> Result<()> {
        let mut bundle = BundleWriter::new(self.bundle_budget);
        let mut ended = false;
        loop {
            match self.director.take_payload(stream) {
                Some(payload) => {
                    bundle.push(&payload)?;
                    if bundle.is_full() {
                        break;
                    }
                }
                None => {
                    bundle.push_end_of_stream();
                    ended = true;
                    break;
                }
            }
        }

        let seq = {
            let mut st = self.streams[stream as usize].lock();
            st.seq += 1;
            if ended && !st.finished {
                st.finished = true;
                self.finished.fetch_add(1, Ordering::AcqRel);
            }
            st.seq
        };

        let mut wire = BytesMut::new();
        encode_data_frame(stream, seq, &bundle.finish(), &mut wire)?;

        if let Err(err) = self.director.send_frame(wire.freeze()) {
            warn!(stream, error = %err, "frame send failed; marking channel lost");
            self.kill_all();
            return Err(EngineError::ChannelLost);
        }

        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        trace!(stream, seq, ended, "bundle sent");
        Ok(())
    }
}
