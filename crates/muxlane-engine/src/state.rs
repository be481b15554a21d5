//! Per-stream bookkeeping for both engine sides.
//!
//! Each state struct is guarded by its own mutex inside the owning engine;
//! nothing here is shared across streams.

/// Terminal states of a receive-side stream.
///
/// Sticky: once a stream enters a terminal state it never leaves it, and a
/// second transition is a no-op — so at most one terminal state ever holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The peer signalled end-of-stream; surfaced as `Ok(None)` from `take`.
    Ended,
    /// The local consumer gave up on this stream.
    Aborted,
    /// A sequence violation (gap or duplicate) was detected.
    Desynchronized,
    /// The physical channel was lost.
    ChannelLost,
}

/// Send-side stream state.
#[derive(Debug)]
pub(crate) struct SendStream {
    /// Sequence number of the last frame sent (frames carry seq starting
    /// at 1, so 0 means nothing sent yet).
    pub seq: u32,
    /// Highest sequence number the receiver has granted credit for.
    pub ceiling: u32,
    /// No further frames will be sent for this stream.
    pub finished: bool,
}

impl SendStream {
    pub fn new(initial_ceiling: u32) -> Self {
        Self {
            seq: 0,
            ceiling: initial_ceiling,
            finished: false,
        }
    }
}

/// Receive-side stream state.
#[derive(Debug)]
pub(crate) struct RecvState {
    /// Sequence number the next incoming frame must carry.
    pub expected_seq: u32,
    /// Last ceiling granted to the sender.
    pub ceiling: u32,
    /// Sequence number at which the next credit grant is issued.
    pub grant_point: u32,
    /// Bundles received but not yet consumed by `take`.
    pub buffered: u32,
    pub terminal: Option<Terminal>,
}

impl RecvState {
    pub fn new(initial_ceiling: u32, grant_step: u32) -> Self {
        Self {
            expected_seq: 1,
            ceiling: initial_ceiling,
            grant_point: grant_step,
            buffered: 0,
            terminal: None,
        }
    }

    /// Enter a terminal state. Returns `false` (and changes nothing) if the
    /// stream is already terminal.
    pub fn set_terminal(&mut self, terminal: Terminal) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        self.terminal = Some(terminal);
        true
    }
}
