//! Credit-flow-controlled stream multiplexer/demultiplexer engines.
//!
//! Many logical payload streams share one physical byte channel. The send
//! side ([`Multiplexer`]) aggregates application payloads into bounded-size
//! bundles and schedules streams according to receiver-granted credit; the
//! receive side ([`Demultiplexer`]) validates per-stream ordering, buffers
//! bundles, hands decoded payloads to consumers, and grants credit back.
//!
//! The engines own no channel resources: bytes enter and leave through the
//! [`OutboundDirector`]/[`InboundDirector`] seams injected at construction.
//!
//! Liveness rule observed throughout: every transition into a terminal
//! stream state enqueues a wakeup into whichever blocking queue a thread
//! might be parked on, so no consumer or scheduler thread is ever stranded.

pub mod config;
pub mod demux;
pub mod director;
pub mod error;
pub mod mux;
pub mod queue;
mod state;

pub use config::MuxConfig;
pub use demux::{Demultiplexer, DemuxStats};
pub use director::{InboundDirector, OutboundDirector};
pub use error::{EngineError, Result};
pub use mux::{Multiplexer, MuxStats};
pub use queue::BlockingQueue;
pub use state::Terminal;
