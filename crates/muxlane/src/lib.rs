//! Multiplexed, credit-flow-controlled stream transport.
//!
//! muxlane carries many logical, ordered payload streams over one physical
//! byte channel. The receive side grants credit (tickets) back to the send
//! side to bound buffering; each stream fails independently, and teardown
//! never leaves a producer or consumer thread parked.
//!
//! # Crate Structure
//!
//! - [`frame`] — Wire codec: data frames, ticket frames, bundles
//! - [`engine`] — Multiplexer/demultiplexer engines and Director seams
//! - [`wire`] — Ready-made Directors over `std::io` byte channels
//! - [`pump`] — Delivery loops feeding received frames into the engines

/// Re-export frame types.
pub mod frame {
    pub use muxlane_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use muxlane_engine::*;
}

pub mod pump;
pub mod wire;

pub use pump::{run_delivery_pump, run_ticket_pump};
pub use wire::{PayloadQueue, WireInbound, WireOutbound};
