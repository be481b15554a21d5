//! Wire framing for the muxlane multiplexed stream transport.
//!
//! Two frame kinds are exchanged over the physical channel, all integers
//! big-endian 32-bit:
//!
//! - Data frame: `streamIndex, packetSeq, length, payload[length]` — carries
//!   one bundle of aggregated application payloads for one logical stream.
//! - Ticket frame: `streamIndex, newCeiling` — receiver-granted send credit;
//!   a ceiling of `-1` releases the stream (stop sending).
//!
//! A bundle is a sequence of `(innerLen, innerPayload)` records terminated by
//! `-2`; an `innerLen` of `-1` (no payload bytes) marks end-of-stream.

pub mod bundle;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use bundle::{BundleReader, BundleWriter, InnerRecord, END_OF_BUNDLE, END_OF_STREAM};
pub use codec::{
    decode_data_frame, decode_ticket, encode_data_frame, encode_ticket, DataFrame, Ticket,
    DATA_HEADER_SIZE, DEFAULT_MAX_PAYLOAD, RELEASE_CEILING, TICKET_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
