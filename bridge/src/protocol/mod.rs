//! Versioned packet building
//!
//! `layout` holds the per-revision tables, `versions` the tables themselves,
//! and `builder` the shared encode/decode code that runs over them.

pub mod builder;
pub mod layout;
pub mod versions;

pub use builder::{PacketBuilder, SpawnFields, UseEntity, UseEntityAction, Hand};
pub use layout::ProtocolLayout;
pub use versions::ProtocolVersion;

use crate::net::codec::DecodeError;

/// Errors raised while building or decoding a single packet
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// A layout assumption that held for another revision does not hold here
    #[error("Protocol mismatch in {operation}: {detail}")]
    Mismatch {
        operation: &'static str,
        detail: String,
    },
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Unknown use-entity action {0}")]
    UnknownAction(i32),
    #[error("Unknown hand {0}")]
    UnknownHand(i32),
    #[error("Unexpected packet id {found:#04x} (expected {expected:#04x})")]
    UnexpectedPacket { expected: i32, found: i32 },
}
