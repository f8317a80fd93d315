//! Reliable prioritized messaging over serial byte links.
//!
//! serlink moves discrete application messages between two peers over a
//! UART-class byte pipe: highest-priority-first scheduling, optional
//! at-least-once delivery via receipts, and bounded retransmission, all
//! driven by a single-threaded `spin` step function.
//!
//! # Crate Structure
//!
//! - [`transport`] — The `ByteLink` trait and concrete links (TCP/UDS
//!   device bridges, in-process loopback)
//! - [`frame`] — Message codec and wire framing (escape transparency,
//!   XOR checksum)
//! - [`comm`] — The protocol engine: slot queues, receipts, trackers

/// Re-export transport types.
pub mod transport {
    pub use serlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serlink_frame::*;
}

/// Re-export the protocol engine.
pub mod comm {
    pub use serlink_comm::*;
}
