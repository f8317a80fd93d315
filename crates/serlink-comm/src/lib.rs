//! The serlink protocol engine.
//!
//! A [`Communicator`] owns a byte link and two fixed-capacity slot arrays
//! (outbound and inbound). It is driven entirely by external calls to
//! [`spin`](Communicator::spin): each call performs at most one transmit
//! attempt and at most one receive attempt. There are no background
//! threads or timers, which keeps the state machine auditable as a pure
//! step function. Wrap the whole communicator in a mutex if it must be
//! shared across threads.
//!
//! Delivery is best-effort prioritized, not FIFO. Senders that need
//! at-least-once delivery request a receipt and watch a
//! [`DeliveryTracker`] for the outcome.

pub mod communicator;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod status;

pub use communicator::{
    Communicator, DEFAULT_MAX_TRANSMISSIONS, DEFAULT_QUEUE_SIZE, DEFAULT_RECEIPT_TIMEOUT,
};
pub use error::{CommError, Result};
pub use status::{DeliveryTracker, MessageStatus};
