use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Delivery state of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageStatus {
    /// Accepted into the transmit queue, not yet on the wire.
    Queued = 0,
    /// Transmitted; no receipt was requested. Terminal.
    Sent = 1,
    /// Transmitted; waiting for a receipt from the peer.
    Verifying = 2,
    /// The peer confirmed delivery. Terminal.
    Received = 3,
    /// The retransmission budget ran out without confirmation. Terminal.
    NotReceived = 4,
}

impl MessageStatus {
    /// Whether the status can still change.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Received | MessageStatus::NotReceived
        )
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => MessageStatus::Sent,
            2 => MessageStatus::Verifying,
            3 => MessageStatus::Received,
            4 => MessageStatus::NotReceived,
            _ => MessageStatus::Queued,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageStatus::Queued => "queued",
            MessageStatus::Sent => "sent",
            MessageStatus::Verifying => "verifying",
            MessageStatus::Received => "received",
            MessageStatus::NotReceived => "not-received",
        };
        f.write_str(name)
    }
}

/// A shared, cloneable view of one outbound message's delivery state.
///
/// Hand a clone to [`send`](crate::Communicator::send) and keep one; the
/// communicator stores every status transition and never reads it back.
/// The handle stays valid after the message leaves the queue, so callers
/// can poll it long after the communicator has moved on.
#[derive(Debug, Clone, Default)]
pub struct DeliveryTracker {
    cell: Arc<AtomicU8>,
}

impl DeliveryTracker {
    /// Create a tracker reporting [`MessageStatus::Queued`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently recorded status.
    pub fn status(&self) -> MessageStatus {
        MessageStatus::from_raw(self.cell.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: MessageStatus) {
        self.cell.store(status as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_starts_queued() {
        assert_eq!(DeliveryTracker::new().status(), MessageStatus::Queued);
    }

    #[test]
    fn clones_observe_updates() {
        let tracker = DeliveryTracker::new();
        let observer = tracker.clone();

        tracker.set(MessageStatus::Verifying);
        assert_eq!(observer.status(), MessageStatus::Verifying);

        tracker.set(MessageStatus::Received);
        assert_eq!(observer.status(), MessageStatus::Received);
    }

    #[test]
    fn terminal_states() {
        assert!(!MessageStatus::Queued.is_terminal());
        assert!(!MessageStatus::Verifying.is_terminal());
        assert!(MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Received.is_terminal());
        assert!(MessageStatus::NotReceived.is_terminal());
    }
}
