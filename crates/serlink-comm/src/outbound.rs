use std::time::{Duration, Instant};

use serlink_frame::Message;

use crate::status::{DeliveryTracker, MessageStatus};

/// Bookkeeping around one message awaiting transmission.
///
/// Owns the message from `send` until the slot is freed. Status moves only
/// through [`set_status`](Outbound::set_status) so the caller's tracker
/// never falls out of sync.
#[derive(Debug)]
pub(crate) struct Outbound {
    message: Message,
    sequence: u32,
    receipt_required: bool,
    tracker: Option<DeliveryTracker>,
    transmitted_at: Instant,
    transmissions: u8,
    status: MessageStatus,
}

impl Outbound {
    pub(crate) fn new(
        message: Message,
        sequence: u32,
        receipt_required: bool,
        tracker: Option<DeliveryTracker>,
    ) -> Self {
        let mut outbound = Self {
            message,
            sequence,
            receipt_required,
            tracker,
            transmitted_at: Instant::now(),
            transmissions: 0,
            status: MessageStatus::Queued,
        };
        outbound.set_status(MessageStatus::Queued);
        outbound
    }

    /// Record a completed transmission: stamp the clock, bump the counter.
    pub(crate) fn mark_transmitted(&mut self) {
        self.transmitted_at = Instant::now();
        self.transmissions = self.transmissions.saturating_add(1);
    }

    /// Update the status and mirror it into the tracker, if any.
    pub(crate) fn set_status(&mut self, status: MessageStatus) {
        self.status = status;
        if let Some(tracker) = &self.tracker {
            tracker.set(status);
        }
    }

    /// Whether the receipt wait has run past `timeout` since the last
    /// transmission.
    pub(crate) fn timeout_elapsed(&self, timeout: Duration) -> bool {
        self.transmitted_at.elapsed() > timeout
    }

    /// Whether another transmission fits in the budget.
    pub(crate) fn can_retransmit(&self, max_transmissions: u8) -> bool {
        self.transmissions < max_transmissions
    }

    pub(crate) fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn sequence(&self) -> u32 {
        self.sequence
    }

    pub(crate) fn receipt_required(&self) -> bool {
        self.receipt_required
    }

    pub(crate) fn transmissions(&self) -> u8 {
        self.transmissions
    }

    pub(crate) fn status(&self) -> MessageStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn new_outbound_reports_queued() {
        let tracker = DeliveryTracker::new();
        let outbound = Outbound::new(Message::new(1), 0, true, Some(tracker.clone()));

        assert_eq!(outbound.status(), MessageStatus::Queued);
        assert_eq!(tracker.status(), MessageStatus::Queued);
        assert_eq!(outbound.transmissions(), 0);
    }

    #[test]
    fn status_updates_reach_tracker() {
        let tracker = DeliveryTracker::new();
        let mut outbound = Outbound::new(Message::new(1), 0, true, Some(tracker.clone()));

        outbound.set_status(MessageStatus::Verifying);
        assert_eq!(tracker.status(), MessageStatus::Verifying);
    }

    #[test]
    fn works_without_tracker() {
        let mut outbound = Outbound::new(Message::new(1), 0, false, None);
        outbound.set_status(MessageStatus::Sent);
        assert_eq!(outbound.status(), MessageStatus::Sent);
    }

    #[test]
    fn retransmit_budget() {
        let mut outbound = Outbound::new(Message::new(1), 0, true, None);
        assert!(outbound.can_retransmit(2));
        outbound.mark_transmitted();
        assert!(outbound.can_retransmit(2));
        outbound.mark_transmitted();
        assert!(!outbound.can_retransmit(2));
        assert_eq!(outbound.transmissions(), 2);
    }

    #[test]
    fn timeout_elapses_after_mark() {
        let mut outbound = Outbound::new(Message::new(1), 0, true, None);
        outbound.mark_transmitted();
        assert!(!outbound.timeout_elapsed(Duration::from_secs(60)));

        thread::sleep(Duration::from_millis(5));
        assert!(outbound.timeout_elapsed(Duration::from_millis(1)));
    }
}
