use serlink_frame::Message;

/// A received message parked in the receive queue until the application
/// claims it. Keeps the sender's sequence number for age ordering.
#[derive(Debug)]
pub(crate) struct Inbound {
    message: Message,
    sequence: u32,
}

impl Inbound {
    pub(crate) fn new(message: Message, sequence: u32) -> Self {
        Self { message, sequence }
    }

    pub(crate) fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn sequence(&self) -> u32 {
        self.sequence
    }

    pub(crate) fn into_message(self) -> Message {
        self.message
    }
}
