use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, trace};

use serlink_frame::{
    codec, Message, ReceiptKind, Unescaper, HEADER_BYTE, PACKET_PREFIX_LEN, WILDCARD_ID,
};
use serlink_transport::ByteLink;

use crate::error::{CommError, Result};
use crate::inbound::Inbound;
use crate::outbound::Outbound;
use crate::status::{DeliveryTracker, MessageStatus};

/// Default capacity of each slot array.
pub const DEFAULT_QUEUE_SIZE: u16 = 10;

/// Default wait for a receipt before a retransmission becomes eligible.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default total transmission budget per receipt-required message.
pub const DEFAULT_MAX_TRANSMISSIONS: u8 = 5;

/// The protocol engine: owns the link, the transmit and receive slot
/// arrays, and the sequence counter.
///
/// Drive it by calling [`spin`](Self::spin) at a fixed rate. Each spin
/// transmits at most one packet and parses at most one incoming packet,
/// so a spin is cheap and its worst case is bounded by the queue size.
///
/// Slots are fixed positions: insertion takes the first empty slot and
/// entries never move, so memory stays bounded and selection cost is one
/// linear scan.
pub struct Communicator<L: ByteLink> {
    link: L,
    tx_slots: Vec<Option<Outbound>>,
    rx_slots: Vec<Option<Inbound>>,
    sequence: u32,
    receipt_timeout: Duration,
    max_transmissions: u8,
}

impl<L: ByteLink> Communicator<L> {
    /// Take ownership of a link and discard whatever half-read bytes it
    /// was holding.
    pub fn new(mut link: L) -> Result<Self> {
        link.flush()?;
        let queue_size = DEFAULT_QUEUE_SIZE as usize;
        Ok(Self {
            link,
            tx_slots: (0..queue_size).map(|_| None).collect(),
            rx_slots: (0..queue_size).map(|_| None).collect(),
            sequence: 0,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            max_transmissions: DEFAULT_MAX_TRANSMISSIONS,
        })
    }

    /// Queue a message for transmission.
    ///
    /// Takes ownership of the message and assigns it the next sequence
    /// number. Returns `false` (dropping the message) when every transmit
    /// slot is occupied or the id is the reserved receive wildcard.
    /// Status transitions are mirrored into `tracker` if one is given.
    pub fn send(
        &mut self,
        message: Message,
        receipt_required: bool,
        tracker: Option<DeliveryTracker>,
    ) -> bool {
        if message.id() == WILDCARD_ID {
            debug!(id = message.id(), "rejecting reserved wildcard id");
            return false;
        }
        let Some(index) = self.tx_slots.iter().position(Option::is_none) else {
            debug!(id = message.id(), "transmit queue full, dropping message");
            return false;
        };
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        self.tx_slots[index] = Some(Outbound::new(message, sequence, receipt_required, tracker));
        true
    }

    /// Number of received messages waiting to be claimed.
    pub fn messages_available(&self) -> u16 {
        self.rx_slots.iter().filter(|slot| slot.is_some()).count() as u16
    }

    /// Claim the best waiting message regardless of id.
    pub fn receive(&mut self) -> Option<Message> {
        self.receive_matching(WILDCARD_ID)
    }

    /// Claim the best waiting message with the given id
    /// ([`WILDCARD_ID`] matches everything).
    ///
    /// "Best" is highest priority, ties broken by the smallest sender
    /// sequence number (oldest first).
    pub fn receive_matching(&mut self, id: u16) -> Option<Message> {
        let mut best: Option<(usize, u8, u32)> = None;
        for (index, slot) in self.rx_slots.iter().enumerate() {
            let Some(entry) = slot else { continue };
            if id != WILDCARD_ID && entry.message().id() != id {
                continue;
            }
            let key = (entry.message().priority(), entry.sequence());
            let better = match best {
                None => true,
                Some((_, priority, sequence)) => {
                    key.0 > priority || (key.0 == priority && key.1 < sequence)
                }
            };
            if better {
                best = Some((index, key.0, key.1));
            }
        }
        let (index, _, _) = best?;
        self.rx_slots[index].take().map(Inbound::into_message)
    }

    /// One engine step: at most one transmit attempt, then at most one
    /// receive attempt. Designed for fixed-rate external invocation.
    pub fn spin(&mut self) -> Result<()> {
        self.spin_tx()?;
        self.spin_rx()
    }

    /// Capacity of each slot array.
    pub fn queue_size(&self) -> u16 {
        self.tx_slots.len() as u16
    }

    /// Resize both slot arrays, preserving existing entries in place.
    ///
    /// Shrinking fails with [`CommError::QueueShrink`] if any slot being
    /// cut is occupied; drain those entries first.
    pub fn set_queue_size(&mut self, value: u16) -> Result<()> {
        let value = value as usize;
        for (index, occupied) in self
            .tx_slots
            .iter()
            .map(Option::is_some)
            .zip(self.rx_slots.iter().map(Option::is_some))
            .map(|(tx, rx)| tx || rx)
            .enumerate()
            .skip(value)
        {
            if occupied {
                return Err(CommError::QueueShrink {
                    requested: value as u16,
                    occupied_slot: index as u16,
                });
            }
        }
        self.tx_slots.resize_with(value, || None);
        self.rx_slots.resize_with(value, || None);
        Ok(())
    }

    /// How long a transmitted message waits for a receipt before it is
    /// eligible for retransmission.
    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }

    /// Set the receipt timeout.
    pub fn set_receipt_timeout(&mut self, value: Duration) {
        self.receipt_timeout = value;
    }

    /// Total transmission budget per receipt-required message.
    pub fn max_transmissions(&self) -> u8 {
        self.max_transmissions
    }

    /// Set the transmission budget.
    pub fn set_max_transmissions(&mut self, value: u8) {
        self.max_transmissions = value;
    }

    /// Transmit the most urgent eligible outbound message, if any.
    ///
    /// Eligible means anything except a `Verifying` entry still inside its
    /// receipt window. Urgency is highest priority first, then the oldest
    /// sequence number, so a stale `Verifying` entry competes on equal
    /// terms with fresh messages and can be preempted by them.
    fn spin_tx(&mut self) -> Result<()> {
        let mut best: Option<(usize, u8, u32)> = None;
        for (index, slot) in self.tx_slots.iter().enumerate() {
            let Some(entry) = slot else { continue };
            if entry.status() == MessageStatus::Verifying
                && !entry.timeout_elapsed(self.receipt_timeout)
            {
                continue;
            }
            let key = (entry.message().priority(), entry.sequence());
            let better = match best {
                None => true,
                Some((_, priority, sequence)) => {
                    key.0 > priority || (key.0 == priority && key.1 < sequence)
                }
            };
            if better {
                best = Some((index, key.0, key.1));
            }
        }
        let Some((index, _, _)) = best else {
            return Ok(());
        };

        let Some(mut entry) = self.tx_slots[index].take() else {
            return Ok(());
        };

        if entry.transmissions() == 0 {
            if let Err(err) = Self::transmit(&mut self.link, &mut entry) {
                self.tx_slots[index] = Some(entry);
                return Err(err);
            }
            if entry.receipt_required() {
                entry.set_status(MessageStatus::Verifying);
                self.tx_slots[index] = Some(entry);
            } else {
                entry.set_status(MessageStatus::Sent);
            }
        } else if entry.can_retransmit(self.max_transmissions) {
            // Receipt window expired; the entry stays in Verifying.
            let result = Self::transmit(&mut self.link, &mut entry);
            self.tx_slots[index] = Some(entry);
            result?;
        } else {
            debug!(
                sequence = entry.sequence(),
                id = entry.message().id(),
                "transmission budget exhausted"
            );
            entry.set_status(MessageStatus::NotReceived);
        }
        Ok(())
    }

    /// Parse at most one incoming packet and dispatch it.
    ///
    /// A short read anywhere abandons the attempt without touching queue
    /// state; the escape latch and checksum are the only resync machinery
    /// this protocol has, by contract.
    fn spin_rx(&mut self) -> Result<()> {
        // Header hunt. Escape processing is off: the header byte never
        // appears escaped, and garbage between packets is skipped here.
        let mut byte = [0u8; 1];
        loop {
            if self.link.read(&mut byte)? < 1 {
                return Ok(());
            }
            if byte[0] == HEADER_BYTE {
                break;
            }
        }

        // Packet prefix, through the data-length field.
        let mut prefix = [0u8; PACKET_PREFIX_LEN];
        prefix[0] = HEADER_BYTE;
        if !Self::read_unescaped(&mut self.link, &mut prefix[1..])? {
            return Ok(());
        }
        let data_length = u16::from_be_bytes([prefix[9], prefix[10]]) as usize;

        // Payload and checksum.
        let mut packet = vec![0u8; PACKET_PREFIX_LEN + data_length + 1];
        packet[..PACKET_PREFIX_LEN].copy_from_slice(&prefix);
        if !Self::read_unescaped(&mut self.link, &mut packet[PACKET_PREFIX_LEN..])? {
            return Ok(());
        }

        let body_len = packet.len() - 1;
        let checksum_ok = packet[body_len] == codec::xor_checksum(&packet[..body_len]);
        let sequence = u32::from_be_bytes([packet[1], packet[2], packet[3], packet[4]]);

        let kind = ReceiptKind::try_from(packet[5]).ok();
        match kind {
            Some(ReceiptKind::NotRequired) => {}
            Some(ReceiptKind::Required) => {
                let ack = if checksum_ok {
                    ReceiptKind::Received
                } else {
                    ReceiptKind::ChecksumMismatch
                };
                // Receipts are written inline; they never occupy a
                // transmit slot and are never retransmitted.
                let receipt = codec::encode_receipt_packet(&packet[..9], ack);
                Self::write_escaped(&mut self.link, &receipt)?;
                trace!(sequence, ack = ?ack, "answered receipt request");
            }
            Some(ReceiptKind::Received) => {
                if checksum_ok {
                    self.settle_received(sequence);
                }
            }
            Some(ReceiptKind::ChecksumMismatch) => {
                if checksum_ok {
                    self.resend_after_mismatch(sequence)?;
                }
            }
            None => {
                trace!(sequence, byte = packet[5], "ignoring unknown receipt kind");
            }
        }

        // Only data packets reach the application; receipt traffic stops
        // here. A full receive queue drops the message outright.
        if checksum_ok && kind.is_some_and(ReceiptKind::is_data) {
            let message = Message::decode(&packet[6..body_len])?;
            match self.rx_slots.iter().position(Option::is_none) {
                Some(index) => {
                    trace!(sequence, id = message.id(), "queued inbound message");
                    self.rx_slots[index] = Some(Inbound::new(message, sequence));
                }
                None => {
                    debug!(sequence, id = message.id(), "receive queue full, dropping");
                }
            }
        }
        Ok(())
    }

    /// Handle a `Received` receipt: settle and free the matching slot.
    /// Unknown sequences are stale or duplicate receipts and ignored.
    fn settle_received(&mut self, sequence: u32) {
        for slot in &mut self.tx_slots {
            if slot.as_ref().is_some_and(|e| e.sequence() == sequence) {
                if let Some(mut entry) = slot.take() {
                    entry.set_status(MessageStatus::Received);
                    trace!(sequence, "delivery confirmed");
                }
                return;
            }
        }
    }

    /// Handle a `ChecksumMismatch` receipt: the peer saw the packet but it
    /// arrived damaged, so retransmit immediately instead of waiting for
    /// the receipt timeout, unless the budget is already spent.
    fn resend_after_mismatch(&mut self, sequence: u32) -> Result<()> {
        for index in 0..self.tx_slots.len() {
            if self.tx_slots[index]
                .as_ref()
                .is_some_and(|e| e.sequence() == sequence)
            {
                let Some(mut entry) = self.tx_slots[index].take() else {
                    return Ok(());
                };
                if entry.can_retransmit(self.max_transmissions) {
                    let result = Self::transmit(&mut self.link, &mut entry);
                    self.tx_slots[index] = Some(entry);
                    result?;
                } else {
                    debug!(sequence, "mismatch receipt after budget exhausted");
                    entry.set_status(MessageStatus::NotReceived);
                }
                return Ok(());
            }
        }
        Ok(())
    }

    /// Serialize, escape, write, and stamp one outbound entry.
    fn transmit(link: &mut L, entry: &mut Outbound) -> Result<()> {
        let receipt = if entry.receipt_required() {
            ReceiptKind::Required
        } else {
            ReceiptKind::NotRequired
        };
        let packet = codec::encode_data_packet(entry.sequence(), receipt, entry.message());
        Self::write_escaped(link, &packet)?;
        entry.mark_transmitted();
        trace!(
            sequence = entry.sequence(),
            id = entry.message().id(),
            transmissions = entry.transmissions(),
            "transmitted packet"
        );
        Ok(())
    }

    fn write_escaped(link: &mut L, packet: &[u8]) -> Result<()> {
        let mut wire = BytesMut::with_capacity(packet.len());
        codec::escape_into(packet, &mut wire);
        link.write(&wire)?;
        Ok(())
    }

    /// Read exactly `buf.len()` logical bytes, honoring the escape latch.
    ///
    /// Returns `Ok(false)` on a read timeout. The latch persists across
    /// short reads within this call, since an escape pair may straddle a
    /// read boundary.
    fn read_unescaped(link: &mut L, buf: &mut [u8]) -> Result<bool> {
        let mut unescaper = Unescaper::new();
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = buf.len() - filled;
            let mut raw = vec![0u8; remaining];
            let count = link.read(&mut raw)?;
            if count < remaining {
                return Ok(false);
            }
            for &wire_byte in &raw {
                if let Some(value) = unescaper.feed(wire_byte) {
                    buf[filled] = value;
                    filled += 1;
                }
            }
        }
        Ok(true)
    }
}
