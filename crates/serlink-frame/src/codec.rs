use bytes::{BufMut, BytesMut};

use crate::error::FrameError;
use crate::message::Message;

/// Start-of-packet marker. Appears literally only at offset 0.
pub const HEADER_BYTE: u8 = 0xAA;

/// Escape marker. Any mid-packet occurrence of [`HEADER_BYTE`] or
/// [`ESCAPE_BYTE`] travels as `ESCAPE_BYTE` followed by the value minus one.
pub const ESCAPE_BYTE: u8 = 0x1B;

/// Fixed packet overhead: header (1) + sequence (4) + receipt (1) + checksum (1).
pub const PACKET_OVERHEAD: usize = 7;

/// Length of the packet prefix through the data-length field:
/// header (1) + sequence (4) + receipt (1) + id (2) + priority (1) + data length (2).
pub const PACKET_PREFIX_LEN: usize = 11;

/// Length of a receipt packet: prefix + checksum, no payload.
pub const RECEIPT_PACKET_LEN: usize = 12;

/// The receipt byte of a packet.
///
/// Data packets carry `NotRequired` or `Required`; receipt packets answer
/// a `Required` packet with `Received` or `ChecksumMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiptKind {
    /// Fire-and-forget data packet.
    NotRequired = 0,
    /// Data packet that must be answered with a receipt.
    Required = 1,
    /// Receipt: the packet arrived with a valid checksum.
    Received = 2,
    /// Receipt: the packet arrived but its checksum did not verify.
    ChecksumMismatch = 3,
}

impl ReceiptKind {
    /// Whether this kind marks a data-bearing packet.
    pub fn is_data(self) -> bool {
        matches!(self, ReceiptKind::NotRequired | ReceiptKind::Required)
    }
}

impl From<ReceiptKind> for u8 {
    fn from(kind: ReceiptKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for ReceiptKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            0 => Ok(ReceiptKind::NotRequired),
            1 => Ok(ReceiptKind::Required),
            2 => Ok(ReceiptKind::Received),
            3 => Ok(ReceiptKind::ChecksumMismatch),
            other => Err(FrameError::UnknownReceiptKind(other)),
        }
    }
}

/// XOR of all bytes. Computed over the un-escaped packet on both sides.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode the logical (pre-escape) packet for a data message.
///
/// Wire format, big-endian multi-byte fields:
///
/// ```text
/// ┌────────────┬───────────────┬──────────────┬────────────────┬──────────┐
/// │ 0xAA (1B)  │ sequence (4B) │ receipt (1B) │ message (5+N B)│ xor (1B) │
/// └────────────┴───────────────┴──────────────┴────────────────┴──────────┘
/// ```
///
/// The checksum covers every byte before it. Escapement is a separate pass
/// ([`escape_into`]) so the checksum is always computed on logical bytes.
pub fn encode_data_packet(sequence: u32, receipt: ReceiptKind, message: &Message) -> BytesMut {
    let mut packet = BytesMut::with_capacity(PACKET_OVERHEAD + message.wire_len());
    packet.put_u8(HEADER_BYTE);
    packet.put_u32(sequence);
    packet.put_u8(receipt.into());
    message.encode_into(&mut packet);
    let checksum = xor_checksum(&packet);
    packet.put_u8(checksum);
    packet
}

/// Build the logical receipt packet answering a `Required` data packet.
///
/// `head` is the first 9 bytes of the received packet (header, sequence,
/// receipt, id, priority); they are copied verbatim, the receipt byte is
/// overwritten with `ack`, the data length is zeroed, and a fresh checksum
/// is appended.
pub fn encode_receipt_packet(head: &[u8], ack: ReceiptKind) -> [u8; RECEIPT_PACKET_LEN] {
    debug_assert!(head.len() >= 9);
    let mut packet = [0u8; RECEIPT_PACKET_LEN];
    packet[..9].copy_from_slice(&head[..9]);
    packet[5] = ack.into();
    // packet[9..11] stay zero: no payload.
    packet[11] = xor_checksum(&packet[..11]);
    packet
}

/// Apply escapement to a logical packet.
///
/// The header byte at offset 0 is emitted verbatim. Every later byte equal
/// to [`HEADER_BYTE`] or [`ESCAPE_BYTE`] (the checksum included) is emitted
/// as the escape byte followed by the value minus one. No other bytes are
/// ever escaped.
pub fn escape_into(packet: &[u8], dst: &mut BytesMut) {
    dst.reserve(packet.len());
    if let Some((&head, rest)) = packet.split_first() {
        dst.put_u8(head);
        for &byte in rest {
            if byte == HEADER_BYTE || byte == ESCAPE_BYTE {
                dst.put_u8(ESCAPE_BYTE);
                dst.put_u8(byte.wrapping_sub(1));
            } else {
                dst.put_u8(byte);
            }
        }
    }
}

/// Inbound escape latch.
///
/// Feed wire bytes one at a time; escaped values come back re-inflated.
/// The latch survives short reads, so a packet interrupted mid-escape
/// resumes correctly when more bytes arrive.
#[derive(Debug, Default)]
pub struct Unescaper {
    pending: bool,
}

impl Unescaper {
    /// Create a cleared latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one wire byte. Returns the logical byte it completes, or
    /// `None` when the byte was an escape marker.
    pub fn feed(&mut self, byte: u8) -> Option<u8> {
        if byte == ESCAPE_BYTE {
            self.pending = true;
            return None;
        }
        let value = if self.pending {
            byte.wrapping_add(1)
        } else {
            byte
        };
        self.pending = false;
        Some(value)
    }
}
