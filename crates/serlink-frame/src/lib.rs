//! Message and wire-frame codec for serlink.
//!
//! Two layers live here:
//!
//! - [`Message`] — the application-visible unit: an id, a scheduling
//!   priority, and an opaque payload with big-endian field accessors.
//! - The packet codec — the outer framing that puts a message on the wire:
//!   header byte, sequence number, receipt byte, message body, XOR
//!   checksum, with escape-byte transparency for the two reserved values.
//!
//! No I/O happens here; the engine in `serlink-comm` drives these
//! functions against a `ByteLink`.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    encode_data_packet, encode_receipt_packet, escape_into, xor_checksum, ReceiptKind, Unescaper,
    ESCAPE_BYTE, HEADER_BYTE, PACKET_OVERHEAD, PACKET_PREFIX_LEN, RECEIPT_PACKET_LEN,
};
pub use error::{FrameError, Result};
pub use message::{Message, MESSAGE_HEADER_LEN, WILDCARD_ID};
