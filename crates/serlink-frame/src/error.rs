/// Errors that can occur during message or packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A message byte slice is shorter than its header or declared length.
    #[error("message truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// A payload field access is out of bounds or misaligned with the payload.
    #[error("invalid field: {size} bytes at offset {address} (payload is {data_length} bytes)")]
    InvalidField {
        address: u16,
        size: usize,
        data_length: usize,
    },

    /// The receipt byte does not name a known receipt kind.
    #[error("unknown receipt kind: 0x{0:02X}")]
    UnknownReceiptKind(u8),
}

pub type Result<T> = std::result::Result<T, FrameError>;
