use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the serialized message header: id (2) + priority (1) + data length (2).
pub const MESSAGE_HEADER_LEN: usize = 5;

/// Reserved id used as the match-anything filter in receive lookups.
/// It must never be used as a message id on the wire.
pub const WILDCARD_ID: u16 = 0xFFFF;

/// An application message: id, scheduling priority, opaque payload.
///
/// Serialized layout (big-endian multi-byte fields):
///
/// ```text
/// ┌──────────┬──────────────┬──────────────────┬───────────────────┐
/// │ id (2B)  │ priority (1B)│ data_length (2B) │ data (N bytes)    │
/// └──────────┴──────────────┴──────────────────┴───────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: u16,
    priority: u8,
    data: Vec<u8>,
}

impl Message {
    /// Create a message with an empty payload.
    pub fn new(id: u16) -> Self {
        Self {
            id,
            priority: 0,
            data: Vec::new(),
        }
    }

    /// Create a message with a zero-initialized payload of `data_length` bytes.
    pub fn with_len(id: u16, data_length: u16) -> Self {
        Self {
            id,
            priority: 0,
            data: vec![0; data_length as usize],
        }
    }

    /// Create a message that owns the given payload.
    pub fn with_payload(id: u16, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let data = payload.into();
        if data.len() > u16::MAX as usize {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: u16::MAX as usize,
            });
        }
        Ok(Self {
            id,
            priority: 0,
            data,
        })
    }

    /// Deserialize a message from its canonical byte layout.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MESSAGE_HEADER_LEN {
            return Err(FrameError::Truncated {
                expected: MESSAGE_HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let priority = bytes[2];
        let data_length = u16::from_be_bytes([bytes[3], bytes[4]]) as usize;
        if bytes.len() < MESSAGE_HEADER_LEN + data_length {
            return Err(FrameError::Truncated {
                expected: MESSAGE_HEADER_LEN + data_length,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            id,
            priority,
            data: bytes[MESSAGE_HEADER_LEN..MESSAGE_HEADER_LEN + data_length].to_vec(),
        })
    }

    /// Serialize into the canonical byte layout.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_len());
        dst.put_u16(self.id);
        dst.put_u8(self.priority);
        dst.put_u16(self.data.len() as u16);
        dst.put_slice(&self.data);
    }

    /// The message id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The scheduling priority (higher wins).
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Set the scheduling priority.
    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
    }

    /// Payload length in bytes.
    pub fn data_len(&self) -> u16 {
        self.data.len() as u16
    }

    /// Total serialized length: header plus payload.
    pub fn wire_len(&self) -> usize {
        MESSAGE_HEADER_LEN + self.data.len()
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Write a field into the payload at the given byte offset.
    ///
    /// Multi-byte integers are stored big-endian; floats are stored as the
    /// big-endian bytes of their IEEE-754 bit pattern, so a round trip is
    /// bit-exact. Both peers are assumed to use IEEE-754 floats.
    pub fn set_field<T: FieldValue>(&mut self, address: u16, value: T) -> Result<()> {
        let range = self.field_range(address, T::WIDTH)?;
        value.write_be(&mut self.data[range]);
        Ok(())
    }

    /// Read a field from the payload at the given byte offset.
    pub fn get_field<T: FieldValue>(&self, address: u16) -> Result<T> {
        let range = self.field_range(address, T::WIDTH)?;
        Ok(T::read_be(&self.data[range]))
    }

    fn field_range(&self, address: u16, width: usize) -> Result<std::ops::Range<usize>> {
        let start = address as usize;
        let end = start
            .checked_add(width)
            .filter(|&end| end <= self.data.len())
            .ok_or(FrameError::InvalidField {
                address,
                size: width,
                data_length: self.data.len(),
            })?;
        Ok(start..end)
    }
}

/// A value that can live in a message payload field.
///
/// Implemented for 1/2/4/8-byte integers and for `f32`/`f64`.
pub trait FieldValue: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Write the big-endian encoding into `dst` (exactly `WIDTH` bytes).
    fn write_be(self, dst: &mut [u8]);

    /// Read the big-endian encoding from `src` (exactly `WIDTH` bytes).
    fn read_be(src: &[u8]) -> Self;
}

macro_rules! impl_int_field {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn write_be(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_be_bytes());
                }

                fn read_be(src: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    <$ty>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_int_field!(u8, i8, u16, i16, u32, i32, u64, i64);

impl FieldValue for f32 {
    const WIDTH: usize = 4;

    fn write_be(self, dst: &mut [u8]) {
        self.to_bits().write_be(dst);
    }

    fn read_be(src: &[u8]) -> Self {
        f32::from_bits(u32::read_be(src))
    }
}

impl FieldValue for f64 {
    const WIDTH: usize = 8;

    fn write_be(self, dst: &mut [u8]) {
        self.to_bits().write_be(dst);
    }

    fn read_be(src: &[u8]) -> Self {
        f64::from_bits(u64::read_be(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut msg = Message::with_len(0x1234, 6);
        msg.set_priority(9);
        msg.set_field(0, 0xDEADBEEFu32).unwrap();
        msg.set_field(4, 0x55AAu16).unwrap();

        let mut wire = BytesMut::new();
        msg.encode_into(&mut wire);
        assert_eq!(wire.len(), msg.wire_len());

        let decoded = Message::decode(&wire).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn encoded_layout_is_big_endian() {
        let mut msg = Message::with_len(0x0102, 2);
        msg.set_field(0, 0x0304u16).unwrap();

        let mut wire = BytesMut::new();
        msg.encode_into(&mut wire);
        assert_eq!(wire.as_ref(), &[0x01, 0x02, 0x00, 0x00, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn wire_len_is_payload_plus_header() {
        assert_eq!(Message::new(1).wire_len(), 5);
        assert_eq!(Message::with_len(1, 100).wire_len(), 105);
    }

    #[test]
    fn integer_fields_roundtrip_all_widths() {
        let mut msg = Message::with_len(1, 30);
        msg.set_field(0, 0xA5u8).unwrap();
        msg.set_field(1, -2i8).unwrap();
        msg.set_field(2, 0xBEEFu16).unwrap();
        msg.set_field(4, -30000i16).unwrap();
        msg.set_field(6, 0xDEADBEEFu32).unwrap();
        msg.set_field(10, -123456789i32).unwrap();
        msg.set_field(14, 0x0123456789ABCDEFu64).unwrap();
        msg.set_field(22, -987654321012345i64).unwrap();

        assert_eq!(msg.get_field::<u8>(0).unwrap(), 0xA5);
        assert_eq!(msg.get_field::<i8>(1).unwrap(), -2);
        assert_eq!(msg.get_field::<u16>(2).unwrap(), 0xBEEF);
        assert_eq!(msg.get_field::<i16>(4).unwrap(), -30000);
        assert_eq!(msg.get_field::<u32>(6).unwrap(), 0xDEADBEEF);
        assert_eq!(msg.get_field::<i32>(10).unwrap(), -123456789);
        assert_eq!(msg.get_field::<u64>(14).unwrap(), 0x0123456789ABCDEF);
        assert_eq!(msg.get_field::<i64>(22).unwrap(), -987654321012345);
    }

    #[test]
    fn float_fields_are_bit_exact() {
        let mut msg = Message::with_len(1, 12);
        msg.set_field(0, 3.5f32).unwrap();
        msg.set_field(4, -1.0e-300f64).unwrap();

        assert_eq!(msg.get_field::<f32>(0).unwrap().to_bits(), 3.5f32.to_bits());
        assert_eq!(
            msg.get_field::<f64>(4).unwrap().to_bits(),
            (-1.0e-300f64).to_bits()
        );
        // The on-wire bytes are the big-endian bit pattern.
        assert_eq!(msg.get_field::<u32>(0).unwrap(), 3.5f32.to_bits());
    }

    #[test]
    fn out_of_bounds_field_rejected() {
        let mut msg = Message::with_len(1, 4);
        assert!(matches!(
            msg.set_field(2, 0u32),
            Err(FrameError::InvalidField { .. })
        ));
        assert!(matches!(
            msg.get_field::<u64>(0),
            Err(FrameError::InvalidField { .. })
        ));
        // Offset arithmetic must not wrap.
        assert!(matches!(
            msg.get_field::<u8>(u16::MAX),
            Err(FrameError::InvalidField { .. })
        ));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert!(matches!(
            Message::decode(&[0x00, 0x01, 0x00]),
            Err(FrameError::Truncated { .. })
        ));
        // Header promises 4 payload bytes, only 2 present.
        assert!(matches!(
            Message::decode(&[0x00, 0x01, 0x00, 0x00, 0x04, 0xAA, 0xBB]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn with_payload_rejects_oversized() {
        let result = Message::with_payload(1, vec![0u8; u16::MAX as usize + 1]);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }
}
