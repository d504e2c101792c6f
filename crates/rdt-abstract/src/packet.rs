use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes of payload a single frame can carry.
pub const MAX_PAYLOAD: usize = 1024;

/// seq(4) + len(4) + checksum(4)
pub const HEADER_LEN: usize = 12;

/// Largest frame a peer will ever put on the wire.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD;

/// Alternating bit that tells a fresh packet apart from a retransmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    pub fn toggled(self) -> Self {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }

    /// Interpret a wire value. Anything other than 0 or 1 is not a sequence bit.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(SeqBit::Zero),
            1 => Some(SeqBit::One),
            _ => None,
        }
    }
}

impl std::ops::Not for SeqBit {
    type Output = SeqBit;

    fn not(self) -> Self::Output {
        self.toggled()
    }
}

impl fmt::Display for SeqBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Sequence bit as carried on the wire (only 0/1 are meaningful).
    pub seq: u32,
    /// Number of meaningful payload bytes. Zero on a data packet marks end of stream.
    pub len: u32,
    /// XOR fold over the header (with this field zeroed) and `len` payload bytes.
    pub checksum: u32,
}

/// One frame: data, end-of-stream marker, or acknowledgment.
///
/// The checksum is left at zero by the constructors; the codec seals a packet
/// right before each transmission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Data packet carrying `payload` (callers keep it within [`MAX_PAYLOAD`]).
    pub fn data(seq: SeqBit, payload: Bytes) -> Self {
        Self {
            header: Header {
                seq: seq.as_u32(),
                len: payload.len() as u32,
                checksum: 0,
            },
            payload,
        }
    }

    /// Zero-length data packet terminating a stream.
    pub fn end_of_stream(seq: SeqBit) -> Self {
        Self::data(seq, Bytes::new())
    }

    /// Control packet acknowledging `seq`. Shares the layout of the end-of-stream
    /// packet; which one it is depends on the direction it travels.
    pub fn ack(seq: SeqBit) -> Self {
        Self::data(seq, Bytes::new())
    }

    pub fn seq_bit(&self) -> Option<SeqBit> {
        SeqBit::from_wire(self.header.seq)
    }

    pub fn len(&self) -> usize {
        self.header.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.len == 0
    }

    /// The meaningful part of the payload, never more than `header.len` bytes.
    pub fn body(&self) -> &[u8] {
        let end = self.len().min(self.payload.len());
        &self.payload[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_bit_alternates() {
        assert_eq!(SeqBit::Zero.toggled(), SeqBit::One);
        assert_eq!(!SeqBit::One, SeqBit::Zero);
        assert_eq!(SeqBit::from_wire(1), Some(SeqBit::One));
        assert_eq!(SeqBit::from_wire(2), None);
    }

    #[test]
    fn body_is_bounded_by_header_len() {
        let mut packet = Packet::data(SeqBit::Zero, Bytes::from_static(b"abcdef"));
        packet.header.len = 3;
        assert_eq!(packet.body(), b"abc");
    }

    #[test]
    fn ack_carries_no_payload() {
        let ack = Packet::ack(SeqBit::One);
        assert!(ack.is_empty());
        assert_eq!(ack.header.seq, 1);
    }
}
