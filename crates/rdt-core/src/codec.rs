//! Wire framing and integrity check.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Sequence bit                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Payload length                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            Checksum                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (length bytes) ...                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All fields are big-endian. The checksum is a plain XOR fold: it catches an
//! odd number of flips at any bit position but misses two flips at the same
//! position in different bytes. It guards against noise, not adversaries.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rdt_abstract::{HEADER_LEN, Header, MAX_PAYLOAD, Packet, SeqBit};

use crate::error::Rejection;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame of {got} bytes is shorter than the {need} bytes it needs")]
    Truncated { need: usize, got: usize },

    #[error("payload length {0} exceeds maximum {max}", max = MAX_PAYLOAD)]
    PayloadTooLarge(u32),
}

/// XOR fold over the header with the checksum zeroed plus the first `len`
/// payload bytes. Bytes past `len` never contribute.
pub fn checksum(packet: &Packet) -> u32 {
    let header = &packet.header;
    let folded = header
        .seq
        .to_be_bytes()
        .into_iter()
        .chain(header.len.to_be_bytes())
        .chain(0u32.to_be_bytes())
        .chain(packet.body().iter().copied())
        .fold(0u8, |acc, b| acc ^ b);
    u32::from(folded)
}

/// Fill in the checksum for a packet about to be transmitted.
pub fn seal(mut packet: Packet) -> Packet {
    packet.header.checksum = checksum(&packet);
    packet
}

pub fn verify(packet: &Packet) -> Result<(), Rejection> {
    let expected = checksum(packet);
    if expected == packet.header.checksum {
        Ok(())
    } else {
        Err(Rejection::ChecksumMismatch {
            expected,
            received: packet.header.checksum,
        })
    }
}

pub fn encode(packet: &Packet) -> Bytes {
    let body = packet.body();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u32(packet.header.seq);
    buf.put_u32(packet.header.len);
    buf.put_u32(packet.header.checksum);
    buf.put_slice(body);
    buf.freeze()
}

/// Parse a frame. Bytes after the declared payload are ignored so peers that
/// always send a full-capacity frame are understood.
pub fn decode(mut buf: &[u8]) -> Result<Packet, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            need: HEADER_LEN,
            got: buf.len(),
        });
    }
    let got = buf.len();
    let seq = buf.get_u32();
    let len = buf.get_u32();
    let checksum = buf.get_u32();

    if len as usize > MAX_PAYLOAD {
        return Err(DecodeError::PayloadTooLarge(len));
    }
    if buf.len() < len as usize {
        return Err(DecodeError::Truncated {
            need: HEADER_LEN + len as usize,
            got,
        });
    }

    let payload = Bytes::copy_from_slice(&buf[..len as usize]);
    Ok(Packet::new(Header { seq, len, checksum }, payload))
}

/// Decode and check a frame against the sequence bit the caller expects.
///
/// Checks run in order: framing, checksum, sequence bit.
pub fn validate(datagram: &[u8], expected: SeqBit) -> Result<Packet, Rejection> {
    let packet = decode(datagram)?;
    verify(&packet)?;
    if packet.header.seq != expected.as_u32() {
        return Err(Rejection::SequenceMismatch {
            expected,
            received: packet.header.seq,
        });
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(seq: SeqBit, payload: &'static [u8]) -> Packet {
        seal(Packet::data(seq, Bytes::from_static(payload)))
    }

    #[test]
    fn encode_decode_roundtrip() {
        let packet = data(SeqBit::One, b"hello, link");
        let decoded = decode(&encode(&packet)).unwrap();
        assert_eq!(decoded, packet);
        assert!(verify(&decoded).is_ok());
    }

    #[test]
    fn full_capacity_roundtrip() {
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| (i * 7) as u8).collect();
        let packet = seal(Packet::data(SeqBit::Zero, Bytes::from(payload)));
        let bytes = encode(&packet);
        assert_eq!(bytes.len(), HEADER_LEN + MAX_PAYLOAD);
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn header_is_big_endian() {
        let bytes = encode(&data(SeqBit::One, b"ab"));
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 2]);
    }

    #[test]
    fn checksum_is_deterministic() {
        let packet = data(SeqBit::Zero, b"same input");
        assert_eq!(checksum(&packet), checksum(&packet.clone()));
    }

    #[test]
    fn checksum_ignores_stored_checksum_field() {
        let mut packet = data(SeqBit::Zero, b"abc");
        let sum = checksum(&packet);
        packet.header.checksum = 0xdead_beef;
        assert_eq!(checksum(&packet), sum);
    }

    #[test]
    fn ack_checksum_covers_header_only() {
        let ack = seal(Packet::ack(SeqBit::One));
        // Only the low byte of seq is non-zero.
        assert_eq!(ack.header.checksum, 1);
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let packet = data(SeqBit::One, b"integrity");
        let frame = encode(&packet);
        for byte in 0..frame.len() {
            // The checksum field itself is outside the covered range.
            if (8..12).contains(&byte) {
                continue;
            }
            for bit in 0..8 {
                let mut corrupted = frame.to_vec();
                corrupted[byte] ^= 1 << bit;
                let outcome = decode(&corrupted).map(|p| verify(&p).is_ok());
                assert_ne!(outcome, Ok(true), "flip at byte {byte} bit {bit} went unnoticed");
            }
        }
    }

    #[test]
    fn paired_flips_at_same_position_cancel_out() {
        let frame = encode(&data(SeqBit::Zero, b"xyzw"));
        let mut corrupted = frame.to_vec();
        corrupted[HEADER_LEN] ^= 0x10;
        corrupted[HEADER_LEN + 2] ^= 0x10;
        let packet = decode(&corrupted).unwrap();
        assert!(verify(&packet).is_ok());
        assert_ne!(packet.body(), b"xyzw");
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let packet = data(SeqBit::Zero, b"short");
        let mut frame = encode(&packet).to_vec();
        frame.resize(rdt_abstract::MAX_FRAME, 0xAA);
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.body(), b"short");
        assert!(verify(&decoded).is_ok());
    }

    #[test]
    fn short_header_is_rejected() {
        assert_eq!(
            decode(&[0u8; HEADER_LEN - 1]),
            Err(DecodeError::Truncated {
                need: HEADER_LEN,
                got: HEADER_LEN - 1
            })
        );
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut frame = encode(&data(SeqBit::Zero, b"data")).to_vec();
        frame.pop();
        assert!(matches!(decode(&frame), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut frame = encode(&data(SeqBit::Zero, b"")).to_vec();
        frame[4..8].copy_from_slice(&(MAX_PAYLOAD as u32 + 1).to_be_bytes());
        assert_eq!(
            decode(&frame),
            Err(DecodeError::PayloadTooLarge(MAX_PAYLOAD as u32 + 1))
        );
    }

    #[test]
    fn validate_orders_checks() {
        let good = encode(&data(SeqBit::One, b"payload"));
        assert!(validate(&good, SeqBit::One).is_ok());
        assert!(matches!(
            validate(&good, SeqBit::Zero),
            Err(Rejection::SequenceMismatch { expected: SeqBit::Zero, received: 1 })
        ));

        let mut bad = good.to_vec();
        bad[HEADER_LEN] ^= 0x01;
        assert!(matches!(
            validate(&bad, SeqBit::Zero),
            Err(Rejection::ChecksumMismatch { .. })
        ));
        assert!(matches!(
            validate(&bad[..3], SeqBit::One),
            Err(Rejection::Malformed(_))
        ));
    }
}
