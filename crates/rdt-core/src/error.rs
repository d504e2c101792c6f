use rdt_abstract::{MAX_PAYLOAD, SeqBit};
use std::time::Duration;

use crate::codec::DecodeError;

/// Why an incoming frame or an acknowledgment wait did not count.
///
/// These are recovered inside the state machines (negative ack or
/// retransmission) and only ever surface in logs and statistics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("bad checksum, expected {expected} received {received}")]
    ChecksumMismatch { expected: u32, received: u32 },

    #[error("bad sequence bit, expected {expected} received {received}")]
    SequenceMismatch { expected: SeqBit, received: u32 },

    #[error("malformed frame: {0}")]
    Malformed(#[from] DecodeError),

    #[error("no acknowledgment within {0:?}")]
    AckTimeout(Duration),
}

/// Conditions that end a transfer.
#[derive(Debug, thiserror::Error)]
pub enum ArqError {
    #[error("chunk {chunk} (seq {seq}) was not acknowledged after {attempts} attempts")]
    TransferFailed {
        chunk: u64,
        seq: SeqBit,
        attempts: u32,
    },

    #[error("payload of {0} bytes exceeds maximum {max}", max = MAX_PAYLOAD)]
    PayloadTooLarge(usize),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("failed to read source: {0}")]
    Source(#[source] std::io::Error),

    #[error("failed to write sink: {0}")]
    Sink(#[source] std::io::Error),
}

impl ArqError {
    pub fn is_transfer_failed(&self) -> bool {
        matches!(self, ArqError::TransferFailed { .. })
    }
}
