//! Sending half of the stop-and-wait protocol.
//!
//! One packet is in flight at a time. Each transmission attempt gets exactly
//! one acknowledgment deadline; a timeout and a bad acknowledgment are both
//! failed attempts, and the packet is retransmitted until the retry budget is
//! spent.

use bytes::Bytes;
use rdt_abstract::{ArqConfig, FaultInjector, MAX_PAYLOAD, NoFaults, Packet, SeqBit, Transport};
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::error::{ArqError, Rejection};
use crate::inject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    AwaitingAck { seq: SeqBit, attempt: u32 },
    Acked,
    Failed,
    /// The end-of-stream packet was acknowledged.
    Done,
}

/// Counters accumulated since the sender was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendStats {
    /// Data chunks acknowledged (the terminator is not counted).
    pub chunks: u64,
    pub bytes: u64,
    /// Every attempt, including ones the injector dropped.
    pub transmissions: u64,
    pub timeouts: u64,
    pub bad_acks: u64,
}

pub struct Sender<T, F = NoFaults> {
    transport: T,
    injector: F,
    config: ArqConfig,
    next_seq: SeqBit,
    /// Packets acknowledged so far; identifies the chunk in failure reports.
    acked: u64,
    state: SenderState,
    stats: SendStats,
}

impl<T: Transport> Sender<T> {
    pub fn new(transport: T, config: ArqConfig) -> Self {
        Self::with_injector(transport, NoFaults, config)
    }
}

impl<T: Transport, F: FaultInjector> Sender<T, F> {
    pub fn with_injector(transport: T, injector: F, config: ArqConfig) -> Self {
        Self {
            transport,
            injector,
            config,
            next_seq: SeqBit::Zero,
            acked: 0,
            state: SenderState::Idle,
            stats: SendStats::default(),
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn stats(&self) -> &SendStats {
        &self.stats
    }

    /// Sequence bit the next chunk of [`Sender::send_stream`] will carry.
    pub fn next_seq(&self) -> SeqBit {
        self.next_seq
    }

    pub fn into_parts(self) -> (T, F) {
        (self.transport, self.injector)
    }

    /// Deliver one packet carrying `payload` under sequence bit `seq`.
    ///
    /// Returns once a matching acknowledgment arrives. The caller owns the bit
    /// and toggles it before the next chunk.
    pub async fn send_reliable(&mut self, payload: &[u8], seq: SeqBit) -> Result<(), ArqError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(ArqError::PayloadTooLarge(payload.len()));
        }
        let packet = Packet::data(seq, Bytes::copy_from_slice(payload));
        let budget = self.config.max_retries;

        for attempt in 1..=budget {
            self.state = SenderState::AwaitingAck { seq, attempt };
            debug!(
                "sending chunk {} seq={} len={} (attempt {}/{})",
                self.acked,
                seq,
                payload.len(),
                attempt,
                budget
            );
            self.stats.transmissions += 1;
            inject::transmit(&mut self.transport, &mut self.injector, packet.clone()).await?;

            match self.await_ack(seq).await? {
                Ok(()) => {
                    info!("good ack for chunk {} seq={}", self.acked, seq);
                    self.acked += 1;
                    self.state = SenderState::Acked;
                    return Ok(());
                }
                Err(rejection) => {
                    match rejection {
                        Rejection::AckTimeout(_) => self.stats.timeouts += 1,
                        _ => self.stats.bad_acks += 1,
                    }
                    warn!(
                        "chunk {} seq={} attempt {}/{}: {}",
                        self.acked, seq, attempt, budget, rejection
                    );
                }
            }
        }

        self.state = SenderState::Failed;
        error!(
            "giving up on chunk {} seq={} after {} attempts",
            self.acked, seq, budget
        );
        Err(ArqError::TransferFailed {
            chunk: self.acked,
            seq,
            attempts: budget,
        })
    }

    /// Wait out one attempt's deadline for an acknowledgment of `seq`.
    async fn await_ack(&mut self, seq: SeqBit) -> Result<Result<(), Rejection>, ArqError> {
        let wait = self.config.ack_timeout();
        let deadline = Instant::now() + wait;
        match timeout_at(deadline, self.transport.recv_datagram()).await {
            Err(_) => Ok(Err(Rejection::AckTimeout(wait))),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                // Nobody listening yet; the attempt still costs a full deadline.
                debug!("peer refused datagram: {}", e);
                sleep_until(deadline).await;
                Ok(Err(Rejection::AckTimeout(wait)))
            }
            Ok(Err(e)) => Err(ArqError::Transport(e)),
            Ok(Ok(datagram)) => {
                let verdict = codec::validate(&datagram, seq).map(|ack| {
                    debug!(
                        "[PACKET] ack seq={} len={} checksum={}",
                        ack.header.seq, ack.header.len, ack.header.checksum
                    );
                });
                Ok(verdict)
            }
        }
    }

    /// Stream `source` to the peer in chunks of up to [`MAX_PAYLOAD`] bytes,
    /// then send the zero-length terminator.
    pub async fn send_stream<R>(&mut self, mut source: R) -> Result<SendStats, ArqError>
    where
        R: AsyncRead + Unpin,
    {
        info!("sending stream starting at seq {}", self.next_seq);
        let mut buf = vec![0u8; MAX_PAYLOAD];
        loop {
            let n = read_chunk(&mut source, &mut buf)
                .await
                .map_err(ArqError::Source)?;
            if n == 0 {
                break;
            }
            self.send_reliable(&buf[..n], self.next_seq).await?;
            self.next_seq = self.next_seq.toggled();
            self.stats.chunks += 1;
            self.stats.bytes += n as u64;
        }

        self.send_reliable(&[], self.next_seq).await?;
        self.next_seq = self.next_seq.toggled();
        self.state = SenderState::Done;
        info!(
            "stream delivered: {} chunks, {} bytes, {} transmissions",
            self.stats.chunks, self.stats.bytes, self.stats.transmissions
        );
        Ok(self.stats.clone())
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
async fn read_chunk<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
