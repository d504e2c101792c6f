//! Receiving half of the stop-and-wait protocol.

use rdt_abstract::{ArqConfig, FaultInjector, NoFaults, Packet, SeqBit, Transport};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{ArqError, Rejection};
use crate::inject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    AwaitingPacket,
    /// The end-of-stream packet was accepted.
    Done,
}

/// Counters accumulated since the receiver was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveStats {
    /// Data chunks written to the sink.
    pub chunks: u64,
    pub bytes: u64,
    /// Well-formed packets carrying the previous sequence bit.
    pub duplicates: u64,
    /// Frames that failed to parse or verify.
    pub corrupted: u64,
    pub acks_sent: u64,
}

pub struct Receiver<T, F = NoFaults> {
    transport: T,
    injector: F,
    config: ArqConfig,
    expected: SeqBit,
    state: ReceiverState,
    stats: ReceiveStats,
}

impl<T: Transport> Receiver<T> {
    pub fn new(transport: T, config: ArqConfig) -> Self {
        Self::with_injector(transport, NoFaults, config)
    }
}

impl<T: Transport, F: FaultInjector> Receiver<T, F> {
    pub fn with_injector(transport: T, injector: F, config: ArqConfig) -> Self {
        Self {
            transport,
            injector,
            config,
            expected: SeqBit::Zero,
            state: ReceiverState::AwaitingPacket,
            stats: ReceiveStats::default(),
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    pub fn expected(&self) -> SeqBit {
        self.expected
    }

    pub fn into_parts(self) -> (T, F) {
        (self.transport, self.injector)
    }

    /// Accept packets into `sink` until the end-of-stream packet arrives.
    ///
    /// Every frame is answered: the expected bit when it is accepted, the
    /// opposite bit ("resend") when it is corrupt or a duplicate.
    pub async fn receive_loop<W>(&mut self, mut sink: W) -> Result<ReceiveStats, ArqError>
    where
        W: AsyncWrite + Unpin,
    {
        self.state = ReceiverState::AwaitingPacket;
        info!("waiting for packets, expecting seq {}", self.expected);

        loop {
            let datagram = self.transport.recv_datagram().await?;
            let packet = match codec::validate(&datagram, self.expected) {
                Ok(packet) => packet,
                Err(rejection) => {
                    self.record_rejection(&rejection);
                    warn!("rejecting packet: {}", rejection);
                    self.ack(!self.expected).await?;
                    continue;
                }
            };

            info!(
                "good packet seq={} len={}",
                packet.header.seq, packet.header.len
            );
            if !packet.is_empty() {
                sink.write_all(packet.body())
                    .await
                    .map_err(ArqError::Sink)?;
                self.stats.chunks += 1;
                self.stats.bytes += packet.len() as u64;
            }
            self.ack(self.expected).await?;
            self.expected = self.expected.toggled();

            if packet.is_empty() {
                break;
            }
        }

        sink.flush().await.map_err(ArqError::Sink)?;
        self.state = ReceiverState::Done;
        info!(
            "end of stream: {} chunks, {} bytes, {} duplicates, {} corrupted",
            self.stats.chunks, self.stats.bytes, self.stats.duplicates, self.stats.corrupted
        );

        self.linger().await?;
        Ok(self.stats.clone())
    }

    /// Keep re-acknowledging the terminator in case its ack was lost.
    ///
    /// Ends after a quiet linger window or when the link closes. Nothing is
    /// delivered while lingering.
    async fn linger(&mut self) -> Result<(), ArqError> {
        let window = self.config.linger();
        if window.is_zero() {
            return Ok(());
        }
        debug!("lingering for {:?}", window);
        loop {
            let datagram = match timeout(window, self.transport.recv_datagram()).await {
                Err(_) => return Ok(()),
                Ok(Err(e)) => {
                    debug!("link closed while lingering: {}", e);
                    return Ok(());
                }
                Ok(Ok(datagram)) => datagram,
            };
            match codec::validate(&datagram, self.expected) {
                Ok(packet) => debug!(
                    "not accepting seq={} while lingering",
                    packet.header.seq
                ),
                Err(rejection) => {
                    self.record_rejection(&rejection);
                    warn!("lingering: {}", rejection);
                }
            }
            self.ack(!self.expected).await?;
        }
    }

    fn record_rejection(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::SequenceMismatch { .. } => self.stats.duplicates += 1,
            _ => self.stats.corrupted += 1,
        }
    }

    async fn ack(&mut self, seq: SeqBit) -> Result<(), ArqError> {
        debug!("sending ack {}", seq);
        inject::transmit(&mut self.transport, &mut self.injector, Packet::ack(seq)).await?;
        self.stats.acks_sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use bytes::Bytes;
    use std::time::Duration;

    fn frame(seq: SeqBit, payload: &'static [u8]) -> Bytes {
        codec::encode(&codec::seal(Packet::data(seq, Bytes::from_static(payload))))
    }

    fn terminator(seq: SeqBit) -> Bytes {
        codec::encode(&codec::seal(Packet::end_of_stream(seq)))
    }

    async fn expect_ack(peer: &mut MemoryTransport, seq: SeqBit) {
        let datagram = peer.recv_datagram().await.unwrap();
        let ack = codec::validate(&datagram, seq).unwrap();
        assert!(ack.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_in_order_and_skips_duplicates() {
        let (link, mut peer) = MemoryTransport::pair();
        let mut receiver = Receiver::new(link, ArqConfig::default());
        let mut sink = Vec::new();

        let script = async move {
            peer.send_datagram(&frame(SeqBit::Zero, b"first ")).await.unwrap();
            expect_ack(&mut peer, SeqBit::Zero).await;
            // Retransmission after a lost ack.
            peer.send_datagram(&frame(SeqBit::Zero, b"first ")).await.unwrap();
            expect_ack(&mut peer, SeqBit::Zero).await;
            peer.send_datagram(&frame(SeqBit::One, b"second")).await.unwrap();
            expect_ack(&mut peer, SeqBit::One).await;
            peer.send_datagram(&terminator(SeqBit::Zero)).await.unwrap();
            expect_ack(&mut peer, SeqBit::Zero).await;
            peer
        };

        let (stats, _peer) = tokio::join!(receiver.receive_loop(&mut sink), script);
        let stats = stats.unwrap();
        assert_eq!(sink, b"first second");
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.acks_sent, 4);
        assert_eq!(receiver.state(), ReceiverState::Done);
        assert_eq!(receiver.expected(), SeqBit::One);
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_frames_get_negative_ack() {
        let (link, mut peer) = MemoryTransport::pair();
        let mut receiver = Receiver::new(link, ArqConfig::default());
        let mut sink = Vec::new();

        let script = async move {
            let mut corrupted = frame(SeqBit::Zero, b"data").to_vec();
            corrupted[13] ^= 0x04;
            peer.send_datagram(&corrupted).await.unwrap();
            expect_ack(&mut peer, SeqBit::One).await;
            peer.send_datagram(b"short").await.unwrap();
            expect_ack(&mut peer, SeqBit::One).await;
            peer.send_datagram(&frame(SeqBit::Zero, b"data")).await.unwrap();
            expect_ack(&mut peer, SeqBit::Zero).await;
            peer.send_datagram(&frame(SeqBit::One, b"")).await.unwrap();
            expect_ack(&mut peer, SeqBit::One).await;
            peer
        };

        let (stats, _peer) = tokio::join!(receiver.receive_loop(&mut sink), script);
        let stats = stats.unwrap();
        assert_eq!(sink, b"data");
        assert_eq!(stats.corrupted, 2);
        assert_eq!(stats.duplicates, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn linger_reacknowledges_terminator() {
        let (link, mut peer) = MemoryTransport::pair();
        let config = ArqConfig {
            linger_ms: 500,
            ..Default::default()
        };
        let mut receiver = Receiver::new(link, config);
        let mut sink = Vec::new();

        let script = async move {
            peer.send_datagram(&frame(SeqBit::Zero, b"")).await.unwrap();
            expect_ack(&mut peer, SeqBit::Zero).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            peer.send_datagram(&frame(SeqBit::Zero, b"")).await.unwrap();
            expect_ack(&mut peer, SeqBit::Zero).await;
            peer
        };

        let (stats, _peer) = tokio::join!(receiver.receive_loop(&mut sink), script);
        let stats = stats.unwrap();
        assert!(sink.is_empty());
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.acks_sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_is_a_transport_error() {
        let (link, peer) = MemoryTransport::pair();
        drop(peer);
        let mut receiver = Receiver::new(link, ArqConfig::default());
        let err = receiver.receive_loop(tokio::io::sink()).await.unwrap_err();
        assert!(matches!(err, ArqError::Transport(_)));
    }
}
