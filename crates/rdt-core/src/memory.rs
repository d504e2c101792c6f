use bytes::Bytes;
use rdt_abstract::Transport;
use std::io;
use tokio::sync::mpsc;

/// One end of an in-process datagram link.
///
/// Delivery is lossless and ordered; faults come from the injector. Sending
/// to an end that has been dropped discards the datagram like a datagram
/// socket would.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }
}

impl Transport for MemoryTransport {
    async fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()> {
        let _ = self.tx.send(Bytes::copy_from_slice(datagram));
        Ok(())
    }

    async fn recv_datagram(&mut self) -> io::Result<Bytes> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionAborted, "peer closed the link"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn datagrams_cross_the_link() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.send_datagram(b"ping").await.unwrap();
        assert_eq!(&b.recv_datagram().await.unwrap()[..], b"ping");
        b.send_datagram(b"pong").await.unwrap();
        assert_eq!(&a.recv_datagram().await.unwrap()[..], b"pong");
    }

    #[tokio::test]
    async fn dropped_peer_swallows_sends_and_closes_receives() {
        let (mut a, b) = MemoryTransport::pair();
        drop(b);
        assert!(a.send_datagram(b"lost").await.is_ok());
        let err = a.recv_datagram().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }
}
