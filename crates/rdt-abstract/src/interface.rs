use crate::packet::Packet;
use bytes::Bytes;
use std::future::Future;
use std::io;

/// The unreliable datagram service a flow runs over.
///
/// Each value is one flow's connection: it knows where its datagrams go, so
/// the protocol never deals with addresses.
pub trait Transport {
    /// Best-effort send of one datagram. Loss is not an error.
    fn send_datagram(&mut self, datagram: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Wait for the next datagram with no deadline.
    ///
    /// Must be cancel-safe: the sender races it against a timer and drops it
    /// when the timer wins.
    fn recv_datagram(&mut self) -> impl Future<Output = io::Result<Bytes>> + Send;
}

/// What happens to one outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Sent untouched.
    Pass,
    /// Never reaches the transport.
    Drop,
    /// Sent with a checksum that cannot verify.
    CorruptChecksum,
    /// Sent with the other sequence bit under the original checksum.
    CorruptSequence,
}

/// Decides, per send attempt, whether the link misbehaves.
pub trait FaultInjector {
    fn decide(&mut self, packet: &Packet) -> Fault;
}

/// Pass-through injector for real transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn decide(&mut self, _packet: &Packet) -> Fault {
        Fault::Pass
    }
}

impl<F: FaultInjector + ?Sized> FaultInjector for Box<F> {
    fn decide(&mut self, packet: &Packet) -> Fault {
        (**self).decide(packet)
    }
}
