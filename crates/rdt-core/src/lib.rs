pub mod codec;
pub mod error;
pub mod inject;
pub mod memory;
pub mod receiver;
pub mod sender;
pub mod udp;

pub use codec::DecodeError;
pub use error::{ArqError, Rejection};
pub use inject::RandomFaults;
pub use memory::MemoryTransport;
pub use receiver::{ReceiveStats, Receiver, ReceiverState};
pub use sender::{SendStats, Sender, SenderState};
pub use udp::UdpTransport;

pub use rdt_abstract::{
    ArqConfig, Fault, FaultConfig, FaultInjector, MAX_PAYLOAD, NoFaults, Packet, SeqBit, Transport,
};
