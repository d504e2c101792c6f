pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{Fault, FaultInjector, NoFaults, Transport};
pub use packet::{HEADER_LEN, Header, MAX_FRAME, MAX_PAYLOAD, Packet, SeqBit};

pub use config::{ArqConfig, ConfigError, FaultConfig, SimConfig};
pub use scenario::{SimConfigOverride, SourceSpec, TestAction, TestAssertion, TestScenario};
