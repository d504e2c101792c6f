use rdt_abstract::{Fault, SimConfig};
use rdt_core::{ReceiveStats, SendStats};
use serde::Serialize;

use crate::engine::NodeId;

/// A compact textual summary of one packet leaving a node.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    /// Virtual milliseconds since the run started.
    pub time: u64,
    pub from: NodeId,
    pub fault: Fault,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub source_len: usize,
    pub delivered_len: usize,
    /// The transfer completed and the sink matches the source byte for byte.
    pub intact: bool,
    pub failure: Option<String>,
    /// The sender exhausted its retry budget on some packet.
    pub transfer_failed: bool,
    pub sender: SendStats,
    pub receiver: ReceiveStats,
    pub link_events: Vec<LinkEventSummary>,
    #[serde(skip)]
    pub delivered_data: Vec<u8>,
}

impl SimulationReport {
    pub fn faults_from(&self, node: NodeId, fault: Fault) -> usize {
        self.link_events
            .iter()
            .filter(|e| e.from == node && e.fault == fault)
            .count()
    }
}
