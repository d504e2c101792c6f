use rdt_abstract::{Fault, FaultConfig, SimConfig};
use rdt_core::{MemoryTransport, RandomFaults, Receiver, Sender};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::faults::{ScriptedFaults, Traced};
use crate::trace::SimulationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

type LinkFaults = Traced<ScriptedFaults<RandomFaults>>;

/// Runs one sender against one receiver over an in-memory link.
///
/// Time is tokio's clock; under a paused runtime every timeout resolves
/// instantly, so a run with hundreds of retransmissions takes microseconds.
pub struct Simulator {
    config: SimConfig,
    data_script: BTreeMap<u64, Fault>,
    ack_script: BTreeMap<u64, Fault>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            data_script: BTreeMap::new(),
            ack_script: BTreeMap::new(),
        }
    }

    /// Force `fault` on the n-th (0-based) data transmission attempt.
    pub fn add_data_fault(&mut self, attempt: u64, fault: Fault) {
        self.data_script.insert(attempt, fault);
    }

    /// Force `fault` on the n-th (0-based) acknowledgment sent.
    pub fn add_ack_fault(&mut self, ack: u64, fault: Fault) {
        self.ack_script.insert(ack, fault);
    }

    fn link_faults(
        &self,
        node: NodeId,
        started: Instant,
        script: &BTreeMap<u64, Fault>,
        faults: &FaultConfig,
        seed: u64,
    ) -> LinkFaults {
        let mut scripted = ScriptedFaults::with_fallback(RandomFaults::new(faults.clone(), seed));
        for (&attempt, &fault) in script {
            scripted.insert(attempt, fault);
        }
        Traced::new(node, started, scripted)
    }

    /// Stream `source` through the link and report what arrived.
    pub async fn run(&self, source: &[u8]) -> SimulationReport {
        let started = Instant::now();
        info!(
            "simulating {} bytes (seed {}, timeout {}ms, {} attempts)",
            source.len(),
            self.config.seed,
            self.config.arq.ack_timeout_ms,
            self.config.arq.max_retries
        );

        let (sender_link, receiver_link) = MemoryTransport::pair();
        let data_faults = self.link_faults(
            NodeId::Sender,
            started,
            &self.data_script,
            &self.config.data_faults,
            self.config.seed,
        );
        let ack_faults = self.link_faults(
            NodeId::Receiver,
            started,
            &self.ack_script,
            &self.config.ack_faults,
            self.config.seed.wrapping_add(1),
        );

        let mut sender = Sender::with_injector(sender_link, data_faults, self.config.arq.clone());
        let mut receiver =
            Receiver::with_injector(receiver_link, ack_faults, self.config.arq.clone());
        let mut sink = Vec::new();

        // The sender's end of the link is dropped as soon as it finishes, which
        // is what lets a still-waiting receiver notice the flow is over.
        let send = async move {
            let result = sender.send_stream(source).await;
            let stats = sender.stats().clone();
            let (_link, faults) = sender.into_parts();
            (result, stats, faults.into_events())
        };
        let ((send_result, sender_stats, mut link_events), recv_result) =
            tokio::join!(send, receiver.receive_loop(&mut sink));

        let receiver_stats = receiver.stats().clone();
        link_events.extend(receiver.into_parts().1.into_events());
        link_events.sort_by_key(|e| e.time);

        let transfer_failed = send_result
            .as_ref()
            .is_err_and(|e| e.is_transfer_failed());
        let failure = match (send_result, recv_result) {
            (Err(e), _) => Some(format!("sender: {e}")),
            (Ok(_), Err(e)) => Some(format!("receiver: {e}")),
            (Ok(_), Ok(_)) => None,
        };
        let intact = failure.is_none() && sink == source;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &failure {
            Some(reason) => warn!("simulation failed after {}ms: {}", duration_ms, reason),
            None => info!(
                "simulation finished after {}ms: {} of {} bytes delivered, {} transmissions",
                duration_ms,
                sink.len(),
                source.len(),
                sender_stats.transmissions
            ),
        }

        SimulationReport {
            config: self.config.clone(),
            duration_ms,
            source_len: source.len(),
            delivered_len: sink.len(),
            intact,
            failure,
            transfer_failed,
            sender: sender_stats,
            receiver: receiver_stats,
            link_events,
            delivered_data: sink,
        }
    }

    /// [`Simulator::run`] on a fresh paused runtime, for synchronous callers.
    pub fn run_blocking(&self, source: &[u8]) -> std::io::Result<SimulationReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()?;
        Ok(runtime.block_on(self.run(source)))
    }
}
