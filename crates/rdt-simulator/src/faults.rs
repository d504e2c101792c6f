use rdt_abstract::{Fault, FaultInjector, NoFaults, Packet};
use std::collections::BTreeMap;
use tokio::time::Instant;

use crate::engine::NodeId;
use crate::trace::LinkEventSummary;

/// Deterministic faults on chosen attempts (0-based, counted per injector).
/// Unscripted attempts are left to the fallback injector.
pub struct ScriptedFaults<F = NoFaults> {
    script: BTreeMap<u64, Fault>,
    fallback: F,
    attempts: u64,
}

impl ScriptedFaults {
    pub fn new() -> Self {
        Self::with_fallback(NoFaults)
    }
}

impl Default for ScriptedFaults {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> ScriptedFaults<F> {
    pub fn with_fallback(fallback: F) -> Self {
        Self {
            script: BTreeMap::new(),
            fallback,
            attempts: 0,
        }
    }

    pub fn at(mut self, attempt: u64, fault: Fault) -> Self {
        self.insert(attempt, fault);
        self
    }

    pub fn insert(&mut self, attempt: u64, fault: Fault) {
        self.script.insert(attempt, fault);
    }

    /// Attempts seen so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl<F: FaultInjector> FaultInjector for ScriptedFaults<F> {
    fn decide(&mut self, packet: &Packet) -> Fault {
        let attempt = self.attempts;
        self.attempts += 1;
        match self.script.remove(&attempt) {
            Some(fault) => fault,
            None => self.fallback.decide(packet),
        }
    }
}

/// Records every decision of the wrapped injector as a link event.
pub struct Traced<F> {
    inner: F,
    from: NodeId,
    started: Instant,
    events: Vec<LinkEventSummary>,
}

impl<F> Traced<F> {
    pub fn new(from: NodeId, started: Instant, inner: F) -> Self {
        Self {
            inner,
            from,
            started,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[LinkEventSummary] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LinkEventSummary> {
        self.events
    }
}

impl<F: FaultInjector> FaultInjector for Traced<F> {
    fn decide(&mut self, packet: &Packet) -> Fault {
        let fault = self.inner.decide(packet);
        let verdict = match fault {
            Fault::Pass => "SEND",
            Fault::Drop => "DROP",
            Fault::CorruptChecksum => "CORRUPT checksum",
            Fault::CorruptSequence => "CORRUPT seq",
        };
        self.events.push(LinkEventSummary {
            time: self.started.elapsed().as_millis() as u64,
            from: self.from,
            fault,
            description: format!(
                "[{:?}->{:?}] {} seq={} len={}",
                self.from,
                self.from.peer(),
                verdict,
                packet.header.seq,
                packet.header.len
            ),
        });
        fault
    }
}
