use crate::config::{FaultConfig, SimConfig};
use crate::interface::Fault;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    pub source: SourceSpec,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub ack_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub linger_ms: Option<u64>,
    pub data_faults: Option<FaultConfig>,
    pub ack_faults: Option<FaultConfig>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.ack_timeout_ms {
            config.arq.ack_timeout_ms = v;
        }
        if let Some(v) = self.max_retries {
            config.arq.max_retries = v;
        }
        if let Some(v) = self.linger_ms {
            config.arq.linger_ms = v;
        }
        if let Some(v) = &self.data_faults {
            config.data_faults = v.clone();
        }
        if let Some(v) = &self.ack_faults {
            config.ack_faults = v.clone();
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

/// Bytes the simulated sender streams.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    Text { text: String },
    /// `len` bytes of a repeating non-trivial pattern.
    Pattern { len: usize },
}

impl SourceSpec {
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            SourceSpec::Text { text } => text.as_bytes().to_vec(),
            SourceSpec::Pattern { len } => (0..*len).map(|i| (i % 251) as u8).collect(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Force a fault on the n-th (0-based) data transmission attempt.
    FaultDataAttempt { attempt: u64, fault: Fault },
    /// Force a fault on the n-th (0-based) acknowledgment the receiver sends.
    FaultAck { ack: u64, fault: Fault },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// The sink holds exactly the source bytes.
    DeliveredIntact,
    /// The sender gave up with a transfer failure.
    TransferFails,
    /// Total data transmissions (including retransmissions) are within range.
    SenderTransmissions { min: u64, max: Option<u64> },
    /// Duplicates recognised by the receiver are within range.
    ReceiverDuplicates { min: u64, max: Option<u64> },
    /// The run finishes within this much virtual time.
    MaxDuration { ms: u64 },
}
