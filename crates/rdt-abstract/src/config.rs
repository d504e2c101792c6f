use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Protocol timing and retry settings for one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArqConfig {
    /// How long the sender waits for an acknowledgment per attempt.
    pub ack_timeout_ms: u64,
    /// Transmissions of one packet allowed before the transfer is abandoned.
    pub max_retries: u32,
    /// How long a finished receiver keeps re-acknowledging a retransmitted terminator.
    pub linger_ms: u64,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 1000,
            max_retries: 3,
            linger_ms: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid value for {0}: {1:?}")]
    InvalidEnv(&'static str, String),
    #[error("invalid {0}: {1}")]
    Invalid(&'static str, String),
}

impl ArqConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Optional file → defaults, then `RDT_*` env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RDT_*` overrides found through `lookup`.
    pub fn apply_overrides<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, "RDT_ACK_TIMEOUT_MS")? {
            self.ack_timeout_ms = v;
        }
        if let Some(v) = parse_override(&lookup, "RDT_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = parse_override(&lookup, "RDT_LINGER_MS")? {
            self.linger_ms = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries",
                "at least one attempt is required".into(),
            ));
        }
        Ok(())
    }
}

fn parse_override<L, T>(lookup: &L, key: &'static str) -> Result<Option<T>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv(key, raw)),
        None => Ok(None),
    }
}

/// Independent per-attempt fault probabilities for one direction of the link.
///
/// Evaluated in priority order: drop, then checksum corruption, then sequence
/// corruption. The first one that fires is the only one applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub drop_rate: f64,
    pub corrupt_checksum_rate: f64,
    pub corrupt_sequence_rate: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            drop_rate: 0.0,
            corrupt_checksum_rate: 0.0,
            corrupt_sequence_rate: 0.0,
        }
    }
}

impl FaultConfig {
    /// The unreliable link the protocol was originally exercised against.
    pub fn reference() -> Self {
        Self {
            drop_rate: 0.5,
            corrupt_checksum_rate: 0.2,
            corrupt_sequence_rate: 0.2,
        }
    }

    /// Acknowledgment-side counterpart of [`FaultConfig::reference`]: one in
    /// five dropped, never corrupted.
    pub fn reference_acks() -> Self {
        Self::drops(0.2)
    }

    pub fn drops(rate: f64) -> Self {
        Self {
            drop_rate: rate,
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.drop_rate <= 0.0 && self.corrupt_checksum_rate <= 0.0 && self.corrupt_sequence_rate <= 0.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub arq: ArqConfig,
    /// Faults applied to data packets leaving the sender.
    pub data_faults: FaultConfig,
    /// Faults applied to acknowledgments leaving the receiver.
    pub ack_faults: FaultConfig,
    pub seed: u64,
}
