//! Shared plumbing for the `rdt-send` and `rdt-recv` binaries.

use anyhow::{Context, Result, ensure};
use clap::Args;
use rdt_abstract::{ArqConfig, FaultConfig, FaultInjector, NoFaults};
use rdt_core::RandomFaults;
use std::path::Path;
use tracing::{Level, info};

pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

/// File (if given), defaults, then `RDT_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ArqConfig> {
    let config = ArqConfig::load(path).context("failed to load configuration")?;
    info!(
        "ack timeout {}ms, {} attempts per packet, linger {}ms",
        config.ack_timeout_ms, config.max_retries, config.linger_ms
    );
    Ok(config)
}

/// Which packets the local injector gets to damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Data,
    Acks,
}

/// Simulated link faults applied to packets this process sends.
#[derive(Args, Debug, Clone, Default)]
pub struct FaultArgs {
    /// Probability of silently dropping an outgoing packet.
    #[arg(long, default_value_t = 0.0)]
    pub drop_rate: f64,

    /// Probability of sending a packet with a checksum that cannot verify.
    #[arg(long, default_value_t = 0.0)]
    pub corrupt_checksum_rate: f64,

    /// Probability of flipping the sequence bit of an outgoing packet.
    #[arg(long, default_value_t = 0.0)]
    pub corrupt_sequence_rate: f64,

    /// Use the classic lossy profile for this direction instead of the rates above.
    #[arg(long, default_value_t = false)]
    pub reference_faults: bool,

    /// Seed for the fault RNG; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl FaultArgs {
    pub fn fault_config(&self, direction: Direction) -> Result<FaultConfig> {
        if self.reference_faults {
            return Ok(match direction {
                Direction::Data => FaultConfig::reference(),
                Direction::Acks => FaultConfig::reference_acks(),
            });
        }
        for (flag, rate) in [
            ("--drop-rate", self.drop_rate),
            ("--corrupt-checksum-rate", self.corrupt_checksum_rate),
            ("--corrupt-sequence-rate", self.corrupt_sequence_rate),
        ] {
            ensure!(
                (0.0..=1.0).contains(&rate),
                "{flag} must be between 0 and 1, got {rate}"
            );
        }
        Ok(FaultConfig {
            drop_rate: self.drop_rate,
            corrupt_checksum_rate: self.corrupt_checksum_rate,
            corrupt_sequence_rate: self.corrupt_sequence_rate,
        })
    }

    pub fn injector(&self, direction: Direction) -> Result<Box<dyn FaultInjector + Send>> {
        let config = self.fault_config(direction)?;
        if config.is_clean() {
            return Ok(Box::new(NoFaults));
        }
        let seed = self.seed.unwrap_or_else(rand::random);
        info!(
            "[SIMULATE] drop {:.2}, corrupt checksum {:.2}, corrupt seq {:.2} (seed {})",
            config.drop_rate, config.corrupt_checksum_rate, config.corrupt_sequence_rate, seed
        );
        Ok(Box::new(RandomFaults::new(config, seed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        faults: FaultArgs,
    }

    fn parse(args: &[&str]) -> FaultArgs {
        Cli::parse_from(std::iter::once("rdt").chain(args.iter().copied())).faults
    }

    #[test]
    fn no_flags_means_a_clean_link() {
        let config = parse(&[]).fault_config(Direction::Data).unwrap();
        assert!(config.is_clean());
    }

    #[test]
    fn reference_profile_depends_on_direction() {
        let args = parse(&["--reference-faults", "--drop-rate", "0.9"]);
        assert_eq!(args.fault_config(Direction::Data).unwrap(), FaultConfig::reference());
        assert_eq!(
            args.fault_config(Direction::Acks).unwrap(),
            FaultConfig::drops(0.2)
        );
    }

    #[test]
    fn explicit_rates_are_used() {
        let args = parse(&["--drop-rate", "0.25", "--corrupt-sequence-rate", "0.5", "--seed", "4"]);
        let config = args.fault_config(Direction::Acks).unwrap();
        assert_eq!(config.drop_rate, 0.25);
        assert_eq!(config.corrupt_checksum_rate, 0.0);
        assert_eq!(config.corrupt_sequence_rate, 0.5);
        assert_eq!(args.seed, Some(4));
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let err = parse(&["--corrupt-checksum-rate", "1.5"])
            .fault_config(Direction::Data)
            .unwrap_err();
        assert!(err.to_string().contains("--corrupt-checksum-rate"));
    }
}
