use anyhow::{Context, Result, bail};
use rdt_abstract::{SimConfig, TestAction, TestAssertion, TestScenario};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse scenario {}", path.display()))
}

/// Load, run and check a scenario file.
pub fn run_scenario(path: &Path) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_loaded(&scenario)
}

pub fn run_loaded(scenario: &TestScenario) -> Result<SimulationReport> {
    info!("Running scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("{}", scenario.description);
    }

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config);
    configure_actions(&mut sim, &scenario.actions);

    let source = scenario.source.bytes();
    let report = sim.run_blocking(&source)?;
    check_assertions(&report, &scenario.assertions)
        .with_context(|| format!("scenario '{}' failed", scenario.name))?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(report)
}

fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::FaultDataAttempt { attempt, fault } => sim.add_data_fault(*attempt, *fault),
            TestAction::FaultAck { ack, fault } => sim.add_ack_fault(*ack, *fault),
        }
    }
}

pub fn check_assertions(report: &SimulationReport, assertions: &[TestAssertion]) -> Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DeliveredIntact => {
                if !report.intact {
                    bail!(
                        "delivery not intact: {} of {} bytes, failure: {}",
                        report.delivered_len,
                        report.source_len,
                        report.failure.as_deref().unwrap_or("none")
                    );
                }
            }
            TestAssertion::TransferFails => {
                if !report.transfer_failed {
                    match &report.failure {
                        Some(reason) => bail!(
                            "expected the sender to give up, but the run failed otherwise: {reason}"
                        ),
                        None => bail!("expected the transfer to fail, but it completed"),
                    }
                }
            }
            TestAssertion::SenderTransmissions { min, max } => {
                check_range("sender transmissions", report.sender.transmissions, *min, *max)?;
            }
            TestAssertion::ReceiverDuplicates { min, max } => {
                check_range("receiver duplicates", report.receiver.duplicates, *min, *max)?;
            }
            TestAssertion::MaxDuration { ms } => {
                if report.duration_ms > *ms {
                    bail!("run took {}ms, limit {}ms", report.duration_ms, ms);
                }
            }
        }
    }
    Ok(())
}

fn check_range(what: &str, value: u64, min: u64, max: Option<u64>) -> Result<()> {
    if value < min {
        bail!("{what}: expected at least {min}, got {value}");
    }
    if let Some(max) = max {
        if value > max {
            bail!("{what}: expected at most {max}, got {value}");
        }
    }
    Ok(())
}
