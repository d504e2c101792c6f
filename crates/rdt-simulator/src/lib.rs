pub mod engine;
pub mod faults;
pub mod scenario_runner;
pub mod trace;

pub use engine::{NodeId, Simulator};
pub use faults::{ScriptedFaults, Traced};
pub use trace::{LinkEventSummary, SimulationReport};
