pub mod agent_loop;

pub use agent_loop::{CycleOutcome, CycleState, Orchestrator, OrchestratorConfig};
