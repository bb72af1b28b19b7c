//! Cadence execution engine: accepts a resolved interchange bundle and
//! runs it as a transition system.
//!
//! The engine consumes interchange JSON (not surface syntax), lowers one
//! module into an evaluation-ready [`Program`], then generates random
//! traces, checks invariants and temporal properties over them, and
//! executes the module's declared runs as tests.

pub mod action;
pub mod choice;
pub mod config;
pub mod env;
pub mod expr;
pub mod itf;
pub mod ops;
pub mod property;
pub mod simulator;
pub mod state;
pub mod types;

pub use action::{ActionOutcome, Executor, Successors};
pub use choice::{ChoiceSource, ScriptedChoices, SeededChoices};
pub use config::SimConfig;
pub use env::Env;
pub use expr::Evaluator;
pub use property::{PropertyResult, TemporalVerdict};
pub use simulator::{
    FailureCause, RunFailure, RunReport, SimulationOutcome, SimulationReport, Simulator,
    TemporalSummary, Termination, TestOutcome, TestReport,
};
pub use state::{State, Trace, TraceEntry};
pub use types::{EvalError, EvalResult, Program, ProgramError, Value};

/// Load the module selected by `config` with its constant overrides applied.
///
/// # Arguments
/// * `bundle` - Interchange JSON bundle (serde_json::Value)
/// * `config` - Supplies the module name and constant overrides
///
/// # Returns
/// * The lowered `Program`, or a `ProgramError` describing why the bundle
///   cannot be run
pub fn load(bundle: &serde_json::Value, config: &SimConfig) -> Result<Program, ProgramError> {
    let overrides = config.constant_values()?;
    Program::from_interchange_with(bundle, config.module.as_deref(), &overrides)
}

/// Load a bundle and simulate it.
///
/// Runs the whole pipeline:
/// 1. Deserialize and lower the selected module
/// 2. Resolve constants, applying overrides from `config`
/// 3. Generate `max_samples` traces, checking invariants as each grows
/// 4. Evaluate temporal properties when `config.temporal` is set
///
/// # Arguments
/// * `bundle` - Interchange JSON bundle
/// * `config` - Simulation settings
///
/// # Returns
/// * `SimulationReport` with the first violation or failure found, if any
pub fn simulate(
    bundle: &serde_json::Value,
    config: &SimConfig,
) -> Result<SimulationReport, ProgramError> {
    let program = load(bundle, config)?;
    Simulator::new(&program).simulate(config)
}

/// Load a bundle and execute its declared runs.
///
/// # Arguments
/// * `bundle` - Interchange JSON bundle
/// * `config` - Seed and sample count for each run
/// * `filter` - Only runs whose name contains this substring
///
/// # Returns
/// * One `TestReport` per selected run, in declaration order
pub fn run_tests(
    bundle: &serde_json::Value,
    config: &SimConfig,
    filter: Option<&str>,
) -> Result<Vec<TestReport>, ProgramError> {
    let program = load(bundle, config)?;
    let sim = Simulator::new(&program);
    program
        .runs
        .iter()
        .filter(|def| filter.map_or(true, |f| def.name.contains(f)))
        .map(|def| sim.run_test(&def.name, config))
        .collect()
}
