//! Trace generation, run combinators and multi-sample simulation.
//!
//! A run starts from `init` evaluated against the empty state and repeatedly
//! applies the module's `step` action. All nondeterminism goes through a
//! [`SeededChoices`] source, so a run is a pure function of
//! (program, seed, step count). Multi-sample simulation spreads independent
//! samples over the rayon pool and reduces their results by sample index,
//! which keeps reports independent of thread scheduling.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::action::{ActionOutcome, Executor};
use crate::choice::SeededChoices;
use crate::config::SimConfig;
use crate::env::Env;
use crate::property::{check_from, check_temporal, PropertyResult, TemporalVerdict};
use crate::state::{State, Trace};
use crate::types::{Action, EvalError, Invariant, Program, ProgramError, Run, Value};

// ──────────────────────────────────────────────
// Reports
// ──────────────────────────────────────────────

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    /// All requested steps were taken.
    Completed,
    /// The step action was disabled at `step`; the trace ends one state
    /// earlier.
    Deadlocked { step: usize },
    /// A property violation stopped the run after state `index`.
    Interrupted { index: usize },
}

/// A finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub seed: u64,
    pub termination: Termination,
    pub trace: Trace,
}

/// Why a run or test failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureCause {
    #[error("action '{action}' is disabled")]
    Disabled { action: String },
    #[error("expectation does not hold in the last state")]
    ExpectationFailed,
    #[error("run expected to fail succeeded")]
    UnexpectedSuccess,
    #[error(transparent)]
    Error(EvalError),
}

/// A failed run: the failing step, the cause and the trace up to (but
/// excluding) the failing step.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("run failed at step {step}: {cause}")]
pub struct RunFailure {
    pub step: usize,
    pub cause: FailureCause,
    pub trace: Trace,
}

impl RunFailure {
    /// Action names the error propagated through, outermost first.
    pub fn action_path(&self) -> Vec<&str> {
        match &self.cause {
            FailureCause::Error(e) => e.action_path(),
            FailureCause::Disabled { action } => vec![action.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Worst temporal verdict observed across samples.
#[derive(Debug, Clone, Serialize)]
pub struct TemporalSummary {
    pub name: String,
    pub sample: usize,
    pub verdict: TemporalVerdict,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// No sample violated a checked invariant. `trace` is sample 0's trace.
    Ok { trace: Trace, deadlocks: usize },
    Violation {
        sample: usize,
        seed: u64,
        invariant: String,
        index: usize,
        trace: Trace,
    },
    /// An invariant could not be evaluated on some state.
    Inconclusive {
        sample: usize,
        seed: u64,
        invariant: String,
        index: usize,
        error: EvalError,
        trace: Trace,
    },
    RunFailed {
        sample: usize,
        seed: u64,
        failure: RunFailure,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub module: String,
    pub seed: u64,
    pub samples: usize,
    pub max_steps: usize,
    pub invariants: Vec<String>,
    pub outcome: SimulationOutcome,
    pub temporal: Vec<TemporalSummary>,
}

impl SimulationReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, SimulationOutcome::Ok { .. })
            && self
                .temporal
                .iter()
                .all(|t| !matches!(t.verdict, TemporalVerdict::Violated { .. }))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed { trace: Trace },
    Failed {
        sample: usize,
        seed: u64,
        failure: RunFailure,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub name: String,
    pub seed: u64,
    pub samples: usize,
    pub outcome: TestOutcome,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, TestOutcome::Passed { .. })
    }
}

/// Seed of sample `index`. Sample 0 uses the base seed itself, so a
/// reported sample seed replays with a single-sample run.
pub fn sample_seed(base: u64, index: usize) -> u64 {
    if index == 0 {
        base
    } else {
        base ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

// ──────────────────────────────────────────────
// Simulator
// ──────────────────────────────────────────────

/// Per-sample result before reduction.
enum Sample {
    Passed {
        report: RunReport,
        temporal: Vec<TemporalVerdict>,
    },
    Broken {
        invariant: String,
        result: PropertyResult,
        trace: Trace,
    },
    Failed(RunFailure),
}

pub struct Simulator<'p> {
    program: &'p Program,
    exec: Executor<'p>,
}

impl<'p> Simulator<'p> {
    pub fn new(program: &'p Program) -> Self {
        Simulator {
            program,
            exec: Executor::new(program),
        }
    }

    /// Generate one trace of up to `max_steps` steps after `init`.
    pub fn run(&self, max_steps: usize, seed: u64) -> Result<RunReport, RunFailure> {
        let mut choices = SeededChoices::new(seed);
        self.drive(max_steps, seed, &mut choices, &mut |_: &Trace| true)
    }

    /// Build a trace, calling `watch` after every committed state. The run
    /// stops early when `watch` returns false.
    fn drive(
        &self,
        max_steps: usize,
        seed: u64,
        choices: &mut SeededChoices,
        watch: &mut dyn FnMut(&Trace) -> bool,
    ) -> Result<RunReport, RunFailure> {
        let init = self.program.init.as_str();
        let step = self.program.step.as_str();
        let mut trace = Trace::new();

        match self.exec.exec_named(init, vec![], &State::new(), choices) {
            Ok(ActionOutcome::Success(state)) => trace.push(init, state),
            Ok(ActionOutcome::GuardFailed) => {
                return Err(RunFailure {
                    step: 0,
                    cause: FailureCause::Disabled {
                        action: init.to_string(),
                    },
                    trace,
                })
            }
            Err(e) => {
                return Err(RunFailure {
                    step: 0,
                    cause: FailureCause::Error(e),
                    trace,
                })
            }
        }
        if !watch(&trace) {
            return Ok(RunReport {
                seed,
                termination: Termination::Interrupted { index: 0 },
                trace,
            });
        }

        for i in 1..=max_steps {
            let current = match trace.last() {
                Some(s) => s.clone(),
                None => break,
            };
            match self.exec.exec_named(step, vec![], &current, choices) {
                Ok(ActionOutcome::Success(next)) => trace.push(step, next),
                Ok(ActionOutcome::GuardFailed) => {
                    warn!(seed, step = i, "deadlock: step action disabled");
                    return Ok(RunReport {
                        seed,
                        termination: Termination::Deadlocked { step: i },
                        trace,
                    });
                }
                Err(e) => {
                    return Err(RunFailure {
                        step: i,
                        cause: FailureCause::Error(e),
                        trace,
                    })
                }
            }
            if !watch(&trace) {
                return Ok(RunReport {
                    seed,
                    termination: Termination::Interrupted { index: i },
                    trace,
                });
            }
        }
        Ok(RunReport {
            seed,
            termination: Termination::Completed,
            trace,
        })
    }

    /// Resolve invariant names; an empty selection means all of them.
    fn selected_invariants(&self, names: &[String]) -> Result<Vec<&'p Invariant>, ProgramError> {
        if names.is_empty() {
            return Ok(self.program.invariants.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.program
                    .get_invariant(name)
                    .ok_or_else(|| ProgramError::UnknownProperty {
                        kind: "invariant".to_string(),
                        name: name.clone(),
                    })
            })
            .collect()
    }

    fn sample(&self, seed: u64, config: &SimConfig, invariants: &[&Invariant]) -> (Sample, u64) {
        let mut choices = SeededChoices::new(seed);
        let mut broken: Option<(String, PropertyResult)> = None;
        let mut checked = 0;
        let outcome = self.drive(config.max_steps, seed, &mut choices, &mut |trace: &Trace| {
            for inv in invariants {
                let result = check_from(self.program, &inv.pred, trace, checked);
                if result != PropertyResult::Holds {
                    broken = Some((inv.name.clone(), result));
                    return false;
                }
            }
            checked = trace.len();
            true
        });
        let sample = match (outcome, broken) {
            (Err(failure), _) => Sample::Failed(failure),
            (Ok(report), Some((invariant, result))) => Sample::Broken {
                invariant,
                result,
                trace: report.trace,
            },
            (Ok(report), None) => {
                let temporal = if config.temporal {
                    self.program
                        .temporals
                        .iter()
                        .map(|t| check_temporal(self.program, &t.formula, &report.trace))
                        .collect()
                } else {
                    Vec::new()
                };
                Sample::Passed { report, temporal }
            }
        };
        (sample, choices.draws())
    }

    /// Run `config.max_samples` seeded samples, checking the selected
    /// invariants at every state.
    pub fn simulate(&self, config: &SimConfig) -> Result<SimulationReport, ProgramError> {
        let invariants = self.selected_invariants(&config.invariants)?;
        let base = config.resolve_seed();
        let samples = config.max_samples.max(1);
        info!(
            module = %self.program.name,
            seed = base,
            samples,
            max_steps = config.max_steps,
            invariants = invariants.len(),
            "starting simulation"
        );

        let (first, draws) = self.sample(base, config, &invariants);
        let mut results = vec![first];
        if draws == 0 {
            // Without a single nondeterministic decision every sample would
            // repeat sample 0.
            debug!("program is deterministic; skipping remaining samples");
        } else {
            let rest: Vec<Sample> = (1..samples)
                .into_par_iter()
                .map(|i| {
                    let seed = sample_seed(base, i);
                    debug!(sample = i, seed, "running sample");
                    self.sample(seed, config, &invariants).0
                })
                .collect();
            results.extend(rest);
        }
        let ran = results.len();

        let mut temporal: BTreeMap<usize, TemporalSummary> = BTreeMap::new();
        let mut deadlocks = 0;
        let mut failure = None;
        for (index, sample) in results.iter().enumerate() {
            match sample {
                Sample::Passed { report, temporal: verdicts } => {
                    if matches!(report.termination, Termination::Deadlocked { .. }) {
                        deadlocks += 1;
                    }
                    for (t, verdict) in verdicts.iter().enumerate() {
                        let worse = temporal
                            .get(&t)
                            .map_or(true, |prev| verdict.severity() > prev.verdict.severity());
                        if worse {
                            temporal.insert(
                                t,
                                TemporalSummary {
                                    name: self.program.temporals[t].name.clone(),
                                    sample: index,
                                    verdict: verdict.clone(),
                                },
                            );
                        }
                    }
                }
                _ if failure.is_none() => failure = Some(index),
                _ => {}
            }
        }

        let outcome = match failure {
            Some(index) => failure_outcome(index, sample_seed(base, index), &results[index]),
            None => SimulationOutcome::Ok {
                trace: match &results[0] {
                    Sample::Passed { report, .. } => report.trace.clone(),
                    _ => Trace::new(),
                },
                deadlocks,
            },
        };

        let report = SimulationReport {
            module: self.program.name.clone(),
            seed: base,
            samples: ran,
            max_steps: config.max_steps,
            invariants: invariants.iter().map(|i| i.name.clone()).collect(),
            outcome,
            temporal: temporal.into_values().collect(),
        };
        info!(ok = report.is_ok(), samples = ran, "simulation finished");
        Ok(report)
    }

    // ── Tests built from run combinators ───────────────────────────

    /// Execute a run expression once.
    pub fn execute_run(&self, run: &Run, seed: u64) -> Result<Trace, RunFailure> {
        let mut choices = SeededChoices::new(seed);
        self.execute(run, &mut choices)
    }

    fn execute(&self, run: &Run, choices: &mut SeededChoices) -> Result<Trace, RunFailure> {
        let mut trace = Trace::new();
        match self.combine(run, &Env::new(), &mut trace, choices) {
            Ok(()) => Ok(trace),
            Err(cause) => Err(RunFailure {
                step: trace.len(),
                cause,
                trace,
            }),
        }
    }

    fn combine(
        &self,
        run: &Run,
        env: &Env,
        trace: &mut Trace,
        choices: &mut SeededChoices,
    ) -> Result<(), FailureCause> {
        match run {
            Run::Step(action) => {
                let current = trace.last().cloned().unwrap_or_default();
                let label = action_label(action);
                match self.exec.exec(action, env, &current, choices) {
                    Ok(ActionOutcome::Success(next)) => {
                        trace.push(label, next);
                        Ok(())
                    }
                    Ok(ActionOutcome::GuardFailed) => Err(FailureCause::Disabled {
                        action: label.to_string(),
                    }),
                    Err(e) => Err(FailureCause::Error(e)),
                }
            }
            Run::Then(runs) => {
                for r in runs {
                    self.combine(r, env, trace, choices)?;
                }
                Ok(())
            }
            Run::Reps { times, index, body } => {
                for i in 0..*times {
                    let env = match index {
                        Some(name) => env.bind(name.as_str(), Value::int(i)),
                        None => env.clone(),
                    };
                    self.combine(body, &env, trace, choices)?;
                }
                Ok(())
            }
            Run::Expect { run, pred } => {
                self.combine(run, env, trace, choices)?;
                let last = trace.last().ok_or(FailureCause::ExpectationFailed)?;
                match self.exec.evaluator().eval_bool(pred, env, last) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(FailureCause::ExpectationFailed),
                    Err(e) => Err(FailureCause::Error(e)),
                }
            }
            Run::Fail(inner) => {
                let mut scratch = trace.clone();
                // Only a disabled action counts as the expected failure.
                match self.combine(inner, env, &mut scratch, choices) {
                    Ok(()) => Err(FailureCause::UnexpectedSuccess),
                    Err(FailureCause::Disabled { .. }) => Ok(()),
                    Err(cause) => Err(cause),
                }
            }
        }
    }

    /// Run the named test over `config.max_samples` seeded samples.
    pub fn run_test(&self, name: &str, config: &SimConfig) -> Result<TestReport, ProgramError> {
        let def = self
            .program
            .get_run(name)
            .ok_or_else(|| ProgramError::UnknownProperty {
                kind: "run".to_string(),
                name: name.to_string(),
            })?;
        let base = config.resolve_seed();
        let samples = config.max_samples.max(1);

        let mut first_choices = SeededChoices::new(base);
        let first = self.execute(&def.run, &mut first_choices);
        let mut results = vec![first];
        if first_choices.draws() > 0 && results[0].is_ok() {
            let rest: Vec<Result<Trace, RunFailure>> = (1..samples)
                .into_par_iter()
                .map(|i| self.execute_run(&def.run, sample_seed(base, i)))
                .collect();
            results.extend(rest);
        }
        let ran = results.len();

        let outcome = match results.iter().position(Result::is_err) {
            Some(index) => match results.swap_remove(index) {
                Err(failure) => TestOutcome::Failed {
                    sample: index,
                    seed: sample_seed(base, index),
                    failure,
                },
                Ok(trace) => TestOutcome::Passed { trace },
            },
            None => TestOutcome::Passed {
                trace: results.swap_remove(0).unwrap_or_default(),
            },
        };
        let report = TestReport {
            name: name.to_string(),
            seed: base,
            samples: ran,
            outcome,
        };
        info!(test = name, passed = report.passed(), samples = ran, "test finished");
        Ok(report)
    }
}

fn failure_outcome(index: usize, seed: u64, sample: &Sample) -> SimulationOutcome {
    match sample {
        Sample::Failed(failure) => SimulationOutcome::RunFailed {
            sample: index,
            seed,
            failure: failure.clone(),
        },
        Sample::Broken {
            invariant,
            result: PropertyResult::Inconclusive { index: at, error },
            trace,
        } => SimulationOutcome::Inconclusive {
            sample: index,
            seed,
            invariant: invariant.clone(),
            index: *at,
            error: error.clone(),
            trace: trace.clone(),
        },
        Sample::Broken {
            invariant,
            result,
            trace,
        } => SimulationOutcome::Violation {
            sample: index,
            seed,
            invariant: invariant.clone(),
            index: match result {
                PropertyResult::Violated { index } => *index,
                _ => trace.len().saturating_sub(1),
            },
            trace: trace.clone(),
        },
        Sample::Passed { report, .. } => SimulationOutcome::Ok {
            trace: report.trace.clone(),
            deadlocks: 0,
        },
    }
}

fn action_label(action: &Action) -> &str {
    match action {
        Action::Call { name, .. } => name,
        _ => "action",
    }
}
