//! Invariant and temporal property checking over finite traces.
//!
//! Invariants are evaluated pointwise. Temporal properties are evaluated
//! over the whole trace with bounded semantics: a finite trace can refute
//! `always` and witness `eventually`, but an unwitnessed `eventually` or an
//! unrefuted `always` only holds (or fails) within the explored bound.

use std::fmt;

use serde::Serialize;

use crate::env::Env;
use crate::expr::Evaluator;
use crate::state::Trace;
use crate::types::{EvalError, Expr, Program, Temporal};

/// Verdict for a state invariant over one trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PropertyResult {
    Holds,
    /// False at `index`; the trace prefix up to `index` is the counterexample.
    Violated { index: usize },
    /// Evaluation failed at `index`. Neither a pass nor a counterexample.
    Inconclusive { index: usize, error: EvalError },
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyResult::Holds => write!(f, "holds"),
            PropertyResult::Violated { index } => write!(f, "violated at state {}", index),
            PropertyResult::Inconclusive { index, error } => {
                write!(f, "inconclusive at state {}: {}", index, error)
            }
        }
    }
}

/// Bounded-trace verdict for a temporal property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TemporalVerdict {
    /// `eventually(p)` witnessed at `witness`.
    Satisfied { witness: usize },
    /// No counterexample within a trace of `bound` states.
    HoldsWithinBound { bound: usize },
    /// `always(p)` refuted at `index`.
    Violated { index: usize },
    /// Not witnessed within a trace of `bound` states; not a refutation.
    FalseWithinBound { bound: usize },
    Inconclusive { index: usize, error: EvalError },
}

impl TemporalVerdict {
    /// Ordering used to aggregate verdicts across samples; higher is worse.
    pub fn severity(&self) -> u8 {
        match self {
            TemporalVerdict::Satisfied { .. } => 0,
            TemporalVerdict::HoldsWithinBound { .. } => 1,
            TemporalVerdict::FalseWithinBound { .. } => 2,
            TemporalVerdict::Inconclusive { .. } => 3,
            TemporalVerdict::Violated { .. } => 4,
        }
    }
}

impl fmt::Display for TemporalVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalVerdict::Satisfied { witness } => write!(f, "satisfied (witness at state {})", witness),
            TemporalVerdict::HoldsWithinBound { bound } => write!(
                f,
                "holds within bound of {} states (finite-trace verdict, not a proof)",
                bound
            ),
            TemporalVerdict::Violated { index } => write!(f, "violated at state {}", index),
            TemporalVerdict::FalseWithinBound { bound } => write!(
                f,
                "false within bound of {} states (finite-trace verdict, not a refutation)",
                bound
            ),
            TemporalVerdict::Inconclusive { index, error } => {
                write!(f, "inconclusive at state {}: {}", index, error)
            }
        }
    }
}

/// Evaluate `pred` at every state of `trace`, stopping at the first
/// violation or error.
pub fn check_invariant(program: &Program, pred: &Expr, trace: &Trace) -> PropertyResult {
    check_from(program, pred, trace, 0)
}

/// Like [`check_invariant`], skipping states before `start`. Used for
/// incremental checking while a trace grows.
pub fn check_from(program: &Program, pred: &Expr, trace: &Trace, start: usize) -> PropertyResult {
    let eval = Evaluator::new(program);
    let env = Env::new();
    for (index, state) in trace.states().enumerate().skip(start) {
        match eval.eval_bool(pred, &env, state) {
            Ok(true) => {}
            Ok(false) => return PropertyResult::Violated { index },
            Err(error) => return PropertyResult::Inconclusive { index, error },
        }
    }
    PropertyResult::Holds
}

/// Evaluate a temporal formula over the whole trace.
pub fn check_temporal(program: &Program, formula: &Temporal, trace: &Trace) -> TemporalVerdict {
    let eval = Evaluator::new(program);
    let verdict = match formula {
        Temporal::Eventually(p) => eventually(&eval, p, trace),
        Temporal::Always(p) => always(&eval, p, trace),
        Temporal::LeadsTo { from, to } => leads_to(&eval, from, to, trace),
    };
    verdict.unwrap_or_else(|inconclusive| inconclusive)
}

type Verdict = Result<TemporalVerdict, TemporalVerdict>;

fn holds_at(eval: &Evaluator<'_>, pred: &Expr, trace: &Trace, index: usize) -> Result<bool, TemporalVerdict> {
    match trace.state(index) {
        Some(state) => eval
            .eval_bool(pred, &Env::new(), state)
            .map_err(|error| TemporalVerdict::Inconclusive { index, error }),
        None => Ok(false),
    }
}

fn eventually(eval: &Evaluator<'_>, p: &Expr, trace: &Trace) -> Verdict {
    for i in 0..trace.len() {
        if holds_at(eval, p, trace, i)? {
            return Ok(TemporalVerdict::Satisfied { witness: i });
        }
    }
    Ok(TemporalVerdict::FalseWithinBound { bound: trace.len() })
}

fn always(eval: &Evaluator<'_>, p: &Expr, trace: &Trace) -> Verdict {
    for i in 0..trace.len() {
        if !holds_at(eval, p, trace, i)? {
            return Ok(TemporalVerdict::Violated { index: i });
        }
    }
    Ok(TemporalVerdict::HoldsWithinBound { bound: trace.len() })
}

fn leads_to(eval: &Evaluator<'_>, from: &Expr, to: &Expr, trace: &Trace) -> Verdict {
    // Walk backwards so `answered` means "a `to`-state occurs at or after i".
    let bound = trace.len();
    let mut answered = false;
    let mut unanswered = false;
    for i in (0..bound).rev() {
        if holds_at(eval, to, trace, i)? {
            answered = true;
        }
        if !answered && holds_at(eval, from, trace, i)? {
            unanswered = true;
        }
    }
    Ok(if unanswered {
        TemporalVerdict::FalseWithinBound { bound }
    } else {
        TemporalVerdict::HoldsWithinBound { bound }
    })
}
