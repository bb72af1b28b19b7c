//! Sources of nondeterministic decisions.
//!
//! The executor never draws randomness itself. Every `nondet` draw and every
//! choice between several enabled `any` branches is delegated to a
//! [`ChoiceSource`], which makes a run a pure function of the source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Resolves one decision among `n` options (`n >= 1`) to an index in `0..n`.
pub trait ChoiceSource {
    fn choose(&mut self, n: usize) -> usize;
}

/// Pseudo-random choices from a seeded generator.
///
/// The k-th draw depends only on the seed and k, so a run is reproducible
/// from its seed.
pub struct SeededChoices {
    rng: StdRng,
    draws: u64,
}

impl SeededChoices {
    pub fn new(seed: u64) -> Self {
        SeededChoices {
            rng: StdRng::seed_from_u64(seed),
            draws: 0,
        }
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl ChoiceSource for SeededChoices {
    fn choose(&mut self, n: usize) -> usize {
        self.draws += 1;
        if n <= 1 {
            0
        } else {
            self.rng.gen_range(0..n)
        }
    }
}

/// Replays a fixed sequence of choices, then picks 0 once exhausted.
///
/// Out-of-range scripted picks are clamped to the last option. Every
/// decision actually taken is recorded with its arity, which is what
/// successor enumeration uses to advance to the next choice sequence.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChoices {
    script: Vec<usize>,
    pos: usize,
    taken: Vec<(usize, usize)>,
}

impl ScriptedChoices {
    pub fn new(script: Vec<usize>) -> Self {
        ScriptedChoices {
            script,
            pos: 0,
            taken: Vec::new(),
        }
    }

    /// `(choice, arity)` for every decision made so far.
    pub fn taken(&self) -> &[(usize, usize)] {
        &self.taken
    }
}

impl ChoiceSource for ScriptedChoices {
    fn choose(&mut self, n: usize) -> usize {
        let wanted = self.script.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        let pick = wanted.min(n.saturating_sub(1));
        self.taken.push((pick, n));
        pick
    }
}

/// Advance a recorded choice sequence to the next one in depth-first order,
/// like an odometer whose digits have the recorded arities. Returns `None`
/// once every sequence has been visited.
pub(crate) fn next_script(taken: &[(usize, usize)]) -> Option<Vec<usize>> {
    let mut digits: Vec<(usize, usize)> = taken.to_vec();
    while let Some((pick, arity)) = digits.pop() {
        if pick + 1 < arity {
            let mut script: Vec<usize> = digits.iter().map(|(p, _)| *p).collect();
            script.push(pick + 1);
            return Some(script);
        }
    }
    None
}
