//! States and traces.

use std::fmt;

use im::OrdMap;

use crate::types::Value;

/// Assignment of values to declared state variables.
///
/// Backed by a persistent ordered map, so a successor state shares
/// structure with its predecessor and states can be compared, hashed and
/// collected into sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct State(OrdMap<String, Value>);

impl State {
    pub fn new() -> Self {
        State(OrdMap::new())
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        State(
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn get(&self, var: &str) -> Option<&Value> {
        self.0.get(var)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.0.contains_key(var)
    }

    /// Bind `var`, returning the previous value if any.
    pub fn insert(&mut self, var: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(var.into(), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        Ok(())
    }
}

/// One committed step: the action that produced it and the resulting state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub action: String,
    pub state: State,
}

/// Append-only sequence of states starting from an initial state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Trace {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, action: impl Into<String>, state: State) {
        self.entries.push(TraceEntry {
            action: action.into(),
            state,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, index: usize) -> Option<&State> {
        self.entries.get(index).map(|e| &e.state)
    }

    pub fn last(&self) -> Option<&State> {
        self.entries.last().map(|e| &e.state)
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.entries.iter().map(|e| &e.state)
    }
}

impl<'a> FromIterator<(&'a str, State)> for Trace {
    fn from_iter<I: IntoIterator<Item = (&'a str, State)>>(iter: I) -> Self {
        let mut trace = Trace::new();
        for (action, state) in iter {
            trace.push(action, state);
        }
        trace
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f, "[{}] {}: {}", i, entry.action, entry.state)?;
        }
        Ok(())
    }
}
