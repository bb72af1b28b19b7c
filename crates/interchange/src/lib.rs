//! cadence-interchange: resolved-program bundle types and deserialization.
//!
//! Provides typed structs for every construct kind the resolver emits
//! (Var, Const, Def, Action, Invariant, Temporal, Run) and a single
//! `from_interchange()` entry point that deserializes a
//! `serde_json::Value` bundle into an `InterchangeBundle`.
//!
//! The engine depends on this crate for initial JSON parsing, then lowers
//! the shared types into its own evaluation-ready representation.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_interchange, InterchangeError};
pub use types::*;
