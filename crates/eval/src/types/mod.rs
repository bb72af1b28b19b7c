//! Runtime value types, the evaluation-ready program and error types.
//!
//! These types are DISTINCT from cadence-interchange types. The engine
//! consumes the resolver's bundle, then lowers it once into the
//! representation defined here. Nothing in this module changes after
//! loading.

pub mod program;
pub mod ty;
pub mod values;

use serde::Serialize;

use cadence_interchange::InterchangeError;

pub use program::{
    Action, ActionDef, Arm, ConstDecl, Def, Expr, Invariant, LambdaDef, Program, Run, RunDef,
    Temporal, TemporalProperty, VarDecl,
};
pub use ty::conforms;
pub use values::{Closure, Value};

/// Result alias used throughout evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that can occur while evaluating expressions or executing actions.
///
/// A disabled action (guard failure) is NOT an error: it is the
/// `GuardFailed` arm of [`crate::action::ActionOutcome`]. Every variant here
/// aborts the step it occurs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum EvalError {
    /// A name is bound neither locally nor in the program.
    #[error("unbound name: {name}")]
    UnboundName { name: String },
    /// An operator was applied to a value of the wrong shape.
    #[error("type mismatch in {context}: expected {expected}, got {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },
    /// `nondet x = oneOf(S)` over an empty `S`.
    #[error("cannot choose '{binder}' from an empty {collection}")]
    EmptyChoiceSet { binder: String, collection: String },
    /// Map lookup of an absent key.
    #[error("key not found: {key}")]
    KeyNotFound { key: String },
    /// Sequence or tuple access out of range.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: String, len: usize },
    /// A variable was primed twice with different values in one action.
    #[error("variable '{var}' assigned twice with different values: {first} and {second}")]
    DoubleAssignment {
        var: String,
        first: String,
        second: String,
    },
    /// No `match` arm handles the variant's tag.
    #[error("no match arm for variant tag '{tag}'")]
    UnmatchedVariant { tag: String },
    #[error("division by zero")]
    DivisionByZero,
    /// Operator or action applied to the wrong number of arguments.
    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    /// An action succeeded without priming every declared variable.
    #[error("action completed without assigning variable '{var}'")]
    UnassignedVariable { var: String },
    /// A collection would exceed the enumeration limit.
    #[error("{what} too large to enumerate ({size} elements)")]
    CollectionTooLarge { what: String, size: String },
    /// A value has no JSON encoding (e.g. an operator closure).
    #[error("value cannot be encoded: {message}")]
    NotEncodable { message: String },
    /// An error raised inside a named action; nests to form the action path.
    #[error("in action '{action}': {source}")]
    InAction {
        action: String,
        source: Box<EvalError>,
    },
}

impl EvalError {
    /// Shorthand for a `TypeMismatch` naming the offending value's shape.
    pub fn type_mismatch(context: impl Into<String>, expected: &str, found: &Value) -> Self {
        EvalError::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    /// Wrap this error with the name of the action it escaped from.
    pub fn in_action(self, action: &str) -> Self {
        EvalError::InAction {
            action: action.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all action-path wrappers removed.
    pub fn root(&self) -> &EvalError {
        let mut err = self;
        while let EvalError::InAction { source, .. } = err {
            err = source;
        }
        err
    }

    /// Names of the actions the error propagated through, outermost first.
    pub fn action_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut err = self;
        while let EvalError::InAction { action, source } = err {
            path.push(action.as_str());
            err = source;
        }
        path
    }

    /// Stable name of the root error kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            EvalError::UnboundName { .. } => "UnboundName",
            EvalError::TypeMismatch { .. } => "TypeMismatch",
            EvalError::EmptyChoiceSet { .. } => "EmptyChoiceSet",
            EvalError::KeyNotFound { .. } => "KeyNotFound",
            EvalError::IndexOutOfBounds { .. } => "IndexOutOfBounds",
            EvalError::DoubleAssignment { .. } => "DoubleAssignment",
            EvalError::UnmatchedVariant { .. } => "UnmatchedVariant",
            EvalError::DivisionByZero => "DivisionByZero",
            EvalError::ArityMismatch { .. } => "ArityMismatch",
            EvalError::UnassignedVariable { .. } => "UnassignedVariable",
            EvalError::CollectionTooLarge { .. } => "CollectionTooLarge",
            EvalError::NotEncodable { .. } => "NotEncodable",
            EvalError::InAction { .. } => "InAction",
        }
    }
}

/// Errors raised while loading a bundle into a [`Program`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error(transparent)]
    Interchange(#[from] InterchangeError),
    #[error("bundle contains no modules")]
    EmptyBundle,
    #[error("module '{0}' not found in bundle")]
    UnknownModule(String),
    #[error("{kind} '{name}' is declared more than once")]
    DuplicateName { kind: String, name: String },
    #[error("{role} action '{name}' is not declared")]
    MissingAction { role: String, name: String },
    #[error("constant '{name}' has no value; supply it as an override")]
    MissingConstant { name: String },
    #[error("override for undeclared constant '{name}'")]
    UnknownConstant { name: String },
    #[error("constant '{name}' failed to evaluate: {source}")]
    Constant { name: String, source: EvalError },
    #[error("invalid value for constant override '{name}': {source}")]
    Override { name: String, source: EvalError },
    #[error("{kind} '{name}' is not declared in the module")]
    UnknownProperty { kind: String, name: String },
    #[error("malformed integer literal '{literal}'")]
    BadInteger { literal: String },
    #[error("builtin '{op}' expects {expected} argument(s), got {got}")]
    BuiltinArity {
        op: String,
        expected: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_path_walks_nested_wrappers() {
        let err = EvalError::EmptyChoiceSet {
            binder: "v".to_string(),
            collection: "set".to_string(),
        }
        .in_action("pick")
        .in_action("step");
        assert_eq!(err.action_path(), vec!["step", "pick"]);
        assert_eq!(err.kind(), "EmptyChoiceSet");
        assert!(matches!(err.root(), EvalError::EmptyChoiceSet { .. }));
    }

    #[test]
    fn display_includes_path() {
        let err = EvalError::DivisionByZero.in_action("step");
        assert_eq!(err.to_string(), "in action 'step': division by zero");
    }
}
