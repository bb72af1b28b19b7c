//! Runtime values.
//!
//! Every value is immutable. Collections use the persistent structures from
//! `im`, so cloning a set, map, record or sequence is O(1) and updates share
//! structure with the original. The ordered variants (`OrdSet`, `OrdMap`)
//! give every collection a canonical iteration order, which makes equality,
//! ordering and hashing structural and keeps nondeterministic draws
//! reproducible.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use im::{OrdMap, OrdSet, Vector};
use num_bigint::BigInt;

use super::program::LambdaDef;
use super::{EvalError, EvalResult};
use crate::env::Env;

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(BigInt),
    Str(Arc<str>),
    Tuple(Vector<Value>),
    Record(OrdMap<String, Value>),
    Set(OrdSet<Value>),
    Map(OrdMap<Value, Value>),
    Seq(Vector<Value>),
    /// Tagged sum-type value. Payload-less variants carry the unit tuple.
    Variant { tag: Arc<str>, payload: Arc<Value> },
    /// Operator closure. Compares and hashes by its lambda's lowering
    /// order, then by the bindings it captured.
    Lambda(Arc<Closure>),
}

/// A lambda (or named operator) together with the environment it was
/// defined in.
pub struct Closure {
    pub def: Arc<LambdaDef>,
    pub env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.def.params)
            .finish_non_exhaustive()
    }
}

impl Value {
    pub fn int(n: impl Into<BigInt>) -> Value {
        Value::Int(n.into())
    }

    pub fn str(s: &str) -> Value {
        Value::Str(Arc::from(s))
    }

    /// The empty tuple, used as the payload of payload-less variants.
    pub fn unit() -> Value {
        Value::Tuple(Vector::new())
    }

    pub fn tuple(elems: impl IntoIterator<Item = Value>) -> Value {
        Value::Tuple(elems.into_iter().collect())
    }

    pub fn set(elems: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(elems.into_iter().collect())
    }

    pub fn seq(elems: impl IntoIterator<Item = Value>) -> Value {
        Value::Seq(elems.into_iter().collect())
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn variant(tag: &str, payload: Value) -> Value {
        Value::Variant {
            tag: Arc::from(tag),
            payload: Arc::new(payload),
        }
    }

    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Str(_) => "Str",
            Value::Tuple(_) => "Tuple",
            Value::Record(_) => "Record",
            Value::Set(_) => "Set",
            Value::Map(_) => "Map",
            Value::Seq(_) => "Seq",
            Value::Variant { .. } => "Variant",
            Value::Lambda(_) => "Lambda",
        }
    }

    /// Position of the value's shape in the cross-shape ordering.
    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Str(_) => 2,
            Value::Tuple(_) => 3,
            Value::Record(_) => 4,
            Value::Set(_) => 5,
            Value::Map(_) => 6,
            Value::Seq(_) => 7,
            Value::Variant { .. } => 8,
            Value::Lambda(_) => 9,
        }
    }

    /// Extracts a boolean or returns a type error.
    pub fn as_bool(&self, context: &str) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::type_mismatch(context, "Bool", other)),
        }
    }

    pub fn as_int(&self, context: &str) -> EvalResult<&BigInt> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(EvalError::type_mismatch(context, "Int", other)),
        }
    }

    pub fn as_set(&self, context: &str) -> EvalResult<&OrdSet<Value>> {
        match self {
            Value::Set(s) => Ok(s),
            other => Err(EvalError::type_mismatch(context, "Set", other)),
        }
    }

    pub fn as_map(&self, context: &str) -> EvalResult<&OrdMap<Value, Value>> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(EvalError::type_mismatch(context, "Map", other)),
        }
    }

    pub fn as_seq(&self, context: &str) -> EvalResult<&Vector<Value>> {
        match self {
            Value::Seq(s) => Ok(s),
            other => Err(EvalError::type_mismatch(context, "Seq", other)),
        }
    }

    pub fn as_record(&self, context: &str) -> EvalResult<&OrdMap<String, Value>> {
        match self {
            Value::Record(r) => Ok(r),
            other => Err(EvalError::type_mismatch(context, "Record", other)),
        }
    }

    pub fn as_lambda(&self, context: &str) -> EvalResult<&Arc<Closure>> {
        match self {
            Value::Lambda(c) => Ok(c),
            other => Err(EvalError::type_mismatch(context, "Lambda", other)),
        }
    }

    pub fn as_variant(&self, context: &str) -> EvalResult<(&str, &Value)> {
        match self {
            Value::Variant { tag, payload } => Ok((tag, payload)),
            other => Err(EvalError::type_mismatch(context, "Variant", other)),
        }
    }

    /// True for the payload of payload-less variants.
    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Tuple(t) if t.is_empty())
    }
}

// ──────────────────────────────────────────────
// Structural equality, ordering and hashing
// ──────────────────────────────────────────────

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => a.cmp(b),
            (Value::Record(a), Value::Record(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Seq(a), Value::Seq(b)) => a.cmp(b),
            (
                Value::Variant {
                    tag: ta,
                    payload: pa,
                },
                Value::Variant {
                    tag: tb,
                    payload: pb,
                },
            ) => ta.cmp(tb).then_with(|| pa.cmp(pb)),
            (Value::Lambda(a), Value::Lambda(b)) => a
                .def
                .id
                .cmp(&b.def.id)
                .then_with(|| a.env.bindings().cmp(b.env.bindings())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Tuple(elems) | Value::Seq(elems) => elems.hash(state),
            Value::Record(fields) => fields.hash(state),
            Value::Set(elems) => elems.hash(state),
            Value::Map(entries) => entries.hash(state),
            Value::Variant { tag, payload } => {
                tag.hash(state);
                payload.hash(state);
            }
            Value::Lambda(c) => {
                c.def.id.hash(state);
                for binding in c.env.bindings() {
                    binding.hash(state);
                }
            }
        }
    }
}

// ──────────────────────────────────────────────
// Display
// ──────────────────────────────────────────────

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Tuple(elems) => {
                write!(f, "(")?;
                write_joined(f, elems.iter())?;
                write!(f, ")")
            }
            Value::Record(fields) => {
                write!(f, "{{ ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            Value::Set(elems) => {
                write!(f, "Set(")?;
                write_joined(f, elems.iter())?;
                write!(f, ")")
            }
            Value::Map(entries) => {
                write!(f, "Map(")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {}", key, value)?;
                }
                write!(f, ")")
            }
            Value::Seq(elems) => {
                write!(f, "List(")?;
                write_joined(f, elems.iter())?;
                write!(f, ")")
            }
            Value::Variant { tag, payload } => {
                if payload.is_unit() {
                    write!(f, "{}", tag)
                } else {
                    write!(f, "{}({})", tag, payload)
                }
            }
            Value::Lambda(c) => write!(f, "<lambda/{}>", c.def.params.len()),
        }
    }
}
