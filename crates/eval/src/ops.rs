//! Builtin operator library.
//!
//! Every builtin is a pure function over already-evaluated arguments.
//! Higher-order builtins receive an `apply` callback from the evaluator to
//! invoke their operator argument; the callback owns closure semantics and
//! arity checking. The boolean connectives `and`, `or` and `implies` are
//! short-circuited by the evaluator before reaching this module; the strict
//! versions here are used only when arguments are already values.

use im::{OrdMap, OrdSet, Vector};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::types::{EvalError, EvalResult, Value};

/// Largest set `powerset` will enumerate the subsets of.
pub const MAX_POWERSET_BASE: usize = 20;

/// Largest integer interval `to`/`range` will materialise.
pub const MAX_INTERVAL: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // Boolean
    Not,
    And,
    Or,
    Implies,
    Iff,
    Eq,
    Neq,
    // Integer
    Iadd,
    Isub,
    Imul,
    Idiv,
    Imod,
    Ipow,
    Iuminus,
    Ilt,
    Ilte,
    Igt,
    Igte,
    // Set
    Contains,
    In,
    Union,
    Intersect,
    Exclude,
    Subseteq,
    Size,
    Powerset,
    Flatten,
    To,
    Map,
    Filter,
    Exists,
    Forall,
    Fold,
    GetOnlyElement,
    IsEmpty,
    // Map
    MapBy,
    Get,
    Put,
    SetBy,
    Update,
    Keys,
    Values,
    MapToSet,
    SetToMap,
    // Sequence
    Append,
    Concat,
    Head,
    Tail,
    Length,
    Nth,
    Slice,
    Indices,
    ReplaceAt,
    Range,
    Select,
    Foldl,
    Last,
    // Tuple / record
    Item,
    With,
    // String
    StrConcat,
    StrLength,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        use Builtin::*;
        Some(match name {
            "not" => Not,
            "and" => And,
            "or" => Or,
            "implies" => Implies,
            "iff" => Iff,
            "eq" => Eq,
            "neq" => Neq,
            "iadd" => Iadd,
            "isub" => Isub,
            "imul" => Imul,
            "idiv" => Idiv,
            "imod" => Imod,
            "ipow" => Ipow,
            "iuminus" => Iuminus,
            "ilt" => Ilt,
            "ilte" => Ilte,
            "igt" => Igt,
            "igte" => Igte,
            "contains" => Contains,
            "in" => In,
            "union" => Union,
            "intersect" => Intersect,
            "exclude" => Exclude,
            "subseteq" => Subseteq,
            "size" => Size,
            "powerset" => Powerset,
            "flatten" => Flatten,
            "to" => To,
            "map" => Map,
            "filter" => Filter,
            "exists" => Exists,
            "forall" => Forall,
            "fold" => Fold,
            "getOnlyElement" => GetOnlyElement,
            "isEmpty" => IsEmpty,
            "mapBy" => MapBy,
            "get" => Get,
            "put" => Put,
            "setBy" => SetBy,
            "update" => Update,
            "keys" => Keys,
            "values" => Values,
            "mapToSet" => MapToSet,
            "setToMap" => SetToMap,
            "append" => Append,
            "concat" => Concat,
            "head" => Head,
            "tail" => Tail,
            "length" => Length,
            "nth" => Nth,
            "slice" => Slice,
            "indices" => Indices,
            "replaceAt" => ReplaceAt,
            "range" => Range,
            "select" => Select,
            "foldl" => Foldl,
            "last" => Last,
            "item" => Item,
            "with" => With,
            "strConcat" => StrConcat,
            "strLength" => StrLength,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use Builtin::*;
        match self {
            Not => "not",
            And => "and",
            Or => "or",
            Implies => "implies",
            Iff => "iff",
            Eq => "eq",
            Neq => "neq",
            Iadd => "iadd",
            Isub => "isub",
            Imul => "imul",
            Idiv => "idiv",
            Imod => "imod",
            Ipow => "ipow",
            Iuminus => "iuminus",
            Ilt => "ilt",
            Ilte => "ilte",
            Igt => "igt",
            Igte => "igte",
            Contains => "contains",
            In => "in",
            Union => "union",
            Intersect => "intersect",
            Exclude => "exclude",
            Subseteq => "subseteq",
            Size => "size",
            Powerset => "powerset",
            Flatten => "flatten",
            To => "to",
            Map => "map",
            Filter => "filter",
            Exists => "exists",
            Forall => "forall",
            Fold => "fold",
            GetOnlyElement => "getOnlyElement",
            IsEmpty => "isEmpty",
            MapBy => "mapBy",
            Get => "get",
            Put => "put",
            SetBy => "setBy",
            Update => "update",
            Keys => "keys",
            Values => "values",
            MapToSet => "mapToSet",
            SetToMap => "setToMap",
            Append => "append",
            Concat => "concat",
            Head => "head",
            Tail => "tail",
            Length => "length",
            Nth => "nth",
            Slice => "slice",
            Indices => "indices",
            ReplaceAt => "replaceAt",
            Range => "range",
            Select => "select",
            Foldl => "foldl",
            Last => "last",
            Item => "item",
            With => "with",
            StrConcat => "strConcat",
            StrLength => "strLength",
        }
    }

    /// Fixed argument count, or `None` for the variadic connectives.
    pub fn arity(self) -> Option<usize> {
        use Builtin::*;
        match self {
            And | Or => None,
            Not | Iuminus | Size | Powerset | Flatten | GetOnlyElement | IsEmpty | Keys
            | Values | MapToSet | SetToMap | Head | Tail | Length | Indices | Last
            | StrLength => Some(1),
            Fold | Put | SetBy | Update | Slice | ReplaceAt | Foldl | With => Some(3),
            _ => Some(2),
        }
    }
}

/// Callback used by higher-order builtins to apply an operator value.
pub type Apply<'a> = dyn Fn(&Value, Vec<Value>) -> EvalResult<Value> + 'a;

/// Apply `op` to evaluated arguments. The argument count has already been
/// checked at load time.
pub fn apply(op: Builtin, args: &[Value], call: &Apply<'_>) -> EvalResult<Value> {
    use Builtin::*;
    let ctx = op.name();
    match op {
        Not => Ok(Value::Bool(!arg(args, 0, ctx)?.as_bool(ctx)?)),
        And => {
            for a in args {
                if !a.as_bool(ctx)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Or => {
            for a in args {
                if a.as_bool(ctx)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Implies => {
            let (p, q) = (arg(args, 0, ctx)?, arg(args, 1, ctx)?);
            Ok(Value::Bool(!p.as_bool(ctx)? || q.as_bool(ctx)?))
        }
        Iff => {
            let (p, q) = (arg(args, 0, ctx)?, arg(args, 1, ctx)?);
            Ok(Value::Bool(p.as_bool(ctx)? == q.as_bool(ctx)?))
        }
        Eq => Ok(Value::Bool(arg(args, 0, ctx)? == arg(args, 1, ctx)?)),
        Neq => Ok(Value::Bool(arg(args, 0, ctx)? != arg(args, 1, ctx)?)),

        Iadd | Isub | Imul | Idiv | Imod | Ipow => {
            let a = arg(args, 0, ctx)?.as_int(ctx)?;
            let b = arg(args, 1, ctx)?.as_int(ctx)?;
            int_binop(op, a, b).map(Value::Int)
        }
        Iuminus => Ok(Value::Int(-(arg(args, 0, ctx)?.as_int(ctx)?.clone()))),
        Ilt | Ilte | Igt | Igte => {
            let a = arg(args, 0, ctx)?.as_int(ctx)?;
            let b = arg(args, 1, ctx)?.as_int(ctx)?;
            Ok(Value::Bool(match op {
                Ilt => a < b,
                Ilte => a <= b,
                Igt => a > b,
                _ => a >= b,
            }))
        }

        Contains => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            Ok(Value::Bool(set.contains(arg(args, 1, ctx)?)))
        }
        In => {
            let set = arg(args, 1, ctx)?.as_set(ctx)?;
            Ok(Value::Bool(set.contains(arg(args, 0, ctx)?)))
        }
        Union => {
            let a = arg(args, 0, ctx)?.as_set(ctx)?;
            let b = arg(args, 1, ctx)?.as_set(ctx)?;
            Ok(Value::Set(a.clone().union(b.clone())))
        }
        Intersect => {
            let a = arg(args, 0, ctx)?.as_set(ctx)?;
            let b = arg(args, 1, ctx)?.as_set(ctx)?;
            Ok(Value::Set(a.clone().intersection(b.clone())))
        }
        Exclude => {
            let a = arg(args, 0, ctx)?.as_set(ctx)?;
            let b = arg(args, 1, ctx)?.as_set(ctx)?;
            Ok(Value::Set(a.clone().relative_complement(b.clone())))
        }
        Subseteq => {
            let a = arg(args, 0, ctx)?.as_set(ctx)?;
            let b = arg(args, 1, ctx)?.as_set(ctx)?;
            Ok(Value::Bool(a.is_subset(b)))
        }
        Size => Ok(Value::int(arg(args, 0, ctx)?.as_set(ctx)?.len())),
        IsEmpty => Ok(Value::Bool(arg(args, 0, ctx)?.as_set(ctx)?.is_empty())),
        Powerset => powerset(arg(args, 0, ctx)?.as_set(ctx)?),
        Flatten => {
            let mut out = OrdSet::new();
            for inner in arg(args, 0, ctx)?.as_set(ctx)? {
                out = out.union(inner.as_set(ctx)?.clone());
            }
            Ok(Value::Set(out))
        }
        To => {
            let lo = arg(args, 0, ctx)?.as_int(ctx)?;
            let hi = arg(args, 1, ctx)?.as_int(ctx)?;
            interval(ctx, lo, &(hi + 1u32)).map(|v| Value::Set(v.into_iter().collect()))
        }
        GetOnlyElement => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            match (set.len(), set.get_min()) {
                (1, Some(only)) => Ok(only.clone()),
                (n, _) => Err(EvalError::TypeMismatch {
                    context: ctx.to_string(),
                    expected: "set with exactly one element".to_string(),
                    found: format!("set with {} elements", n),
                }),
            }
        }
        Map => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            let f = arg(args, 1, ctx)?;
            let mut out = OrdSet::new();
            for x in set {
                out.insert(call(f, vec![x.clone()])?);
            }
            Ok(Value::Set(out))
        }
        Filter => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            let f = arg(args, 1, ctx)?;
            let mut out = OrdSet::new();
            for x in set {
                if call(f, vec![x.clone()])?.as_bool(ctx)? {
                    out.insert(x.clone());
                }
            }
            Ok(Value::Set(out))
        }
        Exists | Forall => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            let f = arg(args, 1, ctx)?;
            let want = op == Exists;
            for x in set {
                if call(f, vec![x.clone()])?.as_bool(ctx)? == want {
                    return Ok(Value::Bool(want));
                }
            }
            Ok(Value::Bool(!want))
        }
        Fold => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            let f = arg(args, 2, ctx)?;
            let mut acc = arg(args, 1, ctx)?.clone();
            for x in set {
                acc = call(f, vec![acc, x.clone()])?;
            }
            Ok(acc)
        }

        MapBy => {
            let set = arg(args, 0, ctx)?.as_set(ctx)?;
            let f = arg(args, 1, ctx)?;
            let mut out = OrdMap::new();
            for k in set {
                out.insert(k.clone(), call(f, vec![k.clone()])?);
            }
            Ok(Value::Map(out))
        }
        Get => {
            let map = arg(args, 0, ctx)?.as_map(ctx)?;
            let key = arg(args, 1, ctx)?;
            map.get(key).cloned().ok_or_else(|| key_not_found(key))
        }
        Put => {
            let map = arg(args, 0, ctx)?.as_map(ctx)?;
            let key = arg(args, 1, ctx)?.clone();
            let value = arg(args, 2, ctx)?.clone();
            Ok(Value::Map(map.update(key, value)))
        }
        Update => {
            let map = arg(args, 0, ctx)?.as_map(ctx)?;
            let key = arg(args, 1, ctx)?;
            if !map.contains_key(key) {
                return Err(key_not_found(key));
            }
            Ok(Value::Map(map.update(key.clone(), arg(args, 2, ctx)?.clone())))
        }
        SetBy => {
            let map = arg(args, 0, ctx)?.as_map(ctx)?;
            let key = arg(args, 1, ctx)?;
            let old = map.get(key).ok_or_else(|| key_not_found(key))?;
            let new = call(arg(args, 2, ctx)?, vec![old.clone()])?;
            Ok(Value::Map(map.update(key.clone(), new)))
        }
        Keys => Ok(Value::Set(
            arg(args, 0, ctx)?.as_map(ctx)?.keys().cloned().collect(),
        )),
        Values => Ok(Value::Set(
            arg(args, 0, ctx)?.as_map(ctx)?.values().cloned().collect(),
        )),
        MapToSet => Ok(Value::Set(
            arg(args, 0, ctx)?
                .as_map(ctx)?
                .iter()
                .map(|(k, v)| Value::tuple([k.clone(), v.clone()]))
                .collect(),
        )),
        SetToMap => {
            let mut out = OrdMap::new();
            for pair in arg(args, 0, ctx)?.as_set(ctx)? {
                match pair {
                    Value::Tuple(kv) if kv.len() == 2 => {
                        out.insert(kv[0].clone(), kv[1].clone());
                    }
                    other => return Err(EvalError::type_mismatch(ctx, "pair", other)),
                }
            }
            Ok(Value::Map(out))
        }

        Append => {
            let mut seq = arg(args, 0, ctx)?.as_seq(ctx)?.clone();
            seq.push_back(arg(args, 1, ctx)?.clone());
            Ok(Value::Seq(seq))
        }
        Concat => {
            let mut a = arg(args, 0, ctx)?.as_seq(ctx)?.clone();
            a.append(arg(args, 1, ctx)?.as_seq(ctx)?.clone());
            Ok(Value::Seq(a))
        }
        Head => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            seq.front().cloned().ok_or_else(|| out_of_bounds(0, seq.len()))
        }
        Last => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            seq.back().cloned().ok_or_else(|| out_of_bounds(0, seq.len()))
        }
        Tail => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            if seq.is_empty() {
                return Err(out_of_bounds(1, 0));
            }
            Ok(Value::Seq(seq.skip(1)))
        }
        Length => Ok(Value::int(arg(args, 0, ctx)?.as_seq(ctx)?.len())),
        Nth => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            let i = index(arg(args, 1, ctx)?.as_int(ctx)?, seq.len())?;
            Ok(seq[i].clone())
        }
        ReplaceAt => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            let i = index(arg(args, 1, ctx)?.as_int(ctx)?, seq.len())?;
            Ok(Value::Seq(seq.update(i, arg(args, 2, ctx)?.clone())))
        }
        Slice => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            let start = arg(args, 1, ctx)?.as_int(ctx)?;
            let end = arg(args, 2, ctx)?.as_int(ctx)?;
            let len = seq.len();
            let bound = |n: &BigInt| n.to_usize().filter(|&n| n <= len);
            match (bound(start), bound(end)) {
                (Some(s), Some(e)) if s <= e => Ok(Value::Seq(seq.clone().slice(s..e))),
                (Some(_), Some(_)) | (Some(_), None) => Err(out_of_bounds_big(end, len)),
                (None, _) => Err(out_of_bounds_big(start, len)),
            }
        }
        Indices => Ok(Value::Set(
            (0..arg(args, 0, ctx)?.as_seq(ctx)?.len()).map(Value::int).collect(),
        )),
        Range => {
            let lo = arg(args, 0, ctx)?.as_int(ctx)?;
            let hi = arg(args, 1, ctx)?.as_int(ctx)?;
            interval(ctx, lo, hi).map(Value::Seq)
        }
        Select => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            let f = arg(args, 1, ctx)?;
            let mut out = Vector::new();
            for x in seq {
                if call(f, vec![x.clone()])?.as_bool(ctx)? {
                    out.push_back(x.clone());
                }
            }
            Ok(Value::Seq(out))
        }
        Foldl => {
            let seq = arg(args, 0, ctx)?.as_seq(ctx)?;
            let f = arg(args, 2, ctx)?;
            let mut acc = arg(args, 1, ctx)?.clone();
            for x in seq {
                acc = call(f, vec![acc, x.clone()])?;
            }
            Ok(acc)
        }

        Item => {
            let tuple = match arg(args, 0, ctx)? {
                Value::Tuple(t) => t,
                other => return Err(EvalError::type_mismatch(ctx, "Tuple", other)),
            };
            let i = arg(args, 1, ctx)?.as_int(ctx)?;
            match i.to_usize() {
                Some(n) if n >= 1 && n <= tuple.len() => Ok(tuple[n - 1].clone()),
                _ => Err(out_of_bounds_big(i, tuple.len())),
            }
        }
        With => {
            let record = arg(args, 0, ctx)?.as_record(ctx)?;
            let field = match arg(args, 1, ctx)? {
                Value::Str(s) => s.to_string(),
                other => return Err(EvalError::type_mismatch(ctx, "Str", other)),
            };
            if !record.contains_key(&field) {
                return Err(EvalError::KeyNotFound { key: field });
            }
            Ok(Value::Record(record.update(field, arg(args, 2, ctx)?.clone())))
        }

        StrConcat => match (arg(args, 0, ctx)?, arg(args, 1, ctx)?) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::str(&format!("{}{}", a, b))),
            (Value::Str(_), other) | (other, _) => {
                Err(EvalError::type_mismatch(ctx, "Str", other))
            }
        },
        StrLength => match arg(args, 0, ctx)? {
            Value::Str(s) => Ok(Value::int(s.chars().count())),
            other => Err(EvalError::type_mismatch(ctx, "Str", other)),
        },
    }
}

fn arg<'a>(args: &'a [Value], i: usize, ctx: &str) -> EvalResult<&'a Value> {
    args.get(i).ok_or_else(|| EvalError::ArityMismatch {
        name: ctx.to_string(),
        expected: i + 1,
        got: args.len(),
    })
}

fn key_not_found(key: &Value) -> EvalError {
    EvalError::KeyNotFound {
        key: key.to_string(),
    }
}

fn out_of_bounds(index: usize, len: usize) -> EvalError {
    EvalError::IndexOutOfBounds {
        index: index.to_string(),
        len,
    }
}

fn out_of_bounds_big(index: &BigInt, len: usize) -> EvalError {
    EvalError::IndexOutOfBounds {
        index: index.to_string(),
        len,
    }
}

/// Convert a 0-based integer index, checking it against `len`.
fn index(i: &BigInt, len: usize) -> EvalResult<usize> {
    i.to_usize()
        .filter(|&n| n < len)
        .ok_or_else(|| out_of_bounds_big(i, len))
}

fn int_binop(op: Builtin, a: &BigInt, b: &BigInt) -> EvalResult<BigInt> {
    match op {
        Builtin::Iadd => Ok(a + b),
        Builtin::Isub => Ok(a - b),
        Builtin::Imul => Ok(a * b),
        // BigInt division and remainder truncate toward zero.
        Builtin::Idiv | Builtin::Imod if b.is_zero() => Err(EvalError::DivisionByZero),
        Builtin::Idiv => Ok(a / b),
        Builtin::Imod => Ok(a % b),
        Builtin::Ipow => {
            if b.is_negative() {
                return Err(EvalError::TypeMismatch {
                    context: "ipow".to_string(),
                    expected: "non-negative exponent".to_string(),
                    found: b.to_string(),
                });
            }
            if a.is_zero() || a.abs().is_one() {
                // 0^n, 1^n and (-1)^n never grow, whatever the exponent.
                let odd = (b % 2u32).is_one();
                return Ok(match (a.is_zero(), b.is_zero(), a.is_negative() && odd) {
                    (_, true, _) => BigInt::one(),
                    (true, false, _) => BigInt::zero(),
                    (false, false, true) => -BigInt::one(),
                    (false, false, false) => BigInt::one(),
                });
            }
            let exp = b.to_u32().ok_or_else(|| EvalError::CollectionTooLarge {
                what: "exponent".to_string(),
                size: b.to_string(),
            })?;
            Ok(a.pow(exp))
        }
        _ => Err(EvalError::TypeMismatch {
            context: op.name().to_string(),
            expected: "integer operator".to_string(),
            found: op.name().to_string(),
        }),
    }
}

/// Integers in `[lo, hi)` as a sequence.
fn interval(ctx: &str, lo: &BigInt, hi: &BigInt) -> EvalResult<Vector<Value>> {
    if hi <= lo {
        return Ok(Vector::new());
    }
    let width = hi - lo;
    if width > BigInt::from(MAX_INTERVAL) {
        return Err(EvalError::CollectionTooLarge {
            what: format!("{} interval", ctx),
            size: width.to_string(),
        });
    }
    let mut out = Vector::new();
    let mut n = lo.clone();
    while &n < hi {
        out.push_back(Value::Int(n.clone()));
        n += 1u32;
    }
    Ok(out)
}

fn powerset(set: &OrdSet<Value>) -> EvalResult<Value> {
    if set.len() > MAX_POWERSET_BASE {
        return Err(EvalError::CollectionTooLarge {
            what: "powerset".to_string(),
            size: format!("2^{}", set.len()),
        });
    }
    let elems: Vec<&Value> = set.iter().collect();
    let mut out = OrdSet::new();
    for mask in 0u32..(1u32 << elems.len()) {
        let subset: OrdSet<Value> = elems
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, v)| (*v).clone())
            .collect();
        out.insert(Value::Set(subset));
    }
    Ok(Value::Set(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_call(_: &Value, _: Vec<Value>) -> EvalResult<Value> {
        panic!("operator argument not expected")
    }

    fn run(op: &str, args: Vec<Value>) -> EvalResult<Value> {
        let op = Builtin::from_name(op).expect("known builtin");
        apply(op, &args, &no_call)
    }

    fn ints(ns: &[i64]) -> Value {
        Value::set(ns.iter().map(|&n| Value::int(n)))
    }

    #[test]
    fn names_round_trip() {
        for name in ["not", "getOnlyElement", "replaceAt", "strLength", "setToMap"] {
            assert_eq!(Builtin::from_name(name).map(Builtin::name), Some(name));
        }
        assert_eq!(Builtin::from_name("nope"), None);
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(run("idiv", vec![Value::int(-7), Value::int(2)]), Ok(Value::int(-3)));
        assert_eq!(run("imod", vec![Value::int(-7), Value::int(2)]), Ok(Value::int(-1)));
        assert_eq!(
            run("idiv", vec![Value::int(1), Value::int(0)]),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            run("imod", vec![Value::int(1), Value::int(0)]),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn arithmetic_is_unbounded() {
        let big = run("ipow", vec![Value::int(2), Value::int(100)]).unwrap();
        let expected: BigInt = "1267650600228229401496703205376".parse().unwrap();
        assert_eq!(big, Value::Int(expected));
        assert!(matches!(
            run("ipow", vec![Value::int(2), Value::int(-1)]),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert_eq!(run("ipow", vec![Value::int(-1), Value::int(3)]), Ok(Value::int(-1)));
        assert_eq!(run("ipow", vec![Value::int(5), Value::int(0)]), Ok(Value::int(1)));
    }

    #[test]
    fn unary_minus_negates() {
        assert_eq!(run("iuminus", vec![Value::int(5)]), Ok(Value::int(-5)));
        assert_eq!(run("iuminus", vec![Value::int(-5)]), Ok(Value::int(5)));
        assert!(matches!(
            run("iuminus", vec![Value::str("5")]),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn set_algebra() {
        assert_eq!(run("union", vec![ints(&[1, 2]), ints(&[2, 3])]), Ok(ints(&[1, 2, 3])));
        assert_eq!(run("intersect", vec![ints(&[1, 2]), ints(&[2, 3])]), Ok(ints(&[2])));
        assert_eq!(run("exclude", vec![ints(&[1, 2]), ints(&[2, 3])]), Ok(ints(&[1])));
        assert_eq!(
            run("subseteq", vec![ints(&[1]), ints(&[1, 2])]),
            Ok(Value::Bool(true))
        );
        assert_eq!(run("to", vec![Value::int(1), Value::int(3)]), Ok(ints(&[1, 2, 3])));
        assert_eq!(run("to", vec![Value::int(3), Value::int(1)]), Ok(ints(&[])));
        assert_eq!(run("size", vec![ints(&[4, 5])]), Ok(Value::int(2)));
    }

    #[test]
    fn powerset_and_flatten() {
        let ps = run("powerset", vec![ints(&[1, 2])]).unwrap();
        assert_eq!(
            ps,
            Value::set([ints(&[]), ints(&[1]), ints(&[2]), ints(&[1, 2])])
        );
        assert_eq!(run("flatten", vec![ps]), Ok(ints(&[1, 2])));

        let huge = Value::set((0..=MAX_POWERSET_BASE as i64).map(Value::int));
        assert!(matches!(
            run("powerset", vec![huge]),
            Err(EvalError::CollectionTooLarge { .. })
        ));
    }

    #[test]
    fn get_only_element_requires_singleton() {
        assert_eq!(run("getOnlyElement", vec![ints(&[9])]), Ok(Value::int(9)));
        assert!(run("getOnlyElement", vec![ints(&[1, 2])]).is_err());
        assert!(run("getOnlyElement", vec![ints(&[])]).is_err());
    }

    #[test]
    fn map_lookup_and_update() {
        let m = Value::map([(Value::str("a"), Value::int(1))]);
        assert_eq!(run("get", vec![m.clone(), Value::str("a")]), Ok(Value::int(1)));
        assert_eq!(
            run("get", vec![m.clone(), Value::str("b")]),
            Err(EvalError::KeyNotFound {
                key: "\"b\"".to_string()
            })
        );
        assert!(matches!(
            run("update", vec![m.clone(), Value::str("b"), Value::int(2)]),
            Err(EvalError::KeyNotFound { .. })
        ));
        let put = run("put", vec![m.clone(), Value::str("b"), Value::int(2)]).unwrap();
        assert_eq!(run("keys", vec![put]), Ok(Value::set([Value::str("a"), Value::str("b")])));
        let updated = run("update", vec![m, Value::str("a"), Value::int(5)]).unwrap();
        assert_eq!(
            run("mapToSet", vec![updated]),
            Ok(Value::set([Value::tuple([Value::str("a"), Value::int(5)])]))
        );
    }

    #[test]
    fn sequence_bounds() {
        let s = Value::seq([Value::int(10), Value::int(20), Value::int(30)]);
        assert_eq!(run("head", vec![s.clone()]), Ok(Value::int(10)));
        assert_eq!(run("last", vec![s.clone()]), Ok(Value::int(30)));
        assert_eq!(run("nth", vec![s.clone(), Value::int(1)]), Ok(Value::int(20)));
        assert!(matches!(
            run("nth", vec![s.clone(), Value::int(3)]),
            Err(EvalError::IndexOutOfBounds { len: 3, .. })
        ));
        assert!(matches!(
            run("head", vec![Value::seq([])]),
            Err(EvalError::IndexOutOfBounds { .. })
        ));
        assert_eq!(
            run("slice", vec![s.clone(), Value::int(1), Value::int(3)]),
            Ok(Value::seq([Value::int(20), Value::int(30)]))
        );
        assert!(run("slice", vec![s.clone(), Value::int(2), Value::int(1)]).is_err());
        assert_eq!(
            run("tail", vec![s.clone()]),
            Ok(Value::seq([Value::int(20), Value::int(30)]))
        );
        assert_eq!(run("indices", vec![s]), Ok(ints(&[0, 1, 2])));
        assert_eq!(
            run("range", vec![Value::int(0), Value::int(3)]),
            Ok(Value::seq([Value::int(0), Value::int(1), Value::int(2)]))
        );
    }

    #[test]
    fn tuples_are_one_based_and_records_update_existing_fields() {
        let t = Value::tuple([Value::str("x"), Value::int(2)]);
        assert_eq!(run("item", vec![t.clone(), Value::int(1)]), Ok(Value::str("x")));
        assert!(run("item", vec![t, Value::int(0)]).is_err());

        let r = Value::record([("a", Value::int(1))]);
        assert_eq!(
            run("with", vec![r.clone(), Value::str("a"), Value::int(2)]),
            Ok(Value::record([("a", Value::int(2))]))
        );
        assert!(matches!(
            run("with", vec![r, Value::str("b"), Value::int(2)]),
            Err(EvalError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn strings() {
        assert_eq!(
            run("strConcat", vec![Value::str("ab"), Value::str("c")]),
            Ok(Value::str("abc"))
        );
        assert_eq!(run("strLength", vec![Value::str("abc")]), Ok(Value::int(3)));
    }

    #[test]
    fn operand_shapes_are_checked() {
        assert_eq!(
            run("iadd", vec![Value::int(1), Value::Bool(true)]),
            Err(EvalError::TypeMismatch {
                context: "iadd".to_string(),
                expected: "Int".to_string(),
                found: "Bool".to_string(),
            })
        );
        assert!(run("union", vec![ints(&[1]), Value::seq([])]).is_err());
    }
}
