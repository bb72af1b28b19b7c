//! Lossless JSON encoding of values, states and traces.
//!
//! Follows the Informal Trace Format conventions: integers are
//! `{"#bigint": "<decimal>"}`, tuples `{"#tup": [...]}`, sets `{"#set": [...]}`,
//! maps `{"#map": [[k, v], ...]}`, sequences plain arrays, records plain
//! objects and variants `{"tag": t, "value": v}`. Decoding accepts the
//! same shapes, plus bare JSON integers for convenience on the command line.

use im::OrdMap;
use num_bigint::BigInt;
use serde::ser::{Error as _, Serialize, Serializer};
use serde_json::{json, Map as JsonMap, Value as Json};

use crate::state::{State, Trace};
use crate::types::{EvalError, EvalResult, Program, Value};

pub fn value_to_json(value: &Value) -> EvalResult<Json> {
    Ok(match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => json!({ "#bigint": n.to_string() }),
        Value::Str(s) => Json::String(s.to_string()),
        Value::Tuple(elems) => json!({ "#tup": encode_all(elems.iter())? }),
        Value::Set(elems) => json!({ "#set": encode_all(elems.iter())? }),
        Value::Seq(elems) => Json::Array(encode_all(elems.iter())?),
        Value::Map(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in entries.iter() {
                pairs.push(Json::Array(vec![value_to_json(k)?, value_to_json(v)?]));
            }
            json!({ "#map": pairs })
        }
        Value::Record(fields) => {
            let mut obj = JsonMap::new();
            for (name, v) in fields.iter() {
                obj.insert(name.clone(), value_to_json(v)?);
            }
            Json::Object(obj)
        }
        Value::Variant { tag, payload } => {
            json!({ "tag": tag.to_string(), "value": value_to_json(payload)? })
        }
        Value::Lambda(_) => {
            return Err(EvalError::NotEncodable {
                message: "operator closures have no trace encoding".to_string(),
            })
        }
    })
}

fn encode_all<'a>(values: impl Iterator<Item = &'a Value>) -> EvalResult<Vec<Json>> {
    values.map(value_to_json).collect()
}

pub fn value_from_json(json: &Json) -> EvalResult<Value> {
    match json {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => Ok(Value::int(i)),
            (None, Some(u)) => Ok(Value::int(u)),
            _ => Err(not_decodable(json, "integers must be whole numbers")),
        },
        Json::String(s) => Ok(Value::str(s)),
        Json::Array(items) => Ok(Value::Seq(decode_all(items)?.into_iter().collect())),
        Json::Object(obj) => {
            if let Some(special) = decode_special(obj)? {
                return Ok(special);
            }
            let mut fields = OrdMap::new();
            for (name, v) in obj {
                fields.insert(name.clone(), value_from_json(v)?);
            }
            Ok(Value::Record(fields))
        }
        Json::Null => Err(not_decodable(json, "null has no value encoding")),
    }
}

fn decode_all(items: &[Json]) -> EvalResult<Vec<Value>> {
    items.iter().map(value_from_json).collect()
}

/// Decode the `#`-tagged and variant shapes; `None` for plain records.
fn decode_special(obj: &JsonMap<String, Json>) -> EvalResult<Option<Value>> {
    if obj.len() == 1 {
        if let Some(n) = obj.get("#bigint") {
            let digits = n
                .as_str()
                .ok_or_else(|| not_decodable(n, "#bigint expects a decimal string"))?;
            let parsed: BigInt = digits
                .parse()
                .map_err(|_| not_decodable(n, "malformed #bigint"))?;
            return Ok(Some(Value::Int(parsed)));
        }
        if let Some(items) = obj.get("#tup") {
            return Ok(Some(Value::Tuple(array(items, "#tup")?.into_iter().collect())));
        }
        if let Some(items) = obj.get("#set") {
            return Ok(Some(Value::Set(array(items, "#set")?.into_iter().collect())));
        }
        if let Some(pairs) = obj.get("#map") {
            let pairs = pairs
                .as_array()
                .ok_or_else(|| not_decodable(pairs, "#map expects an array of pairs"))?;
            let mut out = OrdMap::new();
            for pair in pairs {
                match pair.as_array().map(Vec::as_slice) {
                    Some([k, v]) => {
                        out.insert(value_from_json(k)?, value_from_json(v)?);
                    }
                    _ => return Err(not_decodable(pair, "#map entries are [key, value]")),
                }
            }
            return Ok(Some(Value::Map(out)));
        }
    }
    if obj.len() == 2 {
        if let (Some(Json::String(tag)), Some(payload)) = (obj.get("tag"), obj.get("value")) {
            return Ok(Some(Value::variant(tag, value_from_json(payload)?)));
        }
    }
    Ok(None)
}

fn array(json: &Json, key: &str) -> EvalResult<Vec<Value>> {
    let items = json
        .as_array()
        .ok_or_else(|| not_decodable(json, &format!("{} expects an array", key)))?;
    decode_all(items)
}

fn not_decodable(json: &Json, why: &str) -> EvalError {
    EvalError::NotEncodable {
        message: format!("{}: {}", why, json),
    }
}

pub fn state_to_json(state: &State) -> EvalResult<Json> {
    let mut obj = JsonMap::new();
    for (name, value) in state.iter() {
        obj.insert(name.clone(), value_to_json(value)?);
    }
    Ok(Json::Object(obj))
}

/// Encode the states of a trace, each with a `#meta` entry carrying its
/// index and the action that produced it.
pub fn states_to_json(trace: &Trace) -> EvalResult<Vec<Json>> {
    let mut states = Vec::with_capacity(trace.len());
    for (index, entry) in trace.entries().iter().enumerate() {
        let mut obj = JsonMap::new();
        obj.insert(
            "#meta".to_string(),
            json!({ "index": index, "action": entry.action }),
        );
        if let Json::Object(vars) = state_to_json(&entry.state)? {
            obj.extend(vars);
        }
        states.push(Json::Object(obj));
    }
    Ok(states)
}

/// Encode a full trace document for `program`.
pub fn trace_to_json(program: &Program, trace: &Trace) -> EvalResult<Json> {
    let vars: Vec<&str> = program.var_names().collect();
    Ok(json!({
        "#meta": {
            "format": "ITF",
            "source": program.name,
        },
        "vars": vars,
        "states": states_to_json(trace)?,
    }))
}

// Reports embed values, states and traces; they serialize through the
// trace encoding above.

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        value_to_json(self)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        state_to_json(self)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl Serialize for Trace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        states_to_json(self)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::record([
            ("n", Value::int(-12)),
            ("flag", Value::Bool(true)),
            ("name", Value::str("alice")),
            ("pair", Value::tuple([Value::int(1), Value::str("x")])),
            ("s", Value::set([Value::int(2), Value::int(1)])),
            ("m", Value::map([(Value::str("k"), Value::seq([Value::int(3)]))])),
            ("v", Value::variant("Some", Value::int(5))),
            ("u", Value::variant("None", Value::unit())),
        ])
    }

    #[test]
    fn encodes_itf_shapes() {
        let json = value_to_json(&sample()).unwrap();
        assert_eq!(json["n"], json!({ "#bigint": "-12" }));
        assert_eq!(json["pair"], json!({ "#tup": [{ "#bigint": "1" }, "x"] }));
        assert_eq!(json["s"], json!({ "#set": [{ "#bigint": "1" }, { "#bigint": "2" }] }));
        assert_eq!(json["m"], json!({ "#map": [["k", [{ "#bigint": "3" }]]] }));
        assert_eq!(json["v"], json!({ "tag": "Some", "value": { "#bigint": "5" } }));
        assert_eq!(json["u"], json!({ "tag": "None", "value": { "#tup": [] } }));
    }

    #[test]
    fn decodes_what_it_encodes() {
        let v = sample();
        assert_eq!(value_from_json(&value_to_json(&v).unwrap()), Ok(v));
    }

    #[test]
    fn decodes_plain_numbers_and_huge_bigints() {
        assert_eq!(value_from_json(&json!(7)), Ok(Value::int(7)));
        let big = value_from_json(&json!({ "#bigint": "99999999999999999999999" })).unwrap();
        assert_eq!(big.to_string(), "99999999999999999999999");
        assert!(value_from_json(&json!(1.5)).is_err());
        assert!(value_from_json(&json!(null)).is_err());
        assert!(value_from_json(&json!({ "#map": [[1]] })).is_err());
    }

    #[test]
    fn traces_serialize_with_meta() {
        let trace: Trace = [
            ("init", State::from_pairs([("x", Value::int(0))])),
            ("step", State::from_pairs([("x", Value::int(1))])),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(
            json,
            json!([
                { "#meta": { "index": 0, "action": "init" }, "x": { "#bigint": "0" } },
                { "#meta": { "index": 1, "action": "step" }, "x": { "#bigint": "1" } }
            ])
        );
    }

    #[test]
    fn lambdas_do_not_encode() {
        use crate::env::Env;
        use crate::types::{Closure, Expr, LambdaDef};
        use std::sync::Arc;

        let lambda = Value::Lambda(Arc::new(Closure {
            def: Arc::new(LambdaDef {
                id: 0,
                params: vec!["x".to_string()],
                body: Expr::Name("x".to_string()),
            }),
            env: Env::new(),
        }));
        assert!(matches!(
            value_to_json(&lambda),
            Err(EvalError::NotEncodable { .. })
        ));
    }
}
