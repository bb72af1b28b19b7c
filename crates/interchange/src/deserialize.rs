//! Deserialization from resolved-program bundles into typed structs.
//!
//! The main entry point is [`from_interchange`], which takes a
//! `&serde_json::Value` and produces an [`InterchangeBundle`].

use crate::types::*;
use std::fmt;

/// Errors during bundle deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The bundle is missing a required top-level field.
    MissingField { field: String },
    /// A module is malformed.
    ModuleError { module: String, message: String },
    /// A construct is missing a required field or has a malformed body.
    ConstructError {
        kind: String,
        name: String,
        message: String,
    },
    /// The bundle structure is invalid.
    InvalidBundle(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "bundle missing required field: '{}'", field)
            }
            InterchangeError::ModuleError { module, message } => {
                write!(f, "module '{}': {}", module, message)
            }
            InterchangeError::ConstructError {
                kind,
                name,
                message,
            } => {
                write!(f, "{} '{}': {}", kind, name, message)
            }
            InterchangeError::InvalidBundle(msg) => {
                write!(f, "invalid bundle: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize a resolved-program bundle into typed structs.
///
/// Walks the `modules` array, then each module's `constructs` array,
/// dispatching on the `kind` field. Unknown construct kinds are silently
/// skipped for forward compatibility.
pub fn from_interchange(bundle: &serde_json::Value) -> Result<InterchangeBundle, InterchangeError> {
    let id = bundle
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "id".to_string(),
        })?
        .to_string();

    let format = bundle
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let format_version = bundle
        .get("format_version")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let modules_arr = bundle
        .get("modules")
        .and_then(|m| m.as_array())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "modules".to_string(),
        })?;

    let modules = modules_arr
        .iter()
        .map(parse_module)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InterchangeBundle {
        id,
        format,
        format_version,
        modules,
    })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn required_str(obj: &serde_json::Value, field: &str) -> Result<String, InterchangeError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| InterchangeError::InvalidBundle(format!("missing '{}' field", field)))
}

fn parse_module(obj: &serde_json::Value) -> Result<ModuleConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;

    let init = obj
        .get("init")
        .and_then(|v| v.as_str())
        .unwrap_or("init")
        .to_string();
    let step = obj
        .get("step")
        .and_then(|v| v.as_str())
        .unwrap_or("step")
        .to_string();

    let constructs_arr = obj
        .get("constructs")
        .and_then(|c| c.as_array())
        .ok_or_else(|| InterchangeError::ModuleError {
            module: name.clone(),
            message: "missing 'constructs' array".to_string(),
        })?;

    let mut constructs = Vec::with_capacity(constructs_arr.len());

    for obj in constructs_arr {
        let kind = obj.get("kind").and_then(|k| k.as_str()).unwrap_or("");

        let construct = match kind {
            "Var" => Some(InterchangeConstruct::Var(parse_var(obj)?)),
            "Const" => Some(InterchangeConstruct::Const(parse_const(obj)?)),
            "Def" => Some(InterchangeConstruct::Def(parse_def(obj)?)),
            "Action" => Some(InterchangeConstruct::Action(parse_action(obj)?)),
            "Invariant" => Some(InterchangeConstruct::Invariant(parse_invariant(obj)?)),
            "Temporal" => Some(InterchangeConstruct::Temporal(parse_temporal(obj)?)),
            "Run" => Some(InterchangeConstruct::Run(parse_run(obj)?)),
            _ => None, // Skip unknown kinds for forward compatibility
        };

        if let Some(c) = construct {
            constructs.push(c);
        }
    }

    Ok(ModuleConstruct {
        name,
        init,
        step,
        constructs,
    })
}

/// Deserialize a nested tree field (expression, action, type...) with serde,
/// attributing failures to the enclosing construct.
fn typed_field<T: serde::de::DeserializeOwned>(
    obj: &serde_json::Value,
    kind: &str,
    name: &str,
    field: &str,
) -> Result<T, InterchangeError> {
    let raw = obj
        .get(field)
        .ok_or_else(|| InterchangeError::ConstructError {
            kind: kind.to_string(),
            name: name.to_string(),
            message: format!("missing '{}' field", field),
        })?;
    serde_json::from_value(raw.clone()).map_err(|e| InterchangeError::ConstructError {
        kind: kind.to_string(),
        name: name.to_string(),
        message: format!("malformed '{}': {}", field, e),
    })
}

fn parse_params(obj: &serde_json::Value) -> Vec<String> {
    obj.get("params")
        .and_then(|p| p.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

fn parse_var(obj: &serde_json::Value) -> Result<VarConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let var_type = if obj.get("type").is_some() {
        typed_field(obj, "Var", &name, "type")?
    } else {
        TypeExpr::Any
    };
    Ok(VarConstruct { name, var_type })
}

fn parse_const(obj: &serde_json::Value) -> Result<ConstConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let const_type = if obj.get("type").is_some() {
        typed_field(obj, "Const", &name, "type")?
    } else {
        TypeExpr::Any
    };
    let value = match obj.get("value") {
        Some(v) if !v.is_null() => Some(typed_field(obj, "Const", &name, "value")?),
        _ => None,
    };
    Ok(ConstConstruct {
        name,
        const_type,
        value,
    })
}

fn parse_def(obj: &serde_json::Value) -> Result<DefConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let params = parse_params(obj);
    let body = typed_field(obj, "Def", &name, "body")?;
    Ok(DefConstruct { name, params, body })
}

fn parse_action(obj: &serde_json::Value) -> Result<ActionConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let params = parse_params(obj);
    let body = typed_field(obj, "Action", &name, "body")?;
    Ok(ActionConstruct { name, params, body })
}

fn parse_invariant(obj: &serde_json::Value) -> Result<InvariantConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let pred = typed_field(obj, "Invariant", &name, "pred")?;
    Ok(InvariantConstruct { name, pred })
}

fn parse_temporal(obj: &serde_json::Value) -> Result<TemporalConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let formula = typed_field(obj, "Temporal", &name, "formula")?;
    Ok(TemporalConstruct { name, formula })
}

fn parse_run(obj: &serde_json::Value) -> Result<RunConstruct, InterchangeError> {
    let name = required_str(obj, "name")?;
    let run = typed_field(obj, "Run", &name, "run")?;
    Ok(RunConstruct { name, run })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_bundle(constructs: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "id": "test-bundle",
            "format": "cadence-ir",
            "format_version": "1.0",
            "modules": [{
                "name": "Main",
                "constructs": constructs
            }]
        })
    }

    #[test]
    fn test_empty_module() {
        let bundle = make_bundle(vec![]);
        let result = from_interchange(&bundle).unwrap();
        assert_eq!(result.id, "test-bundle");
        assert_eq!(result.format, "cadence-ir");
        assert_eq!(result.format_version, "1.0");
        assert_eq!(result.modules.len(), 1);
        let module = result.module("Main").unwrap();
        assert_eq!(module.init, "init");
        assert_eq!(module.step, "step");
        assert!(module.constructs.is_empty());
    }

    #[test]
    fn test_missing_modules_array() {
        let bundle = json!({"id": "test"});
        match from_interchange(&bundle).unwrap_err() {
            InterchangeError::MissingField { field } => assert_eq!(field, "modules"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_bundle_id() {
        let bundle = json!({"modules": []});
        match from_interchange(&bundle).unwrap_err() {
            InterchangeError::MissingField { field } => assert_eq!(field, "id"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_module_without_constructs() {
        let bundle = json!({"id": "b", "modules": [{"name": "M"}]});
        match from_interchange(&bundle).unwrap_err() {
            InterchangeError::ModuleError { module, .. } => assert_eq!(module, "M"),
            other => panic!("expected ModuleError, got {:?}", other),
        }
    }

    #[test]
    fn test_var_with_structured_type() {
        let bundle = make_bundle(vec![json!({
            "kind": "Var",
            "name": "balances",
            "type": {
                "kind": "map",
                "key": { "kind": "str" },
                "value": { "kind": "int" }
            }
        })]);
        let result = from_interchange(&bundle).unwrap();
        match &result.modules[0].constructs[0] {
            InterchangeConstruct::Var(v) => {
                assert_eq!(v.name, "balances");
                assert_eq!(
                    v.var_type,
                    TypeExpr::Map {
                        key: Box::new(TypeExpr::Str),
                        value: Box::new(TypeExpr::Int),
                    }
                );
            }
            other => panic!("expected Var, got {:?}", other),
        }
    }

    #[test]
    fn test_var_without_type_is_any() {
        let bundle = make_bundle(vec![json!({"kind": "Var", "name": "x"})]);
        let result = from_interchange(&bundle).unwrap();
        match &result.modules[0].constructs[0] {
            InterchangeConstruct::Var(v) => assert_eq!(v.var_type, TypeExpr::Any),
            other => panic!("expected Var, got {:?}", other),
        }
    }

    #[test]
    fn test_big_int_literal_from_string() {
        let bundle = make_bundle(vec![json!({
            "kind": "Const",
            "name": "BIG",
            "value": { "kind": "int", "value": "123456789012345678901234567890" }
        })]);
        let result = from_interchange(&bundle).unwrap();
        match &result.modules[0].constructs[0] {
            InterchangeConstruct::Const(c) => match &c.value {
                Some(Expr::Int {
                    value: IntLiteral::Big(s),
                }) => assert_eq!(s, "123456789012345678901234567890"),
                other => panic!("expected big int literal, got {:?}", other),
            },
            other => panic!("expected Const, got {:?}", other),
        }
    }

    #[test]
    fn test_const_without_value() {
        let bundle = make_bundle(vec![json!({"kind": "Const", "name": "N", "value": null})]);
        let result = from_interchange(&bundle).unwrap();
        match &result.modules[0].constructs[0] {
            InterchangeConstruct::Const(c) => assert!(c.value.is_none()),
            other => panic!("expected Const, got {:?}", other),
        }
    }

    #[test]
    fn test_action_body_tree() {
        let bundle = make_bundle(vec![json!({
            "kind": "Action",
            "name": "step",
            "body": {
                "kind": "any",
                "actions": [
                    {
                        "kind": "all",
                        "actions": [
                            { "kind": "guard", "cond": { "kind": "app", "op": "ilt", "args": [
                                { "kind": "name", "name": "x" },
                                { "kind": "int", "value": 3 }
                            ]}},
                            { "kind": "assign", "var": "x", "value": { "kind": "app", "op": "iadd", "args": [
                                { "kind": "name", "name": "x" },
                                { "kind": "int", "value": 1 }
                            ]}}
                        ]
                    },
                    { "kind": "stutter" }
                ]
            }
        })]);
        let result = from_interchange(&bundle).unwrap();
        match &result.modules[0].constructs[0] {
            InterchangeConstruct::Action(a) => {
                assert!(a.params.is_empty());
                match &a.body {
                    ActionExpr::Any { actions } => {
                        assert_eq!(actions.len(), 2);
                        assert_eq!(actions[1], ActionExpr::Stutter);
                    }
                    other => panic!("expected any, got {:?}", other),
                }
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_if_uses_then_else_keys() {
        let expr: Expr = serde_json::from_value(json!({
            "kind": "if",
            "cond": { "kind": "bool", "value": true },
            "then": { "kind": "int", "value": 1 },
            "else": { "kind": "int", "value": 2 }
        }))
        .unwrap();
        match expr {
            Expr::If { then_branch, .. } => assert_eq!(
                *then_branch,
                Expr::Int {
                    value: IntLiteral::Small(1)
                }
            ),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_body_names_construct() {
        let bundle = make_bundle(vec![json!({
            "kind": "Def",
            "name": "broken",
            "body": { "kind": "no_such_expr" }
        })]);
        match from_interchange(&bundle).unwrap_err() {
            InterchangeError::ConstructError { kind, name, .. } => {
                assert_eq!(kind, "Def");
                assert_eq!(name, "broken");
            }
            other => panic!("expected ConstructError, got {:?}", other),
        }
    }

    #[test]
    fn test_run_and_temporal_constructs() {
        let bundle = make_bundle(vec![
            json!({
                "kind": "Run",
                "name": "twoSteps",
                "run": {
                    "kind": "then",
                    "runs": [
                        { "kind": "step", "action": { "kind": "call", "name": "init" } },
                        { "kind": "reps", "times": 2, "body":
                            { "kind": "step", "action": { "kind": "call", "name": "step" } } }
                    ]
                }
            }),
            json!({
                "kind": "Temporal",
                "name": "converges",
                "formula": { "kind": "eventually", "pred": { "kind": "bool", "value": true } }
            }),
        ]);
        let result = from_interchange(&bundle).unwrap();
        let constructs = &result.modules[0].constructs;
        assert_eq!(constructs[0].kind(), "Run");
        assert_eq!(constructs[0].name(), "twoSteps");
        assert_eq!(constructs[1].kind(), "Temporal");
    }

    #[test]
    fn test_unknown_kinds_skipped() {
        let bundle = make_bundle(vec![
            json!({"kind": "Assumption", "name": "a"}),
            json!({"kind": "Var", "name": "x", "type": {"kind": "int"}}),
        ]);
        let result = from_interchange(&bundle).unwrap();
        assert_eq!(result.modules[0].constructs.len(), 1);
    }

    #[test]
    fn test_custom_init_and_step_names() {
        let bundle = json!({
            "id": "b",
            "modules": [{ "name": "M", "init": "Init", "step": "Next", "constructs": [] }]
        });
        let result = from_interchange(&bundle).unwrap();
        assert_eq!(result.modules[0].init, "Init");
        assert_eq!(result.modules[0].step, "Next");
    }
}
