//! Conformance of runtime values to declared types.

use cadence_interchange::TypeExpr;

use super::values::Value;

/// True when `value` inhabits `ty`. `Any` accepts everything; operator
/// types only check the parameter count.
pub fn conforms(value: &Value, ty: &TypeExpr) -> bool {
    match (ty, value) {
        (TypeExpr::Any, _) => true,
        (TypeExpr::Bool, Value::Bool(_)) => true,
        (TypeExpr::Int, Value::Int(_)) => true,
        (TypeExpr::Str, Value::Str(_)) => true,
        (TypeExpr::Set { elem }, Value::Set(elems)) => elems.iter().all(|v| conforms(v, elem)),
        (TypeExpr::List { elem }, Value::Seq(elems)) => elems.iter().all(|v| conforms(v, elem)),
        (TypeExpr::Map { key, value: val }, Value::Map(entries)) => entries
            .iter()
            .all(|(k, v)| conforms(k, key) && conforms(v, val)),
        (TypeExpr::Tuple { elems: tys }, Value::Tuple(elems)) => {
            tys.len() == elems.len() && elems.iter().zip(tys).all(|(v, t)| conforms(v, t))
        }
        (TypeExpr::Record { fields: tys }, Value::Record(fields)) => {
            tys.len() == fields.len()
                && tys
                    .iter()
                    .all(|(name, t)| fields.get(name).is_some_and(|v| conforms(v, t)))
        }
        (TypeExpr::Sum { variants }, Value::Variant { tag, payload }) => {
            match variants.get(tag.as_ref()) {
                Some(t) => conforms(payload, t),
                None => false,
            }
        }
        (TypeExpr::Fun { params, .. }, Value::Lambda(c)) => c.def.params.len() == params.len(),
        _ => false,
    }
}

/// Short rendering of a type for error messages.
pub fn describe(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Bool => "bool".to_string(),
        TypeExpr::Int => "int".to_string(),
        TypeExpr::Str => "str".to_string(),
        TypeExpr::Set { elem } => format!("Set[{}]", describe(elem)),
        TypeExpr::List { elem } => format!("List[{}]", describe(elem)),
        TypeExpr::Map { key, value } => format!("{} -> {}", describe(key), describe(value)),
        TypeExpr::Tuple { elems } => format!(
            "({})",
            elems.iter().map(describe).collect::<Vec<_>>().join(", ")
        ),
        TypeExpr::Record { fields } => format!(
            "{{ {} }}",
            fields
                .iter()
                .map(|(n, t)| format!("{}: {}", n, describe(t)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        TypeExpr::Sum { variants } => variants.keys().cloned().collect::<Vec<_>>().join(" | "),
        TypeExpr::Fun { params, result } => format!(
            "({}) => {}",
            params.iter().map(describe).collect::<Vec<_>>().join(", "),
            describe(result)
        ),
        TypeExpr::Any => "any".to_string(),
    }
}
