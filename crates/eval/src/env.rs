//! Lexical environments.
//!
//! An [`Env`] is a persistent chain of scopes. Binding a name creates a new
//! child scope that points at its parent; the parent is never touched, so
//! an environment captured by a closure or held by a sibling branch of an
//! `any` stays valid for as long as anyone references it.

use std::fmt;
use std::sync::Arc;

use crate::types::Value;

struct Scope {
    bindings: Vec<(String, Value)>,
    parent: Option<Arc<Scope>>,
}

/// Immutable name-to-value mapping with scoped extension.
#[derive(Clone, Default)]
pub struct Env {
    head: Option<Arc<Scope>>,
}

impl Env {
    pub fn new() -> Self {
        Env { head: None }
    }

    /// A child environment with `name` bound to `value`.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Env {
        self.bind_all(std::iter::once((name.into(), value)))
    }

    /// A child environment binding all pairs in one scope. Later pairs
    /// shadow earlier ones with the same name.
    pub fn bind_all(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Env {
        Env {
            head: Some(Arc::new(Scope {
                bindings: bindings.into_iter().collect(),
                parent: self.head.clone(),
            })),
        }
    }

    /// Innermost binding of `name`, walking outward through parent scopes.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut scope = self.head.as_deref();
        while let Some(s) = scope {
            if let Some((_, v)) = s.bindings.iter().rev().find(|(n, _)| n == name) {
                return Some(v);
            }
            scope = s.parent.as_deref();
        }
        None
    }

    /// Every binding, innermost scope first, including shadowed ones.
    pub(crate) fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        let mut scope = self.head.as_deref();
        std::iter::from_fn(move || {
            let s = scope?;
            scope = s.parent.as_deref();
            Some(s.bindings.iter().rev())
        })
        .flatten()
        .map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut scope = self.head.as_deref();
        while let Some(s) = scope {
            for (name, value) in &s.bindings {
                list.entry(&format_args!("{} = {}", name, value));
            }
            scope = s.parent.as_deref();
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_shadows_without_mutating_parent() {
        let outer = Env::new().bind("x", Value::int(1));
        let inner = outer.bind("x", Value::int(2));
        assert_eq!(inner.lookup("x"), Some(&Value::int(2)));
        assert_eq!(outer.lookup("x"), Some(&Value::int(1)));
    }

    #[test]
    fn lookup_walks_outward() {
        let env = Env::new()
            .bind("a", Value::int(1))
            .bind("b", Value::int(2))
            .bind("c", Value::int(3));
        assert_eq!(env.lookup("a"), Some(&Value::int(1)));
        assert_eq!(env.lookup("missing"), None);
        assert!(Env::new().is_empty());
    }

    #[test]
    fn bind_all_later_pairs_win() {
        let env = Env::new().bind_all(vec![
            ("p".to_string(), Value::int(1)),
            ("p".to_string(), Value::int(2)),
        ]);
        assert_eq!(env.lookup("p"), Some(&Value::int(2)));
    }

    #[test]
    fn env_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Env>();
        assert_send_sync::<Value>();
    }
}
