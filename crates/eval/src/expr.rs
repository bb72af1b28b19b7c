//! Pure expression evaluation.
//!
//! Expressions read the environment, the current state and the module's
//! constants and definitions. Inside an action they may also read primed
//! variables already assigned in the candidate next state. Evaluation is
//! plain recursion; it never mutates anything it is given.

use std::sync::Arc;

use tracing::trace;

use crate::env::Env;
use crate::ops::{self, Builtin};
use crate::state::State;
use crate::types::{
    Arm, Closure, EvalError, EvalResult, Expr, LambdaDef, Program, Value,
};

/// What an expression can see besides its environment.
#[derive(Clone, Copy)]
pub(crate) struct Frame<'s> {
    pub state: &'s State,
    /// Candidate next state, present only while executing an action.
    pub next: Option<&'s State>,
}

/// Expression evaluator bound to one program.
#[derive(Clone, Copy)]
pub struct Evaluator<'p> {
    program: &'p Program,
}

impl<'p> Evaluator<'p> {
    pub fn new(program: &'p Program) -> Self {
        Evaluator { program }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Evaluate a pure expression against `state`.
    pub fn eval(&self, expr: &Expr, env: &Env, state: &State) -> EvalResult<Value> {
        self.eval_in(expr, env, Frame { state, next: None })
    }

    /// Evaluate a predicate, requiring a Bool result.
    pub fn eval_bool(&self, expr: &Expr, env: &Env, state: &State) -> EvalResult<bool> {
        self.eval(expr, env, state)?.as_bool("predicate")
    }

    pub(crate) fn eval_in(&self, expr: &Expr, env: &Env, frame: Frame<'_>) -> EvalResult<Value> {
        match expr {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Name(name) => self.lookup(name, env, frame),
            Expr::Next(name) => frame
                .next
                .and_then(|next| next.get(name))
                .cloned()
                .ok_or_else(|| EvalError::UnboundName {
                    name: format!("{}'", name),
                }),
            Expr::Builtin { op, args } => self.eval_builtin(*op, args, env, frame),
            Expr::Call { name, args } => {
                let args = self.eval_args(args, env, frame)?;
                self.call(name, args, env, frame)
            }
            Expr::Apply { callee, args } => {
                let callee = self.eval_in(callee, env, frame)?;
                let args = self.eval_args(args, env, frame)?;
                self.apply_value(&callee, args, frame)
            }
            Expr::Lambda(def) => Ok(Value::Lambda(Arc::new(Closure {
                def: Arc::clone(def),
                env: env.clone(),
            }))),
            Expr::Let { name, value, body } => {
                let v = self.eval_in(value, env, frame)?;
                self.eval_in(body, &env.bind(name.as_str(), v), frame)
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_in(cond, env, frame)?.as_bool("if")? {
                    self.eval_in(then_branch, env, frame)
                } else {
                    self.eval_in(else_branch, env, frame)
                }
            }
            Expr::Tuple(elems) => Ok(Value::Tuple(
                self.eval_args(elems, env, frame)?.into_iter().collect(),
            )),
            Expr::List(elems) => Ok(Value::Seq(
                self.eval_args(elems, env, frame)?.into_iter().collect(),
            )),
            Expr::Set(elems) => Ok(Value::Set(
                self.eval_args(elems, env, frame)?.into_iter().collect(),
            )),
            Expr::Record(fields) => {
                let mut out = im::OrdMap::new();
                for (name, e) in fields {
                    out.insert(name.clone(), self.eval_in(e, env, frame)?);
                }
                Ok(Value::Record(out))
            }
            Expr::Map(entries) => {
                let mut out = im::OrdMap::new();
                for (k, v) in entries {
                    let key = self.eval_in(k, env, frame)?;
                    out.insert(key, self.eval_in(v, env, frame)?);
                }
                Ok(Value::Map(out))
            }
            Expr::Variant { tag, payload } => {
                let payload = match payload {
                    Some(p) => self.eval_in(p, env, frame)?,
                    None => Value::unit(),
                };
                Ok(Value::variant(tag, payload))
            }
            Expr::Field { record, field } => {
                let value = self.eval_in(record, env, frame)?;
                value
                    .as_record("field access")?
                    .get(field)
                    .cloned()
                    .ok_or_else(|| EvalError::KeyNotFound { key: field.clone() })
            }
            Expr::Match { scrutinee, arms } => {
                let value = self.eval_in(scrutinee, env, frame)?;
                let (arm, env) = select_arm(arms, &value, env)?;
                self.eval_in(&arm.body, &env, frame)
            }
        }
    }

    fn eval_args(&self, args: &[Expr], env: &Env, frame: Frame<'_>) -> EvalResult<Vec<Value>> {
        args.iter().map(|a| self.eval_in(a, env, frame)).collect()
    }

    /// Local binders, then state variables, then constants, then
    /// definitions.
    fn lookup(&self, name: &str, env: &Env, frame: Frame<'_>) -> EvalResult<Value> {
        if let Some(v) = env.lookup(name) {
            return Ok(v.clone());
        }
        if self.program.is_variable(name) {
            return frame.state.get(name).cloned().ok_or_else(|| EvalError::UnboundName {
                name: name.to_string(),
            });
        }
        if let Some(v) = self.program.get_constant(name) {
            return Ok(v.clone());
        }
        if let Some(def) = self.program.get_def(name) {
            if def.params().is_empty() {
                return self.eval_in(&def.lambda.body, &Env::new(), frame);
            }
            return Ok(Value::Lambda(Arc::new(Closure {
                def: Arc::clone(&def.lambda),
                env: Env::new(),
            })));
        }
        Err(EvalError::UnboundName {
            name: name.to_string(),
        })
    }

    /// Apply the operator named `name`: a lambda in scope, else a module
    /// definition, else a constant or variable holding a lambda.
    fn call(&self, name: &str, args: Vec<Value>, env: &Env, frame: Frame<'_>) -> EvalResult<Value> {
        if let Some(v) = env.lookup(name) {
            return self.apply_value(v, args, frame);
        }
        if let Some(def) = self.program.get_def(name) {
            trace!(def = name, "calling definition");
            return self.apply_lambda(name, &def.lambda, &Env::new(), args, frame);
        }
        let callee = self.lookup(name, env, frame)?;
        self.apply_value(&callee, args, frame)
    }

    fn apply_value(&self, callee: &Value, args: Vec<Value>, frame: Frame<'_>) -> EvalResult<Value> {
        let closure = callee.as_lambda("application")?;
        self.apply_lambda("lambda", &closure.def, &closure.env, args, frame)
    }

    /// Bind `args` to the parameters in a fresh child of the definition
    /// environment and evaluate the body.
    fn apply_lambda(
        &self,
        name: &str,
        def: &LambdaDef,
        env: &Env,
        args: Vec<Value>,
        frame: Frame<'_>,
    ) -> EvalResult<Value> {
        if def.params.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                name: name.to_string(),
                expected: def.params.len(),
                got: args.len(),
            });
        }
        let scope = env.bind_all(def.params.iter().cloned().zip(args));
        self.eval_in(&def.body, &scope, frame)
    }

    fn eval_builtin(
        &self,
        op: Builtin,
        args: &[Expr],
        env: &Env,
        frame: Frame<'_>,
    ) -> EvalResult<Value> {
        match op {
            Builtin::And | Builtin::Or => {
                let short = op == Builtin::Or;
                for a in args {
                    if self.eval_in(a, env, frame)?.as_bool(op.name())? == short {
                        return Ok(Value::Bool(short));
                    }
                }
                Ok(Value::Bool(!short))
            }
            Builtin::Implies if args.len() == 2 => {
                if !self.eval_in(&args[0], env, frame)?.as_bool("implies")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_in(&args[1], env, frame)?.as_bool("implies")?))
            }
            _ => {
                let values = self.eval_args(args, env, frame)?;
                let call = |f: &Value, xs: Vec<Value>| self.apply_value(f, xs, frame);
                ops::apply(op, &values, &call)
            }
        }
    }
}

/// Pick the arm for `value`'s tag (or the `_` arm) and bind its payload.
pub(crate) fn select_arm<'a, B>(
    arms: &'a [Arm<B>],
    value: &Value,
    env: &Env,
) -> EvalResult<(&'a Arm<B>, Env)> {
    let (tag, payload) = value.as_variant("match")?;
    let arm = arms
        .iter()
        .find(|arm| arm.tag == tag)
        .or_else(|| arms.iter().find(|arm| arm.is_default()))
        .ok_or_else(|| EvalError::UnmatchedVariant {
            tag: tag.to_string(),
        })?;
    let env = match &arm.binder {
        Some(binder) if !arm.is_default() => env.bind(binder.as_str(), payload.clone()),
        Some(binder) => env.bind(binder.as_str(), value.clone()),
        None => env.clone(),
    };
    Ok((arm, env))
}
