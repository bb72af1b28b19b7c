//! Action execution.
//!
//! An action relates the current state to a candidate next state. The
//! executor walks the action tree, accumulating primed assignments into the
//! candidate, and reports one of three outcomes: the completed next state,
//! a guard failure (the action is disabled here), or an evaluation error.
//! Guard failures are values; only errors travel through `Err`.

use std::collections::BTreeSet;

use tracing::trace;

use crate::choice::{next_script, ChoiceSource, ScriptedChoices};
use crate::env::Env;
use crate::expr::{select_arm, Evaluator, Frame};
use crate::state::State;
use crate::types::ty::describe;
use crate::types::{conforms, Action, EvalError, EvalResult, Expr, Program, Value};

/// Result of executing a whole action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Every declared variable was assigned; this is the next state.
    Success(State),
    /// Some guard evaluated to false.
    GuardFailed,
}

impl ActionOutcome {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ActionOutcome::Success(_))
    }
}

/// Partial result while walking an action tree.
enum Branch {
    Taken(State),
    Blocked,
}

/// All states reachable by one action from one state.
#[derive(Debug, Clone)]
pub struct Successors {
    pub states: BTreeSet<State>,
    /// Number of choice sequences replayed.
    pub explored: usize,
    /// True when the exploration bound stopped enumeration early.
    pub truncated: bool,
}

/// Executes actions of one program.
#[derive(Clone, Copy)]
pub struct Executor<'p> {
    program: &'p Program,
    eval: Evaluator<'p>,
}

impl<'p> Executor<'p> {
    pub fn new(program: &'p Program) -> Self {
        Executor {
            program,
            eval: Evaluator::new(program),
        }
    }

    pub fn evaluator(&self) -> &Evaluator<'p> {
        &self.eval
    }

    /// Execute an action tree from `state`.
    pub fn exec(
        &self,
        action: &Action,
        env: &Env,
        state: &State,
        choices: &mut dyn ChoiceSource,
    ) -> EvalResult<ActionOutcome> {
        match self.step(action, env, state, State::new(), choices)? {
            Branch::Taken(next) => self.complete(next).map(ActionOutcome::Success),
            Branch::Blocked => Ok(ActionOutcome::GuardFailed),
        }
    }

    /// Execute the named action with `args` bound to its parameters.
    /// Errors are wrapped with the action name.
    pub fn exec_named(
        &self,
        name: &str,
        args: Vec<Value>,
        state: &State,
        choices: &mut dyn ChoiceSource,
    ) -> EvalResult<ActionOutcome> {
        let call = Action::Call {
            name: name.to_string(),
            args: args.into_iter().map(Expr::Lit).collect(),
        };
        let outcome = match self.step(&call, &Env::new(), state, State::new(), choices)? {
            Branch::Taken(next) => self
                .complete(next)
                .map(ActionOutcome::Success)
                .map_err(|e| e.in_action(name))?,
            Branch::Blocked => ActionOutcome::GuardFailed,
        };
        trace!(action = name, enabled = outcome.is_enabled(), "executed action");
        Ok(outcome)
    }

    /// Enumerate every next state the named action can produce from `state`
    /// by replaying all choice sequences, visiting at most `limit` of them.
    pub fn successors_named(
        &self,
        name: &str,
        args: Vec<Value>,
        state: &State,
        limit: usize,
    ) -> EvalResult<Successors> {
        self.enumerate(limit, |choices| {
            self.exec_named(name, args.clone(), state, choices)
        })
    }

    fn enumerate(
        &self,
        limit: usize,
        run: impl Fn(&mut ScriptedChoices) -> EvalResult<ActionOutcome>,
    ) -> EvalResult<Successors> {
        let mut states = BTreeSet::new();
        let mut explored = 0;
        let mut script = Some(Vec::new());
        while let Some(s) = script {
            if explored >= limit {
                return Ok(Successors {
                    states,
                    explored,
                    truncated: true,
                });
            }
            explored += 1;
            let mut choices = ScriptedChoices::new(s);
            if let ActionOutcome::Success(next) = run(&mut choices)? {
                states.insert(next);
            }
            script = next_script(choices.taken());
        }
        Ok(Successors {
            states,
            explored,
            truncated: false,
        })
    }

    fn step(
        &self,
        action: &Action,
        env: &Env,
        state: &State,
        next: State,
        choices: &mut dyn ChoiceSource,
    ) -> EvalResult<Branch> {
        match action {
            Action::Assign { var, value } => {
                let v = self.eval_with(value, env, state, &next)?;
                self.assign(var, v, next).map(Branch::Taken)
            }
            Action::Guard(cond) => {
                if self.eval_with(cond, env, state, &next)?.as_bool("guard")? {
                    Ok(Branch::Taken(next))
                } else {
                    Ok(Branch::Blocked)
                }
            }
            Action::All(actions) => {
                let mut next = next;
                for a in actions {
                    match self.step(a, env, state, next, choices)? {
                        Branch::Taken(n) => next = n,
                        Branch::Blocked => return Ok(Branch::Blocked),
                    }
                }
                Ok(Branch::Taken(next))
            }
            Action::Any(actions) => {
                let mut enabled = Vec::new();
                for a in actions {
                    if let Branch::Taken(n) = self.step(a, env, state, next.clone(), choices)? {
                        enabled.push(n);
                    }
                }
                match enabled.len() {
                    0 => Ok(Branch::Blocked),
                    1 => Ok(Branch::Taken(enabled.swap_remove(0))),
                    n => {
                        let pick = choices.choose(n).min(n - 1);
                        Ok(Branch::Taken(enabled.swap_remove(pick)))
                    }
                }
            }
            Action::Nondet { name, domain, body } => {
                let d = self.eval_with(domain, env, state, &next)?;
                let picked = match &d {
                    Value::Set(set) if !set.is_empty() => {
                        let i = choices.choose(set.len()).min(set.len() - 1);
                        set.iter().nth(i).cloned()
                    }
                    Value::Seq(seq) if !seq.is_empty() => {
                        let i = choices.choose(seq.len()).min(seq.len() - 1);
                        seq.get(i).cloned()
                    }
                    Value::Set(_) | Value::Seq(_) => {
                        return Err(EvalError::EmptyChoiceSet {
                            binder: name.clone(),
                            collection: d.type_name().to_string(),
                        })
                    }
                    other => return Err(EvalError::type_mismatch("oneOf", "Set or Seq", other)),
                };
                let elem = picked.ok_or_else(|| EvalError::EmptyChoiceSet {
                    binder: name.clone(),
                    collection: d.type_name().to_string(),
                })?;
                self.step(body, &env.bind(name.as_str(), elem), state, next, choices)
            }
            Action::Let { name, value, body } => {
                let v = self.eval_with(value, env, state, &next)?;
                self.step(body, &env.bind(name.as_str(), v), state, next, choices)
            }
            Action::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let branch = if self.eval_with(cond, env, state, &next)?.as_bool("if")? {
                    then_branch
                } else {
                    else_branch
                };
                self.step(branch, env, state, next, choices)
            }
            Action::Match { scrutinee, arms } => {
                let v = self.eval_with(scrutinee, env, state, &next)?;
                let (arm, env) = select_arm(arms, &v, env)?;
                self.step(&arm.body, &env, state, next, choices)
            }
            Action::Call { name, args } => {
                let def = self
                    .program
                    .get_action(name)
                    .ok_or_else(|| EvalError::UnboundName { name: name.clone() })?;
                if def.params.len() != args.len() {
                    return Err(EvalError::ArityMismatch {
                        name: name.clone(),
                        expected: def.params.len(),
                        got: args.len(),
                    });
                }
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_with(a, env, state, &next)?);
                }
                let callee_env = Env::new().bind_all(def.params.iter().cloned().zip(values));
                self.step(&def.body, &callee_env, state, next, choices)
                    .map_err(|e| e.in_action(name))
            }
            Action::Unchanged(vars) => {
                let mut next = next;
                for var in vars {
                    next = self.keep(var, state, next)?;
                }
                Ok(Branch::Taken(next))
            }
            Action::Stutter => {
                let mut next = next;
                for var in self.program.var_names() {
                    next = self.keep(var, state, next)?;
                }
                Ok(Branch::Taken(next))
            }
        }
    }

    fn eval_with(&self, expr: &Expr, env: &Env, state: &State, next: &State) -> EvalResult<Value> {
        self.eval.eval_in(
            expr,
            env,
            Frame {
                state,
                next: Some(next),
            },
        )
    }

    /// Bind `var' = value` in the candidate. Re-assigning an equal value is
    /// allowed.
    fn assign(&self, var: &str, value: Value, mut next: State) -> EvalResult<State> {
        if !self.program.is_variable(var) {
            return Err(EvalError::UnboundName {
                name: var.to_string(),
            });
        }
        match next.get(var) {
            Some(first) if first != &value => Err(EvalError::DoubleAssignment {
                var: var.to_string(),
                first: first.to_string(),
                second: value.to_string(),
            }),
            Some(_) => Ok(next),
            None => {
                next.insert(var, value);
                Ok(next)
            }
        }
    }

    fn keep(&self, var: &str, state: &State, next: State) -> EvalResult<State> {
        let current = state.get(var).cloned().ok_or_else(|| EvalError::UnboundName {
            name: var.to_string(),
        })?;
        self.assign(var, current, next)
    }

    /// Check that the candidate assigns every declared variable a value of
    /// its declared type.
    fn complete(&self, next: State) -> EvalResult<State> {
        for decl in &self.program.variables {
            let value = next
                .get(&decl.name)
                .ok_or_else(|| EvalError::UnassignedVariable {
                    var: decl.name.clone(),
                })?;
            if !conforms(value, &decl.ty) {
                return Err(EvalError::TypeMismatch {
                    context: format!("variable '{}'", decl.name),
                    expected: describe(&decl.ty),
                    found: value.to_string(),
                });
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::SeededChoices;
    use serde_json::json;

    fn int(n: i64) -> serde_json::Value {
        json!({ "kind": "int", "value": n })
    }

    fn name(n: &str) -> serde_json::Value {
        json!({ "kind": "name", "name": n })
    }

    fn app(op: &str, args: Vec<serde_json::Value>) -> serde_json::Value {
        json!({ "kind": "app", "op": op, "args": args })
    }

    fn assign(var: &str, value: serde_json::Value) -> serde_json::Value {
        json!({ "kind": "assign", "var": var, "value": value })
    }

    fn action(n: &str, body: serde_json::Value) -> serde_json::Value {
        json!({ "kind": "Action", "name": n, "body": body })
    }

    /// Program with `x: int`, `y: int` plus extra actions; init/step are stutter
    /// unless overridden.
    fn program(actions: Vec<serde_json::Value>) -> Program {
        let mut constructs = vec![
            json!({ "kind": "Var", "name": "x", "type": { "kind": "int" } }),
            json!({ "kind": "Var", "name": "y", "type": { "kind": "int" } }),
        ];
        let declares = |n: &str| actions.iter().any(|a| a["name"] == n);
        if !declares("init") {
            constructs.push(action("init", json!({ "kind": "stutter" })));
        }
        if !declares("step") {
            constructs.push(action("step", json!({ "kind": "stutter" })));
        }
        constructs.extend(actions.iter().cloned());
        let bundle = json!({
            "id": "t", "format": "cadence-ir", "format_version": "1.0",
            "modules": [{ "name": "M", "constructs": constructs }]
        });
        Program::from_interchange(&bundle, None).unwrap()
    }

    fn xy(x: i64, y: i64) -> State {
        State::from_pairs([("x", Value::int(x)), ("y", Value::int(y))])
    }

    fn run(p: &Program, name: &str, state: &State) -> EvalResult<ActionOutcome> {
        Executor::new(p).exec_named(name, vec![], state, &mut SeededChoices::new(0))
    }

    #[test]
    fn conjunction_threads_primed_values() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "all", "actions": [
                assign("x", int(5)),
                assign("y", app("iadd", vec![json!({ "kind": "next", "name": "x" }), int(1)]))
            ]}),
        )]);
        assert_eq!(run(&p, "a", &xy(0, 0)), Ok(ActionOutcome::Success(xy(5, 6))));
    }

    #[test]
    fn guard_false_disables_without_error() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "all", "actions": [
                { "kind": "guard", "cond": app("igt", vec![name("x"), int(10)]) },
                assign("x", int(0)), assign("y", int(0))
            ]}),
        )]);
        assert_eq!(run(&p, "a", &xy(0, 0)), Ok(ActionOutcome::GuardFailed));
    }

    #[test]
    fn disjunction_swallows_guards_but_not_errors() {
        let disabled = json!({ "kind": "guard", "cond": { "kind": "bool", "value": false } });
        let ok = json!({ "kind": "all", "actions": [assign("x", int(1)), assign("y", int(1))] });
        let broken = assign("x", app("idiv", vec![int(1), int(0)]));
        let p = program(vec![
            action("a", json!({ "kind": "any", "actions": [disabled.clone(), ok.clone()] })),
            action("b", json!({ "kind": "any", "actions": [disabled.clone(), disabled] })),
            action("c", json!({ "kind": "any", "actions": [ok, broken] })),
        ]);
        assert_eq!(run(&p, "a", &xy(0, 0)), Ok(ActionOutcome::Success(xy(1, 1))));
        assert_eq!(run(&p, "b", &xy(0, 0)), Ok(ActionOutcome::GuardFailed));
        assert_eq!(
            run(&p, "c", &xy(0, 0)),
            Err(EvalError::DivisionByZero.in_action("c"))
        );
    }

    #[test]
    fn disjunction_branches_do_not_share_candidates() {
        // Both branches assign x; no DoubleAssignment because each starts fresh.
        let p = program(vec![action(
            "a",
            json!({ "kind": "all", "actions": [
                assign("y", int(0)),
                { "kind": "any", "actions": [assign("x", int(1)), assign("x", int(2))] }
            ]}),
        )]);
        let succ = Executor::new(&p)
            .successors_named("a", vec![], &xy(0, 0), 100)
            .unwrap();
        assert_eq!(succ.states, BTreeSet::from([xy(1, 0), xy(2, 0)]));
        assert!(!succ.truncated);
    }

    #[test]
    fn double_assignment_detected_unless_equal() {
        let p = program(vec![
            action("same", json!({ "kind": "all", "actions": [
                assign("x", int(1)), assign("x", int(1)), assign("y", int(0))
            ]})),
            action("diff", json!({ "kind": "all", "actions": [
                assign("x", int(1)), assign("x", int(2)), assign("y", int(0))
            ]})),
        ]);
        assert_eq!(run(&p, "same", &xy(0, 0)), Ok(ActionOutcome::Success(xy(1, 0))));
        assert_eq!(
            run(&p, "diff", &xy(0, 0)).map_err(|e| e.root().clone()),
            Err(EvalError::DoubleAssignment {
                var: "x".to_string(),
                first: "1".to_string(),
                second: "2".to_string()
            })
        );
    }

    #[test]
    fn unassigned_and_undeclared_variables() {
        let p = program(vec![
            action("partial", assign("x", int(1))),
            action("ghost", assign("z", int(1))),
        ]);
        assert_eq!(
            run(&p, "partial", &xy(0, 0)),
            Err(EvalError::UnassignedVariable {
                var: "y".to_string()
            }
            .in_action("partial"))
        );
        assert_eq!(
            run(&p, "ghost", &xy(0, 0)).map_err(|e| e.root().clone()),
            Err(EvalError::UnboundName {
                name: "z".to_string()
            })
        );
    }

    #[test]
    fn declared_types_are_enforced() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "all", "actions": [
                assign("x", json!({ "kind": "str", "value": "oops" })), assign("y", int(0))
            ]}),
        )]);
        assert!(matches!(
            run(&p, "a", &xy(0, 0)).map_err(|e| e.root().clone()),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn nondet_over_empty_set_is_an_error() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "nondet", "name": "v", "domain": { "kind": "set" },
                    "body": { "kind": "all", "actions": [assign("x", name("v")), assign("y", int(0))] } }),
        )]);
        assert_eq!(
            run(&p, "a", &xy(0, 0)),
            Err(EvalError::EmptyChoiceSet {
                binder: "v".to_string(),
                collection: "Set".to_string()
            }
            .in_action("a"))
        );
    }

    #[test]
    fn nondet_rejects_non_collections() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "nondet", "name": "v", "domain": int(3), "body": { "kind": "stutter" } }),
        )]);
        assert!(matches!(
            run(&p, "a", &xy(0, 0)).map_err(|e| e.root().clone()),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn nondet_successors_cover_the_domain() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "nondet", "name": "v", "domain": app("to", vec![int(1), int(3)]),
                    "body": { "kind": "all", "actions": [assign("x", name("v")), { "kind": "unchanged", "vars": ["y"] }] } }),
        )]);
        let ex = Executor::new(&p);
        let succ = ex.successors_named("a", vec![], &xy(0, 9), 100).unwrap();
        assert_eq!(succ.states, BTreeSet::from([xy(1, 9), xy(2, 9), xy(3, 9)]));
        assert_eq!(succ.explored, 3);

        let bounded = ex.successors_named("a", vec![], &xy(0, 9), 2).unwrap();
        assert!(bounded.truncated);
        assert_eq!(bounded.states.len(), 2);
    }

    #[test]
    fn nested_call_errors_record_the_path() {
        let p = program(vec![
            action("outer", json!({ "kind": "call", "name": "inner", "args": [] })),
            action("inner", assign("x", app("idiv", vec![int(1), int(0)]))),
        ]);
        let err = run(&p, "outer", &xy(0, 0)).unwrap_err();
        assert_eq!(err.action_path(), vec!["outer", "inner"]);
        assert_eq!(err.kind(), "DivisionByZero");
    }

    #[test]
    fn parameterised_actions() {
        let constructs = json!({
            "kind": "Action", "name": "set_x", "params": ["v"],
            "body": { "kind": "all", "actions": [assign("x", name("v")), { "kind": "unchanged", "vars": ["y"] }] }
        });
        let p = program(vec![constructs]);
        let ex = Executor::new(&p);
        let out = ex.exec_named("set_x", vec![Value::int(8)], &xy(0, 1), &mut SeededChoices::new(0));
        assert_eq!(out, Ok(ActionOutcome::Success(xy(8, 1))));
        let err = ex.exec_named("set_x", vec![], &xy(0, 1), &mut SeededChoices::new(0));
        assert!(matches!(err, Err(EvalError::ArityMismatch { .. })));
    }

    #[test]
    fn match_dispatches_on_tag() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "match",
                "scrutinee": { "kind": "variant", "tag": "Inc", "payload": int(2) },
                "arms": [
                    { "tag": "Inc", "binder": "d", "body": { "kind": "all", "actions": [
                        assign("x", app("iadd", vec![name("x"), name("d")])), { "kind": "unchanged", "vars": ["y"] }
                    ]}},
                    { "tag": "Reset", "body": { "kind": "all", "actions": [assign("x", int(0)), assign("y", int(0))] } }
                ]}),
        )]);
        assert_eq!(run(&p, "a", &xy(1, 1)), Ok(ActionOutcome::Success(xy(3, 1))));
    }

    #[test]
    fn stutter_and_conditionals() {
        let p = program(vec![action(
            "a",
            json!({ "kind": "if", "cond": app("igt", vec![name("x"), int(0)]),
                    "then": { "kind": "stutter" },
                    "else": { "kind": "let", "name": "z", "value": int(4),
                              "body": { "kind": "all", "actions": [assign("x", name("z")), assign("y", name("z"))] } } }),
        )]);
        assert_eq!(run(&p, "a", &xy(2, 3)), Ok(ActionOutcome::Success(xy(2, 3))));
        assert_eq!(run(&p, "a", &xy(0, 3)), Ok(ActionOutcome::Success(xy(4, 4))));
    }
}
