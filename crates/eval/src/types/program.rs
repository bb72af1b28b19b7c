//! Evaluation-ready program representation and lowering from the bundle.
//!
//! A [`Program`] is built once per top-level module. Lowering resolves
//! builtin operator names, parses integer literals, evaluates constants and
//! indexes every declaration by name. The result is read-only and is shared
//! by reference across concurrent runs.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use cadence_interchange::{
    ActionExpr, InterchangeBundle, InterchangeConstruct, IntLiteral, MatchArm, ModuleConstruct,
    RunExpr, TemporalExpr, TypeExpr,
};
use num_bigint::BigInt;

use super::ty::{conforms, describe};
use super::values::Value;
use super::{EvalError, ProgramError};
use crate::env::Env;
use crate::expr::Evaluator;
use crate::ops::Builtin;
use crate::state::State;

// ──────────────────────────────────────────────
// Lowered trees
// ──────────────────────────────────────────────

/// A pure expression with builtins resolved and literals pre-built.
#[derive(Debug, Clone)]
pub enum Expr {
    Lit(Value),
    Name(String),
    /// Primed read of a state variable.
    Next(String),
    Builtin {
        op: Builtin,
        args: Vec<Expr>,
    },
    /// Application of a user definition or a lambda bound to `name`.
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Apply {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda(Arc<LambdaDef>),
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    Record(Vec<(String, Expr)>),
    Set(Vec<Expr>),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Variant {
        tag: String,
        payload: Option<Box<Expr>>,
    },
    Field {
        record: Box<Expr>,
        field: String,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<Arm<Expr>>,
    },
}

/// One arm of a variant match. `tag == "_"` is the default arm.
#[derive(Debug, Clone)]
pub struct Arm<B> {
    pub tag: String,
    pub binder: Option<String>,
    pub body: B,
}

impl<B> Arm<B> {
    pub fn is_default(&self) -> bool {
        self.tag == "_"
    }
}

/// Parameters and body shared by lambdas and parameterised definitions.
#[derive(Debug)]
pub struct LambdaDef {
    /// Lowering order within the module. Closures are ordered by it, so a
    /// set of operators iterates the same way on every load.
    pub id: usize,
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub enum Action {
    Assign {
        var: String,
        value: Expr,
    },
    Guard(Expr),
    All(Vec<Action>),
    Any(Vec<Action>),
    Nondet {
        name: String,
        domain: Expr,
        body: Box<Action>,
    },
    Let {
        name: String,
        value: Expr,
        body: Box<Action>,
    },
    If {
        cond: Expr,
        then_branch: Box<Action>,
        else_branch: Box<Action>,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<Arm<Action>>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unchanged(Vec<String>),
    Stutter,
}

#[derive(Debug, Clone)]
pub enum Run {
    Step(Action),
    Then(Vec<Run>),
    Reps {
        times: u64,
        index: Option<String>,
        body: Box<Run>,
    },
    Expect {
        run: Box<Run>,
        pred: Expr,
    },
    Fail(Box<Run>),
}

#[derive(Debug, Clone)]
pub enum Temporal {
    Always(Expr),
    Eventually(Expr),
    LeadsTo { from: Expr, to: Expr },
}

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Def {
    pub name: String,
    pub lambda: Arc<LambdaDef>,
}

impl Def {
    pub fn params(&self) -> &[String] {
        &self.lambda.params
    }
}

#[derive(Debug, Clone)]
pub struct ActionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Action,
}

#[derive(Debug, Clone)]
pub struct Invariant {
    pub name: String,
    pub pred: Expr,
}

#[derive(Debug, Clone)]
pub struct TemporalProperty {
    pub name: String,
    pub formula: Temporal,
}

#[derive(Debug, Clone)]
pub struct RunDef {
    pub name: String,
    pub run: Run,
}

// ──────────────────────────────────────────────
// Program
// ──────────────────────────────────────────────

/// A flattened, lowered module ready for evaluation.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub init: String,
    pub step: String,
    pub variables: Vec<VarDecl>,
    pub const_decls: Vec<ConstDecl>,
    /// Resolved constant values (defaults merged with host overrides).
    pub constants: BTreeMap<String, Value>,
    pub defs: Vec<Def>,
    pub actions: Vec<ActionDef>,
    pub invariants: Vec<Invariant>,
    pub temporals: Vec<TemporalProperty>,
    pub runs: Vec<RunDef>,
    var_index: HashMap<String, usize>,
    def_index: HashMap<String, usize>,
    action_index: HashMap<String, usize>,
}

impl Program {
    /// Load a program from bundle JSON, selecting `module` (or the last
    /// module in the bundle when `None`).
    pub fn from_interchange(
        bundle: &serde_json::Value,
        module: Option<&str>,
    ) -> Result<Program, ProgramError> {
        Self::from_interchange_with(bundle, module, &BTreeMap::new())
    }

    /// Like [`Program::from_interchange`], with host-supplied constant values
    /// taking precedence over declared defaults.
    pub fn from_interchange_with(
        bundle: &serde_json::Value,
        module: Option<&str>,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<Program, ProgramError> {
        let parsed = cadence_interchange::from_interchange(bundle)?;
        Self::from_bundle(&parsed, module, overrides)
    }

    /// Lower an already-parsed bundle.
    pub fn from_bundle(
        bundle: &InterchangeBundle,
        module: Option<&str>,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<Program, ProgramError> {
        let module = match module {
            Some(name) => bundle
                .module(name)
                .ok_or_else(|| ProgramError::UnknownModule(name.to_string()))?,
            None => bundle.modules.last().ok_or(ProgramError::EmptyBundle)?,
        };
        let mut program = lower_module(module)?;
        program.resolve_constants(overrides)?;
        Ok(program)
    }

    /// Evaluate constants in declaration order. Later constants may refer
    /// to earlier ones.
    fn resolve_constants(&mut self, overrides: &BTreeMap<String, Value>) -> Result<(), ProgramError> {
        if let Some(name) = overrides
            .keys()
            .find(|name| !self.const_decls.iter().any(|c| &c.name == *name))
        {
            return Err(ProgramError::UnknownConstant { name: name.clone() });
        }
        let decls = self.const_decls.clone();
        for decl in &decls {
            let value = match (overrides.get(&decl.name), &decl.default) {
                (Some(v), _) => {
                    if !conforms(v, &decl.ty) {
                        return Err(ProgramError::Override {
                            name: decl.name.clone(),
                            source: const_mismatch(decl, v),
                        });
                    }
                    v.clone()
                }
                (None, Some(expr)) => {
                    let v = Evaluator::new(self)
                        .eval(expr, &Env::new(), &State::default())
                        .map_err(|source| ProgramError::Constant {
                            name: decl.name.clone(),
                            source,
                        })?;
                    if !conforms(&v, &decl.ty) {
                        return Err(ProgramError::Constant {
                            name: decl.name.clone(),
                            source: const_mismatch(decl, &v),
                        });
                    }
                    v
                }
                (None, None) => {
                    return Err(ProgramError::MissingConstant {
                        name: decl.name.clone(),
                    })
                }
            };
            self.constants.insert(decl.name.clone(), value);
        }
        Ok(())
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.var_index.contains_key(name)
    }

    pub fn get_def(&self, name: &str) -> Option<&Def> {
        self.def_index.get(name).map(|&i| &self.defs[i])
    }

    pub fn get_action(&self, name: &str) -> Option<&ActionDef> {
        self.action_index.get(name).map(|&i| &self.actions[i])
    }

    pub fn get_constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn get_invariant(&self, name: &str) -> Option<&Invariant> {
        self.invariants.iter().find(|i| i.name == name)
    }

    pub fn get_run(&self, name: &str) -> Option<&RunDef> {
        self.runs.iter().find(|r| r.name == name)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}

// ──────────────────────────────────────────────
// Lowering
// ──────────────────────────────────────────────

fn lower_module(module: &ModuleConstruct) -> Result<Program, ProgramError> {
    check_duplicates(module)?;

    let user_defs: HashSet<&str> = module
        .constructs
        .iter()
        .filter_map(|c| match c {
            InterchangeConstruct::Def(d) => Some(d.name.as_str()),
            _ => None,
        })
        .collect();
    let lower = Lowerer {
        user_defs,
        next_lambda: Cell::new(0),
    };

    let mut variables = Vec::new();
    let mut const_decls = Vec::new();
    let mut defs = Vec::new();
    let mut actions = Vec::new();
    let mut invariants = Vec::new();
    let mut temporals = Vec::new();
    let mut runs = Vec::new();

    for construct in &module.constructs {
        match construct {
            InterchangeConstruct::Var(v) => variables.push(VarDecl {
                name: v.name.clone(),
                ty: v.var_type.clone(),
            }),
            InterchangeConstruct::Const(c) => const_decls.push(ConstDecl {
                name: c.name.clone(),
                ty: c.const_type.clone(),
                default: c.value.as_ref().map(|e| lower.expr(e)).transpose()?,
            }),
            InterchangeConstruct::Def(d) => defs.push(Def {
                name: d.name.clone(),
                lambda: lower.lambda(&d.params, &d.body)?,
            }),
            InterchangeConstruct::Action(a) => actions.push(ActionDef {
                name: a.name.clone(),
                params: a.params.clone(),
                body: lower.action(&a.body)?,
            }),
            InterchangeConstruct::Invariant(i) => invariants.push(Invariant {
                name: i.name.clone(),
                pred: lower.expr(&i.pred)?,
            }),
            InterchangeConstruct::Temporal(t) => temporals.push(TemporalProperty {
                name: t.name.clone(),
                formula: lower.temporal(&t.formula)?,
            }),
            InterchangeConstruct::Run(r) => runs.push(RunDef {
                name: r.name.clone(),
                run: lower.run(&r.run)?,
            }),
        }
    }

    let var_index = index_by(&variables, |v| &v.name);
    let def_index = index_by(&defs, |d| &d.name);
    let action_index = index_by(&actions, |a| &a.name);

    for (role, name) in [("init", &module.init), ("step", &module.step)] {
        if !action_index.contains_key(name) {
            return Err(ProgramError::MissingAction {
                role: role.to_string(),
                name: name.clone(),
            });
        }
    }

    Ok(Program {
        name: module.name.clone(),
        init: module.init.clone(),
        step: module.step.clone(),
        variables,
        const_decls,
        constants: BTreeMap::new(),
        defs,
        actions,
        invariants,
        temporals,
        runs,
        var_index,
        def_index,
        action_index,
    })
}

fn index_by<T>(items: &[T], key: impl Fn(&T) -> &String) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| (key(item).clone(), i))
        .collect()
}

/// Variables, constants, definitions and actions share one namespace;
/// invariants, temporal properties and runs share another.
fn check_duplicates(module: &ModuleConstruct) -> Result<(), ProgramError> {
    let mut values = HashSet::new();
    let mut properties = HashSet::new();
    for construct in &module.constructs {
        let seen = match construct {
            InterchangeConstruct::Var(_)
            | InterchangeConstruct::Const(_)
            | InterchangeConstruct::Def(_)
            | InterchangeConstruct::Action(_) => &mut values,
            InterchangeConstruct::Invariant(_)
            | InterchangeConstruct::Temporal(_)
            | InterchangeConstruct::Run(_) => &mut properties,
        };
        if !seen.insert(construct.name()) {
            return Err(ProgramError::DuplicateName {
                kind: construct.kind().to_string(),
                name: construct.name().to_string(),
            });
        }
    }
    Ok(())
}

fn parse_int(lit: &IntLiteral) -> Result<BigInt, ProgramError> {
    match lit {
        IntLiteral::Small(n) => Ok(BigInt::from(*n)),
        IntLiteral::Big(s) => s.trim().parse::<BigInt>().map_err(|_| ProgramError::BadInteger {
            literal: s.clone(),
        }),
    }
}

struct Lowerer<'a> {
    user_defs: HashSet<&'a str>,
    next_lambda: Cell<usize>,
}

impl Lowerer<'_> {
    fn lambda(
        &self,
        params: &[String],
        body: &cadence_interchange::Expr,
    ) -> Result<Arc<LambdaDef>, ProgramError> {
        let id = self.next_lambda.get();
        self.next_lambda.set(id + 1);
        Ok(Arc::new(LambdaDef {
            id,
            params: params.to_vec(),
            body: self.expr(body)?,
        }))
    }

    fn exprs(&self, exprs: &[cadence_interchange::Expr]) -> Result<Vec<Expr>, ProgramError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&self, expr: &cadence_interchange::Expr) -> Result<Box<Expr>, ProgramError> {
        self.expr(expr).map(Box::new)
    }

    fn expr(&self, expr: &cadence_interchange::Expr) -> Result<Expr, ProgramError> {
        use cadence_interchange::Expr as Ix;

        Ok(match expr {
            Ix::Bool { value } => Expr::Lit(Value::Bool(*value)),
            Ix::Int { value } => Expr::Lit(Value::Int(parse_int(value)?)),
            Ix::Str { value } => Expr::Lit(Value::str(value)),
            Ix::Name { name } => Expr::Name(name.clone()),
            Ix::Next { name } => Expr::Next(name.clone()),
            Ix::App { op, args } => {
                let args = self.exprs(args)?;
                match Builtin::from_name(op) {
                    Some(builtin) if !self.user_defs.contains(op.as_str()) => {
                        if let Some(expected) = builtin.arity() {
                            if expected != args.len() {
                                return Err(ProgramError::BuiltinArity {
                                    op: op.clone(),
                                    expected,
                                    got: args.len(),
                                });
                            }
                        }
                        Expr::Builtin { op: builtin, args }
                    }
                    _ => Expr::Call {
                        name: op.clone(),
                        args,
                    },
                }
            }
            Ix::Apply { callee, args } => Expr::Apply {
                callee: self.boxed(callee)?,
                args: self.exprs(args)?,
            },
            Ix::Lambda { params, body } => Expr::Lambda(self.lambda(params, body)?),
            Ix::Let { name, value, body } => Expr::Let {
                name: name.clone(),
                value: self.boxed(value)?,
                body: self.boxed(body)?,
            },
            Ix::If {
                cond,
                then_branch,
                else_branch,
            } => Expr::If {
                cond: self.boxed(cond)?,
                then_branch: self.boxed(then_branch)?,
                else_branch: self.boxed(else_branch)?,
            },
            Ix::Tuple { elems } => Expr::Tuple(self.exprs(elems)?),
            Ix::Record { fields } => Expr::Record(
                fields
                    .iter()
                    .map(|(name, e)| Ok((name.clone(), self.expr(e)?)))
                    .collect::<Result<_, ProgramError>>()?,
            ),
            Ix::Set { elems } => Expr::Set(self.exprs(elems)?),
            Ix::List { elems } => Expr::List(self.exprs(elems)?),
            Ix::Map { entries } => Expr::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((self.expr(k)?, self.expr(v)?)))
                    .collect::<Result<_, ProgramError>>()?,
            ),
            Ix::Variant { tag, payload } => Expr::Variant {
                tag: tag.clone(),
                payload: payload.as_deref().map(|p| self.boxed(p)).transpose()?,
            },
            Ix::Field { record, field } => Expr::Field {
                record: self.boxed(record)?,
                field: field.clone(),
            },
            Ix::Match { scrutinee, arms } => Expr::Match {
                scrutinee: self.boxed(scrutinee)?,
                arms: arms
                    .iter()
                    .map(|arm| self.arm(arm, |b| self.expr(b)))
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    fn arm<S, B>(
        &self,
        arm: &MatchArm<S>,
        body: impl Fn(&S) -> Result<B, ProgramError>,
    ) -> Result<Arm<B>, ProgramError> {
        Ok(Arm {
            tag: arm.tag.clone(),
            binder: arm.binder.clone(),
            body: body(&arm.body)?,
        })
    }

    fn action(&self, action: &ActionExpr) -> Result<Action, ProgramError> {
        Ok(match action {
            ActionExpr::Assign { var, value } => Action::Assign {
                var: var.clone(),
                value: self.expr(value)?,
            },
            ActionExpr::Guard { cond } => Action::Guard(self.expr(cond)?),
            ActionExpr::All { actions } => Action::All(self.actions(actions)?),
            ActionExpr::Any { actions } => Action::Any(self.actions(actions)?),
            ActionExpr::Nondet { name, domain, body } => Action::Nondet {
                name: name.clone(),
                domain: self.expr(domain)?,
                body: Box::new(self.action(body)?),
            },
            ActionExpr::Let { name, value, body } => Action::Let {
                name: name.clone(),
                value: self.expr(value)?,
                body: Box::new(self.action(body)?),
            },
            ActionExpr::If {
                cond,
                then_branch,
                else_branch,
            } => Action::If {
                cond: self.expr(cond)?,
                then_branch: Box::new(self.action(then_branch)?),
                else_branch: Box::new(self.action(else_branch)?),
            },
            ActionExpr::Match { scrutinee, arms } => Action::Match {
                scrutinee: self.expr(scrutinee)?,
                arms: arms
                    .iter()
                    .map(|arm| self.arm(arm, |b| self.action(b)))
                    .collect::<Result<_, _>>()?,
            },
            ActionExpr::Call { name, args } => Action::Call {
                name: name.clone(),
                args: self.exprs(args)?,
            },
            ActionExpr::Unchanged { vars } => Action::Unchanged(vars.clone()),
            ActionExpr::Stutter => Action::Stutter,
        })
    }

    fn actions(&self, actions: &[ActionExpr]) -> Result<Vec<Action>, ProgramError> {
        actions.iter().map(|a| self.action(a)).collect()
    }

    fn run(&self, run: &RunExpr) -> Result<Run, ProgramError> {
        Ok(match run {
            RunExpr::Step { action } => Run::Step(self.action(action)?),
            RunExpr::Then { runs } => Run::Then(
                runs.iter()
                    .map(|r| self.run(r))
                    .collect::<Result<_, _>>()?,
            ),
            RunExpr::Reps { times, index, body } => Run::Reps {
                times: *times,
                index: index.clone(),
                body: Box::new(self.run(body)?),
            },
            RunExpr::Expect { run, pred } => Run::Expect {
                run: Box::new(self.run(run)?),
                pred: self.expr(pred)?,
            },
            RunExpr::Fail { run } => Run::Fail(Box::new(self.run(run)?)),
        })
    }

    fn temporal(&self, formula: &TemporalExpr) -> Result<Temporal, ProgramError> {
        Ok(match formula {
            TemporalExpr::Always { pred } => Temporal::Always(self.expr(pred)?),
            TemporalExpr::Eventually { pred } => Temporal::Eventually(self.expr(pred)?),
            TemporalExpr::LeadsTo { from, to } => Temporal::LeadsTo {
                from: self.expr(from)?,
                to: self.expr(to)?,
            },
        })
    }
}

fn const_mismatch(decl: &ConstDecl, value: &Value) -> EvalError {
    EvalError::TypeMismatch {
        context: format!("constant '{}'", decl.name),
        expected: describe(&decl.ty),
        found: value.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(constructs: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "t",
            "format": "cadence-ir",
            "format_version": "1.0",
            "modules": [{ "name": "M", "constructs": constructs }]
        })
    }

    fn trivial_actions() -> Vec<serde_json::Value> {
        vec![
            json!({ "kind": "Action", "name": "init", "body": { "kind": "stutter" } }),
            json!({ "kind": "Action", "name": "step", "body": { "kind": "stutter" } }),
        ]
    }

    fn with_actions(mut constructs: Vec<serde_json::Value>) -> serde_json::Value {
        constructs.extend(trivial_actions());
        bundle(serde_json::Value::Array(constructs))
    }

    #[test]
    fn builtin_names_lower_to_builtins() {
        let b = with_actions(vec![json!({
            "kind": "Def", "name": "two", "params": [],
            "body": { "kind": "app", "op": "iadd", "args": [
                { "kind": "int", "value": 1 }, { "kind": "int", "value": 1 }
            ]}
        })]);
        let program = Program::from_interchange(&b, None).unwrap();
        let def = program.get_def("two").unwrap();
        assert!(matches!(
            def.lambda.body,
            Expr::Builtin {
                op: Builtin::Iadd,
                ..
            }
        ));
    }

    #[test]
    fn user_def_shadows_builtin_name() {
        let b = with_actions(vec![
            json!({ "kind": "Def", "name": "size", "params": ["s"],
                    "body": { "kind": "int", "value": 0 } }),
            json!({ "kind": "Def", "name": "use", "params": [],
                    "body": { "kind": "app", "op": "size", "args": [{ "kind": "set" }] } }),
        ]);
        let program = Program::from_interchange(&b, None).unwrap();
        let def = program.get_def("use").unwrap();
        assert!(matches!(&def.lambda.body, Expr::Call { name, .. } if name == "size"));
    }

    #[test]
    fn builtin_arity_checked_at_load() {
        let b = with_actions(vec![json!({
            "kind": "Def", "name": "bad", "params": [],
            "body": { "kind": "app", "op": "not", "args": [] }
        })]);
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert_eq!(
            err,
            ProgramError::BuiltinArity {
                op: "not".to_string(),
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn big_integer_literal_parses() {
        let b = with_actions(vec![json!({
            "kind": "Const", "name": "BIG",
            "value": { "kind": "int", "value": "123456789012345678901234567890" }
        })]);
        let program = Program::from_interchange(&b, None).unwrap();
        let expected: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(program.get_constant("BIG"), Some(&Value::Int(expected)));
    }

    #[test]
    fn malformed_integer_is_load_error() {
        let b = with_actions(vec![json!({
            "kind": "Const", "name": "X", "value": { "kind": "int", "value": "12a" }
        })]);
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert!(matches!(err, ProgramError::BadInteger { .. }));
    }

    #[test]
    fn constants_resolve_in_order() {
        let b = with_actions(vec![
            json!({ "kind": "Const", "name": "N", "value": { "kind": "int", "value": 3 } }),
            json!({ "kind": "Const", "name": "M", "value": { "kind": "app", "op": "imul", "args": [
                { "kind": "name", "name": "N" }, { "kind": "int", "value": 2 }
            ]}}),
        ]);
        let program = Program::from_interchange(&b, None).unwrap();
        assert_eq!(program.get_constant("M"), Some(&Value::int(6)));
    }

    #[test]
    fn overrides_take_precedence() {
        let b = with_actions(vec![
            json!({ "kind": "Const", "name": "N", "value": { "kind": "int", "value": 3 } }),
        ]);
        let overrides = BTreeMap::from([("N".to_string(), Value::int(10))]);
        let program = Program::from_interchange_with(&b, None, &overrides).unwrap();
        assert_eq!(program.get_constant("N"), Some(&Value::int(10)));
    }

    #[test]
    fn override_of_wrong_type_rejected_at_load() {
        let b = with_actions(vec![json!({
            "kind": "Const", "name": "N", "type": { "kind": "int" },
            "value": { "kind": "int", "value": 3 }
        })]);
        let overrides = BTreeMap::from([("N".to_string(), Value::str("three"))]);
        let err = Program::from_interchange_with(&b, None, &overrides).unwrap_err();
        match err {
            ProgramError::Override { name, source } => {
                assert_eq!(name, "N");
                assert!(matches!(source, EvalError::TypeMismatch { .. }));
            }
            other => panic!("expected override error, got {:?}", other),
        }
    }

    #[test]
    fn default_of_wrong_type_rejected_at_load() {
        let b = with_actions(vec![json!({
            "kind": "Const", "name": "FLAG", "type": { "kind": "bool" },
            "value": { "kind": "int", "value": 1 }
        })]);
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert!(matches!(
            err,
            ProgramError::Constant {
                ref name,
                source: EvalError::TypeMismatch { .. }
            } if name == "FLAG"
        ));
    }

    #[test]
    fn constant_without_value_needs_override() {
        let b = with_actions(vec![json!({ "kind": "Const", "name": "N" })]);
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert_eq!(
            err,
            ProgramError::MissingConstant {
                name: "N".to_string()
            }
        );

        let overrides = BTreeMap::from([("N".to_string(), Value::int(1))]);
        assert!(Program::from_interchange_with(&b, None, &overrides).is_ok());
    }

    #[test]
    fn override_for_unknown_constant_rejected() {
        let b = with_actions(vec![]);
        let overrides = BTreeMap::from([("Q".to_string(), Value::int(1))]);
        let err = Program::from_interchange_with(&b, None, &overrides).unwrap_err();
        assert_eq!(
            err,
            ProgramError::UnknownConstant {
                name: "Q".to_string()
            }
        );
    }

    #[test]
    fn failing_constant_reports_cause() {
        let b = with_actions(vec![json!({
            "kind": "Const", "name": "Z",
            "value": { "kind": "app", "op": "idiv", "args": [
                { "kind": "int", "value": 1 }, { "kind": "int", "value": 0 }
            ]}
        })]);
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert_eq!(
            err,
            ProgramError::Constant {
                name: "Z".to_string(),
                source: EvalError::DivisionByZero
            }
        );
    }

    #[test]
    fn missing_step_action_is_load_error() {
        let b = bundle(json!([
            { "kind": "Action", "name": "init", "body": { "kind": "stutter" } }
        ]));
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert_eq!(
            err,
            ProgramError::MissingAction {
                role: "step".to_string(),
                name: "step".to_string()
            }
        );
    }

    #[test]
    fn duplicate_names_rejected() {
        let b = with_actions(vec![
            json!({ "kind": "Var", "name": "x", "type": { "kind": "int" } }),
            json!({ "kind": "Def", "name": "x", "params": [], "body": { "kind": "bool", "value": true } }),
        ]);
        let err = Program::from_interchange(&b, None).unwrap_err();
        assert_eq!(
            err,
            ProgramError::DuplicateName {
                kind: "Def".to_string(),
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn unknown_module_rejected() {
        let b = with_actions(vec![]);
        let err = Program::from_interchange(&b, Some("Nope")).unwrap_err();
        assert_eq!(err, ProgramError::UnknownModule("Nope".to_string()));
    }

    #[test]
    fn indexes_declarations() {
        let b = with_actions(vec![
            json!({ "kind": "Var", "name": "x", "type": { "kind": "int" } }),
            json!({ "kind": "Invariant", "name": "inv", "pred": { "kind": "bool", "value": true } }),
        ]);
        let program = Program::from_interchange(&b, Some("M")).unwrap();
        assert_eq!(program.name, "M");
        assert!(program.is_variable("x"));
        assert!(!program.is_variable("y"));
        assert!(program.get_action("init").is_some());
        assert!(program.get_invariant("inv").is_some());
        assert_eq!(program.var_names().collect::<Vec<_>>(), vec!["x"]);
    }
}
