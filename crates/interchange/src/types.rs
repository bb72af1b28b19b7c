//! Typed structs representing the resolved-program bundle format.
//!
//! The resolver emits one bundle per top-level specification. Each module
//! in the bundle is already flattened: imports and instances are inlined
//! and every name refers to something declared in the same module (or to
//! a local binder). Expression, action, run and temporal trees are tagged
//! JSON objects keyed by `kind` and deserialize directly via serde.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level bundle containing all modules.
#[derive(Debug, Clone)]
pub struct InterchangeBundle {
    /// Bundle identifier (usually the main module's file stem).
    pub id: String,
    /// Format tag (e.g. "cadence-ir").
    pub format: String,
    /// Format version (e.g. "1.0").
    pub format_version: String,
    pub modules: Vec<ModuleConstruct>,
}

impl InterchangeBundle {
    /// Look up a module by name.
    pub fn module(&self, name: &str) -> Option<&ModuleConstruct> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// A flattened module: declarations plus the designated init/step actions.
#[derive(Debug, Clone)]
pub struct ModuleConstruct {
    pub name: String,
    /// Name of the action producing the initial state. Defaults to `init`.
    pub init: String,
    /// Name of the action producing successor states. Defaults to `step`.
    pub step: String,
    pub constructs: Vec<InterchangeConstruct>,
}

/// A single declaration from a module, dispatched by kind.
#[derive(Debug, Clone)]
pub enum InterchangeConstruct {
    Var(VarConstruct),
    Const(ConstConstruct),
    Def(DefConstruct),
    Action(ActionConstruct),
    Invariant(InvariantConstruct),
    Temporal(TemporalConstruct),
    Run(RunConstruct),
}

impl InterchangeConstruct {
    pub fn name(&self) -> &str {
        match self {
            InterchangeConstruct::Var(c) => &c.name,
            InterchangeConstruct::Const(c) => &c.name,
            InterchangeConstruct::Def(c) => &c.name,
            InterchangeConstruct::Action(c) => &c.name,
            InterchangeConstruct::Invariant(c) => &c.name,
            InterchangeConstruct::Temporal(c) => &c.name,
            InterchangeConstruct::Run(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InterchangeConstruct::Var(_) => "Var",
            InterchangeConstruct::Const(_) => "Const",
            InterchangeConstruct::Def(_) => "Def",
            InterchangeConstruct::Action(_) => "Action",
            InterchangeConstruct::Invariant(_) => "Invariant",
            InterchangeConstruct::Temporal(_) => "Temporal",
            InterchangeConstruct::Run(_) => "Run",
        }
    }
}

// ── Declarations ────────────────────────────────────────────────────

/// A state variable with its declared type.
#[derive(Debug, Clone)]
pub struct VarConstruct {
    pub name: String,
    pub var_type: TypeExpr,
}

/// A module constant. `value` is absent when the host must supply it.
#[derive(Debug, Clone)]
pub struct ConstConstruct {
    pub name: String,
    pub const_type: TypeExpr,
    pub value: Option<Expr>,
}

/// A pure definition (`pure def`, `def`, `val`).
#[derive(Debug, Clone)]
pub struct DefConstruct {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

/// A named action.
#[derive(Debug, Clone)]
pub struct ActionConstruct {
    pub name: String,
    pub params: Vec<String>,
    pub body: ActionExpr,
}

/// A named state invariant.
#[derive(Debug, Clone)]
pub struct InvariantConstruct {
    pub name: String,
    pub pred: Expr,
}

/// A named temporal property.
#[derive(Debug, Clone)]
pub struct TemporalConstruct {
    pub name: String,
    pub formula: TemporalExpr,
}

/// A named run (test scenario built from run combinators).
#[derive(Debug, Clone)]
pub struct RunConstruct {
    pub name: String,
    pub run: RunExpr,
}

// ── Types ───────────────────────────────────────────────────────────

/// Declared type of a variable or constant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    Bool,
    Int,
    Str,
    Set {
        elem: Box<TypeExpr>,
    },
    List {
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Tuple {
        elems: Vec<TypeExpr>,
    },
    Record {
        fields: BTreeMap<String, TypeExpr>,
    },
    Sum {
        variants: BTreeMap<String, TypeExpr>,
    },
    Fun {
        params: Vec<TypeExpr>,
        result: Box<TypeExpr>,
    },
    /// Type left unconstrained by the resolver (type variables, uninterpreted types).
    Any,
}

// ── Expressions ─────────────────────────────────────────────────────

/// Integer literal. Small values are plain JSON numbers; values outside
/// the 64-bit range are carried as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntLiteral {
    Small(i64),
    Big(String),
}

/// A pure expression tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Bool {
        value: bool,
    },
    Int {
        value: IntLiteral,
    },
    Str {
        value: String,
    },
    /// Reference to a local binder, state variable, constant or definition.
    Name {
        name: String,
    },
    /// Primed variable read (`x'`), only meaningful inside actions.
    Next {
        name: String,
    },
    /// Operator application: either a builtin or a user definition.
    App {
        op: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Application of an arbitrary callee expression (e.g. a lambda value).
    Apply {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        #[serde(rename = "then")]
        then_branch: Box<Expr>,
        #[serde(rename = "else")]
        else_branch: Box<Expr>,
    },
    Tuple {
        #[serde(default)]
        elems: Vec<Expr>,
    },
    Record {
        fields: BTreeMap<String, Expr>,
    },
    Set {
        #[serde(default)]
        elems: Vec<Expr>,
    },
    List {
        #[serde(default)]
        elems: Vec<Expr>,
    },
    Map {
        #[serde(default)]
        entries: Vec<(Expr, Expr)>,
    },
    Variant {
        tag: String,
        #[serde(default)]
        payload: Option<Box<Expr>>,
    },
    Field {
        record: Box<Expr>,
        field: String,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm<Expr>>,
    },
}

/// One arm of a `match`. The tag `_` matches any variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchArm<B> {
    pub tag: String,
    #[serde(default)]
    pub binder: Option<String>,
    pub body: B,
}

// ── Actions ─────────────────────────────────────────────────────────

/// An action tree relating the current state to a candidate next state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionExpr {
    /// `var' = value`
    Assign { var: String, value: Expr },
    /// A boolean conjunct; false disables the action.
    Guard { cond: Expr },
    All { actions: Vec<ActionExpr> },
    Any { actions: Vec<ActionExpr> },
    /// `nondet name = oneOf(domain); body`
    Nondet {
        name: String,
        domain: Expr,
        body: Box<ActionExpr>,
    },
    Let {
        name: String,
        value: Expr,
        body: Box<ActionExpr>,
    },
    If {
        cond: Expr,
        #[serde(rename = "then")]
        then_branch: Box<ActionExpr>,
        #[serde(rename = "else")]
        else_branch: Box<ActionExpr>,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm<ActionExpr>>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Unchanged { vars: Vec<String> },
    Stutter,
}

// ── Runs ────────────────────────────────────────────────────────────

/// A run built from run combinators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunExpr {
    /// Execute one action, appending one state.
    Step { action: ActionExpr },
    /// `a.then(b).then(c)`
    Then { runs: Vec<RunExpr> },
    /// `n.reps(i => body)`
    Reps {
        times: u64,
        #[serde(default)]
        index: Option<String>,
        body: Box<RunExpr>,
    },
    /// `run.expect(pred)`
    Expect { run: Box<RunExpr>, pred: Expr },
    /// `run.fail()`
    Fail { run: Box<RunExpr> },
}

// ── Temporal formulas ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemporalExpr {
    Always { pred: Expr },
    Eventually { pred: Expr },
    LeadsTo { from: Expr, to: Expr },
}
