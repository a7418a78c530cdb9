//! The typed AST: a fully resolved and semantically valid program.
//!
//! Semantic analysis raises the parser's AST into these nodes; any ambiguity
//! that requires type information is resolved before they are built. The
//! interpreter never sees this representation directly — lowering erases it
//! into the runtime IR — but the analyses and the lowerer both walk it.

use crate::builtins;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the source text, retained only where diagnostics can still
/// be produced after semantic analysis (predicate and effect references).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        SourceLocation { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ── Types ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorParameter {
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    pub name: String,
    pub parameters: Vec<CtorParameter>,
}

/// A user-defined algebraic data type. The builtin types `Int` and `String`
/// never appear here; literals are their only inhabitants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub declaration: TypeDecl,
    pub constructors: Vec<Constructor>,
}

impl Type {
    pub fn new(name: impl Into<String>, constructors: Vec<Constructor>) -> Self {
        Type {
            declaration: TypeDecl { name: name.into() },
            constructors,
        }
    }
}

// ── Values ──

/// A syntactic value, as it occurs in argument and pattern positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// `_` with its declared type.
    Anonymous { type_name: String },
    /// A named variable. `is_definition` is true at exactly one occurrence
    /// per implication.
    Variable {
        name: String,
        type_name: String,
        is_definition: bool,
    },
    /// A constructor applied to argument values.
    Ctor(CtorRef),
    StringLit(String),
    IntLit(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorRef {
    pub name: String,
    pub arguments: Vec<Value>,
}

impl Value {
    pub fn ctor(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Value::Ctor(CtorRef {
            name: name.into(),
            arguments,
        })
    }

    pub fn var(name: impl Into<String>, type_name: impl Into<String>, is_definition: bool) -> Self {
        Value::Variable {
            name: name.into(),
            type_name: type_name.into(),
            is_definition,
        }
    }
}

// ── Effects ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectDecl {
    pub name: String,
}

/// A predicate or effect-constructor parameter. `is_input_only` corresponds
/// to the `in` modifier: the argument must be ground at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub type_name: String,
    pub is_input_only: bool,
}

impl Parameter {
    pub fn new(type_name: impl Into<String>, is_input_only: bool) -> Self {
        Parameter {
            type_name: type_name.into(),
            is_input_only,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectCtor {
    pub name: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub declaration: EffectDecl,
    pub constructors: Vec<EffectCtor>,
}

impl Effect {
    pub fn new(name: impl Into<String>, constructors: Vec<EffectCtor>) -> Self {
        Effect {
            declaration: EffectDecl { name: name.into() },
            constructors,
        }
    }
}

// ── Predicates ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDecl {
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// Names of the effects this predicate may perform without handling.
    pub effects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateRef {
    pub name: String,
    pub arguments: Vec<Value>,
    pub location: SourceLocation,
}

impl PredicateRef {
    pub fn new(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        PredicateRef {
            name: name.into(),
            arguments,
            location: SourceLocation::default(),
        }
    }
}

/// An effect constructor invocation, e.g. `do msg("hi")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectCtorRef {
    pub effect_name: String,
    pub ctor_name: String,
    pub arguments: Vec<Value>,
    pub location: SourceLocation,
}

impl EffectCtorRef {
    pub fn new(
        effect_name: impl Into<String>,
        ctor_name: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        EffectCtorRef {
            effect_name: effect_name.into(),
            ctor_name: ctor_name.into(),
            arguments,
            location: SourceLocation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    TruthLit(bool),
    PredicateRef(PredicateRef),
    /// `do e(…)` with the expression proved after the effect is handled.
    /// A missing continuation lowers to `true`.
    Effect {
        call: EffectCtorRef,
        continuation: Option<Box<Expression>>,
    },
    Conjunction(Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn conjunction(left: Expression, right: Expression) -> Self {
        Expression::Conjunction(Box::new(left), Box::new(right))
    }

    pub fn effect(call: EffectCtorRef) -> Self {
        Expression::Effect {
            call,
            continuation: None,
        }
    }
}

/// The body language of effect handlers. Identical to [`Expression`] except
/// that the `continue` atom is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerExpression {
    TruthLit(bool),
    /// The `continue` atom: prove the continuation captured at the `do` site.
    Continue,
    PredicateRef(PredicateRef),
    Effect {
        call: EffectCtorRef,
        continuation: Option<Box<Expression>>,
    },
    Conjunction(Box<HandlerExpression>, Box<HandlerExpression>),
}

impl HandlerExpression {
    pub fn conjunction(left: HandlerExpression, right: HandlerExpression) -> Self {
        HandlerExpression::Conjunction(Box::new(left), Box::new(right))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implication {
    pub head: PredicateRef,
    pub body: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectImplication {
    pub head: EffectCtorRef,
    pub body: HandlerExpression,
}

/// A `handle` block: all of a predicate's effect implications for one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    pub effect_name: String,
    pub implications: Vec<EffectImplication>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPredicate {
    pub declaration: PredicateDecl,
    pub implications: Vec<Implication>,
    pub handlers: Vec<Handler>,
}

/// Groundness effect of one execution mode of a builtin predicate: which
/// arguments must arrive ground, and which are ground afterwards. Tied to
/// the left-to-right, depth-first execution model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub in_groundness: Vec<bool>,
    pub out_groundness: Vec<bool>,
}

/// A predicate hardcoded into the interpreter, such as `concat`. The
/// implementation lives in the runtime crate; only the declaration and its
/// groundness modes are visible to analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinPredicate {
    pub declaration: PredicateDecl,
    pub modes: Vec<Mode>,
}

/// A resolved view of a predicate reference: either a user definition or a
/// builtin declaration.
#[derive(Debug, Clone, Copy)]
pub enum Predicate<'a> {
    User(&'a UserPredicate),
    Builtin(&'a BuiltinPredicate),
}

impl<'a> Predicate<'a> {
    pub fn declaration(&self) -> &'a PredicateDecl {
        match self {
            Predicate::User(p) => &p.declaration,
            Predicate::Builtin(b) => &b.declaration,
        }
    }
}

// ── Program ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub types: Vec<Type>,
    pub effects: Vec<Effect>,
    pub predicates: Vec<UserPredicate>,
}

impl Program {
    pub fn new(types: Vec<Type>, effects: Vec<Effect>, predicates: Vec<UserPredicate>) -> Self {
        Program {
            types,
            effects,
            predicates,
        }
    }

    pub fn resolve_type(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.declaration.name == name)
    }

    /// Looks up a constructor of the named type, yielding its position in
    /// the type's constructor list alongside its definition.
    pub fn resolve_ctor(&self, type_name: &str, ctor_name: &str) -> Option<(usize, &Constructor)> {
        self.resolve_type(type_name)?
            .constructors
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == ctor_name)
    }

    /// Resolves an effect name against the user effects, falling back to the
    /// builtin effects.
    pub fn resolve_effect(&self, name: &str) -> Option<&Effect> {
        self.effects
            .iter()
            .find(|e| e.declaration.name == name)
            .or_else(|| {
                builtins::builtin_effects()
                    .iter()
                    .find(|e| e.declaration.name == name)
            })
    }

    pub fn resolve_effect_ctor(&self, ecr: &EffectCtorRef) -> Option<&EffectCtor> {
        self.resolve_effect(&ecr.effect_name)?
            .constructors
            .iter()
            .find(|c| c.name == ecr.ctor_name)
    }

    /// Resolves a predicate name to its user definition or, failing that, a
    /// builtin declaration.
    pub fn resolve_predicate(&self, name: &str) -> Option<Predicate<'_>> {
        self.predicates
            .iter()
            .find(|p| p.declaration.name == name)
            .map(Predicate::User)
            .or_else(|| {
                builtins::builtin_predicates()
                    .iter()
                    .find(|b| b.declaration.name == name)
                    .map(Predicate::Builtin)
            })
    }

    /// Pretty JSON dump of the checked program, backing `--print-ast`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
