//! The runtime IR executed by the proof-search interpreter.
//!
//! Lowering erases all syntactic information from the typed AST: names
//! become indices into the owning [`Program`], variables become positions in
//! a per-implication variable table, and builtin references become closed
//! tags. Keeping these types separate from the AST enforces a strict split
//! between lexical and execution information.

use crate::builtins::BuiltinPredicateKind;
use crate::config::Config;
use crate::values::{unbound_cell, CellRef, Context, RuntimeCtorRef, RuntimeValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

// ── Matcher values ──

/// A constructor pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherCtorRef {
    pub index: usize,
    pub arguments: Vec<MatcherValue>,
}

impl MatcherCtorRef {
    pub fn new(index: usize, arguments: Vec<MatcherValue>) -> Self {
        MatcherCtorRef { index, arguments }
    }
}

/// A variable pattern: an index into the enclosing implication's variable
/// table, or the anonymous sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherVariable {
    pub index: usize,
    /// Whether the variable's type has any constructible value. A witness
    /// must never assert the existence of a value of an uninhabited type,
    /// so an unbindable variable of such a type fails to match.
    pub is_type_inhabited: bool,
}

impl MatcherVariable {
    pub const ANONYMOUS_INDEX: usize = usize::MAX;

    pub fn new(index: usize) -> Self {
        MatcherVariable {
            index,
            is_type_inhabited: true,
        }
    }

    pub fn anonymous(is_type_inhabited: bool) -> Self {
        MatcherVariable {
            index: Self::ANONYMOUS_INDEX,
            is_type_inhabited,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.index == Self::ANONYMOUS_INDEX
    }
}

/// A pattern used to test a runtime value, possibly binding variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatcherValue {
    Ctor(MatcherCtorRef),
    Str(String),
    Int(i64),
    Variable(MatcherVariable),
    /// An indirection into an already-allocated cell. Never produced by
    /// lowering; instantiation substitutes these for variables whose cells
    /// have been bound, so that captured expressions no longer depend on
    /// the frame that defined them.
    Cell(CellRef),
}

impl MatcherValue {
    pub fn ctor(index: usize, arguments: Vec<MatcherValue>) -> Self {
        MatcherValue::Ctor(MatcherCtorRef::new(index, arguments))
    }

    pub fn var(index: usize) -> Self {
        MatcherValue::Variable(MatcherVariable::new(index))
    }

    /// Views this matcher as a runtime value in the given frame: variables
    /// become redirects to their cells, anonymous variables get a fresh
    /// throwaway cell, and constructors lower componentwise.
    pub fn lower(&self, context: &Context) -> RuntimeValue {
        match self {
            MatcherValue::Ctor(ctor) => RuntimeValue::Ctor(RuntimeCtorRef::new(
                ctor.index,
                ctor.arguments.iter().map(|a| a.lower(context)).collect(),
            )),
            MatcherValue::Str(s) => RuntimeValue::Str(s.clone()),
            MatcherValue::Int(i) => RuntimeValue::Int(*i),
            MatcherValue::Variable(v) => {
                if v.is_anonymous() {
                    RuntimeValue::Redirect(unbound_cell())
                } else {
                    RuntimeValue::Redirect(Rc::clone(&context[v.index]))
                }
            }
            MatcherValue::Cell(cell) => RuntimeValue::Redirect(Rc::clone(cell)),
        }
    }
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateReference {
    /// The index into the program's predicate list.
    pub index: usize,
    pub arguments: Vec<MatcherValue>,
}

impl PredicateReference {
    pub fn new(index: usize, arguments: Vec<MatcherValue>) -> Self {
        PredicateReference { index, arguments }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinPredicateReference {
    pub predicate: BuiltinPredicateKind,
    pub arguments: Vec<MatcherValue>,
}

/// An effect invocation. The continuation is the expression proved after
/// the handler allows execution to resume; it is captured by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectCtorRef {
    pub effect_index: usize,
    pub effect_ctor_index: usize,
    pub arguments: Vec<MatcherValue>,
    pub continuation: Box<Expression>,
}

impl EffectCtorRef {
    pub fn new(
        effect_index: usize,
        effect_ctor_index: usize,
        arguments: Vec<MatcherValue>,
        continuation: Expression,
    ) -> Self {
        EffectCtorRef {
            effect_index,
            effect_ctor_index,
            arguments,
            continuation: Box::new(continuation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    TruthValue(bool),
    PredicateReference(PredicateReference),
    BuiltinPredicateReference(BuiltinPredicateReference),
    EffectCtorRef(EffectCtorRef),
    Conjunction(Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn conjunction(left: Expression, right: Expression) -> Self {
        Expression::Conjunction(Box::new(left), Box::new(right))
    }
}

impl From<PredicateReference> for Expression {
    fn from(pr: PredicateReference) -> Self {
        Expression::PredicateReference(pr)
    }
}

/// The body language of effect handlers: ordinary expressions plus the
/// `continue` atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HandlerExpression {
    TruthValue(bool),
    /// Prove the continuation captured at the `do` site.
    Continuation,
    PredicateReference(PredicateReference),
    BuiltinPredicateReference(BuiltinPredicateReference),
    EffectCtorRef(EffectCtorRef),
    Conjunction(Box<HandlerExpression>, Box<HandlerExpression>),
}

impl HandlerExpression {
    pub fn conjunction(left: HandlerExpression, right: HandlerExpression) -> Self {
        HandlerExpression::Conjunction(Box::new(left), Box::new(right))
    }
}

// ── Implications, handlers, predicates ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implication {
    pub head: PredicateReference,
    pub body: Expression,
    /// Size of the local context allocated for each attempt of this
    /// implication. Every non-anonymous variable index in the head and body
    /// is below this count.
    pub variable_count: usize,
}

impl Implication {
    pub fn new(head: PredicateReference, body: Expression, variable_count: usize) -> Self {
        Implication {
            head,
            body,
            variable_count,
        }
    }
}

/// The head of an effect implication: one constructor of the handled effect
/// with argument patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectImplHead {
    pub effect_index: usize,
    pub effect_ctor_index: usize,
    pub arguments: Vec<MatcherValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectImplication {
    pub head: EffectImplHead,
    pub body: HandlerExpression,
    pub variable_count: usize,
}

/// One `handle` block of a predicate, covering a single effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserHandler {
    pub effect_index: usize,
    pub implications: Vec<EffectImplication>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Predicate {
    pub implications: Vec<Implication>,
    pub handlers: Vec<UserHandler>,
}

impl Predicate {
    pub fn new(implications: Vec<Implication>) -> Self {
        Predicate {
            implications,
            handlers: vec![],
        }
    }

    pub fn with_handlers(implications: Vec<Implication>, handlers: Vec<UserHandler>) -> Self {
        Predicate {
            implications,
            handlers,
        }
    }
}

// ── Program ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Predicates refer to each other through indices into this list.
    pub predicates: Vec<Predicate>,
    /// The proof obligation of the whole program, i.e. `main`, if defined.
    /// A program without one always rejects.
    pub entry_point: Option<PredicateReference>,
    /// Predicate names, for diagnostics only.
    pub predicate_names: Vec<String>,
    pub config: Config,
}

impl Program {
    pub fn new(predicates: Vec<Predicate>, entry_point: Option<PredicateReference>) -> Self {
        Program {
            predicates,
            entry_point,
            predicate_names: vec![],
            config: Config::default(),
        }
    }

    pub fn with_names(
        predicates: Vec<Predicate>,
        entry_point: Option<PredicateReference>,
        predicate_names: Vec<String>,
        config: Config,
    ) -> Self {
        Program {
            predicates,
            entry_point,
            predicate_names,
            config,
        }
    }

    pub fn predicate(&self, index: usize) -> Option<&Predicate> {
        self.predicates.get(index)
    }

    /// Renders a call through the name table for trace output. Falls back
    /// to the raw index when no names were recorded.
    pub fn call_debug_string(&self, pr: &PredicateReference) -> String {
        let name = self
            .predicate_names
            .get(pr.index)
            .cloned()
            .unwrap_or_else(|| pr.index.to_string());
        let args: Vec<String> = pr.arguments.iter().map(|a| a.to_string()).collect();
        format!("{}({})", name, args.join(", "))
    }
}

// ── Debug formatting ──

impl fmt::Display for MatcherVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            write!(f, "var _")
        } else {
            write!(f, "var {}", self.index)
        }
    }
}

impl fmt::Display for MatcherValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherValue::Ctor(ctor) => {
                write!(f, "{}(", ctor.index)?;
                for arg in &ctor.arguments {
                    write!(f, "{}, ", arg)?;
                }
                write!(f, ")")
            }
            MatcherValue::Str(s) => write!(f, "{}", s),
            MatcherValue::Int(i) => write!(f, "{}", i),
            MatcherValue::Variable(v) => write!(f, "{}", v),
            MatcherValue::Cell(cell) => write!(f, "{}", cell.borrow()),
        }
    }
}

impl fmt::Display for PredicateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.index)?;
        for arg in &self.arguments {
            write!(f, "{}, ", arg)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for BuiltinPredicateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for arg in &self.arguments {
            write!(f, "{}, ", arg)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for EffectCtorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "do {}.{} {{ {} }}",
            self.effect_index, self.effect_ctor_index, self.continuation
        )
    }
}

impl fmt::Display for EffectImplHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "do {}.{}", self.effect_index, self.effect_ctor_index)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::TruthValue(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            Expression::PredicateReference(pr) => write!(f, "{}", pr),
            Expression::BuiltinPredicateReference(bpr) => write!(f, "{}", bpr),
            Expression::EffectCtorRef(ecr) => write!(f, "{}", ecr),
            Expression::Conjunction(left, right) => write!(f, "({} and {})", left, right),
        }
    }
}

impl fmt::Display for HandlerExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerExpression::TruthValue(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            HandlerExpression::Continuation => write!(f, "continue"),
            HandlerExpression::PredicateReference(pr) => write!(f, "{}", pr),
            HandlerExpression::BuiltinPredicateReference(bpr) => write!(f, "{}", bpr),
            HandlerExpression::EffectCtorRef(ecr) => write!(f, "{}", ecr),
            HandlerExpression::Conjunction(left, right) => write!(f, "({} and {})", left, right),
        }
    }
}

impl fmt::Display for Implication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.head, self.body)
    }
}

impl fmt::Display for EffectImplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {};", self.head, self.body)
    }
}

impl fmt::Display for UserHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "handle {} {{", self.effect_index)?;
        for impl_ in &self.implications {
            writeln!(f, "    {}", impl_)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pred {{")?;
        for impl_ in &self.implications {
            writeln!(f, "    {}", impl_)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program")?;
        for pred in &self.predicates {
            writeln!(f, "    {}", pred)?;
        }
        Ok(())
    }
}
