//! Groundness analysis.
//!
//! Verifies that every argument to a parameter marked `in` is a ground value
//! on every path from `main`. A value is ground iff it is a literal, a
//! constructor all of whose arguments are ground, or a variable that has
//! been unified with a ground value.
//!
//! Groundness changes during execution, so the execution model matters: the
//! analysis assumes sub-proofs start with pattern matching and proceed in
//! left-to-right, depth-first order. A variable is ground if it is ground in
//! all of a predicate's witnesses; since a witness that is never produced
//! cannot be consumed, it suffices to reason by induction on proof length,
//! which is why non-recursive implications are processed before recursive
//! ones. The result never alters codegen, only diagnostics.

use crate::analysis::recursion::{for_each_pred_ref, PredDependenceGraph};
use crate::analysis::variables::implication_variables;
use crate::diagnostics::{DiagnosticEmitter, SemanticError};
use allium_core::ast::{
    EffectCtorRef, Expression, Implication, Mode, Predicate, PredicateRef, Program, SourceLocation,
    Value,
};
use std::collections::BTreeMap;

/// Groundness of the variables in one implication attempt.
type Ctx = BTreeMap<String, bool>;

/// The abstract groundness of a value. A constructor whose arguments are
/// only partially ground keeps its shape so that pattern matching on the
/// callee side can recover the ground components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Groundness {
    Ground,
    Nonground,
    Ctor(CtorGroundness),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CtorGroundness {
    pub ctor: String,
    pub arguments: Vec<Groundness>,
}

impl Groundness {
    pub fn is_ground(&self) -> bool {
        match self {
            Groundness::Ground => true,
            Groundness::Nonground => false,
            Groundness::Ctor(cg) => cg.arguments.iter().all(Groundness::is_ground),
        }
    }

    /// Greatest lower bound, propagated pointwise through constructors.
    pub fn meet(&mut self, other: &Groundness) {
        match self {
            Groundness::Ground => *self = other.clone(),
            Groundness::Nonground => {}
            Groundness::Ctor(cg) => match other {
                Groundness::Ground => {}
                Groundness::Nonground => *self = Groundness::Nonground,
                Groundness::Ctor(other_cg) => {
                    if cg.ctor == other_cg.ctor && cg.arguments.len() == other_cg.arguments.len() {
                        for (arg, other_arg) in cg.arguments.iter_mut().zip(&other_cg.arguments) {
                            arg.meet(other_arg);
                        }
                    } else {
                        *self = Groundness::Nonground;
                    }
                }
            },
        }
    }
}

/// The groundness of every argument of one predicate call. Used both as the
/// memo key (input state) and the memo value (state after a proof).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CallGroundness {
    name: String,
    arguments: Vec<Groundness>,
}

struct GroundAnalysis<'a> {
    program: &'a Program,
    emitter: &'a mut DiagnosticEmitter,
    pdg: PredDependenceGraph,

    /// Maps input groundness to output groundness for predicate modes which
    /// have already been (partially) computed; refined as the analysis
    /// proceeds for recursive predicates.
    memo: BTreeMap<CallGroundness, CallGroundness>,

    /// The variable that last made `is_ground` fail, for diagnostics.
    /// `None` inside the option means it was anonymous.
    nonground_variable: Option<String>,
}

impl<'a> GroundAnalysis<'a> {
    fn new(program: &'a Program, emitter: &'a mut DiagnosticEmitter) -> Self {
        GroundAnalysis {
            program,
            emitter,
            pdg: PredDependenceGraph::new(program),
            memo: BTreeMap::new(),
            nonground_variable: None,
        }
    }

    fn emit_grounding_error(&mut self, location: SourceLocation) {
        let error = match self.nonground_variable.take() {
            Some(name) => SemanticError::ArgumentNotGround(name),
            None => SemanticError::ArgumentNotGroundAnonymous,
        };
        self.emitter.emit(location, error);
    }

    /// True iff `value` contains no anonymous or unbound variables in `ctx`.
    fn is_ground(&mut self, ctx: &Ctx, value: &Value) -> bool {
        match value {
            Value::Anonymous { .. } => {
                self.nonground_variable = None;
                false
            }
            Value::Variable { name, .. } => {
                let ground = ctx.get(name).copied().unwrap_or(false);
                if !ground {
                    self.nonground_variable = Some(name.clone());
                }
                ground
            }
            Value::Ctor(ctor) => ctor.arguments.iter().all(|arg| self.is_ground(ctx, arg)),
            Value::StringLit(_) | Value::IntLit(_) => true,
        }
    }

    /// Marks every variable in `value` as ground. Returns whether anything
    /// changed.
    fn ground_all_variables(ctx: &mut Ctx, value: &Value) -> bool {
        match value {
            Value::Anonymous { .. } | Value::StringLit(_) | Value::IntLit(_) => false,
            Value::Variable { name, .. } => {
                let entry = ctx.entry(name.clone()).or_insert(false);
                if !*entry {
                    *entry = true;
                    true
                } else {
                    false
                }
            }
            Value::Ctor(ctor) => {
                let mut changed = false;
                for arg in &ctor.arguments {
                    changed |= Self::ground_all_variables(ctx, arg);
                }
                changed
            }
        }
    }

    /// Propagates groundness between two unified values: if either side is
    /// ground, all variables of the other become ground; otherwise ground
    /// components flow through matching constructor shapes.
    fn ground_variables_smart(
        &mut self,
        ctx1: &mut Ctx,
        v1: &Value,
        ctx2: &mut Ctx,
        v2: &Value,
    ) -> bool {
        if self.is_ground(ctx1, v1) {
            return Self::ground_all_variables(ctx2, v2);
        }
        if self.is_ground(ctx2, v2) {
            return Self::ground_all_variables(ctx1, v1);
        }

        if let (Value::Ctor(c1), Value::Ctor(c2)) = (v1, v2) {
            if c1.arguments.len() == c2.arguments.len() {
                let mut changed = false;
                for (a1, a2) in c1.arguments.iter().zip(&c2.arguments) {
                    changed |= self.ground_variables_smart(ctx1, a1, ctx2, a2);
                }
                return changed;
            }
        }
        false
    }

    fn groundness_of(&mut self, ctx: &Ctx, value: &Value) -> Groundness {
        if self.is_ground(ctx, value) {
            return Groundness::Ground;
        }
        match value {
            Value::Anonymous { .. } => Groundness::Nonground,
            Value::Variable { name, .. } => {
                if ctx.get(name).copied().unwrap_or(false) {
                    Groundness::Ground
                } else {
                    Groundness::Nonground
                }
            }
            Value::Ctor(ctor) => Groundness::Ctor(CtorGroundness {
                ctor: ctor.name.clone(),
                arguments: ctor
                    .arguments
                    .iter()
                    .map(|arg| self.groundness_of(ctx, arg))
                    .collect(),
            }),
            Value::StringLit(_) | Value::IntLit(_) => Groundness::Ground,
        }
    }

    fn call_groundness(&mut self, ctx: &Ctx, pr: &PredicateRef) -> CallGroundness {
        CallGroundness {
            name: pr.name.clone(),
            arguments: pr
                .arguments
                .iter()
                .map(|arg| self.groundness_of(ctx, arg))
                .collect(),
        }
    }

    /// Emits a diagnostic for every `in` parameter whose actual argument is
    /// not provably ground at this call.
    fn check_input_only_arguments(
        &mut self,
        ctx: &Ctx,
        arguments: &[Value],
        parameters: &[allium_core::ast::Parameter],
        location: SourceLocation,
    ) {
        for (parameter, argument) in parameters.iter().zip(arguments) {
            if parameter.is_input_only && !self.is_ground(ctx, argument) {
                self.emit_grounding_error(location);
            }
        }
    }

    /// Applies a builtin's tabulated modes: inputs must be ground, outputs
    /// become ground after the call.
    fn analyze_builtin_call(&mut self, ctx: &mut Ctx, pr: &PredicateRef, modes: &[Mode]) -> bool {
        let mut changed = false;
        for mode in modes {
            for (i, must_be_ground) in mode.in_groundness.iter().enumerate() {
                if *must_be_ground && !self.is_ground(ctx, &pr.arguments[i]) {
                    self.emit_grounding_error(pr.location);
                }
            }
            for (i, ground_after) in mode.out_groundness.iter().enumerate() {
                if *ground_after {
                    changed |= Self::ground_all_variables(ctx, &pr.arguments[i]);
                }
            }
        }
        changed
    }

    /// True iff a new argument was proven to always be ground.
    fn analyze_predicate_ref(&mut self, ctx: &mut Ctx, pr: &PredicateRef) -> bool {
        let program = self.program;
        let Some(predicate) = program.resolve_predicate(&pr.name) else {
            // Unresolved references were already diagnosed by the checker.
            return false;
        };

        // Builtins carry their `in` requirements in their modes.
        let user = match predicate {
            Predicate::Builtin(builtin) => {
                return self.analyze_builtin_call(ctx, pr, &builtin.modes);
            }
            Predicate::User(user) => user,
        };

        self.check_input_only_arguments(
            ctx,
            &pr.arguments,
            &user.declaration.parameters,
            pr.location,
        );

        // The groundness of the arguments before the sub-proof.
        let initial = self.call_groundness(ctx, pr);

        if let Some(result) = self.memo.get(&initial).cloned() {
            let mut changed = false;
            for (i, out) in result.arguments.iter().enumerate() {
                if out.is_ground() {
                    changed |= Self::ground_all_variables(ctx, &pr.arguments[i]);
                }
            }
            return changed;
        }

        // Arguments start optimistically ground and are weakened by each
        // implication that cannot guarantee them.
        let mut final_groundness = CallGroundness {
            name: pr.name.clone(),
            arguments: vec![Groundness::Ground; pr.arguments.len()],
        };

        let (nonrecursive, recursive) = self.partition_recursive_implications(user);

        // Implications which cannot make a recursive call produce proofs in
        // the fewest steps; if a variable is ground for all of them, that is
        // the base case of an inductive proof that it is always ground.
        for implication in &nonrecursive {
            self.analyze_implication(ctx, pr, implication, &mut final_groundness);
        }

        self.memo.insert(initial.clone(), final_groundness.clone());

        // Recursive implications rely on the memo to provide the induction
        // hypothesis.
        for implication in &recursive {
            self.analyze_implication(ctx, pr, implication, &mut final_groundness);
        }

        let mut changed = false;
        for (i, out) in final_groundness.arguments.iter().enumerate() {
            if out.is_ground() {
                Self::ground_all_variables(ctx, &pr.arguments[i]);
                changed = true;
            } else if let Some(memoized) = self.memo.get_mut(&initial) {
                memoized.arguments[i] = Groundness::Nonground;
            }
        }
        changed
    }

    fn partition_recursive_implications(
        &self,
        predicate: &'a allium_core::ast::UserPredicate,
    ) -> (Vec<&'a Implication>, Vec<&'a Implication>) {
        let mut nonrecursive = Vec::new();
        let mut recursive = Vec::new();
        for implication in &predicate.implications {
            let mut is_recursive = false;
            for_each_pred_ref(&implication.body, &mut |callee| {
                is_recursive |= self
                    .pdg
                    .depends_on(&callee.name, &predicate.declaration.name);
            });
            if is_recursive {
                recursive.push(implication);
            } else {
                nonrecursive.push(implication);
            }
        }
        (nonrecursive, recursive)
    }

    fn analyze_implication(
        &mut self,
        ctx: &mut Ctx,
        pr: &PredicateRef,
        implication: &Implication,
        should_ground: &mut CallGroundness,
    ) {
        let mut inner: Ctx = implication_variables(implication)
            .into_iter()
            .map(|v| (v, false))
            .collect();

        // Groundness flows from the caller into the head.
        for (argument, head_argument) in pr.arguments.iter().zip(&implication.head.arguments) {
            self.ground_variables_smart(ctx, argument, &mut inner, head_argument);
        }

        // Then through the body, to a fixed point.
        while self.analyze_expression(&mut inner, &implication.body) {}

        // And back out to the caller.
        for (i, head_argument) in implication.head.arguments.iter().enumerate() {
            let groundness = self.groundness_of(&inner, head_argument);
            should_ground.arguments[i].meet(&groundness);
        }
    }

    fn analyze_effect_ctor_ref(&mut self, ctx: &mut Ctx, ecr: &EffectCtorRef) -> bool {
        let program = self.program;
        if let Some(ctor) = program.resolve_effect_ctor(ecr) {
            self.check_input_only_arguments(ctx, &ecr.arguments, &ctor.parameters, ecr.location);
        }
        false
    }

    fn analyze_expression(&mut self, ctx: &mut Ctx, expr: &Expression) -> bool {
        match expr {
            Expression::TruthLit(_) => false,
            Expression::PredicateRef(pr) => self.analyze_predicate_ref(ctx, pr),
            Expression::Effect { call, continuation } => {
                let mut changed = self.analyze_effect_ctor_ref(ctx, call);
                if let Some(k) = continuation {
                    changed |= self.analyze_expression(ctx, k);
                }
                changed
            }
            Expression::Conjunction(left, right) => {
                let left_changed = self.analyze_expression(ctx, left);
                let right_changed = self.analyze_expression(ctx, right);
                left_changed || right_changed
            }
        }
    }

    fn analyze_main(&mut self) {
        // main is currently the only entry point, so every path starts
        // there. A missing main is diagnosed by the driver, not here.
        if self.program.resolve_predicate("main").is_none() {
            return;
        }
        let mut ctx = Ctx::new();
        self.analyze_predicate_ref(&mut ctx, &PredicateRef::new("main", vec![]));
    }
}

/// Checks every `in` parameter along every path from `main`, emitting
/// `argument_is_not_ground` diagnostics through `emitter`.
pub fn check_ground_parameters(program: &Program, emitter: &mut DiagnosticEmitter) {
    GroundAnalysis::new(program, emitter).analyze_main();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meet_is_pointwise_through_constructors() {
        let mut a = Groundness::Ctor(CtorGroundness {
            ctor: "s".into(),
            arguments: vec![Groundness::Ground],
        });
        a.meet(&Groundness::Ctor(CtorGroundness {
            ctor: "s".into(),
            arguments: vec![Groundness::Nonground],
        }));
        assert!(!a.is_ground());

        let mut b = Groundness::Ground;
        b.meet(&Groundness::Nonground);
        assert_eq!(b, Groundness::Nonground);

        let mut c = Groundness::Ctor(CtorGroundness {
            ctor: "s".into(),
            arguments: vec![Groundness::Ground],
        });
        c.meet(&Groundness::Ground);
        assert!(c.is_ground());
    }

    #[test]
    fn mismatched_constructors_meet_to_nonground() {
        let mut a = Groundness::Ctor(CtorGroundness {
            ctor: "s".into(),
            arguments: vec![Groundness::Ground],
        });
        a.meet(&Groundness::Ctor(CtorGroundness {
            ctor: "z".into(),
            arguments: vec![],
        }));
        assert_eq!(a, Groundness::Nonground);
    }
}
