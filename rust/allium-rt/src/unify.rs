//! Unification of runtime values against matchers.
//!
//! A goal's arguments are lowered into the caller's frame and then matched
//! against the head patterns of an implication, whose variables index a
//! freshly allocated callee frame. Arguments are matched left to right and
//! the first mismatch fails the whole match. Binding writes are speculative:
//! a failed implication simply discards its local frame, while writes that
//! reached the caller's cells persist — they are how witness outputs flow
//! upward.

use allium_core::ir::{
    BuiltinPredicateReference, EffectCtorRef, EffectImplHead, Expression, HandlerExpression,
    MatcherCtorRef, MatcherValue, MatcherVariable, PredicateReference,
};
use allium_core::values::{target, unbound_cell, CellRef, Context, RuntimeCtorRef, RuntimeValue};
use std::rc::Rc;

/// Matches a call against an implication head. `caller` is the frame the
/// goal's variables live in; `local` is the callee frame being populated.
pub fn match_head(
    goal: &PredicateReference,
    head: &PredicateReference,
    caller: &Context,
    local: &Context,
) -> bool {
    goal.index == head.index
        && goal.arguments.len() == head.arguments.len()
        && match_arguments(&goal.arguments, &head.arguments, caller, local)
}

/// Matches an effect invocation against an effect implication head.
pub fn match_effect_head(
    goal: &EffectCtorRef,
    head: &EffectImplHead,
    caller: &Context,
    local: &Context,
) -> bool {
    goal.effect_index == head.effect_index
        && goal.effect_ctor_index == head.effect_ctor_index
        && goal.arguments.len() == head.arguments.len()
        && match_arguments(&goal.arguments, &head.arguments, caller, local)
}

fn match_arguments(
    goal_arguments: &[MatcherValue],
    head_arguments: &[MatcherValue],
    caller: &Context,
    local: &Context,
) -> bool {
    goal_arguments
        .iter()
        .zip(head_arguments)
        .all(|(goal_argument, head_argument)| {
            // Passing `_` of an uninhabited type asserts the existence of an
            // impossible value; the proof fails here rather than producing a
            // vacuous witness.
            if let MatcherValue::Variable(v) = goal_argument {
                if v.is_anonymous() && !v.is_type_inhabited {
                    return false;
                }
            }
            let subject = goal_argument.lower(caller);
            match_value(&subject, head_argument, local)
        })
}

/// Matches a runtime value against a matcher, binding variables of the
/// `local` frame as needed.
pub fn match_value(subject: &RuntimeValue, matcher: &MatcherValue, local: &Context) -> bool {
    match subject {
        RuntimeValue::Redirect(cell) => match_cell(cell, matcher, local),
        // A bare undefined value carries no cell to constrain; only an
        // anonymous matcher accepts it.
        RuntimeValue::Undefined => {
            matches!(matcher, MatcherValue::Variable(v) if v.is_anonymous() && v.is_type_inhabited)
        }
        RuntimeValue::Ctor(ctor) => match matcher {
            MatcherValue::Ctor(matcher_ctor) => match_ctor(ctor, matcher_ctor, local),
            MatcherValue::Str(_) | MatcherValue::Int(_) => false,
            MatcherValue::Variable(v) => match_concrete_with_variable(subject, *v, local),
            MatcherValue::Cell(cell) => {
                unify(subject, &RuntimeValue::Redirect(Rc::clone(cell)))
            }
        },
        RuntimeValue::Str(s) => match matcher {
            MatcherValue::Str(t) => s == t,
            MatcherValue::Ctor(_) | MatcherValue::Int(_) => false,
            MatcherValue::Variable(v) => match_concrete_with_variable(subject, *v, local),
            MatcherValue::Cell(cell) => {
                unify(subject, &RuntimeValue::Redirect(Rc::clone(cell)))
            }
        },
        RuntimeValue::Int(i) => match matcher {
            MatcherValue::Int(j) => i == j,
            MatcherValue::Ctor(_) | MatcherValue::Str(_) => false,
            MatcherValue::Variable(v) => match_concrete_with_variable(subject, *v, local),
            MatcherValue::Cell(cell) => {
                unify(subject, &RuntimeValue::Redirect(Rc::clone(cell)))
            }
        },
    }
}

fn match_ctor(subject: &RuntimeCtorRef, matcher: &MatcherCtorRef, local: &Context) -> bool {
    subject.index == matcher.index
        && subject.arguments.len() == matcher.arguments.len()
        && subject
            .arguments
            .iter()
            .zip(&matcher.arguments)
            .all(|(s, m)| match_value(s, m, local))
}

/// A concrete subject against a variable matcher: bind the local cell if it
/// is still free, otherwise unify with its stored value.
fn match_concrete_with_variable(
    subject: &RuntimeValue,
    variable: MatcherVariable,
    local: &Context,
) -> bool {
    if variable.is_anonymous() {
        return variable.is_type_inhabited;
    }
    let cell = target(&local[variable.index]);
    let content = cell.borrow().clone();
    if content.is_defined() {
        unify(subject, &content)
    } else {
        if !variable.is_type_inhabited {
            return false;
        }
        *cell.borrow_mut() = subject.clone();
        true
    }
}

/// A subject behind a variable cell. A bound cell is matched through its
/// value; an unbound cell takes the matcher's shape, so that pattern
/// matching doubles as construction of the witness.
fn match_cell(cell: &CellRef, matcher: &MatcherValue, local: &Context) -> bool {
    let cell = target(cell);
    let content = cell.borrow().clone();
    if content.is_defined() {
        return match_value(&content, matcher, local);
    }

    match matcher {
        MatcherValue::Ctor(matcher_ctor) => {
            // Fill the cell with a constructor of the right shape whose
            // children are fresh cells, then constrain the children.
            let arguments: Vec<RuntimeValue> = matcher_ctor
                .arguments
                .iter()
                .map(|_| RuntimeValue::Redirect(unbound_cell()))
                .collect();
            *cell.borrow_mut() =
                RuntimeValue::Ctor(RuntimeCtorRef::new(matcher_ctor.index, arguments.clone()));
            arguments
                .iter()
                .zip(&matcher_ctor.arguments)
                .all(|(s, m)| match_value(s, m, local))
        }
        MatcherValue::Str(s) => {
            *cell.borrow_mut() = RuntimeValue::Str(s.clone());
            true
        }
        MatcherValue::Int(i) => {
            *cell.borrow_mut() = RuntimeValue::Int(*i);
            true
        }
        MatcherValue::Variable(v) => {
            if v.is_anonymous() {
                return v.is_type_inhabited;
            }
            let local_cell = target(&local[v.index]);
            if Rc::ptr_eq(&local_cell, &cell) {
                return true;
            }
            let local_content = local_cell.borrow().clone();
            if local_content.is_defined() {
                unify(&RuntimeValue::Redirect(cell), &local_content)
            } else {
                // Bind the two cells together. The local cell points into
                // the enclosing frame, which outlives it.
                *local_cell.borrow_mut() = RuntimeValue::Redirect(cell);
                true
            }
        }
        MatcherValue::Cell(other) => unify(
            &RuntimeValue::Redirect(cell),
            &RuntimeValue::Redirect(Rc::clone(other)),
        ),
    }
}

enum Resolved {
    Free(CellRef),
    Value(RuntimeValue),
}

fn resolve(value: &RuntimeValue) -> Resolved {
    match value {
        RuntimeValue::Redirect(cell) => {
            let cell = target(cell);
            let content = cell.borrow().clone();
            if content.is_defined() {
                Resolved::Value(content)
            } else {
                Resolved::Free(cell)
            }
        }
        other => Resolved::Value(other.clone()),
    }
}

/// Unification of two runtime values: used when a variable already holds a
/// value and another constraint arrives.
pub fn unify(left: &RuntimeValue, right: &RuntimeValue) -> bool {
    match (resolve(left), resolve(right)) {
        (Resolved::Free(a), Resolved::Free(b)) => {
            if !Rc::ptr_eq(&a, &b) {
                *a.borrow_mut() = RuntimeValue::Redirect(b);
            }
            true
        }
        (Resolved::Free(cell), Resolved::Value(value))
        | (Resolved::Value(value), Resolved::Free(cell)) => {
            if value.is_defined() {
                *cell.borrow_mut() = value;
            }
            true
        }
        (Resolved::Value(a), Resolved::Value(b)) => unify_concrete(&a, &b),
    }
}

fn unify_concrete(left: &RuntimeValue, right: &RuntimeValue) -> bool {
    match (left, right) {
        (RuntimeValue::Undefined, _) | (_, RuntimeValue::Undefined) => true,
        (RuntimeValue::Ctor(a), RuntimeValue::Ctor(b)) => {
            a.index == b.index
                && a.arguments.len() == b.arguments.len()
                && a.arguments
                    .iter()
                    .zip(&b.arguments)
                    .all(|(x, y)| unify(x, y))
        }
        (RuntimeValue::Str(a), RuntimeValue::Str(b)) => a == b,
        (RuntimeValue::Int(a), RuntimeValue::Int(b)) => a == b,
        _ => false,
    }
}

// ── Instantiation ──

fn instantiate_value(matcher: &MatcherValue, context: &Context) -> MatcherValue {
    match matcher {
        MatcherValue::Ctor(ctor) => MatcherValue::Ctor(MatcherCtorRef::new(
            ctor.index,
            ctor.arguments
                .iter()
                .map(|arg| instantiate_value(arg, context))
                .collect(),
        )),
        MatcherValue::Variable(v) => {
            if !v.is_anonymous() && context[v.index].borrow().is_defined() {
                return MatcherValue::Cell(Rc::clone(&context[v.index]));
            }
            MatcherValue::Variable(*v)
        }
        other => other.clone(),
    }
}

fn instantiate_arguments(arguments: &[MatcherValue], context: &Context) -> Vec<MatcherValue> {
    arguments
        .iter()
        .map(|arg| instantiate_value(arg, context))
        .collect()
}

/// Produces a copy of `expr` in which every variable whose cell has been
/// bound is replaced by an indirection into that cell. Literals and unbound
/// references are preserved. Captured expressions (effect continuations)
/// thereby stop depending on the frame that created them.
pub fn instantiate(expr: &Expression, context: &Context) -> Expression {
    match expr {
        Expression::TruthValue(v) => Expression::TruthValue(*v),
        Expression::PredicateReference(pr) => {
            Expression::PredicateReference(PredicateReference::new(
                pr.index,
                instantiate_arguments(&pr.arguments, context),
            ))
        }
        Expression::BuiltinPredicateReference(bpr) => {
            Expression::BuiltinPredicateReference(BuiltinPredicateReference {
                predicate: bpr.predicate,
                arguments: instantiate_arguments(&bpr.arguments, context),
            })
        }
        Expression::EffectCtorRef(ecr) => Expression::EffectCtorRef(EffectCtorRef::new(
            ecr.effect_index,
            ecr.effect_ctor_index,
            instantiate_arguments(&ecr.arguments, context),
            instantiate(&ecr.continuation, context),
        )),
        Expression::Conjunction(left, right) => Expression::conjunction(
            instantiate(left, context),
            instantiate(right, context),
        ),
    }
}

/// [`instantiate`] for handler bodies; the `continue` atom has no variables
/// of its own and is preserved.
pub fn instantiate_handler(expr: &HandlerExpression, context: &Context) -> HandlerExpression {
    match expr {
        HandlerExpression::TruthValue(v) => HandlerExpression::TruthValue(*v),
        HandlerExpression::Continuation => HandlerExpression::Continuation,
        HandlerExpression::PredicateReference(pr) => {
            HandlerExpression::PredicateReference(PredicateReference::new(
                pr.index,
                instantiate_arguments(&pr.arguments, context),
            ))
        }
        HandlerExpression::BuiltinPredicateReference(bpr) => {
            HandlerExpression::BuiltinPredicateReference(BuiltinPredicateReference {
                predicate: bpr.predicate,
                arguments: instantiate_arguments(&bpr.arguments, context),
            })
        }
        HandlerExpression::EffectCtorRef(ecr) => HandlerExpression::EffectCtorRef(
            EffectCtorRef::new(
                ecr.effect_index,
                ecr.effect_ctor_index,
                instantiate_arguments(&ecr.arguments, context),
                instantiate(&ecr.continuation, context),
            ),
        ),
        HandlerExpression::Conjunction(left, right) => HandlerExpression::conjunction(
            instantiate_handler(left, context),
            instantiate_handler(right, context),
        ),
    }
}
