//! Proof-search tests over hand-lowered programs.

use allium_core::ir::{
    EffectCtorRef, EffectImplHead, EffectImplication, Expression, HandlerExpression, Implication,
    MatcherValue, MatcherVariable, Predicate, PredicateReference, Program, UserHandler,
};
use allium_core::values::{fresh_context, Context, RuntimeValue};
use allium_rt::witness::{HandlerKind, HandlerStack, Witnesses};
use allium_rt::{prove, FatalError};
use allium_rt::intrinsics::BuiltinEffectHandler;
use allium_core::builtins::IO_EFFECT_INDEX;

fn pred_ref(index: usize, arguments: Vec<MatcherValue>) -> Expression {
    Expression::PredicateReference(PredicateReference::new(index, arguments))
}

/// The shared fixture:
/// ```text
/// pred a { a <- true; }
/// pred b { }
/// pred c(Nat) { c(z) <- true; c(s(let x)) <- c(x); }
/// pred d(Nat) { d(s(z)) <- true; }
/// pred e { e <- c(let x); }
/// ```
fn fixture() -> Program {
    Program::new(
        vec![
            Predicate::new(vec![Implication::new(
                PredicateReference::new(0, vec![]),
                Expression::TruthValue(true),
                0,
            )]),
            Predicate::new(vec![]),
            Predicate::new(vec![
                Implication::new(
                    PredicateReference::new(2, vec![MatcherValue::ctor(0, vec![])]),
                    Expression::TruthValue(true),
                    0,
                ),
                Implication::new(
                    PredicateReference::new(
                        2,
                        vec![MatcherValue::ctor(1, vec![MatcherValue::var(0)])],
                    ),
                    pred_ref(2, vec![MatcherValue::var(0)]),
                    1,
                ),
            ]),
            Predicate::new(vec![Implication::new(
                PredicateReference::new(
                    3,
                    vec![MatcherValue::ctor(1, vec![MatcherValue::ctor(0, vec![])])],
                ),
                Expression::TruthValue(true),
                0,
            )]),
            Predicate::new(vec![Implication::new(
                PredicateReference::new(4, vec![]),
                pred_ref(2, vec![MatcherValue::var(0)]),
                1,
            )]),
        ],
        None,
    )
}

/// Counts all witnesses of `expr` in a fresh proof.
fn count_witnesses(program: &Program, expr: Expression, context: Context) -> usize {
    let handlers = HandlerStack::new().push(
        IO_EFFECT_INDEX,
        HandlerKind::Builtin(BuiltinEffectHandler::Io),
    );
    let mut witnesses = Witnesses::new(program, expr, context, handlers).unwrap();
    let mut count = 0;
    while witnesses.advance().unwrap() {
        count += 1;
    }
    count
}

#[test]
fn prove_truth_literal() {
    let program = fixture();
    assert_eq!(prove(&program, &Expression::TruthValue(true)), Ok(true));
    assert_eq!(prove(&program, &Expression::TruthValue(false)), Ok(false));
}

#[test]
fn prove_predicate() {
    let program = fixture();
    assert_eq!(prove(&program, &pred_ref(0, vec![])), Ok(true));
    assert_eq!(prove(&program, &pred_ref(1, vec![])), Ok(false));
}

#[test]
fn prove_predicate_with_arguments() {
    let program = fixture();
    let z = || MatcherValue::ctor(0, vec![]);
    let s = |inner| MatcherValue::ctor(1, vec![inner]);

    assert_eq!(prove(&program, &pred_ref(2, vec![z()])), Ok(true));
    assert_eq!(prove(&program, &pred_ref(2, vec![s(z())])), Ok(true));
    assert_eq!(prove(&program, &pred_ref(2, vec![s(s(z()))])), Ok(true));
}

#[test]
fn cannot_prove_predicate_with_nonmatching_implication() {
    let program = fixture();
    assert_eq!(
        prove(&program, &pred_ref(3, vec![MatcherValue::ctor(0, vec![])])),
        Ok(false)
    );
}

#[test]
fn prove_predicate_with_existentially_quantified_variable() {
    // Proves c(let x) by way of c(z) <- true, so the witness is x = z. The
    // indirection through e keeps the top-level goal variable-free.
    let program = fixture();
    assert_eq!(prove(&program, &pred_ref(4, vec![])), Ok(true));
}

#[test]
fn prove_conjunction_of_truth_values() {
    let program = fixture();
    let t = || Expression::TruthValue(true);
    let f = || Expression::TruthValue(false);

    assert_eq!(prove(&program, &Expression::conjunction(t(), t())), Ok(true));
    assert_eq!(prove(&program, &Expression::conjunction(t(), f())), Ok(false));
    assert_eq!(prove(&program, &Expression::conjunction(f(), t())), Ok(false));
    assert_eq!(prove(&program, &Expression::conjunction(f(), f())), Ok(false));
}

#[test]
fn prove_conjunction_of_predicates() {
    let program = fixture();
    assert_eq!(
        prove(
            &program,
            &Expression::conjunction(pred_ref(0, vec![]), pred_ref(0, vec![]))
        ),
        Ok(true)
    );
    assert_eq!(
        prove(
            &program,
            &Expression::conjunction(pred_ref(0, vec![]), pred_ref(1, vec![]))
        ),
        Ok(false)
    );
    assert_eq!(
        prove(
            &program,
            &Expression::conjunction(pred_ref(1, vec![]), pred_ref(0, vec![]))
        ),
        Ok(false)
    );
}

#[test]
fn witnesses_follow_implication_source_order_and_count() {
    // pred two(Nat) { two(z) <- true; two(s(z)) <- true; }
    let program = Program::new(
        vec![Predicate::new(vec![
            Implication::new(
                PredicateReference::new(0, vec![MatcherValue::ctor(0, vec![])]),
                Expression::TruthValue(true),
                0,
            ),
            Implication::new(
                PredicateReference::new(
                    0,
                    vec![MatcherValue::ctor(1, vec![MatcherValue::ctor(0, vec![])])],
                ),
                Expression::TruthValue(true),
                0,
            ),
        ])],
        None,
    );

    // An unconstrained query runs through both implications.
    let anonymous = MatcherValue::Variable(MatcherVariable::anonymous(true));
    assert_eq!(
        count_witnesses(&program, pred_ref(0, vec![anonymous.clone()]), Context::new()),
        2
    );

    // A conjunction multiplies witnesses: the left is the outer loop.
    assert_eq!(
        count_witnesses(
            &program,
            Expression::conjunction(
                pred_ref(0, vec![anonymous.clone()]),
                pred_ref(0, vec![anonymous.clone()])
            ),
            Context::new()
        ),
        4
    );
}

#[test]
fn first_witness_determines_the_caller_binding() {
    // With two(let r), the first implication in source order provides the
    // first witness, so r is bound to z.
    let program = Program::new(
        vec![Predicate::new(vec![
            Implication::new(
                PredicateReference::new(0, vec![MatcherValue::ctor(0, vec![])]),
                Expression::TruthValue(true),
                0,
            ),
            Implication::new(
                PredicateReference::new(
                    0,
                    vec![MatcherValue::ctor(1, vec![MatcherValue::ctor(0, vec![])])],
                ),
                Expression::TruthValue(true),
                0,
            ),
        ])],
        None,
    );

    let context = fresh_context(1);
    let handlers = HandlerStack::new();
    let mut witnesses = Witnesses::new(
        &program,
        pred_ref(0, vec![MatcherValue::var(0)]),
        context.clone(),
        handlers,
    )
    .unwrap();

    assert_eq!(witnesses.advance(), Ok(true));
    match RuntimeValue::Redirect(context[0].clone()).resolved() {
        RuntimeValue::Ctor(ctor) => assert_eq!(ctor.index, 0),
        other => panic!("expected z, got {:?}", other),
    }
}

#[test]
fn caller_bindings_persist_across_implication_retries() {
    // pred p(Nat) { p(s(let x)) <- false; p(let y) <- true; }
    //
    // The first implication's head binds the caller's variable to s(_),
    // then its body fails. The binding is not undone; the second
    // implication still matches and produces the witness.
    let program = Program::new(
        vec![Predicate::new(vec![
            Implication::new(
                PredicateReference::new(
                    0,
                    vec![MatcherValue::ctor(1, vec![MatcherValue::var(0)])],
                ),
                Expression::TruthValue(false),
                1,
            ),
            Implication::new(
                PredicateReference::new(0, vec![MatcherValue::var(0)]),
                Expression::TruthValue(true),
                1,
            ),
        ])],
        None,
    );

    let context = fresh_context(1);
    let mut witnesses = Witnesses::new(
        &program,
        pred_ref(0, vec![MatcherValue::var(0)]),
        context.clone(),
        HandlerStack::new(),
    )
    .unwrap();

    assert_eq!(witnesses.advance(), Ok(true));
    match RuntimeValue::Redirect(context[0].clone()).resolved() {
        RuntimeValue::Ctor(ctor) => assert_eq!(ctor.index, 1),
        other => panic!("expected the persisted s(_) binding, got {:?}", other),
    }
}

#[test]
fn uninhabited_existence_proofs_are_rejected() {
    // pred p(Void) { p(_) <- true; } — Void has no constructors, so the
    // anonymous head variable can never stand for a value.
    let program = Program::new(
        vec![Predicate::new(vec![Implication::new(
            PredicateReference::new(
                0,
                vec![MatcherValue::Variable(MatcherVariable::anonymous(false))],
            ),
            Expression::TruthValue(true),
            0,
        )])],
        None,
    );

    assert_eq!(
        prove(
            &program,
            &pred_ref(
                0,
                vec![MatcherValue::Variable(MatcherVariable::anonymous(false))]
            )
        ),
        Ok(false)
    );
}

// ── Effects and handlers ──

/// A program whose predicate 0 proves `do 1.0("hi") { k }` under its own
/// handler for effect 1 with the given handler body.
fn handler_fixture(handler_body: HandlerExpression, continuation: Expression) -> Program {
    Program::new(
        vec![Predicate::with_handlers(
            vec![Implication::new(
                PredicateReference::new(0, vec![]),
                Expression::EffectCtorRef(EffectCtorRef::new(
                    1,
                    0,
                    vec![MatcherValue::Str("hi".into())],
                    continuation,
                )),
                0,
            )],
            vec![UserHandler {
                effect_index: 1,
                implications: vec![EffectImplication {
                    head: EffectImplHead {
                        effect_index: 1,
                        effect_ctor_index: 0,
                        arguments: vec![MatcherValue::var(0)],
                    },
                    body: handler_body,
                    variable_count: 1,
                }],
            }],
        )],
        None,
    )
}

#[test]
fn user_handler_proves_the_effect() {
    let program = handler_fixture(
        HandlerExpression::TruthValue(true),
        Expression::TruthValue(true),
    );
    assert_eq!(prove(&program, &pred_ref(0, vec![])), Ok(true));
}

#[test]
fn user_handler_can_refuse_the_effect() {
    let program = handler_fixture(
        HandlerExpression::TruthValue(false),
        Expression::TruthValue(true),
    );
    assert_eq!(prove(&program, &pred_ref(0, vec![])), Ok(false));
}

#[test]
fn continue_proves_the_captured_continuation() {
    // The handler resumes, so the proof's outcome is the continuation's.
    let succeeding = handler_fixture(
        HandlerExpression::Continuation,
        Expression::TruthValue(true),
    );
    assert_eq!(prove(&succeeding, &pred_ref(0, vec![])), Ok(true));

    let failing = handler_fixture(
        HandlerExpression::Continuation,
        Expression::TruthValue(false),
    );
    assert_eq!(prove(&failing, &pred_ref(0, vec![])), Ok(false));
}

#[test]
fn handler_pattern_match_binds_effect_arguments() {
    // handle 1 { msg(let s) <- concat(s, "!", let out); } — exercises that
    // the handler's local frame receives the effect argument.
    let program = handler_fixture(
        HandlerExpression::BuiltinPredicateReference(
            allium_core::ir::BuiltinPredicateReference {
                predicate: allium_core::builtins::BuiltinPredicateKind::Concat,
                arguments: vec![
                    MatcherValue::var(0),
                    MatcherValue::Str("!".into()),
                    MatcherValue::Str("hi!".into()),
                ],
            },
        ),
        Expression::TruthValue(true),
    );
    assert_eq!(prove(&program, &pred_ref(0, vec![])), Ok(true));
}

#[test]
fn handler_implications_are_tried_in_source_order() {
    // Two implications for the same constructor: the first refuses, the
    // second resumes. The effect is still provable.
    let program = Program::new(
        vec![Predicate::with_handlers(
            vec![Implication::new(
                PredicateReference::new(0, vec![]),
                Expression::EffectCtorRef(EffectCtorRef::new(
                    1,
                    0,
                    vec![MatcherValue::Str("hi".into())],
                    Expression::TruthValue(true),
                )),
                0,
            )],
            vec![UserHandler {
                effect_index: 1,
                implications: vec![
                    EffectImplication {
                        head: EffectImplHead {
                            effect_index: 1,
                            effect_ctor_index: 0,
                            arguments: vec![MatcherValue::var(0)],
                        },
                        body: HandlerExpression::TruthValue(false),
                        variable_count: 1,
                    },
                    EffectImplication {
                        head: EffectImplHead {
                            effect_index: 1,
                            effect_ctor_index: 0,
                            arguments: vec![MatcherValue::var(0)],
                        },
                        body: HandlerExpression::Continuation,
                        variable_count: 1,
                    },
                ],
            }],
        )],
        None,
    );
    assert_eq!(prove(&program, &pred_ref(0, vec![])), Ok(true));
}

#[test]
fn unhandled_effects_are_fatal() {
    // No handler for effect 1 anywhere on the stack: this is a checker
    // bug, not a proof failure.
    let program = Program::new(
        vec![Predicate::new(vec![Implication::new(
            PredicateReference::new(0, vec![]),
            Expression::EffectCtorRef(EffectCtorRef::new(
                1,
                0,
                vec![MatcherValue::Str("hi".into())],
                Expression::TruthValue(true),
            )),
            0,
        )])],
        None,
    );
    assert_eq!(
        prove(&program, &pred_ref(0, vec![])),
        Err(FatalError::UnhandledEffect(1))
    );
}

#[test]
fn handlers_are_visible_to_callees() {
    // pred 0 performs the effect; pred 1 handles it and calls pred 0. The
    // handler installed by pred 1 is on the stack during pred 0's proof.
    let program = Program::new(
        vec![
            Predicate::new(vec![Implication::new(
                PredicateReference::new(0, vec![]),
                Expression::EffectCtorRef(EffectCtorRef::new(
                    1,
                    0,
                    vec![MatcherValue::Str("hi".into())],
                    Expression::TruthValue(true),
                )),
                0,
            )]),
            Predicate::with_handlers(
                vec![Implication::new(
                    PredicateReference::new(1, vec![]),
                    pred_ref(0, vec![]),
                    0,
                )],
                vec![UserHandler {
                    effect_index: 1,
                    implications: vec![EffectImplication {
                        head: EffectImplHead {
                            effect_index: 1,
                            effect_ctor_index: 0,
                            arguments: vec![MatcherValue::Variable(MatcherVariable::anonymous(
                                true,
                            ))],
                        },
                        body: HandlerExpression::Continuation,
                        variable_count: 0,
                    }],
                }],
            ),
        ],
        None,
    );

    assert_eq!(prove(&program, &pred_ref(1, vec![])), Ok(true));
    // Called directly, nothing handles the effect.
    assert_eq!(
        prove(&program, &pred_ref(0, vec![])),
        Err(FatalError::UnhandledEffect(1))
    );
}
