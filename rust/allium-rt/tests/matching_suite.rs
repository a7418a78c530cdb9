//! Unifier tests: runtime values against matchers, with caller and callee
//! frames.

use allium_core::ir::{MatcherValue, MatcherVariable};
use allium_core::values::{cell, fresh_context, target, Context, RuntimeCtorRef, RuntimeValue};
use allium_rt::unify::{match_value, unify};
use std::rc::Rc;

fn rt_ctor(index: usize, arguments: Vec<RuntimeValue>) -> RuntimeValue {
    RuntimeValue::Ctor(RuntimeCtorRef::new(index, arguments))
}

#[test]
fn match_base_constructor() {
    let local = Context::new();
    let value = rt_ctor(0, vec![]);

    assert!(match_value(&value, &MatcherValue::ctor(0, vec![]), &local));
    assert!(!match_value(&value, &MatcherValue::ctor(1, vec![]), &local));
}

#[test]
fn match_constructor_with_parameter() {
    let local = Context::new();
    let value = rt_ctor(1, vec![rt_ctor(0, vec![])]);

    assert!(match_value(
        &value,
        &MatcherValue::ctor(1, vec![MatcherValue::ctor(0, vec![])]),
        &local
    ));
    assert!(!match_value(
        &value,
        &MatcherValue::ctor(0, vec![MatcherValue::ctor(1, vec![])]),
        &local
    ));
}

#[test]
fn match_constructor_with_multiple_parameters() {
    let local = Context::new();
    let value = rt_ctor(0, vec![rt_ctor(0, vec![]), rt_ctor(1, vec![])]);

    assert!(match_value(
        &value,
        &MatcherValue::ctor(
            0,
            vec![MatcherValue::ctor(0, vec![]), MatcherValue::ctor(1, vec![])]
        ),
        &local
    ));
    assert!(!match_value(
        &value,
        &MatcherValue::ctor(
            0,
            vec![MatcherValue::ctor(0, vec![]), MatcherValue::ctor(0, vec![])]
        ),
        &local
    ));
}

#[test]
fn matching_undefined_local_variable_sets_its_value() {
    let local = fresh_context(1);
    let value = rt_ctor(1, vec![]);

    assert!(match_value(&value, &MatcherValue::var(0), &local));
    assert_eq!(*local[0].borrow(), rt_ctor(1, vec![]));
}

#[test]
fn matching_nonlocal_variable_definition_sets_its_value() {
    let parent = fresh_context(1);
    let local = Context::new();
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));

    assert!(match_value(&subject, &MatcherValue::ctor(1, vec![]), &local));
    assert_eq!(*parent[0].borrow(), rt_ctor(1, vec![]));
}

#[test]
fn matching_defined_local_variable_matches_its_value() {
    let local: Context = vec![cell(rt_ctor(1, vec![]))];

    assert!(match_value(&rt_ctor(1, vec![]), &MatcherValue::var(0), &local));
    assert!(!match_value(&rt_ctor(2, vec![]), &MatcherValue::var(0), &local));
}

#[test]
fn matching_defined_nonlocal_variable_matches_its_value() {
    let parent: Context = vec![cell(rt_ctor(1, vec![]))];
    let local = Context::new();
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));

    assert!(match_value(&subject, &MatcherValue::ctor(1, vec![]), &local));
    assert!(!match_value(&subject, &MatcherValue::ctor(2, vec![]), &local));
}

#[test]
fn matching_unbound_nonlocal_and_local_variables_links_them() {
    let parent = fresh_context(1);
    let local = fresh_context(1);
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));

    assert!(match_value(&subject, &MatcherValue::var(0), &local));

    // The local cell now points into the enclosing frame.
    assert_eq!(
        *local[0].borrow(),
        RuntimeValue::Redirect(Rc::clone(&parent[0]))
    );
}

#[test]
fn variables_are_properly_bound_after_binding_to_each_other() {
    let parent = fresh_context(1);
    let local = fresh_context(1);
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));

    assert!(match_value(&subject, &MatcherValue::var(0), &local));
    // A later constraint on the parent cell reaches the shared binding.
    assert!(match_value(&subject, &MatcherValue::ctor(1, vec![]), &local));

    assert_eq!(*parent[0].borrow(), rt_ctor(1, vec![]));
    assert_eq!(
        RuntimeValue::Redirect(Rc::clone(&local[0])).resolved(),
        rt_ctor(1, vec![])
    );
}

#[test]
fn variables_are_properly_bound_after_binding_to_each_other2() {
    let parent = fresh_context(1);
    let local = fresh_context(1);
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));

    assert!(match_value(&subject, &MatcherValue::var(0), &local));
    // This time the constraint arrives through the local variable; the
    // match looks through the link and stores the value in the parent cell.
    assert!(match_value(&rt_ctor(1, vec![]), &MatcherValue::var(0), &local));

    assert_eq!(*parent[0].borrow(), rt_ctor(1, vec![]));
    assert_eq!(
        RuntimeValue::Redirect(Rc::clone(&local[0])).resolved(),
        rt_ctor(1, vec![])
    );
}

#[test]
fn matching_through_nested_links_binds_the_innermost_cell() {
    // parent[0] links to local[0]; parent[1] holds a constructor whose
    // argument goes through parent[0]. Matching a nested pattern against
    // parent[1] must land the binding in local[0].
    let parent = fresh_context(2);
    let local = fresh_context(1);

    *parent[0].borrow_mut() = RuntimeValue::Redirect(Rc::clone(&local[0]));
    *parent[1].borrow_mut() = rt_ctor(1, vec![RuntimeValue::Redirect(Rc::clone(&parent[0]))]);

    let subject = RuntimeValue::Redirect(Rc::clone(&parent[1]));
    let matcher = MatcherValue::ctor(1, vec![MatcherValue::ctor(0, vec![])]);
    assert!(match_value(&subject, &matcher, &local));

    assert_eq!(*local[0].borrow(), rt_ctor(0, vec![]));
    assert_eq!(
        *parent[0].borrow(),
        RuntimeValue::Redirect(Rc::clone(&local[0]))
    );
}

#[test]
fn matching_an_unbound_cell_against_a_pattern_builds_its_shape() {
    // Matching `s(s(z))` against a fresh cell constructs the value with
    // fresh cells for the children, then constrains them.
    let parent = fresh_context(1);
    let local = Context::new();
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));

    let matcher = MatcherValue::ctor(1, vec![MatcherValue::ctor(1, vec![MatcherValue::ctor(0, vec![])])]);
    assert!(match_value(&subject, &matcher, &local));

    let built = RuntimeValue::Redirect(Rc::clone(&parent[0])).resolved();
    match built {
        RuntimeValue::Ctor(outer) => {
            assert_eq!(outer.index, 1);
            match outer.arguments[0].resolved() {
                RuntimeValue::Ctor(inner) => {
                    assert_eq!(inner.index, 1);
                    assert_eq!(inner.arguments[0].resolved(), rt_ctor(0, vec![]));
                }
                other => panic!("expected inner ctor, got {:?}", other),
            }
        }
        other => panic!("expected ctor, got {:?}", other),
    }
}

#[test]
fn literals_match_by_equality() {
    let local = Context::new();

    assert!(match_value(
        &RuntimeValue::Str("abc".into()),
        &MatcherValue::Str("abc".into()),
        &local
    ));
    assert!(!match_value(
        &RuntimeValue::Str("abc".into()),
        &MatcherValue::Str("abd".into()),
        &local
    ));
    assert!(match_value(
        &RuntimeValue::Int(42),
        &MatcherValue::Int(42),
        &local
    ));
    assert!(!match_value(
        &RuntimeValue::Int(42),
        &MatcherValue::Int(43),
        &local
    ));
    // Literals never match constructors or each other's types.
    assert!(!match_value(
        &RuntimeValue::Str("1".into()),
        &MatcherValue::Int(1),
        &local
    ));
}

#[test]
fn literals_bind_unbound_cells() {
    let parent = fresh_context(2);
    let local = Context::new();

    assert!(match_value(
        &RuntimeValue::Redirect(Rc::clone(&parent[0])),
        &MatcherValue::Str("abc".into()),
        &local
    ));
    assert_eq!(*parent[0].borrow(), RuntimeValue::Str("abc".into()));

    assert!(match_value(
        &RuntimeValue::Redirect(Rc::clone(&parent[1])),
        &MatcherValue::Int(7),
        &local
    ));
    assert_eq!(*parent[1].borrow(), RuntimeValue::Int(7));
}

#[test]
fn anonymous_variables_match_without_binding() {
    let local = Context::new();
    let anonymous = MatcherValue::Variable(MatcherVariable::anonymous(true));

    assert!(match_value(&rt_ctor(3, vec![]), &anonymous, &local));
    assert!(match_value(&RuntimeValue::Int(1), &anonymous, &local));

    let parent = fresh_context(1);
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));
    assert!(match_value(&subject, &anonymous, &local));
    assert_eq!(*parent[0].borrow(), RuntimeValue::Undefined);
}

#[test]
fn anonymous_variables_of_uninhabited_types_never_match() {
    let local = Context::new();
    let impossible = MatcherValue::Variable(MatcherVariable::anonymous(false));

    assert!(!match_value(&rt_ctor(0, vec![]), &impossible, &local));

    let parent = fresh_context(1);
    let subject = RuntimeValue::Redirect(Rc::clone(&parent[0]));
    assert!(!match_value(&subject, &impossible, &local));
}

#[test]
fn binding_a_value_to_an_uninhabited_variable_fails() {
    let local = fresh_context(1);
    let matcher = MatcherValue::Variable(MatcherVariable {
        index: 0,
        is_type_inhabited: false,
    });

    assert!(!match_value(&rt_ctor(0, vec![]), &matcher, &local));
    assert_eq!(*local[0].borrow(), RuntimeValue::Undefined);
}

#[test]
fn unify_links_two_unbound_cells() {
    let a = fresh_context(1);
    let b = fresh_context(1);
    let left = RuntimeValue::Redirect(Rc::clone(&a[0]));
    let right = RuntimeValue::Redirect(Rc::clone(&b[0]));

    assert!(unify(&left, &right));
    assert!(Rc::ptr_eq(&target(&a[0]), &target(&b[0])));

    // A value written through one side is visible through the other.
    *target(&a[0]).borrow_mut() = RuntimeValue::Int(5);
    assert_eq!(right.resolved(), RuntimeValue::Int(5));
}

#[test]
fn unify_compares_concrete_values_structurally() {
    assert!(unify(
        &rt_ctor(1, vec![RuntimeValue::Int(1)]),
        &rt_ctor(1, vec![RuntimeValue::Int(1)])
    ));
    assert!(!unify(
        &rt_ctor(1, vec![RuntimeValue::Int(1)]),
        &rt_ctor(1, vec![RuntimeValue::Int(2)])
    ));
    assert!(!unify(&rt_ctor(0, vec![]), &rt_ctor(1, vec![])));
}
