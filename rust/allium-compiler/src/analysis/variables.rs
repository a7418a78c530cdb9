//! Variable tables.
//!
//! The variable list of an implication is the ordered sequence of variables
//! defined anywhere in its head or body, in first-occurrence order. Lowering
//! turns each variable into its position in this list, and the interpreter
//! allocates one cell per entry for every attempt of the implication.

use allium_core::ast::{
    EffectCtorRef, EffectImplication, Expression, HandlerExpression, Implication, PredicateRef,
    Value,
};

fn collect_value(value: &Value, variables: &mut Vec<String>) {
    match value {
        Value::Anonymous { .. } | Value::StringLit(_) | Value::IntLit(_) => {}
        Value::Variable {
            name,
            is_definition,
            ..
        } => {
            // A variable is defined exactly once per implication, so no
            // dedup is needed here.
            if *is_definition {
                variables.push(name.clone());
            }
        }
        Value::Ctor(ctor) => {
            for arg in &ctor.arguments {
                collect_value(arg, variables);
            }
        }
    }
}

fn collect_pred_ref(pr: &PredicateRef, variables: &mut Vec<String>) {
    for arg in &pr.arguments {
        collect_value(arg, variables);
    }
}

fn collect_effect_call(ecr: &EffectCtorRef, variables: &mut Vec<String>) {
    for arg in &ecr.arguments {
        collect_value(arg, variables);
    }
}

fn collect_expression(expr: &Expression, variables: &mut Vec<String>) {
    match expr {
        Expression::TruthLit(_) => {}
        Expression::PredicateRef(pr) => collect_pred_ref(pr, variables),
        Expression::Effect { call, continuation } => {
            collect_effect_call(call, variables);
            if let Some(k) = continuation {
                collect_expression(k, variables);
            }
        }
        Expression::Conjunction(left, right) => {
            collect_expression(left, variables);
            collect_expression(right, variables);
        }
    }
}

fn collect_handler_expression(expr: &HandlerExpression, variables: &mut Vec<String>) {
    match expr {
        HandlerExpression::TruthLit(_) | HandlerExpression::Continue => {}
        HandlerExpression::PredicateRef(pr) => collect_pred_ref(pr, variables),
        HandlerExpression::Effect { call, continuation } => {
            collect_effect_call(call, variables);
            if let Some(k) = continuation {
                collect_expression(k, variables);
            }
        }
        HandlerExpression::Conjunction(left, right) => {
            collect_handler_expression(left, variables);
            collect_handler_expression(right, variables);
        }
    }
}

/// The ordered variable list of an implication: head first, then body.
pub fn implication_variables(implication: &Implication) -> Vec<String> {
    let mut variables = Vec::new();
    collect_pred_ref(&implication.head, &mut variables);
    collect_expression(&implication.body, &mut variables);
    variables
}

/// The ordered variable list of an effect implication.
pub fn effect_implication_variables(implication: &EffectImplication) -> Vec<String> {
    let mut variables = Vec::new();
    collect_effect_call(&implication.head, &mut variables);
    collect_handler_expression(&implication.body, &mut variables);
    variables
}
