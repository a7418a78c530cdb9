//! Typed AST → runtime IR lowering.
//!
//! A pure transformation with no I/O: names become indices, variables become
//! positions in per-implication variable tables, and all remaining syntactic
//! information is discarded. The input is assumed to have passed semantic
//! analysis; a resolution failure here indicates a checker bug and surfaces
//! as a [`LowerError`](crate::LowerError) rather than a panic.

use crate::analysis::inhabitable::inhabitable_types;
use crate::analysis::variables::{effect_implication_variables, implication_variables};
use crate::LowerError;
use allium_core::ast;
use allium_core::builtins::{self, BuiltinPredicateKind};
use allium_core::config::Config;
use allium_core::ir;
use std::collections::BTreeSet;

/// Lowers a checked program, resolving `main` as the entry point if the
/// program defines it.
pub fn lower(program: &ast::Program, config: Config) -> Result<ir::Program, LowerError> {
    let lowerer = Lowerer::new(program);

    let mut predicates = Vec::with_capacity(program.predicates.len());
    let mut predicate_names = Vec::with_capacity(program.predicates.len());
    let mut entry_point = None;

    for (index, predicate) in program.predicates.iter().enumerate() {
        predicates.push(lowerer.lower_predicate(predicate)?);
        predicate_names.push(predicate.declaration.name.clone());

        if predicate.declaration.name == "main" {
            // If main ever takes arguments, they would be supplied here.
            entry_point = Some(ir::PredicateReference::new(index, vec![]));
        }
    }

    Ok(ir::Program::with_names(
        predicates,
        entry_point,
        predicate_names,
        config,
    ))
}

struct Lowerer<'a> {
    program: &'a ast::Program,
    inhabited: BTreeSet<String>,
}

impl<'a> Lowerer<'a> {
    fn new(program: &'a ast::Program) -> Self {
        Lowerer {
            program,
            inhabited: inhabitable_types(&program.types),
        }
    }

    fn predicate_index(&self, name: &str) -> Result<usize, LowerError> {
        self.program
            .predicates
            .iter()
            .position(|p| p.declaration.name == name)
            .ok_or_else(|| LowerError::UndefinedPredicate(name.to_string()))
    }

    /// Effect indices reserve the low positions for builtins; user effects
    /// follow in source order.
    fn effect_index_of(&self, effect_name: &str) -> Option<usize> {
        let builtin_count = builtins::builtin_effects().len();
        self.program
            .effects
            .iter()
            .position(|e| e.declaration.name == effect_name)
            .map(|position| builtin_count + position)
            .or_else(|| {
                builtins::builtin_effects()
                    .iter()
                    .position(|e| e.declaration.name == effect_name)
            })
    }

    fn effect_indices(
        &self,
        effect_name: &str,
        ctor_name: &str,
    ) -> Result<(usize, usize), LowerError> {
        let effect_index = self
            .effect_index_of(effect_name)
            .ok_or_else(|| LowerError::UndefinedEffect(effect_name.to_string()))?;
        let effect = self
            .program
            .resolve_effect(effect_name)
            .ok_or_else(|| LowerError::UndefinedEffect(effect_name.to_string()))?;

        let ctor_index = effect
            .constructors
            .iter()
            .position(|c| c.name == ctor_name)
            .ok_or_else(|| LowerError::UndefinedEffectConstructor {
                effect: effect_name.to_string(),
                ctor: ctor_name.to_string(),
            })?;

        Ok((effect_index, ctor_index))
    }

    /// Lowers a value at the given expected type, in the scope of the given
    /// variable table.
    fn lower_value(
        &self,
        value: &ast::Value,
        type_name: &str,
        variables: &[String],
    ) -> Result<ir::MatcherValue, LowerError> {
        match value {
            ast::Value::Anonymous { type_name } => Ok(ir::MatcherValue::Variable(
                ir::MatcherVariable::anonymous(self.inhabited.contains(type_name)),
            )),
            ast::Value::Variable {
                name, type_name, ..
            } => {
                let index = variables
                    .iter()
                    .position(|v| v == name)
                    .ok_or_else(|| LowerError::UnboundVariable(name.clone()))?;
                Ok(ir::MatcherValue::Variable(ir::MatcherVariable {
                    index,
                    is_type_inhabited: self.inhabited.contains(type_name),
                }))
            }
            ast::Value::Ctor(ctor) => {
                let (index, declaration) = self
                    .program
                    .resolve_ctor(type_name, &ctor.name)
                    .ok_or_else(|| LowerError::UnknownConstructor {
                        ctor: ctor.name.clone(),
                        type_name: type_name.to_string(),
                    })?;
                if declaration.parameters.len() != ctor.arguments.len() {
                    return Err(LowerError::ArityMismatch {
                        name: ctor.name.clone(),
                        expected: declaration.parameters.len(),
                        found: ctor.arguments.len(),
                    });
                }
                let arguments = ctor
                    .arguments
                    .iter()
                    .zip(&declaration.parameters)
                    .map(|(arg, param)| self.lower_value(arg, &param.type_name, variables))
                    .collect::<Result<_, _>>()?;
                Ok(ir::MatcherValue::Ctor(ir::MatcherCtorRef::new(
                    index, arguments,
                )))
            }
            ast::Value::StringLit(s) => Ok(ir::MatcherValue::Str(s.clone())),
            ast::Value::IntLit(i) => Ok(ir::MatcherValue::Int(*i)),
        }
    }

    fn lower_arguments(
        &self,
        arguments: &[ast::Value],
        parameters: &[ast::Parameter],
        name: &str,
        variables: &[String],
    ) -> Result<Vec<ir::MatcherValue>, LowerError> {
        if arguments.len() != parameters.len() {
            return Err(LowerError::ArityMismatch {
                name: name.to_string(),
                expected: parameters.len(),
                found: arguments.len(),
            });
        }
        arguments
            .iter()
            .zip(parameters)
            .map(|(arg, param)| self.lower_value(arg, &param.type_name, variables))
            .collect()
    }

    /// Lowers a predicate reference, resolving builtins through the
    /// registry.
    fn lower_pred_ref(
        &self,
        pr: &ast::PredicateRef,
        variables: &[String],
    ) -> Result<ir::Expression, LowerError> {
        match self.program.resolve_predicate(&pr.name) {
            Some(ast::Predicate::User(user)) => {
                let arguments = self.lower_arguments(
                    &pr.arguments,
                    &user.declaration.parameters,
                    &pr.name,
                    variables,
                )?;
                Ok(ir::Expression::PredicateReference(
                    ir::PredicateReference::new(self.predicate_index(&pr.name)?, arguments),
                ))
            }
            Some(ast::Predicate::Builtin(builtin)) => {
                let predicate = BuiltinPredicateKind::from_name(&pr.name)
                    .ok_or_else(|| LowerError::UndefinedPredicate(pr.name.clone()))?;
                let arguments = self.lower_arguments(
                    &pr.arguments,
                    &builtin.declaration.parameters,
                    &pr.name,
                    variables,
                )?;
                Ok(ir::Expression::BuiltinPredicateReference(
                    ir::BuiltinPredicateReference {
                        predicate,
                        arguments,
                    },
                ))
            }
            None => Err(LowerError::UndefinedPredicate(pr.name.clone())),
        }
    }

    fn lower_effect_call(
        &self,
        call: &ast::EffectCtorRef,
        continuation: Option<&ast::Expression>,
        variables: &[String],
    ) -> Result<ir::EffectCtorRef, LowerError> {
        let (effect_index, ctor_index) = self.effect_indices(&call.effect_name, &call.ctor_name)?;
        let ctor = self
            .program
            .resolve_effect_ctor(call)
            .ok_or_else(|| LowerError::UndefinedEffectConstructor {
                effect: call.effect_name.clone(),
                ctor: call.ctor_name.clone(),
            })?;
        let arguments =
            self.lower_arguments(&call.arguments, &ctor.parameters, &call.ctor_name, variables)?;

        // An effect invocation with nothing after it continues with `true`.
        let continuation = match continuation {
            Some(k) => self.lower_expression(k, variables)?,
            None => ir::Expression::TruthValue(true),
        };

        Ok(ir::EffectCtorRef::new(
            effect_index,
            ctor_index,
            arguments,
            continuation,
        ))
    }

    fn lower_expression(
        &self,
        expr: &ast::Expression,
        variables: &[String],
    ) -> Result<ir::Expression, LowerError> {
        match expr {
            ast::Expression::TruthLit(value) => Ok(ir::Expression::TruthValue(*value)),
            ast::Expression::PredicateRef(pr) => self.lower_pred_ref(pr, variables),
            ast::Expression::Effect { call, continuation } => Ok(ir::Expression::EffectCtorRef(
                self.lower_effect_call(call, continuation.as_deref(), variables)?,
            )),
            ast::Expression::Conjunction(left, right) => Ok(ir::Expression::conjunction(
                self.lower_expression(left, variables)?,
                self.lower_expression(right, variables)?,
            )),
        }
    }

    fn lower_handler_expression(
        &self,
        expr: &ast::HandlerExpression,
        variables: &[String],
    ) -> Result<ir::HandlerExpression, LowerError> {
        match expr {
            ast::HandlerExpression::TruthLit(value) => Ok(ir::HandlerExpression::TruthValue(*value)),
            ast::HandlerExpression::Continue => Ok(ir::HandlerExpression::Continuation),
            ast::HandlerExpression::PredicateRef(pr) => {
                Ok(match self.lower_pred_ref(pr, variables)? {
                    ir::Expression::PredicateReference(pr) => {
                        ir::HandlerExpression::PredicateReference(pr)
                    }
                    ir::Expression::BuiltinPredicateReference(bpr) => {
                        ir::HandlerExpression::BuiltinPredicateReference(bpr)
                    }
                    _ => unreachable!("predicate references lower to references"),
                })
            }
            ast::HandlerExpression::Effect { call, continuation } => {
                Ok(ir::HandlerExpression::EffectCtorRef(self.lower_effect_call(
                    call,
                    continuation.as_deref(),
                    variables,
                )?))
            }
            ast::HandlerExpression::Conjunction(left, right) => {
                Ok(ir::HandlerExpression::conjunction(
                    self.lower_handler_expression(left, variables)?,
                    self.lower_handler_expression(right, variables)?,
                ))
            }
        }
    }

    fn lower_implication(
        &self,
        implication: &ast::Implication,
    ) -> Result<ir::Implication, LowerError> {
        let variables = implication_variables(implication);

        let head = match self.lower_pred_ref(&implication.head, &variables)? {
            ir::Expression::PredicateReference(pr) => pr,
            _ => return Err(LowerError::UndefinedPredicate(implication.head.name.clone())),
        };
        let body = self.lower_expression(&implication.body, &variables)?;

        Ok(ir::Implication::new(head, body, variables.len()))
    }

    fn lower_handler(&self, handler: &ast::Handler) -> Result<ir::UserHandler, LowerError> {
        let effect_index = self
            .effect_index_of(&handler.effect_name)
            .ok_or_else(|| LowerError::UndefinedEffect(handler.effect_name.clone()))?;

        let implications = handler
            .implications
            .iter()
            .map(|eimpl| self.lower_effect_implication(eimpl))
            .collect::<Result<_, _>>()?;

        Ok(ir::UserHandler {
            effect_index,
            implications,
        })
    }

    fn lower_effect_implication(
        &self,
        implication: &ast::EffectImplication,
    ) -> Result<ir::EffectImplication, LowerError> {
        let variables = effect_implication_variables(implication);

        let (effect_index, ctor_index) = self.effect_indices(
            &implication.head.effect_name,
            &implication.head.ctor_name,
        )?;
        let ctor = self
            .program
            .resolve_effect_ctor(&implication.head)
            .ok_or_else(|| LowerError::UndefinedEffectConstructor {
                effect: implication.head.effect_name.clone(),
                ctor: implication.head.ctor_name.clone(),
            })?;
        let arguments = self.lower_arguments(
            &implication.head.arguments,
            &ctor.parameters,
            &implication.head.ctor_name,
            &variables,
        )?;

        let body = self.lower_handler_expression(&implication.body, &variables)?;

        Ok(ir::EffectImplication {
            head: ir::EffectImplHead {
                effect_index,
                effect_ctor_index: ctor_index,
                arguments,
            },
            body,
            variable_count: variables.len(),
        })
    }

    fn lower_predicate(&self, predicate: &ast::UserPredicate) -> Result<ir::Predicate, LowerError> {
        let implications = predicate
            .implications
            .iter()
            .map(|implication| self.lower_implication(implication))
            .collect::<Result<_, _>>()?;
        let handlers = predicate
            .handlers
            .iter()
            .map(|handler| self.lower_handler(handler))
            .collect::<Result<_, _>>()?;
        Ok(ir::Predicate::with_handlers(implications, handlers))
    }
}
