//! Witness producers: the proof-search kernel.
//!
//! Each expression shape gets a resumable producer of unit ticks. A call to
//! [`Witnesses::advance`] either commits to one more witness (`Ok(true)`),
//! with the witness readable through the bindings it wrote into shared
//! cells, or reports exhaustion (`Ok(false)`). Producers nest: a predicate
//! producer drives the producer of the matched implication's body, a
//! conjunction producer restarts its right operand for every tick of the
//! left. Exactly one producer is advancing at a time, and witness order is
//! fully determined by implication source order and left-before-right
//! traversal.
//!
//! Dropping a producer cancels every producer nested inside it; local
//! frames and handler-stack entries go with them, while writes that reached
//! the caller's cells persist as the proof's outputs.

use crate::intrinsics::{self, BuiltinEffectHandler};
use crate::unify::{instantiate, instantiate_handler, match_effect_head, match_head};
use crate::FatalError;
use allium_core::builtins::IO_EFFECT_INDEX;
use allium_core::config::LogLevel;
use allium_core::ir::{
    BuiltinPredicateReference, EffectCtorRef, Expression, HandlerExpression, PredicateReference,
    Program, UserHandler,
};
use allium_core::values::{fresh_context, Context, RuntimeValue};
use std::rc::Rc;

/// Proves `expr` against an empty context, with the builtin `IO` handler as
/// the only initial handler. True iff at least one witness exists.
pub fn prove(program: &Program, expr: &Expression) -> Result<bool, FatalError> {
    // If main ever takes arguments, they need to be allocated here.
    let handlers = HandlerStack::new().push(
        IO_EFFECT_INDEX,
        HandlerKind::Builtin(BuiltinEffectHandler::Io),
    );
    let mut witnesses = Witnesses::new(program, expr.clone(), Context::new(), handlers)?;
    witnesses.advance()
}

/// Runs the program's entry point. `None` means the program defines no
/// `main`; such a program always rejects, and the driver reports it.
pub fn run(program: &Program) -> Result<Option<bool>, FatalError> {
    match &program.entry_point {
        Some(main) => {
            prove(program, &Expression::PredicateReference(main.clone())).map(Some)
        }
        None => Ok(None),
    }
}

// ── Handler stack ──

/// An entry of the dynamic handler stack: a builtin handler or a `handle`
/// block from some predicate's definition.
#[derive(Clone, Copy)]
pub enum HandlerKind<'p> {
    Builtin(BuiltinEffectHandler),
    User(&'p UserHandler),
}

pub struct HandlerFrame<'p> {
    pub effect_index: usize,
    pub handler: HandlerKind<'p>,
    parent: HandlerStack<'p>,
}

/// The dynamically scoped stack of effect handlers, represented as a
/// persistent list. Each producer holds the stack it was created under, so
/// entries pushed for a predicate's own handlers vanish when that producer
/// is released, on every exit path.
#[derive(Clone, Default)]
pub struct HandlerStack<'p>(Option<Rc<HandlerFrame<'p>>>);

impl<'p> HandlerStack<'p> {
    pub fn new() -> Self {
        HandlerStack(None)
    }

    pub fn push(&self, effect_index: usize, handler: HandlerKind<'p>) -> Self {
        HandlerStack(Some(Rc::new(HandlerFrame {
            effect_index,
            handler,
            parent: self.clone(),
        })))
    }

    /// The innermost handler for an effect.
    pub fn innermost_for(&self, effect_index: usize) -> Option<Rc<HandlerFrame<'p>>> {
        let mut current = self.0.clone();
        while let Some(frame) = current {
            if frame.effect_index == effect_index {
                return Some(frame);
            }
            current = frame.parent.0.clone();
        }
        None
    }

    /// This stack with one frame removed. Handlers above the removed frame
    /// stay visible; the continuation of an effect runs under this reduced
    /// stack so the firing handler cannot recapture it.
    pub fn without(&self, removed: &Rc<HandlerFrame<'p>>) -> Self {
        let mut above: Vec<Rc<HandlerFrame<'p>>> = Vec::new();
        let mut current = self.0.clone();
        while let Some(frame) = current {
            if Rc::ptr_eq(&frame, removed) {
                let mut rebuilt = frame.parent.clone();
                for outer in above.iter().rev() {
                    rebuilt = rebuilt.push(outer.effect_index, outer.handler);
                }
                return rebuilt;
            }
            above.push(Rc::clone(&frame));
            current = frame.parent.0.clone();
        }
        self.clone()
    }
}

// ── Producers ──

pub enum Witnesses<'p> {
    Truth(TruthWitnesses),
    Predicate(PredicateWitnesses<'p>),
    Builtin(BuiltinWitnesses),
    Effect(EffectWitnesses<'p>),
    Conjunction(ConjunctionWitnesses<'p>),
}

impl<'p> Witnesses<'p> {
    pub fn new(
        program: &'p Program,
        expr: Expression,
        context: Context,
        handlers: HandlerStack<'p>,
    ) -> Result<Self, FatalError> {
        Ok(match expr {
            Expression::TruthValue(value) => Witnesses::Truth(TruthWitnesses {
                value,
                exhausted: false,
            }),
            Expression::PredicateReference(goal) => Witnesses::Predicate(
                PredicateWitnesses::new(program, goal, context, handlers)?,
            ),
            Expression::BuiltinPredicateReference(reference) => {
                Witnesses::Builtin(BuiltinWitnesses::new(reference, &context))
            }
            Expression::EffectCtorRef(ecr) => Witnesses::Effect(EffectWitnesses {
                program,
                ecr,
                context,
                handlers,
                state: EffectState::Start,
            }),
            Expression::Conjunction(left, right) => {
                let left = Box::new(Witnesses::new(
                    program,
                    *left,
                    context.clone(),
                    handlers.clone(),
                )?);
                Witnesses::Conjunction(ConjunctionWitnesses {
                    program,
                    context,
                    handlers,
                    left,
                    right_template: *right,
                    right: None,
                })
            }
        })
    }

    pub fn advance(&mut self) -> Result<bool, FatalError> {
        match self {
            Witnesses::Truth(w) => Ok(w.advance()),
            Witnesses::Predicate(w) => w.advance(),
            Witnesses::Builtin(w) => w.advance(),
            Witnesses::Effect(w) => w.advance(),
            Witnesses::Conjunction(w) => w.advance(),
        }
    }
}

/// `true` yields exactly one tick; `false` yields none.
pub struct TruthWitnesses {
    value: bool,
    exhausted: bool,
}

impl TruthWitnesses {
    fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        self.exhausted = true;
        self.value
    }
}

/// Tries each implication of the referenced predicate in source order. A
/// matching implication contributes every witness of its instantiated body
/// before the next implication is tried.
pub struct PredicateWitnesses<'p> {
    program: &'p Program,
    goal: PredicateReference,
    context: Context,
    /// The stack visible to implication bodies: the caller's stack plus
    /// this predicate's own handlers, pushed in declaration order. Visible
    /// to recursive calls as well.
    handlers: HandlerStack<'p>,
    next_implication: usize,
    body: Option<Box<Witnesses<'p>>>,
}

impl<'p> PredicateWitnesses<'p> {
    fn new(
        program: &'p Program,
        goal: PredicateReference,
        context: Context,
        handlers: HandlerStack<'p>,
    ) -> Result<Self, FatalError> {
        if program.config.log_level >= LogLevel::Loud {
            println!("prove: {}", program.call_debug_string(&goal));
        }

        let predicate = program
            .predicate(goal.index)
            .ok_or(FatalError::PredicateIndexOutOfBounds(goal.index))?;

        let mut handlers = handlers;
        for handler in &predicate.handlers {
            handlers = handlers.push(handler.effect_index, HandlerKind::User(handler));
        }

        Ok(PredicateWitnesses {
            program,
            goal,
            context,
            handlers,
            next_implication: 0,
            body: None,
        })
    }

    fn advance(&mut self) -> Result<bool, FatalError> {
        loop {
            if let Some(body) = &mut self.body {
                if body.advance()? {
                    return Ok(true);
                }
                self.body = None;
            }

            let predicate = self
                .program
                .predicate(self.goal.index)
                .ok_or(FatalError::PredicateIndexOutOfBounds(self.goal.index))?;
            let Some(implication) = predicate.implications.get(self.next_implication) else {
                return Ok(false);
            };
            self.next_implication += 1;

            if self.program.config.log_level >= LogLevel::Max {
                println!("  try implication: {}", implication);
            }

            let local = fresh_context(implication.variable_count);
            if match_head(&self.goal, &implication.head, &self.context, &local) {
                let body = instantiate(&implication.body, &local);
                self.body = Some(Box::new(Witnesses::new(
                    self.program,
                    body,
                    local,
                    self.handlers.clone(),
                )?));
            }
        }
    }
}

/// A builtin predicate's witnesses: at most one tick, decided eagerly.
pub struct BuiltinWitnesses {
    reference: BuiltinPredicateReference,
    arguments: Vec<RuntimeValue>,
    exhausted: bool,
}

impl BuiltinWitnesses {
    fn new(reference: BuiltinPredicateReference, context: &Context) -> Self {
        let arguments = reference
            .arguments
            .iter()
            .map(|arg| arg.lower(context))
            .collect();
        BuiltinWitnesses {
            reference,
            arguments,
            exhausted: false,
        }
    }

    fn advance(&mut self) -> Result<bool, FatalError> {
        if self.exhausted {
            return Ok(false);
        }
        self.exhausted = true;
        intrinsics::run_builtin(self.reference.predicate, &self.arguments)
    }
}

/// Resolves an effect against the innermost matching handler and proves the
/// handler's response.
pub struct EffectWitnesses<'p> {
    program: &'p Program,
    ecr: EffectCtorRef,
    context: Context,
    handlers: HandlerStack<'p>,
    state: EffectState<'p>,
}

enum EffectState<'p> {
    Start,
    /// The builtin side effect ran; ticks come from the continuation.
    BuiltinContinuation(Box<Witnesses<'p>>),
    User(UserHandlerWitnesses<'p>),
    Done,
}

impl<'p> EffectWitnesses<'p> {
    fn advance(&mut self) -> Result<bool, FatalError> {
        loop {
            match &mut self.state {
                EffectState::Start => {
                    if self.program.config.log_level >= LogLevel::Quiet {
                        println!("handle effect: {}", self.ecr);
                    }

                    // SemAna rejects unhandled effects, so a miss here is a
                    // checker bug.
                    let frame = self
                        .handlers
                        .innermost_for(self.ecr.effect_index)
                        .ok_or(FatalError::UnhandledEffect(self.ecr.effect_index))?;

                    match frame.handler {
                        HandlerKind::Builtin(builtin) => {
                            intrinsics::run_builtin_handler(builtin, &self.ecr, &self.context)?;
                            let continuation = Witnesses::new(
                                self.program,
                                (*self.ecr.continuation).clone(),
                                self.context.clone(),
                                self.handlers.clone(),
                            )?;
                            self.state =
                                EffectState::BuiltinContinuation(Box::new(continuation));
                        }
                        HandlerKind::User(handler) => {
                            let reduced = self.handlers.without(&frame);
                            self.state = EffectState::User(UserHandlerWitnesses::new(
                                self.program,
                                self.ecr.clone(),
                                self.context.clone(),
                                handler,
                                reduced,
                            ));
                        }
                    }
                }
                EffectState::BuiltinContinuation(continuation) => {
                    if continuation.advance()? {
                        return Ok(true);
                    }
                    self.state = EffectState::Done;
                }
                EffectState::User(user) => {
                    if user.advance()? {
                        return Ok(true);
                    }
                    self.state = EffectState::Done;
                }
                EffectState::Done => return Ok(false),
            }
        }
    }
}

/// What a `continue` proves, captured once per effect invocation: the
/// continuation expression, the frame it was written in, and the handler
/// stack with the firing handler removed.
struct ContinuationEnv<'p> {
    expr: Expression,
    context: Context,
    handlers: HandlerStack<'p>,
}

/// Tries each effect implication of the chosen user handler, in source
/// order, for the matching effect constructor.
pub struct UserHandlerWitnesses<'p> {
    program: &'p Program,
    handler: &'p UserHandler,
    ecr: EffectCtorRef,
    context: Context,
    /// The stack handler bodies run under: the do-site stack without the
    /// firing handler.
    handlers: HandlerStack<'p>,
    continuation: Rc<ContinuationEnv<'p>>,
    next_implication: usize,
    body: Option<Box<HandlerWitnesses<'p>>>,
}

impl<'p> UserHandlerWitnesses<'p> {
    fn new(
        program: &'p Program,
        ecr: EffectCtorRef,
        context: Context,
        handler: &'p UserHandler,
        handlers: HandlerStack<'p>,
    ) -> Self {
        let continuation = Rc::new(ContinuationEnv {
            expr: (*ecr.continuation).clone(),
            context: context.clone(),
            handlers: handlers.clone(),
        });
        UserHandlerWitnesses {
            program,
            handler,
            ecr,
            context,
            handlers,
            continuation,
            next_implication: 0,
            body: None,
        }
    }

    fn advance(&mut self) -> Result<bool, FatalError> {
        loop {
            if let Some(body) = &mut self.body {
                if body.advance()? {
                    return Ok(true);
                }
                self.body = None;
            }

            let Some(implication) = self.handler.implications.get(self.next_implication) else {
                return Ok(false);
            };
            self.next_implication += 1;

            if implication.head.effect_ctor_index != self.ecr.effect_ctor_index {
                continue;
            }

            let local = fresh_context(implication.variable_count);
            if match_effect_head(&self.ecr, &implication.head, &self.context, &local) {
                let body = instantiate_handler(&implication.body, &local);
                self.body = Some(Box::new(HandlerWitnesses::new(
                    self.program,
                    body,
                    local,
                    self.handlers.clone(),
                    Rc::clone(&self.continuation),
                )?));
            }
        }
    }
}

/// Witnesses of a handler-body expression. Everything except `continue`
/// behaves as the ordinary expression it wraps; `continue` proves the
/// captured continuation in the do-site frame.
pub enum HandlerWitnesses<'p> {
    Plain(Box<Witnesses<'p>>),
    Conjunction(HandlerConjunctionWitnesses<'p>),
}

impl<'p> HandlerWitnesses<'p> {
    fn new(
        program: &'p Program,
        expr: HandlerExpression,
        context: Context,
        handlers: HandlerStack<'p>,
        continuation: Rc<ContinuationEnv<'p>>,
    ) -> Result<Self, FatalError> {
        let plain = |expr: Expression, context: Context, handlers: HandlerStack<'p>| {
            Ok(HandlerWitnesses::Plain(Box::new(Witnesses::new(
                program, expr, context, handlers,
            )?)))
        };

        match expr {
            HandlerExpression::TruthValue(value) => {
                plain(Expression::TruthValue(value), context, handlers)
            }
            HandlerExpression::Continuation => plain(
                continuation.expr.clone(),
                continuation.context.clone(),
                continuation.handlers.clone(),
            ),
            HandlerExpression::PredicateReference(pr) => {
                plain(Expression::PredicateReference(pr), context, handlers)
            }
            HandlerExpression::BuiltinPredicateReference(bpr) => {
                plain(Expression::BuiltinPredicateReference(bpr), context, handlers)
            }
            HandlerExpression::EffectCtorRef(ecr) => {
                plain(Expression::EffectCtorRef(ecr), context, handlers)
            }
            HandlerExpression::Conjunction(left, right) => {
                let left = Box::new(HandlerWitnesses::new(
                    program,
                    *left,
                    context.clone(),
                    handlers.clone(),
                    Rc::clone(&continuation),
                )?);
                Ok(HandlerWitnesses::Conjunction(HandlerConjunctionWitnesses {
                    program,
                    context,
                    handlers,
                    continuation,
                    left,
                    right_template: *right,
                    right: None,
                }))
            }
        }
    }

    fn advance(&mut self) -> Result<bool, FatalError> {
        match self {
            HandlerWitnesses::Plain(w) => w.advance(),
            HandlerWitnesses::Conjunction(w) => w.advance(),
        }
    }
}

/// Cartesian product over a conjunction: for each tick of the left operand,
/// the right operand runs to exhaustion with the left's bindings visible.
pub struct ConjunctionWitnesses<'p> {
    program: &'p Program,
    context: Context,
    handlers: HandlerStack<'p>,
    left: Box<Witnesses<'p>>,
    right_template: Expression,
    right: Option<Box<Witnesses<'p>>>,
}

impl<'p> ConjunctionWitnesses<'p> {
    fn advance(&mut self) -> Result<bool, FatalError> {
        loop {
            if let Some(right) = &mut self.right {
                if right.advance()? {
                    return Ok(true);
                }
                self.right = None;
            }

            if !self.left.advance()? {
                return Ok(false);
            }
            self.right = Some(Box::new(Witnesses::new(
                self.program,
                self.right_template.clone(),
                self.context.clone(),
                self.handlers.clone(),
            )?));
        }
    }
}

/// [`ConjunctionWitnesses`] for handler bodies; either operand may contain
/// `continue`.
pub struct HandlerConjunctionWitnesses<'p> {
    program: &'p Program,
    context: Context,
    handlers: HandlerStack<'p>,
    continuation: Rc<ContinuationEnv<'p>>,
    left: Box<HandlerWitnesses<'p>>,
    right_template: HandlerExpression,
    right: Option<Box<HandlerWitnesses<'p>>>,
}

impl<'p> HandlerConjunctionWitnesses<'p> {
    fn advance(&mut self) -> Result<bool, FatalError> {
        loop {
            if let Some(right) = &mut self.right {
                if right.advance()? {
                    return Ok(true);
                }
                self.right = None;
            }

            if !self.left.advance()? {
                return Ok(false);
            }
            self.right = Some(Box::new(HandlerWitnesses::new(
                self.program,
                self.right_template.clone(),
                self.context.clone(),
                self.handlers.clone(),
                Rc::clone(&self.continuation),
            )?));
        }
    }
}
