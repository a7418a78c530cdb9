//! Allium RT
//!
//! The proof-search runtime: unification over runtime values, witness
//! producers for every expression shape, and the builtin kernel. The entry
//! point is [`prove`], which enumerates witnesses for an expression against
//! a lowered [`Program`](allium_core::ir::Program).
#![warn(clippy::all)]

pub mod intrinsics;
pub mod unify;
pub mod witness;

pub use witness::{prove, run};

use thiserror::Error;

/// A violation of an invariant that semantic analysis is supposed to
/// guarantee. A well-typed program can never reach one of these; when one
/// surfaces, it indicates a checker bug, and the driver aborts the process
/// with the message rather than reporting proof failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("runtime: predicate index {0} is out of bounds")]
    PredicateIndexOutOfBounds(usize),

    #[error("runtime: no handler on the stack for effect {0}")]
    UnhandledEffect(usize),

    #[error("runtime: effect {effect} has no constructor {ctor}")]
    UnknownBuiltinEffectCtor { effect: usize, ctor: usize },

    #[error("runtime: argument {argument} of {builtin} must be ground")]
    BuiltinArgumentNotGround {
        builtin: &'static str,
        argument: usize,
    },

    #[error("runtime: argument {argument} of {builtin} must be a String")]
    BuiltinTypeMismatch {
        builtin: &'static str,
        argument: usize,
    },
}
