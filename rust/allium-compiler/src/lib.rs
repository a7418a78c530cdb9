//! Allium Compiler
//!
//! The semantic-analysis surface of the toolchain: the diagnostic catalogue,
//! the whole-program analyses (inhabitability, predicate dependence,
//! groundness), and the lowering from the typed AST to the runtime IR.
#![warn(clippy::all)]

pub mod analysis;
pub mod diagnostics;
pub mod lower;

pub use lower::lower;

use thiserror::Error;

/// Failure to lower a checked program. Semantic analysis guarantees that
/// every name resolves and every arity matches, so any of these indicates a
/// checker bug; they are surfaced as values instead of panics so the driver
/// can abort with a distinguishable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error("lowering: use of undefined predicate \"{0}\"")]
    UndefinedPredicate(String),

    #[error("lowering: use of undefined effect \"{0}\"")]
    UndefinedEffect(String),

    #[error("lowering: \"{ctor}\" is not a constructor of effect \"{effect}\"")]
    UndefinedEffectConstructor { effect: String, ctor: String },

    #[error("lowering: \"{ctor}\" is not a constructor of type \"{type_name}\"")]
    UnknownConstructor { ctor: String, type_name: String },

    #[error("lowering: variable \"{0}\" has no definition in its implication")]
    UnboundVariable(String),

    #[error("lowering: \"{name}\" expects {expected} arguments, found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}
