//! Declarations of everything hardcoded into the language.
//!
//! The registry replaces ad-hoc static-initializer registration: lowering and
//! the ground analysis consult these tables, while the runtime crate supplies
//! the matching implementations.

use crate::ast::{BuiltinPredicate, Effect, EffectCtor, Mode, Parameter, PredicateDecl};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Builtin type names. Literal values are their only inhabitants.
pub const BUILTIN_TYPES: [&str; 2] = ["Int", "String"];

/// The builtin `IO` effect always occupies effect index 0; user effects are
/// numbered after the builtins, in source order.
pub const IO_EFFECT_INDEX: usize = 0;

/// Constructor index of `IO.print` within the `IO` effect.
pub const IO_PRINT_INDEX: usize = 0;

static BUILTIN_EFFECTS: Lazy<Vec<Effect>> = Lazy::new(|| {
    vec![Effect::new(
        "IO",
        vec![EffectCtor {
            name: "print".into(),
            parameters: vec![Parameter::new("String", true)],
        }],
    )]
});

static BUILTIN_PREDICATES: Lazy<Vec<BuiltinPredicate>> = Lazy::new(|| {
    vec![BuiltinPredicate {
        declaration: PredicateDecl {
            name: "concat".into(),
            parameters: vec![
                Parameter::new("String", true),
                Parameter::new("String", true),
                Parameter::new("String", false),
            ],
            effects: vec![],
        },
        // concat(in a, in b, c): with both inputs ground, every argument is
        // ground after a successful proof.
        modes: vec![Mode {
            in_groundness: vec![true, true, false],
            out_groundness: vec![true, true, true],
        }],
    }]
});

pub fn builtin_effects() -> &'static [Effect] {
    &BUILTIN_EFFECTS
}

pub fn builtin_predicates() -> &'static [BuiltinPredicate] {
    &BUILTIN_PREDICATES
}

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// The closed set of builtin predicate implementations. The runtime IR
/// stores this tag instead of a function pointer; dispatch lives in the
/// runtime crate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum BuiltinPredicateKind {
    #[strum(serialize = "concat")]
    #[serde(rename = "concat")]
    Concat,
}

impl BuiltinPredicateKind {
    /// Maps a resolved builtin declaration name to its implementation tag.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}
