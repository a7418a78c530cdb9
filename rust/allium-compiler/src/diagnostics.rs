//! The semantic diagnostic catalogue.
//!
//! Every error the checker can raise is surfaced before execution begins;
//! the checker never aborts on the first diagnostic. Message wording is part
//! of the tool's surface and is covered by tests.

use allium_core::ast::SourceLocation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("Arguments with the \"in\" modifier must not contain free variables, but the variable \"{0}\" is not sufficiently instantiated on all code paths.")]
    ArgumentNotGround(String),

    #[error("Arguments with the \"in\" modifier must not contain anonymous variables.")]
    ArgumentNotGroundAnonymous,

    #[error("Allium builtin \"{0}\" cannot be redefined.")]
    BuiltinRedefined(String),

    #[error("Constructor \"{ctor}\" of type {type_name} expects {expected} arguments.")]
    ConstructorArgumentCount {
        ctor: String,
        type_name: String,
        expected: usize,
    },

    #[error("The \"continue\" keyword may only occur inside an effect handler.")]
    ContinueInPredicateImpl,

    #[error("Effect constructor \"{ctor}\" of effect {effect} expects {expected} arguments.")]
    EffectArgumentCount {
        ctor: String,
        effect: String,
        expected: usize,
    },

    #[error("Predicate \"{predicate}\" does not handle effect \"{effect}\" performed by \"{callee}\".")]
    EffectFromPredicateUnhandled {
        predicate: String,
        effect: String,
        callee: String,
    },

    #[error("Effect \"{name}\" was already defined at {previous} and cannot be redefined.")]
    EffectRedefined {
        name: String,
        previous: SourceLocation,
    },

    #[error("Use of undefined effect type \"{0}\".")]
    EffectTypeUndefined(String),

    #[error("Effect constructor \"{0}\" is not a constructor of any known effect.")]
    EffectConstructorUndefined(String),

    #[error("Predicate \"{predicate}\" does not handle effect \"{effect}\".")]
    EffectUnhandled { predicate: String, effect: String },

    #[error("Implication head \"{head}\" does not match any constructors of effect \"{effect}\".")]
    EffectImplHeadMismatchesEffect { head: String, effect: String },

    #[error("Head of implication must match predicate. Did you mean \"{0}\"?")]
    ImplHeadMismatchesPredicate(String),

    #[error("Parameter was marked \"in\" and cannot be instantiated with definition of variable \"{0}\".")]
    InputOnlyArgumentContainsVariableDefinition(String),

    #[error("An Int literal is not convertible to type \"{0}\".")]
    IntLiteralNotConvertible(String),

    #[error("Predicate \"{predicate}\" expects {expected} arguments.")]
    PredicateArgumentCount { predicate: String, expected: usize },

    #[error("Predicate \"{name}\" was already defined at {previous} and cannot be redefined.")]
    PredicateRedefined {
        name: String,
        previous: SourceLocation,
    },

    #[error("A string literal is not convertible to type \"{0}\".")]
    StringLiteralNotConvertible(String),

    #[error("Type \"{name}\" was already defined at {previous} and cannot be redefined.")]
    TypeRedefined {
        name: String,
        previous: SourceLocation,
    },

    #[error("Use of undefined predicate \"{0}\".")]
    UndefinedPredicate(String),

    #[error("Use of undefined type \"{0}\".")]
    UndefinedType(String),

    #[error("\"{ctor}\" is not a known constructor of type {type_name}.")]
    UnknownConstructor { ctor: String, type_name: String },

    #[error("\"{name}\" is not a known constructor of type {type_name} or variable accessible in the current scope.")]
    UnknownConstructorOrVariable { name: String, type_name: String },

    #[error("Re-definition of variable \"{0}\"; variables may only be defined once.")]
    VariableRedefined(String),

    #[error("Variable \"{variable}\" of type \"{variable_type}\" used where value of type \"{expected_type}\" is required.")]
    VariableTypeMismatch {
        variable: String,
        variable_type: String,
        expected_type: String,
    },
}

/// Collects diagnostics with their source locations. After checking, the
/// driver renders them and refuses to lower or execute if any were emitted.
#[derive(Debug, Default)]
pub struct DiagnosticEmitter {
    diagnostics: Vec<(SourceLocation, SemanticError)>,
}

impl DiagnosticEmitter {
    pub fn new() -> Self {
        DiagnosticEmitter::default()
    }

    /// Records a diagnostic. Fixpoint analyses revisit the same expression
    /// several times, so an identical diagnostic at the same location is
    /// coalesced.
    pub fn emit(&mut self, location: SourceLocation, error: SemanticError) {
        let entry = (location, error);
        if !self.diagnostics.contains(&entry) {
            self.diagnostics.push(entry);
        }
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[(SourceLocation, SemanticError)] {
        &self.diagnostics
    }

    /// Renders all diagnostics in the `error <location> - <message>` form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (location, error) in &self.diagnostics {
            out.push_str(&format!("error {} - {}\n", location, error));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_render_with_locations() {
        let mut emitter = DiagnosticEmitter::new();
        emitter.emit(
            SourceLocation::new(3, 14),
            SemanticError::UndefinedPredicate("frob".into()),
        );
        assert_eq!(emitter.error_count(), 1);
        assert_eq!(
            emitter.render(),
            "error 3:14 - Use of undefined predicate \"frob\".\n"
        );
    }

    #[test]
    fn ground_diagnostics_name_the_offending_variable() {
        let named = SemanticError::ArgumentNotGround("x".into());
        assert!(named.to_string().contains("\"x\""));
        assert!(SemanticError::ArgumentNotGroundAnonymous
            .to_string()
            .contains("anonymous"));
    }
}
