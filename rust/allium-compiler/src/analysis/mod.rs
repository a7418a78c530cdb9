//! Whole-program analyses over the typed AST.

pub mod ground;
pub mod inhabitable;
pub mod recursion;
pub mod variables;
