//! Inhabitability of types.
//!
//! A variable of an uninhabited type can never be bound, so the lowerer tags
//! such variables and the interpreter rejects existence proofs through them.

use allium_core::ast::Type;
use std::collections::BTreeSet;

/// Computes the set of inhabited type names to a least fixed point.
///
/// All user types are assumed uninhabited until proven otherwise; the
/// literal types `Int` and `String` seed the set. A type is inhabited once
/// it has a constructor whose parameters are all of inhabited types.
pub fn inhabitable_types(types: &[Type]) -> BTreeSet<String> {
    let mut inhabited: BTreeSet<String> = BTreeSet::new();
    inhabited.insert("Int".to_string());
    inhabited.insert("String".to_string());

    let mut remaining: Vec<&Type> = types.iter().collect();

    loop {
        let mut changed = false;
        remaining.retain(|ty| {
            let has_constructible_ctor = ty.constructors.iter().any(|ctor| {
                ctor.parameters
                    .iter()
                    .all(|p| inhabited.contains(&p.type_name))
            });
            if has_constructible_ctor {
                inhabited.insert(ty.declaration.name.clone());
                changed = true;
                false
            } else {
                true
            }
        });
        if !changed {
            break;
        }
    }

    inhabited
}
