//! The builtin kernel: predicates and effect handlers implemented in Rust.

use crate::FatalError;
use allium_core::builtins::{BuiltinPredicateKind, IO_PRINT_INDEX};
use allium_core::ir::EffectCtorRef;
use allium_core::values::{target, Context, RuntimeValue};

/// The builtin effect handlers the runtime can install. `Io` is pushed at
/// the bottom of every proof's handler stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinEffectHandler {
    Io,
}

/// Runs a builtin predicate on lowered arguments. Returns whether the
/// builtin produced its single witness; builtins never produce more than
/// one.
pub fn run_builtin(
    kind: BuiltinPredicateKind,
    arguments: &[RuntimeValue],
) -> Result<bool, FatalError> {
    match kind {
        BuiltinPredicateKind::Concat => concat(arguments),
    }
}

fn ground_string(
    value: &RuntimeValue,
    builtin: &'static str,
    argument: usize,
) -> Result<String, FatalError> {
    match value.resolved() {
        RuntimeValue::Str(s) => Ok(s),
        RuntimeValue::Undefined => Err(FatalError::BuiltinArgumentNotGround { builtin, argument }),
        _ => Err(FatalError::BuiltinTypeMismatch { builtin, argument }),
    }
}

/// `concat(in a, in b, c)`: both inputs must be ground strings. An unbound
/// third argument is bound to `a ++ b`; a bound one is compared against it.
fn concat(arguments: &[RuntimeValue]) -> Result<bool, FatalError> {
    let a = ground_string(&arguments[0], "concat", 0)?;
    let b = ground_string(&arguments[1], "concat", 1)?;

    match arguments[2].resolved() {
        RuntimeValue::Undefined => {
            if let RuntimeValue::Redirect(cell) = &arguments[2] {
                *target(cell).borrow_mut() = RuntimeValue::Str(a + &b);
            }
            Ok(true)
        }
        RuntimeValue::Str(c) => Ok(a + &b == c),
        _ => Err(FatalError::BuiltinTypeMismatch {
            builtin: "concat",
            argument: 2,
        }),
    }
}

/// Performs the side effect of a builtin handler. The caller is responsible
/// for advancing the continuation afterwards.
pub fn run_builtin_handler(
    handler: BuiltinEffectHandler,
    ecr: &EffectCtorRef,
    context: &Context,
) -> Result<(), FatalError> {
    match handler {
        BuiltinEffectHandler::Io => handle_io(ecr, context),
    }
}

fn handle_io(ecr: &EffectCtorRef, context: &Context) -> Result<(), FatalError> {
    match ecr.effect_ctor_index {
        IO_PRINT_INDEX => {
            // IO.print(in String)
            let value = ecr.arguments[0].lower(context);
            let text = ground_string(&value, "IO.print", 0)?;
            println!("{}", text);
            Ok(())
        }
        other => Err(FatalError::UnknownBuiltinEffectCtor {
            effect: ecr.effect_index,
            ctor: other,
        }),
    }
}
