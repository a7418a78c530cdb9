//! Interpreter configuration.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, FromRepr};

/// Verbosity of the proof-search trace written to stdout.
///
/// Parses both the numeric form the driver passes (`--log-level=2`) and the
/// symbolic names.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    FromRepr,
)]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Off = 0,
    /// Effect handling only.
    Quiet = 1,
    /// Plus every predicate call.
    Loud = 2,
    /// Plus every implication attempt.
    Max = 3,
}

impl LogLevel {
    /// Parses the driver's `--log-level=N` argument.
    pub fn from_flag(value: &str) -> Option<Self> {
        match value.parse::<usize>() {
            Ok(n) => LogLevel::from_repr(n),
            Err(_) => value.parse().ok(),
        }
    }
}

/// Configuration parameters of a runtime program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
}

impl Config {
    pub fn new(log_level: LogLevel) -> Self {
        Config { log_level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parses_numeric_and_symbolic_flags() {
        assert_eq!(LogLevel::from_flag("0"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_flag("3"), Some(LogLevel::Max));
        assert_eq!(LogLevel::from_flag("loud"), Some(LogLevel::Loud));
        assert_eq!(LogLevel::from_flag("4"), None);
        assert_eq!(LogLevel::from_flag("chatty"), None);
    }

    #[test]
    fn levels_order_by_verbosity() {
        assert!(LogLevel::Off < LogLevel::Quiet);
        assert!(LogLevel::Loud < LogLevel::Max);
    }
}
