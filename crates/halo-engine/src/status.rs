//! Integer status codes returned across the host boundary.
//!
//! [`StatusCode`] is a `repr(i32)` enum. Initialisation returns `Ok` or one
//! of the option codes; a snapshot invocation returns `Ok` or `Failure`.

use crate::config::ConfigError;
use crate::session::InvokeError;

/// Status code handed back to the host simulation.
///
/// Values are stable and shared with the host.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The invocation failed; no catalogs were produced.
    Failure = 0,
    /// Success.
    Ok = 1,
    /// A required option is missing from the parameter source.
    OptionMissing = 8,
    /// An option is malformed or names an unavailable backend.
    OptionError = 9,
    /// Two options, or an option and the simulation contents, conflict.
    OptionConflict = 10,
}

impl StatusCode {
    /// The raw integer value.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether this is [`StatusCode::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<&ConfigError> for StatusCode {
    fn from(e: &ConfigError) -> Self {
        match e {
            ConfigError::Missing { .. } => StatusCode::OptionMissing,
            ConfigError::Invalid { .. }
            | ConfigError::Unavailable { .. }
            | ConfigError::Arena(_) => StatusCode::OptionError,
            ConfigError::Conflict(_) => StatusCode::OptionConflict,
        }
    }
}

impl From<&InvokeError> for StatusCode {
    fn from(_: &InvokeError) -> Self {
        StatusCode::Failure
    }
}

impl From<StatusCode> for i32 {
    fn from(s: StatusCode) -> i32 {
        s.code()
    }
}
