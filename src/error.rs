//! Error taxonomy surfaced at the crate's API boundary (spec §7).

use thiserror::Error;

/// Failure kinds an engine operation can report. Messages never carry secret
/// material or derived key bytes — only enough context (lengths, format ids)
/// to diagnose the call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupwError {
    /// Bad input: key length, source-bytes length/entropy, malformed
    /// encryption string, unknown format id, invalid encoding.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// MAC mismatch, or a structurally invalid blinded payload.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Protected-array element access with an out-of-bounds logical index.
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// Operation invoked on a disposed engine or protected array.
    #[error("use after dispose: {0}")]
    UseAfterDispose(String),

    /// A primitive failed in a way the contract says cannot happen, e.g. a
    /// block cipher reporting a block size the caller did not ask for.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(String),
}

impl TupwError {
    /// The variant name only, never the message payload. Several `Argument`
    /// messages echo attacker-controlled input verbatim (a bad format id, an
    /// out-of-alphabet character); callers that log failures (e.g. this
    /// crate's own optional `tracing` instrumentation) must use this instead
    /// of the `Display` impl above.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TupwError::Argument(_) => "Argument",
            TupwError::Integrity(_) => "Integrity",
            TupwError::IndexOutOfRange(_) => "IndexOutOfRange",
            TupwError::UseAfterDispose(_) => "UseAfterDispose",
            TupwError::InternalInvariantViolated(_) => "InternalInvariantViolated",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TupwError>;

/// If the condition is not met, return an `Err` built from the given
/// `TupwError` variant constructor and message. Keeps guard clauses terse
/// the way the teacher's own `ensure!()` does, but builds a typed error
/// instead of a `&'static str`.
macro_rules! ensure {
    ($cond:expr, $variant:ident, $msg:expr $(,)?) => {
        if !$cond {
            return Err($crate::error::TupwError::$variant($msg.into()));
        }
    };
}

pub(crate) use ensure;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_never_echoes_the_message_payload() {
        let err = TupwError::Argument("character '@' is not part of the alphabet".into());
        assert_eq!(err.kind(), "Argument");
        assert!(!err.kind().contains('@'));
    }

    #[test]
    fn kind_is_stable_per_variant() {
        assert_eq!(TupwError::Integrity("x".into()).kind(), "Integrity");
        assert_eq!(TupwError::IndexOutOfRange("x".into()).kind(), "IndexOutOfRange");
        assert_eq!(TupwError::UseAfterDispose("x".into()).kind(), "UseAfterDispose");
        assert_eq!(TupwError::InternalInvariantViolated("x".into()).kind(), "InternalInvariantViolated");
    }
}
