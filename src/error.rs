//! Typed error taxonomy (spec §7).
//!
//! `Interrupted` is deliberately absent from this enum: cooperative
//! cancellation is a normal successful return (the null/best-so-far
//! partition), not an error, so it is modeled as a plain value
//! (`partition::Outcome::Interrupted`) rather than an `Err`.
//! `NumericClampApplied` is not surfaced at all; it is a `log::trace!` side
//! effect of [`crate::cost::clamp_nonnegative`].

use std::fmt;

/// Errors a caller can observe from this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionError {
    /// invalid parameters, reported immediately by validation (e.g. negative
    /// `min_group_frequency`, non-positive `epsilon_bin_width`)
    Configuration(String),
    /// an internal invariant was violated (e.g. a cell frequency went
    /// negative, a garbage group index fell out of range, a sorted-list
    /// handle was stale). Fatal for the current call only; the process
    /// keeps running.
    InvariantViolation(String),
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            PartitionError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for PartitionError {}

pub type PartitionResult<T> = Result<T, PartitionError>;

/// Returns a typed `InvariantViolation` when `$cond` fails. Call sites that
/// want the debug-panic/release-typed-error split described in spec.md §7
/// (e.g. the sorted-list back-handle check) wrap the call with their own
/// `debug_assert!` instead of baking a panic into every use of this macro --
/// most invariant checks in this crate are expected to be exercised by tests
/// in debug builds and must return `Err`, not abort.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::error::PartitionError::InvariantViolation(format!($($arg)*)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_readable() {
        let config = PartitionError::Configuration("min_group_frequency < 0".into());
        assert_eq!(
            config.to_string(),
            "configuration error: min_group_frequency < 0"
        );
        let invariant = PartitionError::InvariantViolation("negative cell frequency".into());
        assert_eq!(
            invariant.to_string(),
            "invariant violation: negative cell frequency"
        );
    }

    fn checked(x: i32) -> PartitionResult<i32> {
        invariant!(x >= 0, "x must be non-negative, got {x}");
        Ok(x)
    }

    #[test]
    fn invariant_macro_returns_typed_error() {
        assert!(checked(3).is_ok());
        assert!(matches!(
            checked(-1),
            Err(PartitionError::InvariantViolation(_))
        ));
    }
}
