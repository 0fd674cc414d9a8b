//! Result extension helpers
//!
//! The lenient read paths substitute a display default instead of
//! propagating; this keeps the substitution logged in one place.

/// Result extension trait
pub trait ResultExt<T> {
    /// Returns the value, or logs the error with `context` and returns `default`.
    fn unwrap_or_log(self, default: T, context: &str) -> T;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn unwrap_or_log(self, default: T, context: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("{}: {}", context, e);
                default
            }
        }
    }
}
