//! Logging infrastructure for statmerge observability.
//!
//! statmerge uses `tracing` for structured logging. All events use target
//! "statmerge" and include an `event` field for filtering.
//!
//! ## Library Integration
//!
//! statmerge never initializes a global subscriber. Applications configure
//! tracing via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: module/subsystem (e.g., "operator", "manager")
//! - Use `%` for Display, `?` for Debug formatting
//! - Per-value decode failures log at warn and carry the dataset id

/// Target for all statmerge log events.
pub(crate) const STATMERGE_TARGET: &str = "statmerge";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "manager",
///     event = "operator_attached",
///     table = %table,
///     dataset = %dataset,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::STATMERGE_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::STATMERGE_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::STATMERGE_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
