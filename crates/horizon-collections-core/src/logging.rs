//! Logging facilities for Horizon Collections.
//!
//! Horizon Collections uses the `tracing` crate for instrumentation. To see
//! logs, install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_collections=debug")
//!     .init();
//! ```
//!
//! The library never installs a subscriber itself.

/// Span names used throughout Horizon Collections for tracing.
pub mod span_names {
    /// Full rebuild of a collection view.
    pub const REFRESH: &str = "horizon_collections::refresh";
    /// Moving a view to another page.
    pub const PAGE_MOVE: &str = "horizon_collections::page_move";
    /// Rebuilding the group trees.
    pub const REGROUP: &str = "horizon_collections::regroup";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Collection view target.
    pub const VIEW: &str = "horizon_collections::view";
    /// Source adapter target (change tracking).
    pub const SOURCE: &str = "horizon_collections::source";
    /// Group engine target.
    pub const GROUP: &str = "horizon_collections::group";
    /// Pager target.
    pub const PAGER: &str = "horizon_collections::pager";
    /// Add-new transaction target.
    pub const TRANSACTION: &str = "horizon_collections::transaction";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_collections_core::signal";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// This is useful for tracking the duration of refreshes and page moves.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_collections::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}
