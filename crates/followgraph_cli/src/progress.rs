//! Progress reporting for resolve and sync runs.
//!
//! Events from the library are turned into structured `tracing` lines, so
//! the same output works on a terminal and in CI logs.

mod logging;

use std::sync::Arc;

use followgraph::sync::EventCallback;

pub use logging::LoggingReporter;

impl LoggingReporter {
    /// Convert to an [`EventCallback`] for the library.
    pub fn as_callback(self: &Arc<Self>) -> EventCallback {
        let reporter = Arc::clone(self);
        Arc::new(move |event| reporter.handle(event))
    }
}
