//! Application-level span helpers.

use tracing::Span;

use crate::init::build_info;

/// Application span tagged with the run `mode` and the build version.
///
/// Attach it to the top-level future with [`tracing::Instrument`] so every event
/// emitted by the scheduler and the engine carries the same context.
#[must_use]
pub fn app_span(mode: &'static str) -> Span {
    tracing::info_span!(
        "app",
        app = "s3s",
        version = %build_info().version,
        mode
    )
}

