use tracing::{Span, field};

use super::TraceId;

/// Root span for one presentation-level operation (load list, create, ...).
///
/// `pull_id` and `user_id` start empty and are recorded once known.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        pull_id = field::Empty,
        user_id = field::Empty
    )
}

/// Child span; inherits the trace id from its parent.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        pull_id = field::Empty,
        user_id = field::Empty
    )
}
