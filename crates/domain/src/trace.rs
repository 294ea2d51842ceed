use serde::Serialize;

/// Structured trace events emitted across the eve crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    UpstreamCall {
        operation: String,
        ok: bool,
        duration_ms: u64,
    },
    SessionTransition {
        endpoint: String,
        from: String,
        to: String,
    },
    AggregationDegraded {
        operation: String,
        subject: String,
        warnings: usize,
    },
    ToolInvoked {
        tool: String,
        is_error: bool,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "eve_event");
    }
}
