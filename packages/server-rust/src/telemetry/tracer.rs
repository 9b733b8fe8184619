//! In-process operation tracer with a fixed-capacity ring buffer of finished
//! spans.
//!
//! Spans are opened through [`ActiveSpan`], an RAII guard that finishes its
//! span exactly once: either explicitly via [`ActiveSpan::finish`] or on drop,
//! which covers early returns and unwinding.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use sidecar_core::types::now_micros;
use sidecar_core::{SpanRecord, SpanStatus, TraceContext};
use tracing::debug;

// ---------------------------------------------------------------------------
// Tracer trait
// ---------------------------------------------------------------------------

/// Span sink used by adapters, facades, and the relay loop.
pub trait Tracer: Send + Sync {
    /// Opens a span identified by `trace.span_id`.
    fn start(&self, name: &str, trace: &TraceContext, parent_id: Option<&str>);

    fn add_metadata(&self, span_id: &str, key: &str, value: &str);

    fn update_status(&self, span_id: &str, status: SpanStatus, message: &str);

    /// Closes an open span. Finishing an unknown or already finished span is
    /// a no-op.
    fn finish(&self, span_id: &str);

    /// Most recent finished spans, oldest first. `trace_id` restricts the
    /// result to one trace; `count` keeps only the newest `count` spans.
    fn recent(&self, trace_id: Option<&str>, count: Option<usize>) -> Vec<SpanRecord>;
}

// ---------------------------------------------------------------------------
// BufferTracer
// ---------------------------------------------------------------------------

/// Default capacity of the finished-span ring buffer.
pub const DEFAULT_TRACE_BUFFER: usize = 1024;

/// [`Tracer`] that keeps open spans in a `DashMap` and finished spans in a
/// bounded ring buffer, evicting the oldest first.
pub struct BufferTracer {
    open: DashMap<String, SpanRecord>,
    finished: Mutex<VecDeque<SpanRecord>>,
    capacity: usize,
}

impl BufferTracer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            open: DashMap::new(),
            finished: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Number of spans started but not yet finished.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

impl Default for BufferTracer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_BUFFER)
    }
}

impl Tracer for BufferTracer {
    fn start(&self, name: &str, trace: &TraceContext, parent_id: Option<&str>) {
        let record = SpanRecord {
            name: name.to_string(),
            id: trace.span_id.clone(),
            parent_id: parent_id.map(str::to_string),
            trace_id: trace.trace_id.clone(),
            started_at: now_micros(),
            ended_at: None,
            metadata: BTreeMap::new(),
            status: SpanStatus::Unset,
            status_message: String::new(),
        };
        self.open.insert(record.id.clone(), record);
    }

    fn add_metadata(&self, span_id: &str, key: &str, value: &str) {
        if let Some(mut span) = self.open.get_mut(span_id) {
            span.metadata.insert(key.to_string(), value.to_string());
        }
    }

    fn update_status(&self, span_id: &str, status: SpanStatus, message: &str) {
        if let Some(mut span) = self.open.get_mut(span_id) {
            span.status = status;
            span.status_message = message.to_string();
        }
    }

    fn finish(&self, span_id: &str) {
        let Some((_, mut span)) = self.open.remove(span_id) else {
            return;
        };
        span.ended_at = Some(now_micros());

        debug!(
            span = %span.name,
            trace_id = %span.trace_id,
            span_id = %span.id,
            status = ?span.status,
            duration_us = span.ended_at.unwrap_or(span.started_at).saturating_sub(span.started_at),
            "span finished"
        );

        let mut finished = self.finished.lock();
        if finished.len() == self.capacity {
            finished.pop_front();
        }
        finished.push_back(span);
    }

    fn recent(&self, trace_id: Option<&str>, count: Option<usize>) -> Vec<SpanRecord> {
        let finished = self.finished.lock();
        let matching: Vec<&SpanRecord> = finished
            .iter()
            .filter(|s| trace_id.is_none_or(|id| s.trace_id == id))
            .collect();
        let skip = count.map_or(0, |n| matching.len().saturating_sub(n));
        matching.into_iter().skip(skip).cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// ActiveSpan
// ---------------------------------------------------------------------------

/// Guard over one open span.
///
/// Dropping the guard without an explicit status records the span as an
/// error, so an abandoned call never shows up as a success.
pub struct ActiveSpan {
    tracer: Arc<dyn Tracer>,
    trace: TraceContext,
    status_set: bool,
    finished: bool,
}

impl ActiveSpan {
    /// Opens `name` as a child of `parent`, or as the root of a new trace
    /// when there is no parent.
    #[must_use]
    pub fn start(tracer: Arc<dyn Tracer>, name: &str, parent: Option<&TraceContext>) -> Self {
        let (trace, parent_id) = match parent {
            Some(p) => (p.child(), Some(p.span_id.as_str())),
            None => (TraceContext::new_root(), None),
        };
        tracer.start(name, &trace, parent_id);
        Self {
            tracer,
            trace,
            status_set: false,
            finished: false,
        }
    }

    /// Trace context of this span, for propagation to nested calls.
    #[must_use]
    pub fn context(&self) -> &TraceContext {
        &self.trace
    }

    pub fn add_metadata(&self, key: &str, value: &str) {
        self.tracer.add_metadata(&self.trace.span_id, key, value);
    }

    pub fn succeed(&mut self) {
        self.set_status(SpanStatus::Ok, "success");
    }

    pub fn fail(&mut self, message: &str) {
        self.set_status(SpanStatus::Error, message);
    }

    /// Marks the span succeeded or failed according to `result`, recording
    /// the error text on failure.
    pub fn record_result<T, E: std::fmt::Display>(&mut self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.succeed(),
            Err(e) => self.fail(&e.to_string()),
        }
    }

    fn set_status(&mut self, status: SpanStatus, message: &str) {
        self.tracer
            .update_status(&self.trace.span_id, status, message);
        self.status_set = true;
    }

    /// Closes the span now instead of at drop.
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        if !self.status_set {
            self.tracer.update_status(
                &self.trace.span_id,
                SpanStatus::Error,
                "span closed without a result",
            );
        }
        self.tracer.finish(&self.trace.span_id);
        self.finished = true;
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
