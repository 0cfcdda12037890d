//! Span export seam.
//!
//! Transport is an external collaborator: the tracer hands finished spans to
//! a [`SpanExporter`] and never learns what happens afterwards.
use crate::trace::{SpanContext, SpanId, SpanKind, TraceResult};
use crate::KeyValue;
use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

/// Results of exporting a batch of finished spans.
pub type ExportResult = TraceResult<()>;

/// Marker trait for errors returned by exporters.
pub trait ExportError: std::error::Error + Send + Sync + 'static {
    /// The name of exporter that returned this error.
    fn exporter_name(&self) -> &'static str;
}

/// A finished span, immutable and ready for export.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// Span context of this span.
    pub span_context: SpanContext,
    /// Span id of this span's parent, or [`SpanId::INVALID`] for roots.
    pub parent_span_id: SpanId,
    /// The kind of span.
    pub span_kind: SpanKind,
    /// Operation name.
    pub name: Cow<'static, str>,
    /// Service the span was recorded for.
    pub service_name: Cow<'static, str>,
    /// Wall time the span started.
    pub start_time: SystemTime,
    /// Wall time the span ended.
    pub end_time: SystemTime,
    /// Attributes, insertion ordered, later keys win.
    pub attributes: Vec<KeyValue>,
    /// Events recorded while the span was in flight.
    pub events: Vec<Event>,
}

impl SpanData {
    /// The value of the last attribute set under `key`, if any.
    pub fn attribute(&self, key: &str) -> Option<&crate::Value> {
        self.attributes
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

/// A timestamped annotation on a span.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Event name.
    pub name: Cow<'static, str>,
    /// Wall time the event was recorded.
    pub timestamp: SystemTime,
    /// Event attributes.
    pub attributes: Vec<KeyValue>,
}

/// Accepts finished spans for delivery to a tracing backend.
///
/// Called synchronously from [`Span::end`]; implementations that talk to a
/// network must buffer internally rather than block the caller.
///
/// [`Span::end`]: crate::trace::Span::end
pub trait SpanExporter: Send + Sync + fmt::Debug {
    /// Deliver a batch of spans.
    fn export(&self, batch: Vec<SpanData>) -> ExportResult;

    /// Export any internally-buffered spans.
    fn force_flush(&self) -> ExportResult {
        Ok(())
    }

    /// Flush and release any held resources. Called at most once.
    fn shutdown(&self) {}
}

/// An exporter that drops every span.
#[derive(Clone, Debug, Default)]
pub struct NoopSpanExporter {
    _private: (),
}

impl NoopSpanExporter {
    /// Create a new no-op exporter.
    pub fn new() -> Self {
        NoopSpanExporter { _private: () }
    }
}

impl SpanExporter for NoopSpanExporter {
    fn export(&self, _batch: Vec<SpanData>) -> ExportResult {
        Ok(())
    }
}
