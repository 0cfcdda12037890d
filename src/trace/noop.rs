//! No-op trace impls.
//!
//! Installed as the global tracer until a real one is configured. Also useful
//! as a stand-in during tests, as it has no runtime impact.
use crate::propagation::{Extractor, Injector};
use crate::trace::{Span, SpanBuilder, SpanContext, TraceResult, Tracer};
use crate::KeyValue;
use std::borrow::Cow;

/// A no-op instance of a [`Tracer`].
#[derive(Clone, Debug, Default)]
pub struct NoopTracer {
    _private: (),
}

impl NoopTracer {
    /// Create a new no-op tracer.
    pub fn new() -> Self {
        NoopTracer { _private: () }
    }
}

impl Tracer for NoopTracer {
    /// Starts a `NoopSpan`, ignoring the builder.
    fn build_span(&self, _builder: SpanBuilder) -> Box<dyn Span> {
        Box::new(NoopSpan::new())
    }

    /// Injects nothing.
    fn inject(&self, _cx: &SpanContext, _carrier: &mut dyn Injector) {}

    /// Extracts nothing.
    fn extract(&self, _carrier: &dyn Extractor) -> Option<SpanContext> {
        None
    }

    fn flush(&self) -> TraceResult<()> {
        Ok(())
    }

    fn close(&self) -> TraceResult<()> {
        Ok(())
    }
}

/// A no-op instance of a [`Span`].
#[derive(Clone, Debug)]
pub struct NoopSpan {
    span_context: SpanContext,
}

impl Default for NoopSpan {
    fn default() -> Self {
        NoopSpan::new()
    }
}

impl NoopSpan {
    /// Creates a new `NoopSpan` with an invalid context.
    pub fn new() -> Self {
        NoopSpan {
            span_context: SpanContext::empty_context(),
        }
    }
}

impl Span for NoopSpan {
    /// Returns an invalid `SpanContext`.
    fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns false, signifying that this span never records.
    fn is_recording(&self) -> bool {
        false
    }

    /// Ignores all attributes.
    fn set_attribute(&mut self, _attribute: KeyValue) {
        // Ignored
    }

    /// Ignores all events.
    fn add_event(&mut self, _name: Cow<'static, str>, _attributes: Vec<KeyValue>) {
        // Ignored
    }

    /// Ignores the end operation.
    fn end(&mut self) {
        // Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::tags;
    use std::collections::HashMap;

    #[test]
    fn noop_tracer_produces_invalid_contexts() {
        let tracer = NoopTracer::new();
        let span = tracer.start("operation");
        assert!(!span.span_context().is_valid());
        assert!(!span.is_recording());
    }

    #[test]
    fn noop_tracer_injects_nothing() {
        let tracer = NoopTracer::new();
        let mut carrier = HashMap::new();
        tracer.inject(&SpanContext::empty_context(), &mut carrier);
        assert!(carrier.is_empty());
        assert!(tracer.extract(&carrier).is_none());
    }

    #[test]
    fn record_error_is_swallowed() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let mut span = NoopSpan::new();
        span.record_error(&err);
        let _ = tags::ERROR; // tags exist regardless of the span impl
    }
}
