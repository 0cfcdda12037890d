use crate::propagation::{Extractor, Injector};
use crate::trace::{SpanContext, TraceResult};
use crate::KeyValue;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// A shared, type-erased handle to a [`Tracer`].
///
/// The engine passes tracers around as handles so that the process-wide
/// singleton, the rebindable proxy, and per-library config overrides can all
/// refer to the same instance without knowing its concrete type.
pub type TracerHandle = Arc<dyn Tracer>;

/// Describes the relationship between the span and its caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanKind {
    /// Outgoing synchronous request, e.g. an HTTP client call.
    Client,
    /// Incoming synchronous request, e.g. a handled HTTP request.
    Server,
    /// Message sent to a broker.
    Producer,
    /// Message received from a broker.
    Consumer,
    /// Default, internal operation within an application.
    Internal,
}

/// The interface for a single operation within a trace.
///
/// Spans are mutable while in flight and sealed by [`end`](Span::end);
/// implementations must ignore mutations after the span has ended.
pub trait Span: Send {
    /// Returns the `SpanContext` for the given span. Valid for the entire
    /// span lifetime, including after `end`.
    fn span_context(&self) -> &SpanContext;

    /// Returns true if this span records attributes and events.
    fn is_recording(&self) -> bool;

    /// Set a single attribute. Setting an attribute with the same key as an
    /// existing attribute overwrites the existing value.
    fn set_attribute(&mut self, attribute: KeyValue);

    /// Record an event with the given name at the current time.
    fn add_event(&mut self, name: Cow<'static, str>, attributes: Vec<KeyValue>);

    /// Tag this span with the conventional error attributes for `err`.
    fn record_error(&mut self, err: &(dyn std::error::Error + 'static)) {
        use crate::trace::tags;

        self.set_attribute(KeyValue::new(tags::ERROR, true));
        self.set_attribute(KeyValue::new(tags::ERROR_MESSAGE, err.to_string()));
        self.set_attribute(KeyValue::new(tags::ERROR_OBJECT, format!("{:?}", err)));

        let mut sources = Vec::new();
        let mut current = err.source();
        while let Some(cause) = current {
            sources.push(cause.to_string());
            current = cause.source();
        }
        if !sources.is_empty() {
            self.set_attribute(KeyValue::new(tags::ERROR_STACK, sources));
        }
    }

    /// Finish the span. Implementations must ignore repeated calls.
    fn end(&mut self);
}

/// The capability set a tracing backend exposes to instrumentations.
///
/// The trait is object safe on purpose: interceptors resolve their tracer
/// through a [`TracerHandle`] on every intercepted call, so the concrete
/// backend can be swapped at runtime (see [`TracerProxy`]).
///
/// [`TracerProxy`]: crate::global::TracerProxy
pub trait Tracer: Send + Sync + fmt::Debug {
    /// Start a span from a fully-specified builder.
    fn build_span(&self, builder: SpanBuilder) -> Box<dyn Span>;

    /// Write the context's propagation fields into `carrier`.
    fn inject(&self, cx: &SpanContext, carrier: &mut dyn Injector);

    /// Read a remote context out of `carrier`, if one is present and valid.
    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext>;

    /// Export any finished-but-unsent spans.
    fn flush(&self) -> TraceResult<()>;

    /// Flush and release the backend. Further spans are dropped.
    fn close(&self) -> TraceResult<()>;

    /// Start a new span with the default builder settings.
    fn start(&self, name: &str) -> Box<dyn Span> {
        self.build_span(SpanBuilder::from_name(name.to_string()))
    }
}

/// Incrementally describes a span before it is started.
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder {
    /// The operation name.
    pub name: Cow<'static, str>,
    /// The span kind, `Internal` when unset.
    pub span_kind: Option<SpanKind>,
    /// Remote or local parent context.
    pub parent_context: Option<SpanContext>,
    /// Initial attributes.
    pub attributes: Vec<KeyValue>,
    /// Explicit start time override.
    pub start_time: Option<SystemTime>,
}

impl SpanBuilder {
    /// Create a builder with the given operation name.
    pub fn from_name<T: Into<Cow<'static, str>>>(name: T) -> Self {
        SpanBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Assign the span kind.
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.span_kind = Some(kind);
        self
    }

    /// Assign a parent context.
    pub fn with_parent_context(mut self, cx: SpanContext) -> Self {
        self.parent_context = Some(cx);
        self
    }

    /// Assign initial attributes.
    pub fn with_attributes(mut self, attributes: Vec<KeyValue>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Assign an explicit start time.
    pub fn with_start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }
}
