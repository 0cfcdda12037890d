//! The tracer constructed by the factory pipeline.
use crate::propagation::{Extractor, Injector, PropagationFormat, TextMapPropagator};
use crate::sdk::export::{Event, SpanData, SpanExporter};
use crate::sdk::sampler::{Sampler, ShouldSample};
use crate::trace::{
    tags, Span, SpanBuilder, SpanContext, SpanId, SpanKind, TraceFlags, TraceId, TraceResult,
    Tracer,
};
use crate::KeyValue;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// The fully-resolved configuration a tracer was built with.
///
/// Each field is the outcome of the layered resolution performed by the
/// factory pipeline (explicit argument, config entry, environment, default).
#[derive(Clone, PartialEq)]
pub struct TracerSettings {
    /// Service name reported on every span.
    pub service_name: String,
    /// Ingestion endpoint the transport layer should target.
    pub endpoint: String,
    /// Access credential, `None` when auth fields are omitted.
    pub access_token: Option<String>,
    /// Head sampler configuration.
    pub sampler: Sampler,
    /// Context propagation wire format.
    pub propagation: PropagationFormat,
}

impl fmt::Debug for TracerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerSettings")
            .field("service_name", &self.service_name)
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("sampler", &self.sampler)
            .field("propagation", &self.propagation)
            .finish()
    }
}

/// A tracer that samples at span start and hands finished spans to a
/// [`SpanExporter`].
#[derive(Clone, Debug)]
pub struct SdkTracer {
    core: Arc<TracerCore>,
}

#[derive(Debug)]
struct TracerCore {
    settings: TracerSettings,
    sampler: Box<dyn ShouldSample>,
    propagator: Box<dyn TextMapPropagator>,
    exporter: Box<dyn SpanExporter>,
    closed: AtomicBool,
}

impl TracerCore {
    fn export_span(&self, data: SpanData) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.exporter.export(vec![data]) {
            // Runtime export failures must never surface into request handling.
            log::warn!("span export failed: {}", err);
        }
    }
}

impl SdkTracer {
    /// Build a tracer from resolved settings and an exporter.
    pub fn new(settings: TracerSettings, exporter: Box<dyn SpanExporter>) -> Self {
        let sampler = settings.sampler.build();
        let propagator = settings.propagation.propagator();
        SdkTracer {
            core: Arc::new(TracerCore {
                settings,
                sampler,
                propagator,
                exporter,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The settings this tracer was resolved with.
    pub fn settings(&self) -> &TracerSettings {
        &self.core.settings
    }
}

impl Tracer for SdkTracer {
    fn build_span(&self, builder: SpanBuilder) -> Box<dyn Span> {
        let parent = builder.parent_context.filter(SpanContext::is_valid);
        let trace_id = parent
            .as_ref()
            .map(SpanContext::trace_id)
            .unwrap_or_else(|| TraceId::from(rand::random::<u128>()));
        let parent_span_id = parent
            .as_ref()
            .map(SpanContext::span_id)
            .unwrap_or(SpanId::INVALID);

        // Children inherit the parent decision; roots consult the sampler.
        let sampled = match &parent {
            Some(cx) => cx.is_sampled(),
            None => self.core.sampler.should_sample(&builder.name),
        };
        let span_context = SpanContext::new(
            trace_id,
            SpanId::from(rand::random::<u64>()),
            TraceFlags::default().with_sampled(sampled),
            false,
        );

        if !sampled || self.core.closed.load(Ordering::SeqCst) {
            return Box::new(SdkSpan {
                span_context,
                data: None,
                core: self.core.clone(),
            });
        }

        let mut attributes = vec![
            KeyValue::new(tags::TRACING_LIBRARY, "autotrace"),
            KeyValue::new(tags::TRACING_VERSION, env!("CARGO_PKG_VERSION")),
        ];
        attributes.extend(builder.attributes);

        let start_time = builder.start_time.unwrap_or_else(SystemTime::now);
        Box::new(SdkSpan {
            span_context: span_context.clone(),
            data: Some(SpanData {
                span_context,
                parent_span_id,
                span_kind: builder.span_kind.unwrap_or(SpanKind::Internal),
                name: builder.name,
                service_name: Cow::Owned(self.core.settings.service_name.clone()),
                start_time,
                end_time: start_time,
                attributes,
                events: Vec::new(),
            }),
            core: self.core.clone(),
        })
    }

    fn inject(&self, cx: &SpanContext, carrier: &mut dyn Injector) {
        self.core.propagator.inject_context(cx, carrier);
    }

    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        self.core.propagator.extract_context(carrier)
    }

    fn flush(&self) -> TraceResult<()> {
        self.core.exporter.force_flush()
    }

    fn close(&self) -> TraceResult<()> {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.core.exporter.force_flush()?;
        self.core.exporter.shutdown();
        Ok(())
    }
}

/// A span recorded by [`SdkTracer`]; exports itself on `end` (or drop).
#[derive(Debug)]
pub struct SdkSpan {
    span_context: SpanContext,
    data: Option<SpanData>,
    core: Arc<TracerCore>,
}

impl Span for SdkSpan {
    fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        if let Some(data) = self.data.as_mut() {
            data.attributes.push(attribute);
        }
    }

    fn add_event(&mut self, name: Cow<'static, str>, attributes: Vec<KeyValue>) {
        if let Some(data) = self.data.as_mut() {
            data.events.push(Event {
                name,
                timestamp: SystemTime::now(),
                attributes,
            });
        }
    }

    fn end(&mut self) {
        if let Some(mut data) = self.data.take() {
            data.end_time = SystemTime::now();
            self.core.export_span(data);
        }
    }
}

impl Drop for SdkSpan {
    /// Unended spans are still delivered.
    fn drop(&mut self) {
        self.end();
    }
}
