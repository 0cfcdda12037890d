//! W3C `traceparent` propagation.
use crate::propagation::{Extractor, Injector, TextMapPropagator};
use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId};

const SUPPORTED_VERSION: u8 = 0;
const MAX_VERSION: u8 = 254;
const TRACEPARENT_HEADER: &str = "traceparent";

/// Propagates span context in the [W3C TraceContext] `traceparent` header:
/// `{version}-{trace_id}-{parent_id}-{trace_flags}` with all fields encoded
/// as lowercase hex.
///
/// [W3C TraceContext]: https://www.w3.org/TR/trace-context/
#[derive(Clone, Debug, Default)]
pub struct TraceContextPropagator {
    _private: (),
}

impl TraceContextPropagator {
    /// Create a new `TraceContextPropagator`.
    pub fn new() -> Self {
        TraceContextPropagator { _private: () }
    }

    fn extract_span_context(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        let header_value = extractor.get(TRACEPARENT_HEADER)?.trim();
        let parts = header_value.split_terminator('-').collect::<Vec<&str>>();
        if parts.len() < 4 {
            return None;
        }

        if parts[0].len() != 2 {
            return None;
        }
        let version = u8::from_str_radix(parts[0], 16).ok()?;
        if version > MAX_VERSION {
            return None;
        }
        if version == 0 && parts.len() != 4 {
            return None;
        }

        if parts[1].len() != 32 || parts[2].len() != 16 || parts[3].len() != 2 {
            return None;
        }
        let trace_id = TraceId::from_hex(parts[1]).ok()?;
        let span_id = SpanId::from_hex(parts[2]).ok()?;
        let opts = u8::from_str_radix(parts[3], 16).ok()?;

        // Only the sampled flag is defined; clear the rest.
        let trace_flags = TraceFlags::new(opts) & TraceFlags::SAMPLED;
        let cx = SpanContext::new(trace_id, span_id, trace_flags, true);
        cx.is_valid().then_some(cx)
    }
}

impl TextMapPropagator for TraceContextPropagator {
    fn inject_context(&self, cx: &SpanContext, injector: &mut dyn Injector) {
        if !cx.is_valid() {
            return;
        }
        let header_value = format!(
            "{:02x}-{}-{}-{:02x}",
            SUPPORTED_VERSION,
            cx.trace_id(),
            cx.span_id(),
            cx.trace_flags() & TraceFlags::SAMPLED
        );
        injector.set(TRACEPARENT_HEADER, header_value);
    }

    fn extract_context(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        self.extract_span_context(extractor)
    }
}
