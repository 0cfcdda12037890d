//! Zipkin B3 multi-header propagation.
use crate::propagation::{Extractor, Injector, TextMapPropagator};
use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId};

const B3_TRACE_ID_HEADER: &str = "x-b3-traceid";
const B3_SPAN_ID_HEADER: &str = "x-b3-spanid";
const B3_SAMPLED_HEADER: &str = "x-b3-sampled";
const B3_FLAGS_HEADER: &str = "x-b3-flags";

/// Propagates span context with the [B3 multi-header] encoding:
/// `X-B3-TraceId`, `X-B3-SpanId`, and `X-B3-Sampled`.
///
/// Trace ids are accepted in both 64 and 128 bit hex forms.
///
/// [B3 multi-header]: https://github.com/openzipkin/b3-propagation
#[derive(Clone, Debug, Default)]
pub struct B3Propagator {
    _private: (),
}

impl B3Propagator {
    /// Create a new `B3Propagator`.
    pub fn new() -> Self {
        B3Propagator { _private: () }
    }

    fn extract_sampled(&self, extractor: &dyn Extractor) -> TraceFlags {
        // A debug flag implies sampling.
        if extractor.get(B3_FLAGS_HEADER).map(str::trim) == Some("1") {
            return TraceFlags::SAMPLED;
        }
        match extractor.get(B3_SAMPLED_HEADER).map(str::trim) {
            Some("1") | Some("true") | Some("d") => TraceFlags::SAMPLED,
            _ => TraceFlags::NOT_SAMPLED,
        }
    }
}

impl TextMapPropagator for B3Propagator {
    fn inject_context(&self, cx: &SpanContext, injector: &mut dyn Injector) {
        if !cx.is_valid() {
            return;
        }
        injector.set(B3_TRACE_ID_HEADER, cx.trace_id().to_string());
        injector.set(B3_SPAN_ID_HEADER, cx.span_id().to_string());
        let sampled = if cx.is_sampled() { "1" } else { "0" };
        injector.set(B3_SAMPLED_HEADER, sampled.to_string());
    }

    fn extract_context(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        let trace_id_hex = extractor.get(B3_TRACE_ID_HEADER)?.trim();
        if trace_id_hex.len() != 16 && trace_id_hex.len() != 32 {
            return None;
        }
        let trace_id = TraceId::from_hex(trace_id_hex).ok()?;
        let span_id = SpanId::from_hex(extractor.get(B3_SPAN_ID_HEADER)?.trim()).ok()?;

        let cx = SpanContext::new(trace_id, span_id, self.extract_sampled(extractor), true);
        cx.is_valid().then_some(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn carrier(entries: &[(&str, &str)]) -> HashMap<String, String> {
        let mut carrier = HashMap::new();
        for (k, v) in entries {
            Injector::set(&mut carrier, k, v.to_string());
        }
        carrier
    }

    #[test]
    fn extract_multi_header() {
        let propagator = B3Propagator::new();

        let cx = propagator
            .extract_context(&carrier(&[
                (B3_TRACE_ID_HEADER, "4bf92f3577b34da6a3ce929d0e0e4736"),
                (B3_SPAN_ID_HEADER, "00f067aa0ba902b7"),
                (B3_SAMPLED_HEADER, "1"),
            ]))
            .unwrap();
        assert!(cx.is_sampled());
        assert!(cx.is_remote());

        // 64-bit trace ids are accepted
        let cx = propagator
            .extract_context(&carrier(&[
                (B3_TRACE_ID_HEADER, "a3ce929d0e0e4736"),
                (B3_SPAN_ID_HEADER, "00f067aa0ba902b7"),
                (B3_SAMPLED_HEADER, "0"),
            ]))
            .unwrap();
        assert!(!cx.is_sampled());

        // debug flag implies sampled
        let cx = propagator
            .extract_context(&carrier(&[
                (B3_TRACE_ID_HEADER, "a3ce929d0e0e4736"),
                (B3_SPAN_ID_HEADER, "00f067aa0ba902b7"),
                (B3_FLAGS_HEADER, "1"),
            ]))
            .unwrap();
        assert!(cx.is_sampled());
    }

    #[test]
    fn extract_rejects_invalid() {
        let propagator = B3Propagator::new();
        assert!(propagator.extract_context(&carrier(&[])).is_none());
        assert!(propagator
            .extract_context(&carrier(&[
                (B3_TRACE_ID_HEADER, "not-hex-at-all-no"),
                (B3_SPAN_ID_HEADER, "00f067aa0ba902b7"),
            ]))
            .is_none());
        assert!(propagator
            .extract_context(&carrier(&[
                (B3_TRACE_ID_HEADER, "0000000000000000"),
                (B3_SPAN_ID_HEADER, "00f067aa0ba902b7"),
            ]))
            .is_none());
    }

    #[test]
    fn inject_round_trip() {
        let propagator = B3Propagator::new();
        let cx = SpanContext::new(
            TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736),
            SpanId::from(0x00f0_67aa_0ba9_02b7),
            TraceFlags::SAMPLED,
            false,
        );
        let mut carrier = HashMap::new();
        propagator.inject_context(&cx, &mut carrier);
        let extracted = propagator.extract_context(&carrier).unwrap();
        assert_eq!(extracted.trace_id(), cx.trace_id());
        assert_eq!(extracted.span_id(), cx.span_id());
        assert!(extracted.is_sampled());
    }
}
