//! Context propagation interface.
//!
//! Propagators read and write span context to the carriers exchanged between
//! applications (HTTP headers, message metadata). Instrumentations use
//! [`Injector`] and [`Extractor`] so each adapted library can expose whatever
//! carrier shape it natively has.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::trace::SpanContext;

pub mod b3;
pub mod trace_context;

pub use b3::B3Propagator;
pub use trace_context::TraceContextPropagator;

/// Injector provides an interface for adding fields to an underlying
/// carrier like a header map.
pub trait Injector {
    /// Add a key and value to the underlying data.
    fn set(&mut self, key: &str, value: String);
}

/// Extractor provides an interface for reading fields from an underlying
/// carrier like a header map.
pub trait Extractor {
    /// Get a value for a key from the underlying data.
    fn get(&self, key: &str) -> Option<&str>;

    /// Collect all the keys from the underlying data.
    fn keys(&self) -> Vec<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    /// Set a key and value in the HashMap.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    /// Get a value for a key from the HashMap.
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    /// Collect all the keys from the HashMap.
    fn keys(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect()
    }
}

/// Methods to inject and extract a span context as string key/value pairs.
pub trait TextMapPropagator: fmt::Debug + Send + Sync {
    /// Properly encode the context into the carrier.
    fn inject_context(&self, cx: &SpanContext, injector: &mut dyn Injector);

    /// Retrieve a valid remote context from the carrier, if one is encoded.
    fn extract_context(&self, extractor: &dyn Extractor) -> Option<SpanContext>;
}

/// The supported wire formats for span context propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagationFormat {
    /// Zipkin B3 multi-header format.
    B3,
    /// W3C `traceparent` format.
    TraceContext,
}

impl PropagationFormat {
    /// Construct the propagator implementing this format.
    pub fn propagator(&self) -> Box<dyn TextMapPropagator> {
        match self {
            PropagationFormat::B3 => Box::new(B3Propagator::new()),
            PropagationFormat::TraceContext => Box::new(TraceContextPropagator::new()),
        }
    }
}

impl FromStr for PropagationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "b3" => Ok(PropagationFormat::B3),
            "tracecontext" | "w3c" => Ok(PropagationFormat::TraceContext),
            other => Err(format!("unrecognized propagation format '{}'", other)),
        }
    }
}

impl fmt::Display for PropagationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationFormat::B3 => f.write_str("b3"),
            PropagationFormat::TraceContext => f.write_str("tracecontext"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_carrier() {
        let mut carrier = HashMap::new();
        Injector::set(&mut carrier, "X-B3-TraceId", "0af7651916cd43dd".to_string());
        assert_eq!(
            Extractor::get(&carrier, "x-b3-traceid"),
            Some("0af7651916cd43dd")
        );
        assert_eq!(Extractor::keys(&carrier), vec!["x-b3-traceid"]);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("b3".parse::<PropagationFormat>().unwrap(), PropagationFormat::B3);
        assert_eq!(
            "TraceContext".parse::<PropagationFormat>().unwrap(),
            PropagationFormat::TraceContext
        );
        assert_eq!(
            "w3c".parse::<PropagationFormat>().unwrap(),
            PropagationFormat::TraceContext
        );
        assert!("jaeger".parse::<PropagationFormat>().is_err());
    }
}
