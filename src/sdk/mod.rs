//! Concrete tracer implementation installed by the factory pipeline.
//!
//! The SDK decides which spans are recorded (through [`Sampler`]s) and hands
//! finished spans to a [`SpanExporter`]. The network transport itself stays
//! out of scope behind the exporter seam.
//!
//! [`SpanExporter`]: crate::sdk::export::SpanExporter
pub mod export;
pub mod sampler;
pub mod tracer;

pub use sampler::{Sampler, ShouldSample};
pub use tracer::{SdkSpan, SdkTracer, TracerSettings};
