//! Tracing API surface consumed by the instrumentation engine.
//!
//! The engine does not implement a wire protocol; it decides *when* spans are
//! created and with what parameters. The types here form the seam between the
//! engine and whatever backend ultimately receives the spans: an object-safe
//! [`Tracer`] capability set, the [`Span`] handle it yields, and the error
//! taxonomy for setup-time failures.
use thiserror::Error;

mod noop;
mod span_context;
mod tracer;

pub use self::{
    noop::{NoopSpan, NoopTracer},
    span_context::{SpanContext, SpanId, TraceFlags, TraceId},
    tracer::{Span, SpanBuilder, SpanKind, Tracer, TracerHandle},
};
use crate::sdk::export::ExportError;

/// Describe the result of operations in the tracing API.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by the trace API.
///
/// Only adapter and exporter failures surface as errors; "library absent",
/// "disabled by configuration", and repeated instrument/revert operations are
/// silent no-ops by design.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Export failed with the error returned by the exporter.
    #[error("Exporter {} failed with {0}", .0.exporter_name())]
    ExportFailed(Box<dyn ExportError>),

    /// Other errors propagated from instrumentation adapters.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl<T> From<T> for TraceError
where
    T: ExportError,
{
    fn from(err: T) -> Self {
        TraceError::ExportFailed(Box::new(err))
    }
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl From<&'static str> for TraceError {
    fn from(err_msg: &'static str) -> Self {
        TraceError::Other(err_msg.into())
    }
}

/// Span tag names attached by instrumentations.
///
/// The `error.*` family is applied by [`Span::record_error`]; the rest are
/// conventional names adapters share so backends can group spans uniformly.
pub mod tags {
    /// `true` on spans that represent a failed operation.
    pub const ERROR: &str = "error";

    /// The type or "kind" of an error, e.g. `"io"`, `"timeout"`.
    pub const ERROR_KIND: &str = "autotrace.error.kind";

    /// A concise, human-readable, one-line error message.
    pub const ERROR_MESSAGE: &str = "autotrace.error.message";

    /// The rendered error value itself (its `Debug` representation).
    pub const ERROR_OBJECT: &str = "autotrace.error.object";

    /// The chain of error sources, outermost first.
    pub const ERROR_STACK: &str = "autotrace.error.stack";

    /// Version of this crate that generated the span.
    pub const TRACING_VERSION: &str = "autotrace.tracing.version";

    /// Name of the instrumentation library that generated the span.
    pub const TRACING_LIBRARY: &str = "autotrace.tracing.library";

    /// Deployment environment of the traced service.
    pub const ENVIRONMENT: &str = "environment";

    /// The software component being instrumented, e.g. `"redis"`.
    pub const COMPONENT: &str = "component";

    /// A database statement for the given database type.
    pub const DB_STATEMENT: &str = "db.statement";

    /// The database type, e.g. `"sql"` or `"redis"`.
    pub const DB_TYPE: &str = "db.type";

    /// HTTP method of the request for the associated span.
    pub const HTTP_METHOD: &str = "http.method";

    /// HTTP response status code for the associated span.
    pub const HTTP_STATUS_CODE: &str = "http.status_code";

    /// URL of the request being handled.
    pub const HTTP_URL: &str = "http.url";

    /// Remote service name for peer-to-peer calls.
    pub const PEER_SERVICE: &str = "peer.service";
}
