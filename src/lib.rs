//! Automatic tracing instrumentation for common Rust libraries.
//!
//! `autotrace` manages the lifecycle of tracing instrumentation: it keeps a
//! registry of per-library adapters, installs and reverts their interceptors
//! on demand, and builds the tracer those interceptors report spans to.
//!
//! The typical application does two things at startup:
//!
//! ```
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build a tracer from layered configuration (arguments, config
//!     // entries, environment, defaults) and mount it globally.
//!     autotrace::pipeline()
//!         .with_service_name("checkout")
//!         .install()?;
//!
//!     // Instrument every available library that supports it.
//!     autotrace::auto_instrument(None)?;
//!
//!     // ... run the application ...
//!
//!     autotrace::shutdown();
//!     Ok(())
//! }
//! ```
//!
//! Individual libraries can be instrumented, reconfigured and reverted at
//! any point through [`instrument`], [`uninstrument`], and each adapter's
//! [`ConfigNamespace`]. Instrumentation honors environment gates:
//! `AUTOTRACE_ENABLED` disables everything, `AUTOTRACE_<LIBRARY>_ENABLED`
//! disables one library.
//!
//! # Crate layout
//!
//! - [`trace`]: the tracer/span API surface instrumentations are written
//!   against, including the [`NoopTracer`](trace::NoopTracer).
//! - [`sdk`]: the concrete sampled-and-exported tracer the factory builds.
//! - [`propagation`]: B3 and W3C trace-context carrier formats.
//! - [`global`]: the process-wide tracer and the rebindable
//!   [`TracerProxy`](global::TracerProxy).
//! - [`instrument`]: the adapter registry, dispatcher, and the
//!   [`hook`](instrument::hook) interception primitive.
//! - [`factory`]: the [`pipeline`] builder and [`shutdown`].
//! - [`config`]: per-library [`ConfigNamespace`] tunables.
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;

pub mod config;
pub mod factory;
pub mod global;
pub mod instrument;
pub mod propagation;
pub mod sdk;
pub mod testing;
pub mod trace;

pub use common::{Key, KeyValue, Value};
pub use config::ConfigNamespace;
pub use factory::{pipeline, shutdown, TracerPipeline};
pub use instrument::{
    auto_instrument, instrument, instrument_by_name, uninstrument, Instrumentor, Library,
};
