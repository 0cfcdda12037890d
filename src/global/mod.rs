//! Utilities for working with the process-wide tracer.
//!
//! The global API gives instrumentations access to the configured tracer from
//! anywhere in the codebase, without threading a handle through every call
//! site. Adapters resolve it lazily: interceptors that were installed before
//! any tracer existed pick up whatever is configured by the time the first
//! intercepted call runs.
//!
//! ## Usage in applications
//!
//! ```
//! use autotrace::global;
//!
//! fn init_tracing() {
//!     let tracer = autotrace::pipeline()
//!         .with_service_name("my-service")
//!         .install()
//!         .expect("tracer install");
//!     // pipeline().install() already sets the global by default; an
//!     // explicit handle can also be mounted directly:
//!     let _previous = global::set_tracer(tracer);
//! }
//!
//! fn do_something_traced() {
//!     let mut span = global::tracer().start("doing_work");
//!     // ...
//!     span.end();
//! }
//! ```
//!
//! ## Pre-fork worker processes
//!
//! Where interceptors must be installed before a real tracer can exist (for
//! example a primary process that forks workers, each of which builds its own
//! tracer), mount a [`TracerProxy`] globally first and rebind it inside each
//! worker with [`TracerProxy::set_tracer`]. Handles already held by callers
//! keep working; they forward to the new target on the next call.
use crate::propagation::{Extractor, Injector};
use crate::trace::{NoopTracer, Span, SpanBuilder, SpanContext, TraceResult, Tracer, TracerHandle};
use once_cell::sync::Lazy;
use std::fmt;
use std::mem;
use std::sync::{Arc, RwLock};

/// The ambient tracer singleton. A no-op tracer until one is configured.
static GLOBAL_TRACER: Lazy<RwLock<TracerHandle>> =
    Lazy::new(|| RwLock::new(Arc::new(NoopTracer::new())));

/// Returns the currently configured global tracer.
///
/// A [`NoopTracer`] is returned if none has been set.
pub fn tracer() -> TracerHandle {
    GLOBAL_TRACER
        .read()
        .expect("GLOBAL_TRACER RwLock poisoned")
        .clone()
}

/// Sets the given tracer as the current global tracer.
///
/// Returns the tracer that was previously mounted.
pub fn set_tracer(new_tracer: TracerHandle) -> TracerHandle {
    let mut global_tracer = GLOBAL_TRACER
        .write()
        .expect("GLOBAL_TRACER RwLock poisoned");
    mem::replace(&mut *global_tracer, new_tracer)
}

/// Replaces the global tracer with a no-op.
///
/// Used at shutdown and by test harnesses for isolation.
pub fn reset_tracer() -> TracerHandle {
    set_tracer(Arc::new(NoopTracer::new()))
}

/// A forwarding tracer handle whose target can be swapped at runtime.
///
/// All capability methods forward to the *current* target at call time, not
/// the target bound at construction, so a proxy can be handed to adapters
/// before a concrete tracer exists and rebound later without invalidating
/// handles already given out.
pub struct TracerProxy {
    target: RwLock<TracerHandle>,
}

impl TracerProxy {
    /// Create a proxy bound to the current ambient global tracer.
    pub fn new() -> Self {
        TracerProxy::with_tracer(tracer())
    }

    /// Create a proxy bound to the given tracer.
    pub fn with_tracer(target: TracerHandle) -> Self {
        TracerProxy {
            target: RwLock::new(target),
        }
    }

    /// Atomically rebind the forwarding target, returning the previous one.
    pub fn set_tracer(&self, new_target: TracerHandle) -> TracerHandle {
        let mut target = self.target.write().expect("TracerProxy RwLock poisoned");
        mem::replace(&mut *target, new_target)
    }

    fn target(&self) -> TracerHandle {
        self.target
            .read()
            .expect("TracerProxy RwLock poisoned")
            .clone()
    }
}

impl Default for TracerProxy {
    fn default() -> Self {
        TracerProxy::new()
    }
}

impl fmt::Debug for TracerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TracerProxy")
    }
}

impl Tracer for TracerProxy {
    fn build_span(&self, builder: SpanBuilder) -> Box<dyn Span> {
        self.target().build_span(builder)
    }

    fn inject(&self, cx: &SpanContext, carrier: &mut dyn Injector) {
        self.target().inject(cx, carrier)
    }

    fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        self.target().extract(carrier)
    }

    fn flush(&self) -> TraceResult<()> {
        self.target().flush()
    }

    fn close(&self) -> TraceResult<()> {
        self.target().close()
    }
}
