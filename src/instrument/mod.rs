//! The instrumentation dispatcher.
//!
//! Tracks which libraries are instrumentable, which are present, and which
//! are currently instrumented, and routes `instrument`/`uninstrument`
//! requests to the registered per-library adapters. Adapters are external to
//! this crate; they register themselves at startup through
//! [`register_instrumentor`], replacing the dynamic by-name module discovery
//! the equivalent dynamic-language systems use.
//!
//! Setup calls here are expected to run once during single-threaded process
//! startup, strictly before the instrumented libraries begin serving
//! traffic. Do not call `instrument`/`uninstrument` concurrently from
//! multiple threads.
use crate::global;
use crate::trace::{TraceResult, TracerHandle};
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

pub mod hook;

/// Global switch consulted before any instrumentation is applied.
pub const ENV_TRACING_ENABLED: &str = "AUTOTRACE_ENABLED";

/// The fixed catalogue of instrumentable libraries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Library {
    /// The actix-web HTTP server framework.
    ActixWeb,
    /// The hyper HTTP client/server.
    Hyper,
    /// The reqwest HTTP client.
    Reqwest,
    /// The postgres database driver.
    Postgres,
    /// The mysql database driver.
    MySql,
    /// The mongodb database driver.
    MongoDb,
    /// The redis client.
    Redis,
    /// The rdkafka producer/consumer.
    Kafka,
    /// The tonic gRPC stack.
    Tonic,
}

/// Every library the dispatcher accepts.
pub const TRACEABLE_LIBRARIES: &[Library] = &[
    Library::ActixWeb,
    Library::Hyper,
    Library::Reqwest,
    Library::Postgres,
    Library::MySql,
    Library::MongoDb,
    Library::Redis,
    Library::Kafka,
    Library::Tonic,
];

/// The subset instrumented by [`auto_instrument`].
///
/// actix-web needs app-level wiring and so requires explicit opt-in.
pub const AUTO_INSTRUMENTABLE_LIBRARIES: &[Library] = &[
    Library::Hyper,
    Library::Reqwest,
    Library::Postgres,
    Library::MySql,
    Library::MongoDb,
    Library::Redis,
    Library::Kafka,
    Library::Tonic,
];

impl Library {
    /// The canonical (crate) name of the library.
    pub fn name(&self) -> &'static str {
        match self {
            Library::ActixWeb => "actix-web",
            Library::Hyper => "hyper",
            Library::Reqwest => "reqwest",
            Library::Postgres => "postgres",
            Library::MySql => "mysql",
            Library::MongoDb => "mongodb",
            Library::Redis => "redis",
            Library::Kafka => "kafka",
            Library::Tonic => "tonic",
        }
    }

    /// Parse a library name. Hyphens/underscores and case are ignored.
    pub fn from_name(name: &str) -> Option<Library> {
        let normalized = name.trim().to_lowercase().replace(['-', '_'], "");
        TRACEABLE_LIBRARIES
            .iter()
            .copied()
            .find(|library| library.name().replace('-', "") == normalized)
    }

    /// The per-library enable gate, e.g. `AUTOTRACE_REDIS_ENABLED`.
    pub fn env_gate(&self) -> String {
        format!(
            "AUTOTRACE_{}_ENABLED",
            self.name().to_uppercase().replace('-', "_")
        )
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A per-library instrumentation adapter.
///
/// Adapters own the knowledge of *which* entry points of their library to
/// intercept and which span tags to attach; the dispatcher owns lifecycle,
/// consulting and updating the instrumented markers around each call so
/// instrument/uninstrument stay idempotent.
pub trait Instrumentor: Send + Sync {
    /// Whether the adapted library is present in this process.
    fn is_available(&self) -> bool {
        true
    }

    /// Install interceptors, resolving tunables from the adapter's config
    /// namespace at call time. `tracer` is the explicit handle given to the
    /// dispatcher, if any; adapters fall back to their config namespace
    /// override and then the ambient global tracer. Errors propagate to the
    /// dispatcher caller unmodified: an adapter that cannot instrument its
    /// library indicates a version mismatch the operator must fix.
    fn instrument(&self, tracer: Option<TracerHandle>) -> TraceResult<()>;

    /// Remove previously installed interceptors. Must be a no-op when the
    /// library is not instrumented.
    fn uninstrument(&self);
}

static REGISTRY: Lazy<RwLock<HashMap<Library, Arc<dyn Instrumentor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static INSTRUMENTED: Lazy<Mutex<HashSet<Library>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Register the adapter for a library, replacing (and returning) any
/// previous registration.
pub fn register_instrumentor(
    library: Library,
    instrumentor: Arc<dyn Instrumentor>,
) -> Option<Arc<dyn Instrumentor>> {
    REGISTRY
        .write()
        .expect("REGISTRY RwLock poisoned")
        .insert(library, instrumentor)
}

/// Remove a library's adapter registration, returning it if present.
pub fn deregister_instrumentor(library: Library) -> Option<Arc<dyn Instrumentor>> {
    REGISTRY
        .write()
        .expect("REGISTRY RwLock poisoned")
        .remove(&library)
}

fn instrumentor(library: Library) -> Option<Arc<dyn Instrumentor>> {
    REGISTRY
        .read()
        .expect("REGISTRY RwLock poisoned")
        .get(&library)
        .cloned()
}

/// Whether an adapter is registered for `library` and reports its target
/// present in this process.
pub fn is_available(library: Library) -> bool {
    instrumentor(library).map_or(false, |adapter| adapter.is_available())
}

/// Whether `library` is currently instrumented.
pub fn is_instrumented(library: Library) -> bool {
    INSTRUMENTED
        .lock()
        .expect("INSTRUMENTED Mutex poisoned")
        .contains(&library)
}

/// Mark `library` instrumented. The dispatcher sets this after a successful
/// adapter instrument; adapters driving hook slots directly may consult it.
pub fn mark_instrumented(library: Library) {
    INSTRUMENTED
        .lock()
        .expect("INSTRUMENTED Mutex poisoned")
        .insert(library);
}

/// Clear the instrumented marker. A no-op when absent.
pub fn mark_uninstrumented(library: Library) {
    INSTRUMENTED
        .lock()
        .expect("INSTRUMENTED Mutex poisoned")
        .remove(&library);
}

/// Case-insensitive truthiness for environment values.
///
/// `0`, `f`, `false`, `n`, `no`, `off`, and the empty string are falsy;
/// everything else is truthy.
pub fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "" | "0" | "f" | "false" | "n" | "no" | "off"
    )
}

/// The process-wide tracing gate; enabled unless `AUTOTRACE_ENABLED` is set
/// falsy.
pub fn tracing_enabled() -> bool {
    env::var(ENV_TRACING_ENABLED).map_or(true, |value| is_truthy(&value))
}

fn library_enabled(library: Library) -> bool {
    env::var(library.env_gate()).map_or(true, |value| is_truthy(&value))
}

/// Resolve the tracer an adapter should report to: the explicit handle when
/// given, else the adapter's config namespace override, else the ambient
/// global tracer.
pub fn resolve_tracer(
    explicit: Option<TracerHandle>,
    config: &crate::config::ConfigNamespace,
) -> TracerHandle {
    explicit
        .or_else(|| config.tracer())
        .unwrap_or_else(global::tracer)
}

/// Instrument (or, for `false` flags, uninstrument) the given libraries.
///
/// Silent skip paths: the global gate or the library's own gate is off, the
/// library is already instrumented, or no adapter is registered (logged).
/// Adapter failures propagate to the caller: they surface packaging or
/// version mismatches that must fail loudly at startup.
pub fn instrument<I>(tracer: Option<TracerHandle>, libraries: I) -> TraceResult<()>
where
    I: IntoIterator<Item = (Library, bool)>,
{
    for (library, enable) in libraries {
        if !enable {
            uninstrument([library]);
            continue;
        }
        if !tracing_enabled() {
            debug!("tracing is disabled, not instrumenting {}", library);
            continue;
        }
        if !library_enabled(library) {
            debug!("{} instrumentation is disabled by its gate", library);
            continue;
        }
        match instrumentor(library) {
            None => warn!("no instrumentor registered for {}", library),
            Some(adapter) => {
                if is_instrumented(library) {
                    debug!("{} is already instrumented", library);
                    continue;
                }
                adapter.instrument(tracer.clone())?;
                mark_instrumented(library);
            }
        }
    }
    Ok(())
}

/// String entry point for [`instrument`]. Unknown library names are logged
/// and skipped, never raised.
pub fn instrument_by_name(
    tracer: Option<TracerHandle>,
    libraries: &[(&str, bool)],
) -> TraceResult<()> {
    let mut resolved = Vec::with_capacity(libraries.len());
    for (name, enable) in libraries {
        match Library::from_name(name) {
            Some(library) => resolved.push((library, *enable)),
            None => warn!("unable to instrument unknown library '{}'", name),
        }
    }
    instrument(tracer, resolved)
}

/// Uninstrument the given libraries.
///
/// Uninstrumenting a library that is not instrumented is a no-op, delegated
/// to the adapter's own marker check.
pub fn uninstrument<I>(libraries: I)
where
    I: IntoIterator<Item = Library>,
{
    for library in libraries {
        match instrumentor(library) {
            None => warn!("no instrumentor registered for {}", library),
            Some(adapter) => {
                if !is_instrumented(library) {
                    debug!("{} is not instrumented", library);
                    continue;
                }
                adapter.uninstrument();
                mark_uninstrumented(library);
            }
        }
    }
}

/// Instrument every available auto-instrumentable library.
///
/// Short-circuits entirely when the global gate is off. Absent libraries
/// are skipped with a debug log; they are an expected condition, not an
/// error.
pub fn auto_instrument(tracer: Option<TracerHandle>) -> TraceResult<()> {
    if !tracing_enabled() {
        debug!("tracing is disabled, skipping auto-instrumentation");
        return Ok(());
    }

    let (available, unavailable): (Vec<_>, Vec<_>) = AUTO_INSTRUMENTABLE_LIBRARIES
        .iter()
        .copied()
        .partition(|library| is_available(*library));
    for library in unavailable {
        debug!("unable to auto-instrument {} as it is unavailable", library);
    }
    instrument(tracer, available.into_iter().map(|library| (library, true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_names_round_trip() {
        for library in TRACEABLE_LIBRARIES {
            assert_eq!(Library::from_name(library.name()), Some(*library));
        }
        assert_eq!(Library::from_name("Actix_Web"), Some(Library::ActixWeb));
        assert_eq!(Library::from_name(" REDIS "), Some(Library::Redis));
        assert_eq!(Library::from_name("flask"), None);
    }

    #[test]
    fn auto_subset_excludes_opt_in_libraries() {
        assert!(!AUTO_INSTRUMENTABLE_LIBRARIES.contains(&Library::ActixWeb));
        for library in AUTO_INSTRUMENTABLE_LIBRARIES {
            assert!(TRACEABLE_LIBRARIES.contains(library));
        }
    }

    #[test]
    fn env_gate_names() {
        assert_eq!(Library::ActixWeb.env_gate(), "AUTOTRACE_ACTIX_WEB_ENABLED");
        assert_eq!(Library::Redis.env_gate(), "AUTOTRACE_REDIS_ENABLED");
    }

    #[test]
    fn truthy_tokens() {
        for falsy in ["0", "false", "F", "n", "NO", "off", "", " "] {
            assert!(!is_truthy(falsy), "'{}' should be falsy", falsy);
        }
        for truthy in ["1", "true", "yes", "on", "anything"] {
            assert!(is_truthy(truthy), "'{}' should be truthy", truthy);
        }
    }

    #[test]
    fn marker_lifecycle() {
        // Tonic is reserved for this test to avoid cross-test interference
        // on the process-global marker set.
        assert!(!is_instrumented(Library::Tonic));
        mark_instrumented(Library::Tonic);
        assert!(is_instrumented(Library::Tonic));
        mark_uninstrumented(Library::Tonic);
        assert!(!is_instrumented(Library::Tonic));
        mark_uninstrumented(Library::Tonic); // no-op when absent
        assert!(!is_instrumented(Library::Tonic));
    }

    #[test]
    fn unregistered_library_is_unavailable() {
        assert!(!is_available(Library::MySql));
    }
}
