//! The tracer factory pipeline.
//!
//! [`pipeline`] builds an [`SdkTracer`] from layered configuration: explicit
//! builder arguments win over config namespace entries, which win over
//! environment variables, which win over built-in defaults. Each field is
//! resolved independently, so a deployment can pin the endpoint in code while
//! the service name still comes from the environment.
//!
//! Installation is memoized: repeated [`install`](TracerPipeline::install)
//! calls hand back the tracer constructed first, unless
//! [`allow_multiple`](TracerPipeline::allow_multiple) opts out.
use crate::config::ConfigNamespace;
use crate::global;
use crate::propagation::PropagationFormat;
use crate::sdk::export::{NoopSpanExporter, SpanExporter};
use crate::sdk::{Sampler, SdkTracer, TracerSettings};
use crate::trace::{TraceResult, Tracer};
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::env;
use std::sync::{Arc, Mutex, RwLock};

/// Service name reported on spans.
pub const ENV_SERVICE_NAME: &str = "AUTOTRACE_SERVICE_NAME";
/// Ingestion endpoint URL.
pub const ENV_ENDPOINT_URL: &str = "AUTOTRACE_ENDPOINT_URL";
/// Access credential forwarded to the transport layer.
pub const ENV_ACCESS_TOKEN: &str = "AUTOTRACE_ACCESS_TOKEN";
/// Sampler family: `const`, `probabilistic`, `ratelimiting` or `lowerbound`.
pub const ENV_SAMPLER_TYPE: &str = "AUTOTRACE_SAMPLER_TYPE";
/// Sampler parameter; an integer for `const`, a float otherwise.
pub const ENV_SAMPLER_PARAM: &str = "AUTOTRACE_SAMPLER_PARAM";
/// Context propagation wire format: `b3` or `tracecontext`.
pub const ENV_PROPAGATION: &str = "AUTOTRACE_PROPAGATION";

/// Service name used when nothing else names the service.
pub const DEFAULT_SERVICE_NAME: &str = "unnamed-rust-service";
/// Ingestion endpoint used when none is configured.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:9080/v1/trace";

static INSTALLED_TRACER: Lazy<RwLock<Option<Arc<SdkTracer>>>> = Lazy::new(|| RwLock::new(None));

/// Every tracer the factory has constructed, for [`shutdown`] to close.
static CONSTRUCTED: Lazy<Mutex<Vec<Arc<SdkTracer>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Create a pipeline with no fields pinned; everything resolves from the
/// environment or defaults at [`install`](TracerPipeline::install) time.
pub fn pipeline() -> TracerPipeline {
    TracerPipeline::default()
}

/// Config namespace entries the pipeline understands.
#[derive(Debug, Default)]
struct ConfigLayer {
    service_name: Option<String>,
    endpoint: Option<String>,
    access_token: Option<String>,
    sampler_type: Option<String>,
    sampler_param: Option<String>,
    propagation: Option<String>,
}

/// Builder for an [`SdkTracer`], resolved field by field at install time.
#[derive(Debug, Default)]
pub struct TracerPipeline {
    service_name: Option<String>,
    endpoint: Option<String>,
    access_token: Option<String>,
    sampler: Option<Sampler>,
    propagation: Option<PropagationFormat>,
    config: ConfigLayer,
    exporter: Option<Box<dyn SpanExporter>>,
    set_global: Option<bool>,
    allow_multiple: bool,
}

impl TracerPipeline {
    /// Pin the service name.
    pub fn with_service_name<T: Into<String>>(mut self, service_name: T) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Pin the ingestion endpoint URL.
    pub fn with_endpoint<T: Into<String>>(mut self, endpoint: T) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Pin the access credential.
    pub fn with_access_token<T: Into<String>>(mut self, token: T) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Pin the sampler, bypassing `sampler_type`/`sampler_param` resolution.
    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Pin the propagation wire format.
    pub fn with_propagation(mut self, propagation: PropagationFormat) -> Self {
        self.propagation = Some(propagation);
        self
    }

    /// Layer in a config namespace.
    ///
    /// The recognized entries (`service_name`, `endpoint_url`, `access_token`,
    /// `sampler_type`, `sampler_param`, `propagation`) are read once, here;
    /// later edits to the namespace do not reach an installed tracer.
    pub fn with_config(mut self, config: &ConfigNamespace) -> Self {
        self.config = ConfigLayer {
            service_name: config.get_str("service_name"),
            endpoint: config.get_str("endpoint_url"),
            access_token: config.get_str("access_token"),
            sampler_type: config.get_str("sampler_type"),
            sampler_param: config.get_str("sampler_param"),
            propagation: config.get_str("propagation"),
        };
        self
    }

    /// Supply the span exporter. Defaults to a no-op exporter; the wire
    /// transport lives in a separate crate and plugs in here.
    pub fn with_exporter(mut self, exporter: Box<dyn SpanExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Whether installing mounts the tracer globally. Defaults to `true`.
    pub fn with_set_global(mut self, set_global: bool) -> Self {
        self.set_global = Some(set_global);
        self
    }

    /// Opt out of memoization: construct a fresh tracer even when one is
    /// already installed, and make it the one future memoized installs see.
    pub fn allow_multiple(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    fn resolve_field(
        arg: Option<String>,
        config: Option<String>,
        env_name: &str,
        default: &str,
    ) -> String {
        // An environment variable that is set but empty is honored as the
        // empty string, matching the other deployment surfaces.
        arg.or(config)
            .or_else(|| env::var(env_name).ok())
            .unwrap_or_else(|| default.to_string())
    }

    fn resolve_sampler(&mut self) -> Sampler {
        if let Some(sampler) = self.sampler.take() {
            return sampler;
        }
        let sampler_type = Self::resolve_field(
            None,
            self.config.sampler_type.take(),
            ENV_SAMPLER_TYPE,
            "const",
        );
        let sampler_param = Self::resolve_field(
            None,
            self.config.sampler_param.take(),
            ENV_SAMPLER_PARAM,
            "1",
        );
        match Sampler::from_type_and_param(&sampler_type, &sampler_param) {
            Ok(sampler) => sampler,
            Err(message) => {
                warn!("{}, falling back to the default sampler", message);
                Sampler::default()
            }
        }
    }

    fn resolve_propagation(&mut self) -> PropagationFormat {
        if let Some(propagation) = self.propagation.take() {
            return propagation;
        }
        let format = Self::resolve_field(None, self.config.propagation.take(), ENV_PROPAGATION, "b3");
        format.parse().unwrap_or_else(|message: String| {
            warn!("{}, falling back to b3 propagation", message);
            PropagationFormat::B3
        })
    }

    /// Resolve every field against config, environment and defaults.
    fn resolve_settings(&mut self) -> TracerSettings {
        let access_token = self
            .access_token
            .take()
            .or_else(|| self.config.access_token.take())
            .or_else(|| env::var(ENV_ACCESS_TOKEN).ok());
        if access_token.is_none() {
            // Agent-routed deployments do not need one; ingest-direct ones do
            // and will see transport-level auth failures.
            debug!("no access token configured");
        }
        TracerSettings {
            service_name: Self::resolve_field(
                self.service_name.take(),
                self.config.service_name.take(),
                ENV_SERVICE_NAME,
                DEFAULT_SERVICE_NAME,
            ),
            endpoint: Self::resolve_field(
                self.endpoint.take(),
                self.config.endpoint.take(),
                ENV_ENDPOINT_URL,
                DEFAULT_ENDPOINT_URL,
            ),
            access_token,
            sampler: self.resolve_sampler(),
            propagation: self.resolve_propagation(),
        }
    }

    /// Resolve the configuration and install the tracer.
    ///
    /// When a tracer is already installed and [`allow_multiple`] was not
    /// requested, that tracer is returned and this pipeline's configuration
    /// is ignored. The returned handle coerces to a
    /// [`TracerHandle`](crate::trace::TracerHandle); [`settings`] on it
    /// exposes the resolved configuration.
    ///
    /// [`allow_multiple`]: TracerPipeline::allow_multiple
    /// [`settings`]: SdkTracer::settings
    pub fn install(mut self) -> TraceResult<Arc<SdkTracer>> {
        if !self.allow_multiple {
            let installed = INSTALLED_TRACER
                .read()
                .expect("INSTALLED_TRACER RwLock poisoned")
                .clone();
            if let Some(tracer) = installed {
                debug!("a tracer is already installed, reusing it");
                return Ok(tracer);
            }
        }

        let settings = self.resolve_settings();
        debug!("installing tracer: {:?}", settings);
        let exporter = self
            .exporter
            .take()
            .unwrap_or_else(|| Box::new(NoopSpanExporter::new()));
        let tracer = Arc::new(SdkTracer::new(settings, exporter));

        *INSTALLED_TRACER
            .write()
            .expect("INSTALLED_TRACER RwLock poisoned") = Some(tracer.clone());
        CONSTRUCTED
            .lock()
            .expect("CONSTRUCTED Mutex poisoned")
            .push(tracer.clone());
        if self.set_global.unwrap_or(true) {
            global::set_tracer(tracer.clone());
        }
        Ok(tracer)
    }
}

/// Flush and close every tracer the factory constructed, and unmount the
/// global tracer.
///
/// There is no process-exit hook here; applications call this once during
/// orderly shutdown. Idempotent: tracers already closed stay closed.
pub fn shutdown() {
    let constructed = std::mem::take(
        &mut *CONSTRUCTED.lock().expect("CONSTRUCTED Mutex poisoned"),
    );
    for tracer in constructed {
        if let Err(err) = tracer.close() {
            warn!("tracer close failed during shutdown: {}", err);
        }
    }
    *INSTALLED_TRACER
        .write()
        .expect("INSTALLED_TRACER RwLock poisoned") = None;
    global::reset_tracer();
}
