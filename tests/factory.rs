//! Layered tracer configuration resolution and install lifecycle.
//!
//! The factory cache, the constructed-tracer list and the global tracer are
//! process globals, so every test takes the `SERIAL` guard. Environment
//! manipulation goes through `temp_env`, which restores prior values.
use autotrace::config::ConfigNamespace;
use autotrace::global;
use autotrace::propagation::PropagationFormat;
use autotrace::sdk::Sampler;
use autotrace::testing::TestExporter;
use autotrace::{pipeline, shutdown};
use std::sync::{Arc, Mutex};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

const ALL_FACTORY_VARS: &[&str] = &[
    "AUTOTRACE_SERVICE_NAME",
    "AUTOTRACE_ENDPOINT_URL",
    "AUTOTRACE_ACCESS_TOKEN",
    "AUTOTRACE_SAMPLER_TYPE",
    "AUTOTRACE_SAMPLER_PARAM",
    "AUTOTRACE_PROPAGATION",
];

fn with_clean_env<F: Fn()>(overrides: &[(&str, &str)], f: F) {
    let vars: Vec<(&str, Option<&str>)> = ALL_FACTORY_VARS
        .iter()
        .map(|name| {
            let value = overrides
                .iter()
                .find(|(var, _)| var == name)
                .map(|(_, value)| *value);
            (*name, value)
        })
        .collect();
    temp_env::with_vars(vars, f);
}

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let _guard = serial();
    with_clean_env(&[], || {
        let tracer = pipeline()
            .with_set_global(false)
            .allow_multiple()
            .install()
            .unwrap();
        let settings = tracer.settings();
        assert_eq!(settings.service_name, "unnamed-rust-service");
        assert_eq!(settings.endpoint, "http://localhost:9080/v1/trace");
        assert_eq!(settings.access_token, None);
        assert_eq!(settings.sampler, Sampler::Const(1));
        assert_eq!(settings.propagation, PropagationFormat::B3);
    });
}

#[test]
fn environment_fills_unpinned_fields() {
    let _guard = serial();
    with_clean_env(
        &[
            ("AUTOTRACE_SERVICE_NAME", "env-service"),
            ("AUTOTRACE_ENDPOINT_URL", "http://collector:9080/v1/trace"),
            ("AUTOTRACE_ACCESS_TOKEN", "env-token"),
            ("AUTOTRACE_SAMPLER_TYPE", "probabilistic"),
            ("AUTOTRACE_SAMPLER_PARAM", "0.25"),
            ("AUTOTRACE_PROPAGATION", "tracecontext"),
        ],
        || {
            let tracer = pipeline()
                .with_set_global(false)
                .allow_multiple()
                .install()
                .unwrap();
            let settings = tracer.settings();
            assert_eq!(settings.service_name, "env-service");
            assert_eq!(settings.endpoint, "http://collector:9080/v1/trace");
            assert_eq!(settings.access_token.as_deref(), Some("env-token"));
            assert_eq!(settings.sampler, Sampler::Probabilistic(0.25));
            assert_eq!(settings.propagation, PropagationFormat::TraceContext);
        },
    );
}

#[test]
fn arguments_beat_config_entries_beat_environment() {
    let _guard = serial();
    with_clean_env(
        &[
            ("AUTOTRACE_SERVICE_NAME", "env-service"),
            ("AUTOTRACE_ENDPOINT_URL", "http://env:9080/v1/trace"),
            ("AUTOTRACE_SAMPLER_TYPE", "probabilistic"),
            ("AUTOTRACE_SAMPLER_PARAM", "0.25"),
        ],
        || {
            let config = ConfigNamespace::with_defaults([
                ("service_name", "config-service"),
                ("endpoint_url", "http://config:9080/v1/trace"),
                ("sampler_type", "ratelimiting"),
                ("sampler_param", "50"),
            ]);
            let tracer = pipeline()
                .with_service_name("arg-service")
                .with_config(&config)
                .with_set_global(false)
                .allow_multiple()
                .install()
                .unwrap();
            let settings = tracer.settings();
            // Argument over config entry; config entry over environment.
            assert_eq!(settings.service_name, "arg-service");
            assert_eq!(settings.endpoint, "http://config:9080/v1/trace");
            assert_eq!(settings.sampler, Sampler::RateLimiting(50.0));
        },
    );
}

#[test]
fn empty_environment_values_are_honored_literally() {
    let _guard = serial();
    with_clean_env(
        &[
            ("AUTOTRACE_SERVICE_NAME", ""),
            ("AUTOTRACE_ACCESS_TOKEN", ""),
        ],
        || {
            let tracer = pipeline()
                .with_set_global(false)
                .allow_multiple()
                .install()
                .unwrap();
            let settings = tracer.settings();
            assert_eq!(settings.service_name, "");
            assert_eq!(settings.access_token.as_deref(), Some(""));
        },
    );
}

#[test]
fn unparseable_environment_falls_back_to_defaults() {
    let _guard = serial();
    with_clean_env(
        &[
            ("AUTOTRACE_SAMPLER_TYPE", "adaptive"),
            ("AUTOTRACE_PROPAGATION", "jaeger"),
        ],
        || {
            let tracer = pipeline()
                .with_set_global(false)
                .allow_multiple()
                .install()
                .unwrap();
            let settings = tracer.settings();
            assert_eq!(settings.sampler, Sampler::Const(1));
            assert_eq!(settings.propagation, PropagationFormat::B3);
        },
    );
}

#[test]
fn const_sampler_param_is_an_integer() {
    let _guard = serial();
    with_clean_env(
        &[
            ("AUTOTRACE_SAMPLER_TYPE", "const"),
            ("AUTOTRACE_SAMPLER_PARAM", "0.5"),
        ],
        || {
            let tracer = pipeline()
                .with_set_global(false)
                .allow_multiple()
                .install()
                .unwrap();
            assert_eq!(tracer.settings().sampler, Sampler::Const(1));
        },
    );
}

#[test]
fn install_memoizes_mounts_globally_and_shutdown_unmounts() {
    let _guard = serial();
    with_clean_env(&[], || {
        shutdown();
        let (exporter, spans) = TestExporter::new();
        let first = pipeline()
            .with_service_name("lifecycle")
            .with_exporter(Box::new(exporter))
            .install()
            .unwrap();

        // Mounted globally: ambient span creation reaches our exporter.
        drop(global::tracer().start("ambient"));
        assert_eq!(spans.try_iter().count(), 1);

        // Later installs reuse the first tracer, whatever they ask for.
        let second = pipeline().with_service_name("ignored").install().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.settings().service_name, "lifecycle");

        shutdown();
        drop(global::tracer().start("after-shutdown"));
        assert_eq!(spans.try_iter().count(), 0);

        // The cache is empty again; a fresh install constructs a new tracer.
        let third = pipeline().with_set_global(false).install().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        shutdown();
    });
}
