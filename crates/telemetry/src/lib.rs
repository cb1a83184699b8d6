//! Optional distributed tracing.
//!
//! When `WKFLWS_TRACING_EXPORTERS` configures at least one exporter, this
//! module installs a global tracer provider and the W3C trace-context
//! propagator. Everything here degrades to a no-op when tracing is disabled,
//! so callers never need to branch on configuration: spans become no-op
//! spans, [`inject_context`] writes nothing, and [`current_trace_context`]
//! returns `None`.
//!
//! Trace context crosses process boundaries in two places: the
//! `Event.metadata` map on the broker, and the trailing positional argument
//! handed to task subprocesses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::{TraceContextExt, Tracer};
use opentelemetry::{Context, ContextGuard, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::debug;
use wkflws_util::settings::{ConfigurationError, Settings, TraceScheme};

static TRACING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether a tracer provider has been installed.
pub fn enabled() -> bool {
    TRACING_ENABLED.load(Ordering::Relaxed)
}

/// Initialize the tracer with any exporters configured.
///
/// Call once during startup. With no exporters configured this is a no-op
/// and tracing stays disabled. Safe to call more than once; later calls do
/// nothing.
pub fn initialize(settings: &Settings) -> Result<(), ConfigurationError> {
    if enabled() || settings.tracing_exporters.is_empty() {
        return Ok(());
    }

    let resource = Resource::builder()
        .with_service_name(settings.tracing_resource_name.clone())
        .build();
    let mut builder = SdkTracerProvider::builder().with_resource(resource);

    for exporter in &settings.tracing_exporters {
        let invalid = |reason: String| ConfigurationError::InvalidValue {
            name: "WKFLWS_TRACING_EXPORTERS".to_string(),
            value: exporter.host.clone(),
            reason,
        };

        builder = match exporter.scheme {
            TraceScheme::Console => builder.with_batch_exporter(opentelemetry_stdout::SpanExporter::default()),
            TraceScheme::OtlpHttp | TraceScheme::OtlpHttps => {
                let scheme = if exporter.scheme == TraceScheme::OtlpHttps || exporter.secure {
                    "https"
                } else {
                    "http"
                };
                let span_exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .with_endpoint(format!("{scheme}://{}/v1/traces", exporter.host))
                    .build()
                    .map_err(|error| invalid(error.to_string()))?;
                builder.with_batch_exporter(span_exporter)
            }
            TraceScheme::OtlpGrpc => {
                let scheme = if exporter.secure { "https" } else { "http" };
                let span_exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(format!("{scheme}://{}", exporter.host))
                    .build()
                    .map_err(|error| invalid(error.to_string()))?;
                builder.with_batch_exporter(span_exporter)
            }
        };
    }

    global::set_tracer_provider(builder.build());
    global::set_text_map_propagator(TraceContextPropagator::new());
    TRACING_ENABLED.store(true, Ordering::Relaxed);
    debug!("tracing initialized with {} exporter(s)", settings.tracing_exporters.len());

    Ok(())
}

/// A span kept active for the lifetime of the guard.
pub struct SpanGuard {
    _context: ContextGuard,
}

/// Start a span and make it the current context until the guard drops.
///
/// With tracing disabled this produces a no-op span.
pub fn start_active_span(name: &'static str) -> SpanGuard {
    let span = global::tracer("wkflws").start(name);
    let context = Context::current_with_span(span);
    SpanGuard {
        _context: context.attach(),
    }
}

/// Inject the current span context into a metadata map, so a remote hop can
/// resume the trace.
pub fn inject_context(metadata: &mut HashMap<String, String>) {
    let context = Context::current();
    global::get_text_map_propagator(|propagator| propagator.inject_context(&context, &mut MetadataInjector(metadata)));
}

/// Extract a span context from a metadata map and make it current until the
/// guard drops. Metadata without trace headers attaches an empty context.
pub fn extract_and_attach(metadata: &HashMap<String, String>) -> ContextGuard {
    let context = global::get_text_map_propagator(|propagator| propagator.extract(&MetadataExtractor(metadata)));
    context.attach()
}

/// The current trace-context headers as a plain map, for handing to task
/// subprocesses. `None` when tracing is disabled.
pub fn current_trace_context() -> Option<HashMap<String, String>> {
    if !enabled() {
        return None;
    }

    let mut carrier = HashMap::new();
    inject_context(&mut carrier);
    Some(carrier)
}

struct MetadataInjector<'a>(&'a mut HashMap<String, String>);

impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

struct MetadataExtractor<'a>(&'a HashMap<String, String>);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}
