//! Logging and error reporting for the backend binary.

use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{BackendConfig, LogFormat};

const DEFAULT_FILTER: &str = "taja_haat_backend=info,tower_http=debug";

/// Keeps Sentry flushing until dropped.
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Start Sentry (when a DSN is set) and install the global subscriber.
///
/// Sentry is started first so the tracing layer finds an active hub.
#[must_use]
pub fn init(config: &BackendConfig) -> TelemetryGuard {
    let sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config
                    .sentry_environment
                    .clone()
                    .map(std::borrow::Cow::Owned),
                sample_rate: config.sentry_sample_rate,
                traces_sample_rate: config.sentry_traces_sample_rate,
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true)))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(sentry_tracing::layer().event_filter(sentry_events))
        .init();

    if sentry.is_some() {
        tracing::info!("Sentry initialized");
    }
    TelemetryGuard { _sentry: sentry }
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
fn sentry_events(metadata: &Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        Level::TRACE => EventFilter::Ignore,
    }
}
