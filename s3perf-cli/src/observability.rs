use std::env;
use std::io::IsTerminal;

use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use crate::config::{Config, LogFormat};

/// Crates whose logs are emitted at the configured level. Everything else logs warnings only.
const CRATE_NAMES: &[&str] = &["s3perf", "s3perf_backend", "s3perf_bench"];

pub fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    let sentry_config = &config.sentry;
    let dsn = sentry_config.dsn.as_ref()?;

    Some(sentry::init(sentry::ClientOptions {
        dsn: dsn.expose_secret().as_str().parse().ok(),
        release: sentry::release_name!(),
        environment: sentry_config.environment.clone(),
        sample_rate: sentry_config.sample_rate,
        debug: sentry_config.debug,
        ..Default::default()
    }))
}

pub fn init_tracing(config: &Config) {
    // Errors become Sentry events, warnings and info logs become breadcrumbs on them.
    let sentry_layer = config.sentry.is_enabled().then(|| {
        sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
            Level::ERROR => sentry_tracing::EventFilter::Event,
            Level::WARN | Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
            Level::DEBUG | Level::TRACE => sentry_tracing::EventFilter::Ignore,
        })
    });

    tracing_subscriber::registry()
        .with(format_layer(config.logging.format))
        .with(sentry_layer)
        .with(env_filter(config.logging.level))
        .init();
}

fn format_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let format = match format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Auto | LogFormat::Simplified => layer.compact().with_ansi(false).boxed(),
    }
}

/// Uses `RUST_LOG` literally if set, otherwise applies `level` to the workspace crates.
fn env_filter(level: LevelFilter) -> EnvFilter {
    if let Ok(value) = env::var(EnvFilter::DEFAULT_ENV) {
        return EnvFilter::new(value);
    }

    let mut directives = String::from("WARN");
    for name in CRATE_NAMES {
        directives.push_str(&format!(",{name}={level}"));
    }
    EnvFilter::new(directives)
}
