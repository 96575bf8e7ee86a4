use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::cache::CacheKey;
use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should keep flushing.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let json = config.format == "json";

    let result = match config.output.as_str() {
        "file" => {
            let (writer, guard) = file_writer(config)?;
            let file_layer = if json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            };
            registry.with(file_layer).try_init().map(|_| Some(guard))
        }
        "both" => {
            let (writer, guard) = file_writer(config)?;
            let file_layer = fmt::layer().json().with_writer(writer).boxed();
            registry
                .with(console_layer(json))
                .with(file_layer)
                .try_init()
                .map(|_| Some(guard))
        }
        _ => registry.with(console_layer(json)).try_init().map(|_| None),
    };

    let guard = result
        .map_err(|e| ConfigError::Invalid(format!("Logging init failed: {}", e)))?;
    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

fn console_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    // stdout carries command output.
    if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    }
}

fn file_writer(config: &LoggingConfig) -> Result<(non_blocking::NonBlocking, WorkerGuard), ConfigError> {
    let file_path = Path::new(config.file_path.as_deref().unwrap_or("coach.log"));
    let file_dir = file_path.parent().unwrap_or(Path::new("."));
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ConfigError::Invalid(format!("Invalid log file path: {}", file_path.display())))?;

    let file_appender = rolling::daily(file_dir, file_name);
    Ok(non_blocking(file_appender))
}

pub fn log_error(error: &dyn std::error::Error, context: &str) {
    error!(
        error = %error,
        context = context,
        "Error occurred"
    );

    let mut source = error.source();
    let mut level = 1;
    while let Some(err) = source {
        error!(
            error = %err,
            level = level,
            "Error source"
        );
        source = err.source();
        level += 1;
    }
}

pub fn log_cache_event(event_type: &str, key: &CacheKey, hit: bool) {
    debug!(
        event_type = event_type,
        model = %key.model,
        prompt_digest = %key.prompt_digest,
        hit = hit,
        "Cache event"
    );
}

pub fn log_provider_event(event_type: &str, model: &str, attempt: u32, status: Option<u16>) {
    warn!(
        event_type = event_type,
        model = model,
        attempt = attempt,
        status = status,
        "Provider event"
    );
}

pub fn log_fallback(from: &str, to: &str, attempt: u32) {
    info!(
        from_model = from,
        to_model = to,
        attempt = attempt,
        "Falling back to alternate model"
    );
}
