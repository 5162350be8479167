mod filter;

use std::io::{IsTerminal, Write};

use scope_guard_config::log::{LogFormat, LoggingConfig};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

pub use filter::create_filter;

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Installs the global subscriber, writing to stdout.
///
/// The returned guard flushes the non-blocking writer on drop, keep it alive
/// for as long as the process logs.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let stdout = std::io::stdout();
    let ansi = stdout.is_terminal();
    let (layer, guard) = logging_layer::<Registry, _>(config, stdout, ansi);

    tracing_subscriber::registry().with(layer).init();

    guard
}

/// Builds the fmt layer over any writer, moved onto a background thread.
///
/// With `span_events` on, closing a gate span emits one event that carries the
/// span's recorded fields, so every authorization outcome ends up in the log.
pub fn logging_layer<S, W>(
    config: &LoggingConfig,
    writer: W,
    ansi: bool,
) -> (BoxedLayer<S>, WorkerGuard)
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
    W: Write + Send + 'static,
{
    let (writer, guard) = tracing_appender::non_blocking(writer);
    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let filter = create_filter(config.level, config.filter.as_deref());
    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(span_events);

    let layer = match config.format {
        LogFormat::Json => base
            .json()
            .with_ansi(false)
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => base
            .compact()
            .with_ansi(ansi)
            .with_target(false)
            .with_filter(filter)
            .boxed(),
    };

    (layer, guard)
}
