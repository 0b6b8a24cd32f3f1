//! Log sink setup.
//!
//! Every event goes to an append-only file as
//! `[2026-01-01T12:00:00.000000Z] [INFO    ] stage: message`.
//! With `--debug` the same events are mirrored to stderr.

use std::{fmt, fs::OpenOptions, path::Path, sync::Mutex};

use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{
        format::Writer,
        time::{FormatTime, SystemTime},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::InstallerError;

/// Fixed-width severity, timestamp, logical source.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLine;

impl<S, N> FormatEvent<S, N> for LogLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(writer, "[")?;
        SystemTime.format_time(&mut writer)?;
        // Level's Display ignores width, so pad the rendered string.
        write!(writer, "] [{:<8}] {}: ", meta.level().to_string(), meta.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init(log_file: &Path, debug: bool) -> Result<(), InstallerError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .event_format(LogLine)
        .with_filter(LevelFilter::DEBUG);

    let stderr_layer = debug.then(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| InstallerError::Logging(e.to_string()))
}
