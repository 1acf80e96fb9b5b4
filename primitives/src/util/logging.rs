use std::io;

use slog::{o, Drain, Logger};

pub use slog_async::Async;
pub use slog_term::TermDecorator;

/// The `type` key every observable log line carries.
///
/// Downstream pipelines route the JSON lines on it.
pub mod line_type {
    pub const CLICK: &str = "click";
    pub const IMPRESSION: &str = "impression";
    pub const PROFILE: &str = "profile";
    pub const TRACKING_URL_ACTIVITY: &str = "tracking_url_activity";
}

/// The process logger: a compact terminal format, written asynchronously,
/// with every line prefixed by the service name.
pub fn new_logger(prefix: &str) -> Logger {
    let decorator = TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = Async::new(drain).build().fuse();

    Logger::root(drain, o!("service" => prefix.to_string()))
}

/// Logger for the structured lines (click, impression, profile and
/// tracking url activity) that are parsed by downstream pipelines.
///
/// Every record is a single JSON object per line on `stdout`.
pub fn new_event_logger() -> Logger {
    event_logger_to(io::stdout())
}

/// Same as [`new_event_logger`] but writes to any [`io::Write`].
pub fn event_logger_to<W>(writer: W) -> Logger
where
    W: io::Write + Send + 'static,
{
    let drain = slog_json::Json::new(writer)
        .set_newlines(true)
        .add_default_keys()
        .build()
        .fuse();
    let drain = Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

/// Same as [`event_logger_to`] but writes synchronously,
/// so that tests can read the lines right after logging them.
#[cfg(any(test, feature = "test-util"))]
pub fn sync_event_logger_to<W>(writer: W) -> Logger
where
    W: io::Write + Send + 'static,
{
    let drain = slog_json::Json::new(writer)
        .set_newlines(true)
        .add_default_keys()
        .build();
    let drain = std::sync::Mutex::new(drain).fuse();

    Logger::root(drain, o!())
}

/// A logger that drops everything, used in tests.
pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}
