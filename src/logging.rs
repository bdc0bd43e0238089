//! Structured logging, gated behind the `logging` feature. With the feature
//! off, `Replica` carries a zero-sized logger and every log call compiles
//! away; with it on, a real `slog::Logger` is threaded through.
#[cfg(feature = "logging")]
use slog::Drain;

#[cfg(feature = "logging")]
pub type Logger = slog::Logger;

#[cfg(not(feature = "logging"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

/// A logger that discards everything, used when the caller doesn't supply
/// one. Construction is cheap enough to call per-replica at startup.
#[cfg(feature = "logging")]
pub fn discard_logger() -> Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

#[cfg(not(feature = "logging"))]
pub fn discard_logger() -> Logger {
    Logger
}

/// A terminal logger with async draining, for binaries that want to see
/// replica activity logged to a terminal.
#[cfg(feature = "logging")]
pub fn terminal_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

#[cfg(not(feature = "logging"))]
pub fn terminal_logger() -> Logger {
    Logger
}

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($logger:expr, $($args:tt)*) => { slog::debug!($logger, $($args)*) };
}
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($logger:expr, $($args:tt)*) => {
        let _ = &$logger;
    };
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($logger:expr, $($args:tt)*) => { slog::warn!($logger, $($args)*) };
}
#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($logger:expr, $($args:tt)*) => {
        let _ = &$logger;
    };
}

#[cfg(feature = "logging")]
macro_rules! log_crit {
    ($logger:expr, $($args:tt)*) => { slog::crit!($logger, $($args)*) };
}
#[cfg(not(feature = "logging"))]
macro_rules! log_crit {
    ($logger:expr, $($args:tt)*) => {
        let _ = &$logger;
    };
}

pub(crate) use log_crit;
pub(crate) use log_debug;
pub(crate) use log_warn;
