// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable logging sink plus compile-time-gated tracing macros.
//!
//! The public surface is the [`Logger`] trait: a single `log(level, component,
//! message)` sink that host applications implement to route runtime
//! diagnostics wherever they like (stderr, a ring buffer, a telemetry
//! pipeline). Internally, most call sites still use the ordinary `log::debug!`
//! / `log::warn!` / `log::error!` macros from the `log` facade; [`install`]
//! bridges a [`Logger`] into a `log::Log` implementation so both styles reach
//! the same sink. When the `logging` feature is off, `trace_fn!` compiles to
//! nothing.

use std::sync::Arc;

/// Severity of a single log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Single-sink logging interface consumed by [`crate::reactor::Runtime::new`].
///
/// Implementations must be `Send + Sync`: the reactor thread and any handler
/// worker threads all call `log` concurrently.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, component: &str, message: &str);
}

/// Default [`Logger`] that writes to stderr, prefixed with level and component.
pub struct ConsoleLogger {
    min_level: Level,
}

impl ConsoleLogger {
    #[must_use]
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: Level, component: &str, message: &str) {
        if level < self.min_level {
            return;
        }
        let tag = match level {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        eprintln!("[{tag}] [{component}] {message}");
    }
}

struct FacadeBridge {
    sink: Arc<dyn Logger>,
}

impl log::Log for FacadeBridge {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let level = match record.level() {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        };
        let component = record.target();
        self.sink
            .log(level, component, &record.args().to_string());
    }

    fn flush(&self) {}
}

/// Install `sink` as the process-wide destination for both [`Logger::log`]
/// calls made directly against it and ordinary `log::debug!`/`log::warn!`
/// call sites inside this crate.
///
/// Safe to call more than once; only the first call wins (mirrors
/// `log::set_logger`'s own idempotence), matching the teacher crate's
/// "multiple init calls are safe" contract for its own logger.
pub fn install(sink: Arc<dyn Logger>) {
    let bridge = FacadeBridge { sink };
    let _ = log::set_boxed_logger(Box::new(bridge)).map(|()| log::set_max_level(log::LevelFilter::Debug));
}

/// Function-entry trace marker, compiled to nothing unless the `trace`
/// feature is enabled. Used on the hot codec/reactor paths.
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($name:expr) => {
        log::trace!("[ENTER] {}", $name);
    };
}

#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($name:expr) => {};
}
