// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging facility setup.
//!
//! One process-wide subscriber, initialized in main. The env-filter sits
//! behind a reload handle so `set_config log_level` takes effect without a
//! restart.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};
use vnids_core::LogLevel;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Handle for runtime log-level changes.
#[derive(Clone)]
pub struct LogHandle {
    filter: FilterHandle,
}

impl LogHandle {
    /// Swap the active filter. Errors only if the subscriber is gone.
    pub fn set_level(&self, level: LogLevel) -> bool {
        self.filter.reload(EnvFilter::new(level.as_filter_str())).is_ok()
    }
}

/// Initialize the global subscriber.
///
/// With a log directory, output goes to `vnidsd.log` there via a non-blocking
/// writer; the returned guard must live until process exit. Without one,
/// output goes to stderr.
pub fn init(level: LogLevel, log_dir: Option<&Path>) -> (LogHandle, Option<WorkerGuard>) {
    let filter = EnvFilter::new(level.as_filter_str());
    let (filter_layer, handle) = reload::Layer::new(filter);

    let guard = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "vnidsd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            Registry::default()
                .with(filter_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            Registry::default()
                .with(filter_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    };

    (LogHandle { filter: handle }, guard)
}
