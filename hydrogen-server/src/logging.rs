//! Logging initialization: a human-readable term drain in development,
//! MozLog JSON in production, both wrapped in `slog_envlogger` (for
//! `RUST_LOG` filtering) and `slog_async` (off the hot path), installed as
//! the process-wide `slog_scope` logger plus a `log`-crate shim so
//! dependency crates that log through `log::*` still land in the same sink.

use std::io;

use slog::{slog_o, Drain};

pub fn init_logging(json: bool) {
    let logger = if json {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_owned());

        let drain = slog_mozlog_json::MozLogJson::new(io::stdout())
            .logger_name(format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
            .msg_type(format!("{}:log", env!("CARGO_PKG_NAME")))
            .hostname(hostname)
            .build()
            .fuse();
        let drain = slog_envlogger::new(drain);
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog_o!())
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_envlogger::new(drain);
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog_o!())
    };

    slog_scope::set_global_logger(logger).cancel_reset();
    slog_stdlog::init().ok();
}

pub fn reset_logging() {
    let logger = slog::Logger::root(slog::Discard, slog_o!());
    slog_scope::set_global_logger(logger).cancel_reset();
}
