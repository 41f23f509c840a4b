//! Shared, cross-crate plumbing for the Hydrogen daemon: the error-reporting
//! traits every subsystem's error type implements, a statsd-backed metrics
//! facade, and the broadcast shutdown token that replaces the old
//! signal-flag style of cancellation.

mod metrics;
mod shutdown;

pub use metrics::{MetricError, Metrics};
pub use shutdown::ShutdownToken;

use backtrace::Backtrace;

/// Implemented by every subsystem's error type so the logging layer can
/// decide priority and Sentry-worthiness without matching on concrete types.
pub trait ReportableError: std::fmt::Debug + std::fmt::Display {
    /// The next error in the causal chain, if this error wraps one.
    fn reportable_source(&self) -> Option<&(dyn ReportableError + 'static)> {
        None
    }

    fn is_sentry_event(&self) -> bool {
        true
    }

    /// A short, stable label suitable for a metrics tag, if this error kind
    /// warrants incrementing a counter distinct from the generic error count.
    fn metric_label(&self) -> Option<String> {
        None
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        None
    }

    fn tags(&self) -> Vec<(&str, String)> {
        Vec::new()
    }
}

/// Types that can represent "something unexpected happened internally".
pub trait InternalError {
    fn internal_error(message: String) -> Self;
}

#[macro_export]
macro_rules! from_error {
    ($from:ty, $to:ty, $to_kind:expr) => {
        impl From<$from> for $to {
            fn from(inner: $from) -> $to {
                $to_kind(inner).into()
            }
        }
    };
}

#[macro_export]
macro_rules! impl_fmt_display {
    ($error:ty, $kind:ty) => {
        impl std::fmt::Display for $error {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.kind, formatter)
            }
        }
    };
}
