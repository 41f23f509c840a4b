use backtrace::Backtrace;
use hydrogen_common::{impl_fmt_display, ReportableError};
use thiserror::Error;

use crate::engine_kind::EngineKind;

/// The single result-sum-type taxonomy every leaf operation in the
/// cache/pool/adapter layer returns, instead of the heterogeneous
/// bool/int/NULL/out-parameter mix a C-style ABI would use for the same
/// thing.
#[derive(Debug)]
pub struct HydrogenError {
    kind: HydrogenErrorKind,
    pub backtrace: Backtrace,
}

#[derive(Debug, Error)]
pub enum HydrogenErrorKind {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("engine error ({engine}): {detail}")]
    EngineError { engine: EngineKind, detail: String },

    #[error("operation refused: shutdown in progress")]
    Shutdown,

    #[error("subsystem not initialized: {0}")]
    NotInitialized(String),
}

impl HydrogenError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        HydrogenErrorKind::InvalidArgument(msg.into()).into()
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        HydrogenErrorKind::NotFound(msg.into()).into()
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        HydrogenErrorKind::ResourceExhausted(msg.into()).into()
    }

    pub fn engine_error(engine: EngineKind, detail: impl Into<String>) -> Self {
        HydrogenErrorKind::EngineError {
            engine,
            detail: detail.into(),
        }
        .into()
    }

    pub fn shutdown() -> Self {
        HydrogenErrorKind::Shutdown.into()
    }

    pub fn not_initialized(msg: impl Into<String>) -> Self {
        HydrogenErrorKind::NotInitialized(msg.into()).into()
    }

    pub fn kind(&self) -> &HydrogenErrorKind {
        &self.kind
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind, HydrogenErrorKind::Shutdown)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, HydrogenErrorKind::NotFound(_))
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self.kind, HydrogenErrorKind::ResourceExhausted(_))
    }
}

impl From<HydrogenErrorKind> for HydrogenError {
    fn from(kind: HydrogenErrorKind) -> Self {
        HydrogenError {
            kind,
            backtrace: Backtrace::new_unresolved(),
        }
    }
}

impl ReportableError for HydrogenError {
    fn is_sentry_event(&self) -> bool {
        // Leaf cache/pool failures and shutdown refusals are routine control
        // flow, not incidents; engine/connectivity errors are.
        !matches!(
            self.kind,
            HydrogenErrorKind::Shutdown | HydrogenErrorKind::InvalidArgument(_)
        )
    }

    fn metric_label(&self) -> Option<String> {
        match &self.kind {
            HydrogenErrorKind::EngineError { engine, .. } => {
                Some(format!("db.engine_error.{engine}"))
            }
            HydrogenErrorKind::ResourceExhausted(_) => Some("db.resource_exhausted".to_owned()),
            _ => None,
        }
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        Some(&self.backtrace)
    }
}

impl_fmt_display!(HydrogenError, HydrogenErrorKind);

pub type HydrogenResult<T> = Result<T, HydrogenError>;
