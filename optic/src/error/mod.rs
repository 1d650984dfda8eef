//! Error types and reporting

use serde::Serialize;
use thiserror::Error;

use crate::ir::StmtId;

/// Result type alias
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Caller-visible analysis failure
///
/// Only `IrUnavailable` is a hard failure: without a snapshot there is
/// nothing to analyze. Everything else the engine encounters is absorbed
/// into report content (see [`UnsupportedConstruct`]) or recorded as a
/// failed-pass marker (see [`InternalAnalysisError`]).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The front-end could not produce a typed IR snapshot. The diagnostic
    /// is the front-end's own, propagated verbatim and never retried.
    #[error("typed IR unavailable for `{function}`: {diagnostic}")]
    IrUnavailable { function: String, diagnostic: String },

    /// Malformed analysis configuration
    #[error("invalid analysis configuration: {message}")]
    InvalidConfig { message: String },
}

impl AnalysisError {
    pub fn ir_unavailable(function: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::IrUnavailable {
            function: function.into(),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Failed-pass marker
///
/// An unexpected fault inside a pass is caught at the pass boundary and
/// recorded as this value in the aggregate result. Sibling passes are
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("internal fault in `{pass}` pass: {message}")]
pub struct InternalAnalysisError {
    pub pass: String,
    pub message: String,
}

impl InternalAnalysisError {
    pub fn new(pass: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pass: pass.into(),
            message: message.into(),
        }
    }
}

/// Warning-level finding for an IR shape the engine does not recognize
///
/// Never thrown. The affected entity is downgraded to its pass's
/// conservative default and the warning travels inside the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedConstruct {
    pub stmt: StmtId,
    pub message: String,
}

impl UnsupportedConstruct {
    pub fn new(stmt: StmtId, message: impl Into<String>) -> Self {
        Self {
            stmt,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported construct at {}: {}", self.stmt, self.message)
    }
}
