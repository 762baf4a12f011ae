use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the run supervisor, run storage and geometry loading.
#[derive(Debug, Error)]
pub enum DashError {
    /// A run is already in flight; the existing session is left untouched.
    #[error("a simulation is already running (run {run_id})")]
    Conflict { run_id: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The supervisor task has shut down and no longer accepts commands.
    #[error("run supervisor is not running")]
    Closed,
}

impl DashError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DashError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        DashError::Json {
            context: context.into(),
            source,
        }
    }
}

pub type DashResult<T> = std::result::Result<T, DashError>;
