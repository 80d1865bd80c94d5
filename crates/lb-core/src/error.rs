//! Error taxonomy for session requests and the engine boundary

use thiserror::Error;

/// Errors reported back to the client that issued a request.
///
/// Every variant except [`SessionError::DatasetLoad`] is request-scoped: the
/// session state is left exactly as it was before the failing request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("filter slot {index} is out of range (filter has {capacity} slots)")]
    InvalidSlot { index: i64, capacity: usize },

    #[error("{kind} id {index} is out of range (have {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: i64,
        len: usize,
    },

    #[error("field '{0}' is already registered")]
    DuplicateField(String),

    #[error("render engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("failed to load dataset: {0}")]
    DatasetLoad(String),

    #[error("plot limit of {limit} reached")]
    Capacity { limit: usize },

    #[error("plot {0} kept changing while rendering; retry the request")]
    RenderSuperseded(usize),
}

impl SessionError {
    /// Stable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::UnknownField(_) => "unknown_field",
            SessionError::InvalidSlot { .. } => "invalid_slot",
            SessionError::IndexOutOfRange { .. } => "index_out_of_range",
            SessionError::DuplicateField(_) => "duplicate_field",
            SessionError::EngineUnavailable(_) => "engine_unavailable",
            SessionError::DatasetLoad(_) => "dataset_load",
            SessionError::Capacity { .. } => "capacity",
            SessionError::RenderSuperseded(_) => "render_superseded",
        }
    }

    /// Whether retrying the same request later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::EngineUnavailable(_) | SessionError::RenderSuperseded(_)
        )
    }
}

/// Errors raised by an engine backend while executing a queued command
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine stopped")]
    Unavailable,

    #[error("field '{0}' is not known to the engine")]
    UnknownField(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("engine failure: {0}")]
    Internal(String),
}

impl From<EngineError> for SessionError {
    fn from(error: EngineError) -> Self {
        SessionError::EngineUnavailable(error.to_string())
    }
}
