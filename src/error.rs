use display_model::{ConfigId, ValidationError};
use thiserror::Error;

/// Error type shared by the settings manager, the sequencer and the HTTP layer.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Caller-correctable field values; nothing was changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("display configuration {0} not found")]
    NotFound(ConfigId),

    /// At least one display configuration must always exist.
    #[error("cannot delete the last remaining display configuration")]
    CannotDeleteLast,

    /// The caller went away while candidates were being resolved.
    #[error("request cancelled")]
    Cancelled,

    #[error("photo library query failed: {0:#}")]
    Library(anyhow::Error),

    #[error("failed to persist display configurations: {0:#}")]
    Persistence(anyhow::Error),
}

impl DisplayError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation-error",
            Self::NotFound(_) => "not-found",
            Self::CannotDeleteLast => "cannot-delete-last",
            Self::Cancelled => "cancelled",
            Self::Library(_) => "library-error",
            Self::Persistence(_) => "persistence-error",
        }
    }
}

pub type Result<T, E = DisplayError> = std::result::Result<T, E>;
