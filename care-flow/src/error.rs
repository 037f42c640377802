use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Stage;

/// Why a collaborator could not hand over a location or an uploaded artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionFailure {
    #[error("location services are not supported")]
    Unsupported,

    #[error("permission denied")]
    PermissionDenied,

    #[error("upload rejected: {0}")]
    Upload(String),
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Missing required sections: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionFailure),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Cannot {action} while {stage}")]
    InvalidTransition { stage: Stage, action: &'static str },

    #[error("Session has been discarded")]
    Discarded,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Locale error: {0}")]
    Locale(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
