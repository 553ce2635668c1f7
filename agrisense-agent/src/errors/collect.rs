use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ArtifactError, ParseError, UploadError};
use crate::models::SensorRole;

/// Why a single collection cycle failed. None of these end the process.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Another collection is in progress")]
    Busy,

    #[error("No channel for the {0} sensor")]
    NotConnected(SensorRole),

    #[error("No response from the {0} sensor")]
    NoResponse(SensorRole),

    #[error("Channel fault on the {role} sensor: {message}")]
    LinkFault { role: SensorRole, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CollectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Busy => ErrorKind::Busy,
            CollectError::NotConnected(_) => ErrorKind::NotConnected,
            CollectError::NoResponse(_) => ErrorKind::NoResponse,
            CollectError::LinkFault { .. } => ErrorKind::LinkFault,
            CollectError::Parse(_) => ErrorKind::ParseError,
            CollectError::Artifact(_) => ErrorKind::ArtifactError,
            CollectError::Upload(_) => ErrorKind::UploadError,
            CollectError::Config(_) => ErrorKind::ConfigError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Busy,
    NotConnected,
    NoResponse,
    LinkFault,
    ParseError,
    ArtifactError,
    UploadError,
    ConfigError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Busy => "busy",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::NoResponse => "no_response",
            ErrorKind::LinkFault => "link_fault",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::ArtifactError => "artifact_error",
            ErrorKind::UploadError => "upload_error",
            ErrorKind::ConfigError => "config_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
