//! Error taxonomy shared by the pipeline and its collaborators.
//!
//! Each collaborator call returns an explicit [`CollaboratorError`] so the
//! caller decides whether to log, skip or abort. Directory resets are the one
//! fatal step of a download batch and surface as [`SyncError`].

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure of a [`crate::directory_sync::DirectorySync`] batch.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to reset directory {path}: {source}")]
    Reset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single call to an external system.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network level fault: connection refused, timeout, TLS, body decode.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response arrived but lacks the fields we rely on.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A required setting (API key, URI) was not provided.
    #[error("missing configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            CollaboratorError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            CollaboratorError::Transport(e.to_string())
        }
    }
}

/// Invalid date bound handed to [`crate::recordings::DateRange`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("unrecognised date format: {0}")]
    Unrecognised(String),
}

/// Failure of a whole pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("no records returned by the call data source")]
    NoRecords,

    #[error("no stored document to take the latest s_id from")]
    NoStoredDocument,

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
