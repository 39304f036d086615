use std::path::PathBuf;
use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::email::EmailError;
use crate::model::TransitionError;
use crate::notify::NotifyError;

#[derive(Error, Debug)]
pub enum RfpError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Email(#[from] EmailError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Vendor '{vendor}' is not invited to respond to this RFP")]
    NotInvited { vendor: String },

    #[error("Invalid request: {0}")]
    Validation(String),
}

impl RfpError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RfpError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// HTTP-equivalent status for boundary callers.
    pub fn status_code(&self) -> u16 {
        match self {
            RfpError::Storage(StorageError::AccessDenied { .. }) | RfpError::NotInvited { .. } => {
                403
            }
            RfpError::Storage(StorageError::NotFound { .. }) | RfpError::NotFound { .. } => 404,
            RfpError::Transition(_) => 409,
            RfpError::Validation(_) | RfpError::Analysis(AnalysisError::InsufficientData { .. }) => {
                400
            }
            RfpError::Analysis(AnalysisError::Unavailable)
            | RfpError::Notify(NotifyError::Unavailable)
            | RfpError::Email(EmailError::ConfigError(_))
            | RfpError::Email(EmailError::CredentialsNotFound(_)) => 503,
            RfpError::Analysis(AnalysisError::Failure(_))
            | RfpError::Email(EmailError::ConnectionFailed(_))
            | RfpError::Email(EmailError::TlsError(_))
            | RfpError::Email(EmailError::AuthenticationFailed(_))
            | RfpError::Email(EmailError::ProtocolError(_)) => 502,
            _ => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret for '{field}' could not be resolved: {reason}")]
    Secret { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Access denied for attachment key '{key}'")]
    AccessDenied { key: String },

    #[error("Attachment '{key}' not found")]
    NotFound { key: String },

    #[error("Could not allocate a unique name for '{name}'")]
    Exhausted { name: String },
}

pub type Result<T> = std::result::Result<T, RfpError>;
