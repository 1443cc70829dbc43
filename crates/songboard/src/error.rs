//! Error types for songboard.
//!
//! This module defines all error types used throughout the songboard crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Inline message shown when the song field is blank.
pub const EMPTY_SONG_MESSAGE: &str = "Please enter a song + artist.";

/// Generic retry prompt shown for any storage failure.
pub const RETRY_MESSAGE: &str = "Something went wrong, please try again.";

/// Message returned for an unknown request id.
pub const NOT_FOUND_MESSAGE: &str = "No such request.";

/// The main error type for songboard operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The request channel is no longer accepting work.
    #[error("request channel closed")]
    ChannelClosed,

    /// No request with the given id exists.
    #[error("request not found: {0}")]
    RequestNotFound(crate::request::RequestId),

    // === Validation Errors ===
    /// The song field was empty after trimming.
    #[error("{}", EMPTY_SONG_MESSAGE)]
    EmptySong,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Server Errors ===
    /// Failed to bind the HTTP listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that couldn't be bound.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode a QR code.
    #[error("failed to encode QR code: {0}")]
    QrEncode(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for songboard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::QrEncode(err.to_string())
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error was caught locally before reaching storage.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptySong)
    }

    /// Check if this error came from the storage channel.
    ///
    /// Every storage failure is treated as retryable by the user.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::ChannelClosed
                | Self::DirectoryCreate { .. }
                | Self::Internal(_)
        )
    }

    /// The message shown to an attendee for this error.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptySong => EMPTY_SONG_MESSAGE,
            Self::RequestNotFound(_) => NOT_FOUND_MESSAGE,
            _ => RETRY_MESSAGE,
        }
    }

    /// HTTP status for this error.
    ///
    /// - Validation: 422 Unprocessable Entity
    /// - Unknown request: 404 Not Found
    /// - Storage: 503 Service Unavailable
    /// - Everything else: 500 Internal Server Error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if matches!(self, Self::RequestNotFound(_)) {
            StatusCode::NOT_FOUND
        } else if self.is_validation() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else if self.is_storage() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Internal details stay in the log, never in the body.
        tracing::warn!(error = %self, "request failed");
        let status = self.status_code();
        let body = serde_json::json!({ "error": self.user_message() });
        (status, axum::Json(body)).into_response()
    }
}
