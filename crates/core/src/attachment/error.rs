//! Attachment error types.

use ferry_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

/// Attachment operation errors.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Malformed or out-of-policy input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// File too large.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Declared file size.
        size: i64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Content type and extension are not an allowed pair.
    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    /// Attachment not found.
    #[error("attachment not found: {0}")]
    NotFound(Uuid),

    /// Requester is not the uploader.
    #[error("attachment {0} was uploaded by another user")]
    Forbidden(Uuid),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl AttachmentError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid file type error.
    #[must_use]
    pub fn invalid_file_type(msg: impl Into<String>) -> Self {
        Self::InvalidFileType(msg.into())
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Error code from the attachment error taxonomy.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::InvalidFileType(_) => "INVALID_FILE_TYPE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Storage(_) | Self::Repository(_) => "INTERNAL",
        }
    }
}

impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        let msg = err.to_string();
        match err {
            AttachmentError::Validation(reason) => Self::Validation(reason),
            AttachmentError::FileTooLarge { .. } => Self::FileTooLarge(msg),
            AttachmentError::InvalidFileType(reason) => Self::InvalidFileType(reason),
            AttachmentError::NotFound(_) => Self::NotFound(msg),
            AttachmentError::Forbidden(_) => {
                Self::Forbidden("attachment belongs to another user".to_string())
            }
            AttachmentError::Storage(_) | AttachmentError::Repository(_) => Self::Internal(msg),
        }
    }
}
