use std::error::Error as StdError;

use thiserror::Error;

use crate::{application::repos::RepoError, domain::error::DomainError, infra::error::InfraError};

/// Fixed text shown for every permission failure.
pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to perform this action";

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    /// Messages joined outermost-first, for log fields.
    pub fn chain(&self) -> String {
        self.messages.join(": ")
    }
}

/// Coarse classification driving user-visible behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any request left the client.
    Validation,
    NotFound,
    Permission,
    /// Backing source unreachable or erroring; the caller may retry.
    Transient,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("backing source unavailable")]
    TransientFetch(#[source] RepoError),
    #[error("backing call failed")]
    Repo(#[source] RepoError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        if error.is_transient() {
            AppError::TransientFetch(error)
        } else {
            AppError::Repo(error)
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                ErrorKind::Validation
            }
            AppError::NotFound { .. } | AppError::Repo(RepoError::NotFound) => {
                ErrorKind::NotFound
            }
            AppError::Permission(_) => ErrorKind::Permission,
            AppError::TransientFetch(_) => ErrorKind::Transient,
            AppError::Infra(_) | AppError::Repo(_) | AppError::Unexpected(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn presentation_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Request could not be processed; please check the input",
            ErrorKind::NotFound => "Record not found",
            ErrorKind::Permission => PERMISSION_DENIED_MESSAGE,
            ErrorKind::Transient => "Service temporarily unavailable; please retry",
            ErrorKind::Internal => "Unexpected error occurred",
        }
    }

    pub fn report(&self, source: &'static str) -> ErrorReport {
        ErrorReport::from_error(source, self)
    }
}
