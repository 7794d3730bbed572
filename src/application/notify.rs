//! User-facing notifications.
//!
//! Fire-and-forget: nothing in the engine reads back what a sink did.

use std::time::Duration;

use serde::Serialize;

use crate::application::error::AppError;

const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(6000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    /// Whether the UI should offer a retry action.
    pub retryable: bool,
    #[serde(skip)]
    pub ttl: Duration,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
            retryable: false,
            ttl: DEFAULT_NOTICE_TTL,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            text: text.into(),
            retryable: false,
            ttl: DEFAULT_NOTICE_TTL,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
            retryable: false,
            ttl: DEFAULT_NOTICE_TTL,
        }
    }

    /// Presentation text for `error`; transient failures are marked retryable.
    pub fn from_error(error: &AppError) -> Self {
        Self {
            retryable: error.is_retryable(),
            ..Self::error(error.presentation_message())
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that drops every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&self, _notice: Notice) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::PERMISSION_DENIED_MESSAGE;
    use crate::application::repos::RepoError;

    #[test]
    fn transient_errors_produce_retryable_notices() {
        let notice = Notice::from_error(&AppError::from(RepoError::Timeout));
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.retryable);
    }

    #[test]
    fn permission_errors_show_fixed_denial() {
        let notice = Notice::from_error(&AppError::permission("nope"));
        assert_eq!(notice.text, PERMISSION_DENIED_MESSAGE);
        assert!(!notice.retryable);
    }
}
