use tracing::{info, warn};

use crate::application::notify::{Notice, NoticeKind, NotificationSink};

/// Writes every notice as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let kind = notice.kind.as_str();
        match notice.kind {
            NoticeKind::Success => info!(
                target: "deskroute::notice",
                kind,
                ttl_ms = notice.ttl.as_millis() as u64,
                "{}",
                notice.text
            ),
            NoticeKind::Warning | NoticeKind::Error => warn!(
                target: "deskroute::notice",
                kind,
                retryable = notice.retryable,
                "{}",
                notice.text
            ),
        }
    }
}
