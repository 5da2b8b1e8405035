//! User-facing notices (toasts) raised by feature views.

use tokio::sync::broadcast;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The operation completed.
    Success,
    /// Input was rejected before any network call.
    Warning,
    /// The operation failed; nothing was changed remotely.
    Error,
    /// The document change succeeded but a follow-up step did not.
    PartialFailure,
}

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub kind: NoticeKind,
    /// Collection of the view that raised it.
    pub scope: String,
    /// Display text.
    pub text: String,
}

/// Broadcast fan-out of notices to whatever renders them.
///
/// Sending never fails: with no listener the notice is only logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    /// Creates a notifier buffering up to `capacity` undelivered notices.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to future notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Emits a notice and logs it.
    pub fn notify(&self, kind: NoticeKind, scope: &str, text: impl Into<String>) {
        let text = text.into();
        match kind {
            NoticeKind::Success => tracing::info!(scope, %text, "notice"),
            NoticeKind::Warning => tracing::warn!(scope, %text, "validation notice"),
            NoticeKind::Error => tracing::error!(scope, %text, "failure notice"),
            NoticeKind::PartialFailure => tracing::warn!(scope, %text, "partial failure notice"),
        }
        let _ = self.tx.send(Notice {
            kind,
            scope: scope.to_string(),
            text,
        });
    }

    /// Shorthand for [`NoticeKind::Success`].
    pub fn success(&self, scope: &str, text: impl Into<String>) {
        self.notify(NoticeKind::Success, scope, text);
    }

    /// Shorthand for [`NoticeKind::Warning`].
    pub fn warning(&self, scope: &str, text: impl Into<String>) {
        self.notify(NoticeKind::Warning, scope, text);
    }

    /// Shorthand for [`NoticeKind::Error`].
    pub fn error(&self, scope: &str, text: impl Into<String>) {
        self.notify(NoticeKind::Error, scope, text);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
