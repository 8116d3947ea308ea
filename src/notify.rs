use crate::traits::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }

    pub(crate) fn permission_denied(path: &str) -> Self {
        Self::new(
            Severity::Error,
            "Access denied",
            format!("You do not have permission to open {path}"),
        )
    }

    pub(crate) fn logged_out() -> Self {
        Self::new(Severity::Success, "Signed out", "You have been signed out")
    }

    pub(crate) fn logout_incomplete(detail: &str) -> Self {
        Self::new(
            Severity::Warning,
            "Sign-out incomplete",
            format!("You are signed out on this device, but the server was not told: {detail}"),
        )
    }
}

/// Writes notifications to the `tracing` log. Default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(title = %n.title, "{}", n.message);
            }
            Severity::Warning => tracing::warn!(title = %n.title, "{}", n.message),
            Severity::Error => tracing::error!(title = %n.title, "{}", n.message),
        }
    }
}
