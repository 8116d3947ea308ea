use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No identity, or the identity's token has expired.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid username or password")]
    InvalidCredentials,

    /// A sign-out landed while the sign-in was still in flight.
    #[error("Sign-in cancelled by a sign-out")]
    Superseded,

    /// Identity present but its role does not grant access.
    #[error("Forbidden")]
    Forbidden,

    #[error("Backend unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{operation} failed (status {status:?}): {detail}")]
    Upstream {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// Field-level validation failure, keyed by field name.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Duplicate username or email on registration.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unrecognized role name in route metadata or a backend payload.
    #[error("Unrecognized role: {0:?}")]
    MalformedPolicy(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// `true` when the backend could not be reached at all.
    #[must_use]
    pub fn is_upstream_unavailable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Upstream { status, .. } => status.is_none_or(|s| s >= 500),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_availability() {
        let down = Error::Upstream {
            operation: "login",
            status: None,
            detail: "connection refused".into(),
        };
        assert!(down.is_upstream_unavailable());

        let gateway = Error::Upstream {
            operation: "login",
            status: Some(502),
            detail: String::new(),
        };
        assert!(gateway.is_upstream_unavailable());

        assert!(!Error::InvalidCredentials.is_upstream_unavailable());
        assert!(!Error::Conflict("taken".into()).is_upstream_unavailable());
    }

    #[test]
    fn malformed_policy_message_quotes_role() {
        let e = Error::MalformedPolicy("SUPERUSER".into());
        assert_eq!(e.to_string(), "Unrecognized role: \"SUPERUSER\"");
    }
}
