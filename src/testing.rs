//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use time::OffsetDateTime;

use crate::error::Error;
use crate::notify::{Notification, Severity};
use crate::session::Clock;
use crate::traits::{AuthBackend, Notifier};
use crate::types::{Credentials, Identity, LoginGrant, Registration, Role, UserId, UserProfile};

/// Clock that only moves when told to.
pub(crate) struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub(crate) fn at(unix: i64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(OffsetDateTime::from_unix_timestamp(unix).unwrap()),
        })
    }

    pub(crate) fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += time::Duration::seconds(seconds);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

pub(crate) fn identity(role: Role, expiry_unix: Option<i64>) -> Identity {
    Identity {
        id: UserId::from(format!("user-{}", role.as_str().to_ascii_lowercase())),
        username: role.as_str().to_ascii_lowercase(),
        role,
        token: format!("token-{}", role.as_str().to_ascii_lowercase()),
        token_expiry: expiry_unix.map(|t| OffsetDateTime::from_unix_timestamp(t).unwrap()),
    }
}

pub(crate) fn profile(id: &str, username: &str, role: Option<&str>) -> UserProfile {
    let profile = UserProfile::new(id, username);
    match role {
        Some(role) => profile.with_role(role),
        None => profile,
    }
}

/// Unsigned JWT carrying `claims` as its payload.
pub(crate) fn jwt_with_claims(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Backend with canned behaviour.
pub(crate) struct FakeBackend {
    grant: Option<LoginGrant>,
    reachable: bool,
    logout_fails: bool,
    logout_calls: Arc<AtomicUsize>,
    existing_users: Vec<String>,
}

impl FakeBackend {
    pub(crate) fn accepting(grant: LoginGrant) -> Self {
        Self {
            grant: Some(grant),
            ..Self::rejecting()
        }
    }

    pub(crate) fn rejecting() -> Self {
        Self {
            grant: None,
            reachable: true,
            logout_fails: false,
            logout_calls: Arc::new(AtomicUsize::new(0)),
            existing_users: Vec::new(),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::rejecting()
        }
    }

    pub(crate) fn with_failing_logout(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    pub(crate) fn with_existing_user(mut self, username: &str) -> Self {
        self.existing_users.push(username.to_owned());
        self
    }

    pub(crate) fn logout_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.logout_calls)
    }

    fn down(operation: &'static str) -> Error {
        Error::Upstream {
            operation,
            status: None,
            detail: "connection refused".into(),
        }
    }
}

impl AuthBackend for FakeBackend {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginGrant, Error> {
        if !self.reachable {
            return Err(Self::down("login"));
        }
        self.grant.clone().ok_or(Error::InvalidCredentials)
    }

    async fn logout(&self, _token: &str) -> Result<(), Error> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable || self.logout_fails {
            return Err(Self::down("logout"));
        }
        Ok(())
    }

    async fn register(&self, registration: &Registration) -> Result<UserProfile, Error> {
        if !self.reachable {
            return Err(Self::down("register"));
        }
        if self.existing_users.contains(&registration.username) {
            return Err(Error::Conflict(format!(
                "username {} is taken",
                registration.username
            )));
        }
        Ok(UserProfile::new("new-1", registration.username.clone())
            .with_email(registration.email.clone())
            .with_role("CITIZEN"))
    }
}

/// Notifier that remembers everything it was given.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn severities(&self) -> Vec<Severity> {
        self.seen.lock().unwrap().iter().map(|n| n.severity).collect()
    }

    pub(crate) fn last(&self) -> Option<Notification> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
