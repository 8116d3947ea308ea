use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use time::Duration;

use crate::client::HttpBackend;
use crate::config::{DEFAULT_STORAGE_KEY, PortalConfig};
use crate::error::Error;
use crate::notify::{Notification, TracingNotifier};
use crate::session::SessionStore;
use crate::token;
use crate::traits::{AuthBackend, CredentialStorage, Notifier};
use crate::types::{Credentials, Identity, LoginGrant, Registration, Role, UserProfile};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe wrapper for AuthBackend (needed for Arc<dyn>).
trait AuthBackendDyn: Send + Sync {
    fn login_dyn<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<LoginGrant, Error>>;

    fn logout_dyn<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), Error>>;

    fn register_dyn<'a>(
        &'a self,
        registration: &'a Registration,
    ) -> BoxFuture<'a, Result<UserProfile, Error>>;
}

impl<T: AuthBackend> AuthBackendDyn for T {
    fn login_dyn<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<LoginGrant, Error>> {
        Box::pin(self.login(credentials))
    }

    fn logout_dyn<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(self.logout(token))
    }

    fn register_dyn<'a>(
        &'a self,
        registration: &'a Registration,
    ) -> BoxFuture<'a, Result<UserProfile, Error>> {
        Box::pin(self.register(registration))
    }
}

/// Object-safe wrapper for CredentialStorage.
trait CredentialStorageDyn: Send + Sync {
    fn get_dyn<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, Error>>;

    fn set_dyn<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), Error>>;

    fn remove_dyn<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), Error>>;
}

impl<T: CredentialStorage> CredentialStorageDyn for T {
    fn get_dyn<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, Error>> {
        Box::pin(self.get(key))
    }

    fn set_dyn<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(self.set(key, value))
    }

    fn remove_dyn<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(self.remove(key))
    }
}

/// Login, logout and registration against the backend.
///
/// The only writer of the [`SessionStore`]. The store is written last, after
/// every fallible step has succeeded, so consumers never observe a half-built
/// session.
pub struct AuthService {
    session: Arc<SessionStore>,
    backend: Arc<dyn AuthBackendDyn>,
    storage: Arc<dyn CredentialStorageDyn>,
    notifier: Arc<dyn Notifier>,
    storage_key: String,
}

impl AuthService {
    #[must_use]
    pub fn new<B: AuthBackend, S: CredentialStorage>(
        session: Arc<SessionStore>,
        backend: B,
        storage: S,
    ) -> Self {
        Self {
            session,
            backend: Arc::new(backend),
            storage: Arc::new(storage),
            notifier: Arc::new(TracingNotifier),
            storage_key: DEFAULT_STORAGE_KEY.into(),
        }
    }

    /// Build the production service: HTTP backend, fresh session store.
    ///
    /// Call [`restore`](Self::restore) before the first navigation: guards
    /// and [`Navigator::navigate`](crate::Navigator::navigate) wait for it
    /// and never resolve otherwise.
    #[must_use]
    pub fn connect<S: CredentialStorage>(config: &PortalConfig, storage: S) -> Self {
        Self::new(
            Arc::new(SessionStore::new()),
            HttpBackend::new(config.backend.clone()),
            storage,
        )
        .with_storage_key(config.storage_key.clone())
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Restore a persisted identity at startup.
    ///
    /// Expired or unreadable identities are discarded. The session is marked
    /// hydrated whatever the outcome, releasing guards waiting on it.
    pub async fn restore(&self) -> Option<Identity> {
        let restored = self.load_persisted().await;
        if let Some(identity) = &restored {
            tracing::info!(user_id = %identity.id, role = %identity.role, "Session restored");
            self.session.set(identity.clone());
        }
        self.session.mark_hydrated();
        restored
    }

    async fn load_persisted(&self) -> Option<Identity> {
        let raw = match self.storage.get_dyn(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted session");
                return None;
            }
        };

        let identity = match serde_json::from_str::<Identity>(&raw) {
            Ok(identity) if identity.is_expired_at(self.session.now()) => {
                tracing::info!(user_id = %identity.id, "Persisted session expired");
                None
            }
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                None
            }
        };

        if identity.is_none() {
            self.forget_persisted().await;
        }
        identity
    }

    /// Sign in.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCredentials`] if the backend rejects the credentials
    /// - [`Error::Network`] / [`Error::Upstream`] if the backend is unavailable
    /// - [`Error::MalformedPolicy`] / [`Error::Token`] if the response carries
    ///   no usable role or an already-expired token
    ///
    /// - [`Error::Superseded`] if [`logout`](Self::logout) ran while the
    ///   sign-in was in flight
    ///
    /// The session is left untouched on every error.
    pub async fn login(&self, credentials: &Credentials) -> Result<Identity, Error> {
        let generation = self.session.generation();
        let grant = self.backend.login_dyn(credentials).await.inspect_err(|e| {
            tracing::warn!(username = %credentials.username, error = %e, "Login failed");
        })?;

        let identity = self.identity_from_grant(grant)?;

        match serde_json::to_string(&identity) {
            Ok(json) => {
                if let Err(e) = self.storage.set_dyn(&self.storage_key, json).await {
                    tracing::warn!(error = %e, "Session will not survive a restart");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not serialize session"),
        }

        if !self.session.set_if_generation(identity.clone(), generation) {
            tracing::info!(user_id = %identity.id, "Signed out during login; discarding it");
            self.forget_persisted().await;
            return Err(Error::Superseded);
        }
        tracing::info!(user_id = %identity.id, role = %identity.role, "Login successful");
        Ok(identity)
    }

    fn identity_from_grant(&self, grant: LoginGrant) -> Result<Identity, Error> {
        let now = self.session.now();
        // Only decode the token when the response leaves something out.
        let claims = if grant.user.role.is_none()
            || (grant.expires_at.is_none() && grant.expires_in.is_none())
        {
            token::decode_claims(&grant.token).ok()
        } else {
            None
        };

        let role: Role = match (&grant.user.role, &claims) {
            (Some(raw), _) => raw.parse()?,
            (None, Some(claims)) => claims.role()?,
            (None, None) => return Err(Error::Token("missing claim: role".into())),
        };

        let token_expiry = grant
            .expires_at
            .or_else(|| {
                grant
                    .expires_in
                    .and_then(|secs| i64::try_from(secs).ok())
                    .and_then(|secs| now.checked_add(Duration::seconds(secs)))
            })
            .or_else(|| claims.as_ref().and_then(|c| c.expires_at()));

        let identity = Identity {
            id: grant.user.id,
            username: grant.user.username,
            role,
            token: grant.token,
            token_expiry,
        };

        if identity.is_expired_at(now) {
            return Err(Error::Token("token already expired".into()));
        }
        Ok(identity)
    }

    /// Sign out.
    ///
    /// The session is cleared before anything else happens and never waits
    /// on the network. The backend is told in the background.
    pub async fn logout(&self) {
        let previous = self.session.clear();
        self.forget_persisted().await;

        let Some(identity) = previous else {
            tracing::debug!("Logout without an active session");
            return;
        };

        tracing::info!(user_id = %identity.id, "Logged out");
        self.notify(Notification::logged_out());
        self.notify_backend_logout(identity.token);
    }

    fn notify_backend_logout(&self, token: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; skipping backend logout");
            return;
        };

        let backend = Arc::clone(&self.backend);
        let notifier = Arc::clone(&self.notifier);
        runtime.spawn(async move {
            if let Err(e) = backend.logout_dyn(&token).await {
                tracing::warn!(error = %e, "Backend logout failed");
                notifier.notify(Notification::logout_incomplete(&e.to_string()));
            }
        });
    }

    /// Create a citizen account. The caller is not signed in.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for field-level problems (checked locally first)
    /// - [`Error::Conflict`] for a duplicate username or email
    /// - [`Error::Network`] / [`Error::Upstream`] if the backend is unavailable
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, Error> {
        registration.validate()?;
        let profile = self
            .backend
            .register_dyn(registration)
            .await
            .inspect_err(|e| {
                tracing::warn!(username = %registration.username, error = %e, "Registration failed");
            })?;
        tracing::info!(user_id = %profile.id, "Registration successful");
        Ok(profile)
    }

    /// `false` when signed out or expired.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.session
            .authenticated_identity()
            .is_some_and(|identity| identity.role == role)
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.session
            .authenticated_identity()
            .is_some_and(|identity| roles.contains(&identity.role))
    }

    /// Clear the session if its token has expired. Returns whether it did.
    pub async fn expire_stale_session(&self) -> bool {
        let now = self.session.now();
        let stale = self
            .session
            .current_identity()
            .is_some_and(|identity| identity.is_expired_at(now));
        if stale {
            self.session.clear();
            self.forget_persisted().await;
            tracing::info!("Expired session cleared");
        }
        stale
    }

    /// React to a 401 from any authenticated backend call.
    pub async fn handle_unauthorized(&self) {
        if self.session.clear().is_some() {
            tracing::warn!("Backend rejected the session token; signed out");
        }
        self.forget_persisted().await;
    }

    /// `Authorization` header value for other backend calls.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.session
            .authenticated_identity()
            .map(|identity| format!("Bearer {}", identity.token))
    }

    async fn forget_persisted(&self) {
        if let Err(e) = self.storage.remove_dyn(&self.storage_key).await {
            tracing::warn!(error = %e, "Could not remove persisted session");
        }
    }
}
