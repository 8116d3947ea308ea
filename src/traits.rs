use std::future::Future;

use crate::error::Error;
use crate::notify::Notification;
use crate::types::{Credentials, LoginGrant, Registration, UserProfile};

/// The portal's authentication endpoints.
///
/// [`HttpBackend`](crate::HttpBackend) is the production implementation;
/// anything else speaking the same contract can stand in for it.
///
/// # Example
///
/// ```rust,ignore
/// impl AuthBackend for StaticBackend {
///     async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, Error> {
///         if credentials.password == "letmein" {
///             Ok(LoginGrant::new(self.token.clone(), self.user.clone()))
///         } else {
///             Err(Error::InvalidCredentials)
///         }
///     }
///     // ...
/// }
/// ```
pub trait AuthBackend: Send + Sync + 'static {
    /// Exchange credentials for a token and user record.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginGrant, Error>> + Send;

    /// Tell the backend the token is no longer in use.
    fn logout(&self, token: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Create a citizen account. Does not sign in.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<UserProfile, Error>> + Send;
}

/// Durable key-value storage that survives process restarts.
///
/// Read once at startup, written on login, cleared on logout.
pub trait CredentialStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Error>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Fire-and-forget channel for user-visible messages (toasts, banners).
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}
