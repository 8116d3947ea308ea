use std::sync::Arc;

use time::OffsetDateTime;

use super::access;
use super::decision::AccessDecision;
use super::routes::Navigation;
use crate::config::AccessSettings;
use crate::service::AuthService;
use crate::types::{Identity, Role};

/// Decides whether a navigation may proceed for the current session.
///
/// Public pages are always open. Everything else needs a live identity, and
/// routes that declare roles need a matching one (elevated roles pass anywhere
/// under the admin prefix). An expired session is cleared before the redirect,
/// and a refused role produces a permission-denied notification.
pub struct AuthGuard {
    auth: Arc<AuthService>,
    settings: Arc<AccessSettings>,
}

enum Verdict {
    Decided(AccessDecision),
    /// Deny, and drop the expired session first.
    Stale(AccessDecision),
    Forbidden(Role),
}

impl AuthGuard {
    #[must_use]
    pub fn new(auth: Arc<AuthService>, settings: Arc<AccessSettings>) -> Self {
        Self { auth, settings }
    }

    /// Waits for startup restoration, then decides.
    pub async fn evaluate(&self, target: &Navigation<'_>) -> AccessDecision {
        let session = self.auth.session();
        session.hydrated().await;

        let identity = session.current_identity();
        match self.check(identity.as_ref(), session.now(), target) {
            Verdict::Decided(decision) => decision,
            Verdict::Stale(decision) => {
                self.auth.expire_stale_session().await;
                decision
            }
            Verdict::Forbidden(role) => {
                access::forbidden(&self.auth, role, target.path(), &self.settings)
            }
        }
    }

    fn check(
        &self,
        identity: Option<&Identity>,
        now: OffsetDateTime,
        target: &Navigation<'_>,
    ) -> Verdict {
        let settings = &*self.settings;
        let path = target.path();

        if access::is_public(path, settings) {
            return Verdict::Decided(AccessDecision::Allow);
        }

        let Some(identity) = identity else {
            return Verdict::Decided(AccessDecision::Deny(access::login_redirect(
                settings, target.url,
            )));
        };

        if identity.is_expired_at(now) {
            return Verdict::Stale(AccessDecision::Deny(access::login_redirect(
                settings, target.url,
            )));
        }

        if target.requirement.declares_roles() {
            if access::elevated_bypass(identity.role, path, settings) {
                return Verdict::Decided(AccessDecision::Allow);
            }
            if !target.requirement.permits(identity.role) {
                return Verdict::Forbidden(identity.role);
            }
        }

        Verdict::Decided(AccessDecision::Allow)
    }
}
