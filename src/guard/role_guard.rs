use std::sync::Arc;

use super::access;
use super::decision::{AccessDecision, Redirect};
use super::routes::{Navigation, RoleRequirement};
use crate::config::AccessSettings;
use crate::service::AuthService;
use crate::types::{Identity, Role};

/// Refines access for routes that list required roles.
///
/// Safe to attach on its own: it re-checks authentication rather than
/// assuming an [`AuthGuard`](super::AuthGuard) ran first. A refused role
/// produces a permission-denied notification before the redirect.
pub struct RoleGuard {
    auth: Arc<AuthService>,
    settings: Arc<AccessSettings>,
}

enum Verdict {
    Allow,
    Unauthenticated(Redirect),
    Forbidden(Role),
}

impl RoleGuard {
    #[must_use]
    pub fn new(auth: Arc<AuthService>, settings: Arc<AccessSettings>) -> Self {
        Self { auth, settings }
    }

    /// Waits for startup restoration, then decides.
    pub async fn evaluate(&self, target: &Navigation<'_>) -> AccessDecision {
        let session = self.auth.session();
        session.hydrated().await;

        let identity = session.authenticated_identity();
        match self.check(identity.as_ref(), target) {
            Verdict::Allow => AccessDecision::Allow,
            Verdict::Unauthenticated(redirect) => AccessDecision::Deny(redirect),
            Verdict::Forbidden(role) => {
                access::forbidden(&self.auth, role, target.path(), &self.settings)
            }
        }
    }

    fn check(&self, identity: Option<&Identity>, target: &Navigation<'_>) -> Verdict {
        let settings = &*self.settings;
        let path = target.path();

        let Some(identity) = identity else {
            return Verdict::Unauthenticated(access::login_redirect(settings, target.url));
        };

        if access::elevated_bypass(identity.role, path, settings) {
            return Verdict::Allow;
        }

        if matches!(target.requirement, RoleRequirement::Any) {
            return Verdict::Allow;
        }

        if target.requirement.permits(identity.role) {
            return Verdict::Allow;
        }

        tracing::debug!(path, requirement = ?target.requirement, "Role not in requirement");
        Verdict::Forbidden(identity.role)
    }
}
