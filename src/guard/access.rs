//! Policy shared by both guards.

use super::decision::{AccessDecision, Redirect};
use crate::config::AccessSettings;
use crate::notify::Notification;
use crate::service::AuthService;
use crate::types::Role;

/// The path part of a router URL, without query or fragment.
pub(crate) fn path_only(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Segment-aware prefix match: `/admin` covers `/admin` and `/admin/x`, not `/administrator`.
pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The login and registration area, reachable by anyone.
pub(crate) fn is_public(path: &str, settings: &AccessSettings) -> bool {
    is_under(path, &settings.public_prefix) || is_under(path, &settings.login_path)
}

/// Elevated roles enter the administrative area regardless of per-route roles.
pub(crate) fn elevated_bypass(role: Role, path: &str, settings: &AccessSettings) -> bool {
    role.is_elevated() && is_under(path, &settings.admin_prefix)
}

pub(crate) fn login_redirect(settings: &AccessSettings, intended: &str) -> Redirect {
    Redirect::to(settings.login_path.clone())
        .with_query(settings.return_url_param.clone(), intended)
}

pub(crate) fn landing_redirect(role: Role, settings: &AccessSettings) -> Redirect {
    if role.is_elevated() {
        Redirect::to(settings.elevated_landing.clone())
    } else {
        Redirect::to(settings.default_landing.clone())
    }
}

/// Deny a role the route does not grant. Whichever guard refuses, the user
/// gets one permission-denied notification and lands on their home page.
pub(crate) fn forbidden(
    auth: &AuthService,
    role: Role,
    path: &str,
    settings: &AccessSettings,
) -> AccessDecision {
    tracing::warn!(path, role = %role, "Permission denied");
    auth.notify(Notification::permission_denied(path));
    AccessDecision::Deny(landing_redirect(role, settings))
}
