use std::sync::Arc;

use super::access;
use super::auth_guard::AuthGuard;
use super::decision::{AccessDecision, Redirect};
use super::role_guard::RoleGuard;
use crate::config::AccessSettings;
use crate::service::AuthService;
use crate::types::Role;

/// Roles a route demands, parsed once from the route table's role names.
///
/// An unrecognized name is kept as [`RoleRequirement::Malformed`] rather than
/// dropped, so evaluation can refuse it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any authenticated identity may enter.
    #[default]
    Any,
    OneOf(Vec<Role>),
    Malformed(String),
}

impl RoleRequirement {
    /// Parse role names such as `["ADMIN", "ROLE_POLICE_OFFICER"]`.
    ///
    /// An empty list means [`RoleRequirement::Any`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roles = Vec::new();
        for name in names {
            let name = name.as_ref();
            match name.parse::<Role>() {
                Ok(role) if !roles.contains(&role) => roles.push(role),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Route declares an unrecognized role");
                    return Self::Malformed(name.to_owned());
                }
            }
        }
        if roles.is_empty() {
            Self::Any
        } else {
            Self::OneOf(roles)
        }
    }

    #[must_use]
    pub fn one_of(roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: Vec<Role> = roles.into_iter().collect();
        if roles.is_empty() {
            Self::Any
        } else {
            Self::OneOf(roles)
        }
    }

    /// `true` for anything but [`RoleRequirement::Any`]; malformed counts.
    #[must_use]
    pub fn declares_roles(&self) -> bool {
        !matches!(self, Self::Any)
    }

    /// Malformed requirements permit nobody.
    #[must_use]
    pub fn permits(&self, role: Role) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(roles) => roles.contains(&role),
            Self::Malformed(_) => false,
        }
    }
}

/// One navigation attempt: the URL the user asked for and the route's roles.
#[derive(Debug, Clone, Copy)]
pub struct Navigation<'a> {
    pub url: &'a str,
    pub requirement: &'a RoleRequirement,
}

impl<'a> Navigation<'a> {
    #[must_use]
    pub fn new(url: &'a str, requirement: &'a RoleRequirement) -> Self {
        Self { url, requirement }
    }

    /// The URL without query string or fragment.
    #[must_use]
    pub fn path(&self) -> &'a str {
        access::path_only(self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    Auth,
    Role,
}

#[derive(Debug, Clone)]
pub struct Route {
    pattern: String,
    guards: Vec<GuardKind>,
    requirement: RoleRequirement,
}

impl Route {
    /// A route covering `pattern` and everything below it.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            guards: Vec::new(),
            requirement: RoleRequirement::Any,
        }
    }

    /// Guards run in the order they are attached.
    #[must_use]
    pub fn guarded_by(mut self, guard: GuardKind) -> Self {
        self.guards.push(guard);
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.requirement = RoleRequirement::from_names(names);
        self
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn guards(&self) -> &[GuardKind] {
        &self.guards
    }

    #[must_use]
    pub fn requirement(&self) -> &RoleRequirement {
        &self.requirement
    }
}

/// The portal's routes. The most specific matching route wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    fallback: Option<String>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Unmatched paths redirect here. Without a fallback they are allowed.
    #[must_use]
    pub fn with_fallback(mut self, path: impl Into<String>) -> Self {
        self.fallback = Some(path.into());
        self
    }

    /// The citizen, police and admin areas of the portal.
    #[must_use]
    pub fn portal_default() -> Self {
        use GuardKind::Auth;

        Self::new()
            .with_route(Route::new("/auth"))
            .with_route(Route::new("/dashboard").guarded_by(Auth))
            .with_route(Route::new("/profile").guarded_by(Auth))
            .with_route(Route::new("/complaints").guarded_by(Auth))
            .with_route(
                Route::new("/complaints/new")
                    .guarded_by(Auth)
                    .with_roles(["CITIZEN"]),
            )
            .with_route(
                Route::new("/police")
                    .guarded_by(Auth)
                    .guarded_by(GuardKind::Role)
                    .with_roles(["POLICE_OFFICER", "ROLE_ADMIN"]),
            )
            .with_route(
                Route::new("/admin")
                    .guarded_by(Auth)
                    .guarded_by(GuardKind::Role)
                    .with_roles(["ADMIN"]),
            )
            .with_fallback("/dashboard")
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|route| access::is_under(path, &route.pattern))
            .max_by_key(|route| route.pattern.trim_end_matches('/').len())
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Runs the guards a route table attaches to each navigation.
pub struct Navigator {
    table: RouteTable,
    auth_guard: AuthGuard,
    role_guard: RoleGuard,
}

impl Navigator {
    #[must_use]
    pub fn new(auth: Arc<AuthService>, settings: AccessSettings, table: RouteTable) -> Self {
        let settings = Arc::new(settings);
        Self {
            table,
            auth_guard: AuthGuard::new(Arc::clone(&auth), Arc::clone(&settings)),
            role_guard: RoleGuard::new(auth, settings),
        }
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Decide a navigation to `url`. Waits for session restoration first.
    ///
    /// Does not resolve until [`AuthService::restore`] has run, so call it
    /// once at startup before navigating.
    pub async fn navigate(&self, url: &str) -> AccessDecision {
        let path = access::path_only(url);
        let Some(route) = self.table.resolve(path) else {
            return match &self.table.fallback {
                Some(fallback) if fallback != path => {
                    tracing::debug!(path, "No route matches; redirecting to fallback");
                    AccessDecision::Deny(Redirect::to(fallback.clone()))
                }
                _ => AccessDecision::Allow,
            };
        };

        let target = Navigation::new(url, &route.requirement);
        for guard in &route.guards {
            let decision = match guard {
                GuardKind::Auth => self.auth_guard.evaluate(&target).await,
                GuardKind::Role => self.role_guard.evaluate(&target).await,
            };
            if let AccessDecision::Deny(redirect) = &decision {
                tracing::info!(path, guard = ?guard, redirect = %redirect, "Navigation denied");
                return decision;
            }
        }
        AccessDecision::Allow
    }
}
