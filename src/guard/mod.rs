//! Route guards for the Casefile portal.
//!
//! A navigation is checked against the route it resolves to in a
//! [`RouteTable`]. Routes attach an [`AuthGuard`], a [`RoleGuard`], or both;
//! the [`Navigator`] runs them in declared order and the first denial wins.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use casefile_auth::{AccessSettings, Navigator, RouteTable};
//!
//! // 1. Build and restore the AuthService (see crate docs)
//! // 2. Describe the routes
//! let navigator = Navigator::new(auth, AccessSettings::default(), RouteTable::portal_default());
//!
//! // 3. Ask before every navigation
//! if let AccessDecision::Deny(redirect) = navigator.navigate("/admin/officers").await {
//!     router.go(&redirect.to_string());
//! }
//! ```
//!
//! Both guards fail closed: an unrecognized role in route metadata, a
//! missing identity, or an expired token always ends in a redirect.

mod access;
mod auth_guard;
mod decision;
mod role_guard;
mod routes;

pub use auth_guard::AuthGuard;
pub use decision::{AccessDecision, Redirect};
pub use role_guard::RoleGuard;
pub use routes::{GuardKind, Navigation, Navigator, RoleRequirement, Route, RouteTable};
