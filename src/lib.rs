#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod notify;
pub mod service;
pub mod session;
pub mod storage;
pub mod token;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use client::{BackendConfig, HttpBackend};
pub use config::{AccessSettings, PortalConfig};
pub use error::Error;
pub use guard::{
    AccessDecision, AuthGuard, GuardKind, Navigation, Navigator, Redirect, RoleGuard,
    RoleRequirement, Route, RouteTable,
};
pub use notify::{Notification, Severity, TracingNotifier};
pub use service::AuthService;
pub use session::{Clock, SessionStore, SystemClock};
pub use storage::{FileStorage, MemoryStorage};
pub use token::{TokenClaims, decode_claims};
pub use traits::{AuthBackend, CredentialStorage, Notifier};
pub use types::{Credentials, Identity, LoginGrant, Registration, Role, UserId, UserProfile};
