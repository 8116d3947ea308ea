use std::collections::BTreeMap;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// Backend-assigned user identifier (opaque string).
///
/// Numeric ids from the backend are stored in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Portal role, normalized from every spelling the backend and route tables use.
///
/// `"ADMIN"`, `"ROLE_ADMIN"`, `"admin"` and `"Role-Admin"` all parse to [`Role::Admin`].
/// Anything else is rejected with [`Error::MalformedPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Citizen,
    PoliceOfficer,
    Admin,
}

impl Role {
    /// Canonical wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "CITIZEN",
            Self::PoliceOfficer => "POLICE_OFFICER",
            Self::Admin => "ADMIN",
        }
    }

    /// Elevated roles get the coarse administrative-area bypass.
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Admin | Self::PoliceOfficer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let name = normalized.strip_prefix("ROLE_").unwrap_or(&normalized);
        match name {
            "CITIZEN" | "USER" => Ok(Self::Citizen),
            "POLICE_OFFICER" | "POLICE" | "OFFICER" => Ok(Self::PoliceOfficer),
            "ADMIN" | "ADMINISTRATOR" => Ok(Self::Admin),
            _ => Err(Error::MalformedPolicy(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        r.as_str().to_owned()
    }
}

/// The signed-in identity. Either fully present in the session or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub token: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub token_expiry: Option<OffsetDateTime>,
}

impl Identity {
    /// An identity without an expiry never expires on the client side.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.token_expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Login form payload.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Citizen self-registration payload.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

impl Registration {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            full_name: None,
            phone_number: None,
        }
    }

    #[must_use]
    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    /// Client-side checks run before anything is sent to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every offending field.
    pub fn validate(&self) -> Result<(), Error> {
        let mut fields = BTreeMap::new();

        if self.username.trim().is_empty() {
            fields.insert("username".to_owned(), "is required".to_owned());
        }

        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            fields.insert("email".to_owned(), "must be a valid email address".to_owned());
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            fields.insert(
                "password".to_owned(),
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                message: "registration form is invalid".to_owned(),
                fields,
            })
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

/// User record as the backend reports it.
///
/// `role` stays a raw string here; it is normalized into [`Role`] when the
/// session identity is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            role: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Successful login response.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoginGrant {
    pub token: String,
    pub user: UserProfile,
    /// Absolute expiry, when the backend sends one.
    pub expires_at: Option<OffsetDateTime>,
    /// Relative lifetime in seconds, when the backend sends one.
    pub expires_in: Option<u64>,
}

impl LoginGrant {
    #[must_use]
    pub fn new(token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            token: token.into(),
            user,
            expires_at: None,
            expires_in: None,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, at: OffsetDateTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}
