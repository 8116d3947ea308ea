use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::Error;
use crate::types::Role;

/// Claims read from a backend-issued JWT.
///
/// The signature is NOT verified. The backend verifies its own tokens; the
/// client only reads `exp` and the role to decide what to show.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "authorities")]
    pub roles: Vec<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Expiry as an absolute instant, if the token carries a valid `exp`.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
    }

    /// The role claim, preferring `role` over the first entry of `roles`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPolicy`] if the claim is not a known role, or
    /// [`Error::Token`] if the token carries no role at all.
    pub fn role(&self) -> Result<Role, Error> {
        self.role
            .as_deref()
            .or_else(|| self.roles.first().map(String::as_str))
            .ok_or_else(|| Error::Token("missing claim: role".into()))?
            .parse()
    }
}

/// Decodes the payload segment of a JWT without verifying it.
///
/// # Errors
///
/// Returns [`Error::Token`] if the token is not three dot-separated segments
/// or the payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<TokenClaims, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    serde_json::from_slice(&payload).map_err(|e| Error::Token(format!("invalid payload: {e}")))
}
