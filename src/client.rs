use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::traits::AuthBackend;
use crate::types::{Credentials, LoginGrant, Registration, UserId, UserProfile};

/// Casefile REST backend configuration.
///
/// The API base URL is the only required field; endpoint paths default to
/// `auth/login`, `auth/logout` and `auth/register` relative to it.
///
/// ```rust,ignore
/// use casefile_auth::BackendConfig;
///
/// let config = BackendConfig::new("https://api.casefile.example/api".parse()?)?
///     .with_login_url("https://sso.casefile.example/login".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BackendConfig {
    pub(crate) api_base: Url,
    pub(crate) login_url: Url,
    pub(crate) logout_url: Url,
    pub(crate) register_url: Url,
}

impl BackendConfig {
    /// Create a configuration rooted at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `api_base` cannot carry a path (e.g. `mailto:`).
    pub fn new(mut api_base: Url) -> Result<Self, Error> {
        if api_base.cannot_be_a_base() {
            return Err(Error::Config(format!("{api_base} cannot be an API base URL")));
        }
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        let endpoint = |path: &str| {
            api_base
                .join(path)
                .map_err(|e| Error::Config(format!("{path}: {e}")))
        };

        Ok(Self {
            login_url: endpoint("auth/login")?,
            logout_url: endpoint("auth/logout")?,
            register_url: endpoint("auth/register")?,
            api_base,
        })
    }

    /// Resolve `path` against the API base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.api_base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("{path}: {e}")))
    }

    #[must_use]
    pub fn with_login_url(mut self, url: Url) -> Self {
        self.login_url = url;
        self
    }

    #[must_use]
    pub fn with_logout_url(mut self, url: Url) -> Self {
        self.logout_url = url;
        self
    }

    #[must_use]
    pub fn with_register_url(mut self, url: Url) -> Self {
        self.register_url = url;
        self
    }

    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    #[must_use]
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    #[must_use]
    pub fn logout_url(&self) -> &Url {
        &self.logout_url
    }

    #[must_use]
    pub fn register_url(&self) -> &Url {
        &self.register_url
    }
}

/// HTTP client for the backend's authentication endpoints.
pub struct HttpBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

/// Ids arrive as numbers from some deployments and strings from others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

impl From<WireId> for UserId {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Number(n) => Self(n.to_string()),
            WireId::Text(s) => Self(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: WireId,
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl From<WireUser> for UserProfile {
    fn from(u: WireUser) -> Self {
        Self {
            id: u.id.into(),
            username: u.username,
            email: u.email,
            role: u.role,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    #[serde(alias = "accessToken")]
    token: String,
    user: WireUser,
    #[serde(default, with = "time::serde::rfc3339::option")]
    expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegisterBody {
    Wrapped { user: WireUser },
    Bare(WireUser),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Checks HTTP response status; returns the response on success or a classified error.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(operation, status, &body))
    }
}

/// Reads a success body. A body that does not parse means the backend answered
/// with something unexpected, not that it was unreachable.
async fn decode_body<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<T, Error> {
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    parse_body(operation, status, &bytes)
}

fn parse_body<T: DeserializeOwned>(
    operation: &'static str,
    status: u16,
    bytes: &[u8],
) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(|e| Error::Upstream {
        operation,
        status: Some(status),
        detail: format!("unexpected response body: {e}"),
    })
}

/// A rejected login is a credentials problem, whatever status carried it.
fn login_failure(err: Error) -> Error {
    match err {
        Error::Unauthenticated | Error::Forbidden => Error::InvalidCredentials,
        other => other,
    }
}

/// Maps a non-success status and body onto the error taxonomy.
fn classify_failure(operation: &'static str, status: u16, body: &str) -> Error {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed.message.unwrap_or_else(|| body.trim().to_owned());

    match status {
        401 => Error::Unauthenticated,
        403 => Error::Forbidden,
        409 => Error::Conflict(detail),
        400 | 422 => Error::Validation {
            message: detail,
            fields: parsed.errors,
        },
        _ => Error::Upstream {
            operation,
            status: Some(status),
            detail,
        },
    }
}

impl AuthBackend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, Error> {
        let response = self
            .http
            .post(self.config.login_url.clone())
            .json(credentials)
            .send()
            .await?;

        let response = Self::ensure_success(response, "login")
            .await
            .map_err(login_failure)?;

        let body: LoginBody = decode_body(response, "login").await?;
        Ok(LoginGrant {
            token: body.token,
            user: body.user.into(),
            expires_at: body.expires_at,
            expires_in: body.expires_in,
        })
    }

    async fn logout(&self, token: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(self.config.logout_url.clone())
            .bearer_auth(token)
            .send()
            .await?;

        Self::ensure_success(response, "logout").await?;
        Ok(())
    }

    async fn register(&self, registration: &Registration) -> Result<UserProfile, Error> {
        let response = self
            .http
            .post(self.config.register_url.clone())
            .json(registration)
            .send()
            .await?;

        let response = Self::ensure_success(response, "register").await?;
        let user = match decode_body::<RegisterBody>(response, "register").await? {
            RegisterBody::Wrapped { user } | RegisterBody::Bare(user) => user,
        };
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BackendConfig {
        BackendConfig::new("https://api.casefile.test/api".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_default_endpoints_are_relative_to_base() {
        let config = test_config();

        assert_eq!(config.api_base().as_str(), "https://api.casefile.test/api/");
        assert_eq!(
            config.login_url().as_str(),
            "https://api.casefile.test/api/auth/login"
        );
        assert_eq!(
            config.logout_url().as_str(),
            "https://api.casefile.test/api/auth/logout"
        );
        assert_eq!(
            config.register_url().as_str(),
            "https://api.casefile.test/api/auth/register"
        );
        assert_eq!(
            config.endpoint("/complaints").unwrap().as_str(),
            "https://api.casefile.test/api/complaints"
        );
    }

    #[test]
    fn test_config_with_overrides() {
        let config = test_config()
            .with_login_url("https://sso.casefile.test/login".parse().unwrap());

        assert_eq!(config.login_url().as_str(), "https://sso.casefile.test/login");
        assert_eq!(
            config.logout_url().as_str(),
            "https://api.casefile.test/api/auth/logout"
        );
    }

    #[test]
    fn test_config_rejects_non_base_url() {
        let err = BackendConfig::new("mailto:desk@casefile.test".parse().unwrap()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_classify_conflict_and_validation() {
        let conflict = classify_failure("register", 409, r#"{"message":"username taken"}"#);
        assert!(matches!(conflict, Error::Conflict(ref m) if m == "username taken"));

        let invalid = classify_failure(
            "register",
            400,
            r#"{"message":"bad form","errors":{"email":"already used"}}"#,
        );
        let Error::Validation { message, fields } = invalid else {
            panic!("expected validation error");
        };
        assert_eq!(message, "bad form");
        assert_eq!(fields.get("email").map(String::as_str), Some("already used"));
    }

    #[test]
    fn test_classify_auth_and_upstream() {
        assert!(matches!(
            classify_failure("logout", 401, ""),
            Error::Unauthenticated
        ));
        assert!(matches!(classify_failure("logout", 403, ""), Error::Forbidden));

        let upstream = classify_failure("login", 503, "maintenance");
        assert!(matches!(
            upstream,
            Error::Upstream { operation: "login", status: Some(503), ref detail } if detail == "maintenance"
        ));
        assert!(upstream.is_upstream_unavailable());
    }

    #[test]
    fn test_login_rejection_is_invalid_credentials() {
        assert!(matches!(
            login_failure(classify_failure("login", 401, "")),
            Error::InvalidCredentials
        ));
        assert!(matches!(
            login_failure(classify_failure("login", 403, r#"{"message":"locked"}"#)),
            Error::InvalidCredentials
        ));
        assert!(matches!(
            login_failure(classify_failure("login", 500, "boom")),
            Error::Upstream { status: Some(500), .. }
        ));
    }

    #[test]
    fn test_garbled_success_body_is_upstream_error() {
        let err = parse_body::<LoginBody>("login", 200, b"<html>proxy error</html>").unwrap_err();
        assert!(matches!(
            err,
            Error::Upstream { operation: "login", status: Some(200), ref detail }
                if detail.starts_with("unexpected response body")
        ));
        assert!(!err.is_upstream_unavailable());

        let body = parse_body::<LoginBody>("login", 200, br#"{"token":"t","user":{"id":1,"username":"kim"}}"#)
            .unwrap();
        assert_eq!(body.token, "t");
    }

    #[test]
    fn test_login_body_shapes() {
        let body: LoginBody = serde_json::from_str(
            r#"{"accessToken":"t","user":{"id":12,"username":"amina","role":"ROLE_CITIZEN"},"expiresIn":3600}"#,
        )
        .unwrap();
        assert_eq!(body.token, "t");
        assert_eq!(body.expires_in, Some(3600));
        let user: UserProfile = body.user.into();
        assert_eq!(user.id, UserId::from("12"));
        assert_eq!(user.role.as_deref(), Some("ROLE_CITIZEN"));

        let body: LoginBody = serde_json::from_str(
            r#"{"token":"t","user":{"id":"u-1","username":"kim"},"expiresAt":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(body.expires_at.unwrap().year(), 2030);
        assert!(body.user.role.is_none());
    }

    #[test]
    fn test_register_body_shapes() {
        for raw in [
            r#"{"user":{"id":3,"username":"amina","email":"a@x.org"}}"#,
            r#"{"id":3,"username":"amina","email":"a@x.org"}"#,
        ] {
            let user = match serde_json::from_str::<RegisterBody>(raw).unwrap() {
                RegisterBody::Wrapped { user } | RegisterBody::Bare(user) => user,
            };
            assert_eq!(user.username, "amina");
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let config = BackendConfig::new("http://127.0.0.1:9/api".parse().unwrap()).unwrap();
        let backend = HttpBackend::new(config);

        let err = backend
            .login(&Credentials::new("amina", "password1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.is_upstream_unavailable());
    }
}
