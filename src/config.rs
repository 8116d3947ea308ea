use url::Url;

use crate::client::BackendConfig;
use crate::error::Error;

/// Paths the guards route between.
#[derive(Debug, Clone)]
pub struct AccessSettings {
    pub(crate) login_path: String,
    pub(crate) public_prefix: String,
    pub(crate) admin_prefix: String,
    pub(crate) default_landing: String,
    pub(crate) elevated_landing: String,
    pub(crate) return_url_param: String,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".into(),
            public_prefix: "/auth".into(),
            admin_prefix: "/admin".into(),
            default_landing: "/dashboard".into(),
            elevated_landing: "/admin/dashboard".into(),
            return_url_param: "returnUrl".into(),
        }
    }
}

impl AccessSettings {
    /// Where unauthenticated navigations are sent.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Everything under this prefix is reachable without signing in.
    #[must_use]
    pub fn with_public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_prefix = prefix.into();
        self
    }

    /// Elevated roles bypass per-route role lists under this prefix.
    #[must_use]
    pub fn with_admin_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.admin_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_default_landing(mut self, path: impl Into<String>) -> Self {
        self.default_landing = path.into();
        self
    }

    #[must_use]
    pub fn with_elevated_landing(mut self, path: impl Into<String>) -> Self {
        self.elevated_landing = path.into();
        self
    }

    #[must_use]
    pub fn with_return_url_param(mut self, name: impl Into<String>) -> Self {
        self.return_url_param = name.into();
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    #[must_use]
    pub fn admin_prefix(&self) -> &str {
        &self.admin_prefix
    }

    #[must_use]
    pub fn default_landing(&self) -> &str {
        &self.default_landing
    }

    #[must_use]
    pub fn elevated_landing(&self) -> &str {
        &self.elevated_landing
    }

    #[must_use]
    pub fn return_url_param(&self) -> &str {
        &self.return_url_param
    }

    /// Every configured path must be absolute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first relative path.
    pub fn validate(&self) -> Result<(), Error> {
        let paths = [
            ("login_path", &self.login_path),
            ("public_prefix", &self.public_prefix),
            ("admin_prefix", &self.admin_prefix),
            ("default_landing", &self.default_landing),
            ("elevated_landing", &self.elevated_landing),
        ];
        for (name, path) in paths {
            if !path.starts_with('/') {
                return Err(Error::Config(format!("{name} must start with '/': {path:?}")));
            }
        }
        if self.return_url_param.is_empty() {
            return Err(Error::Config("return_url_param must not be empty".into()));
        }
        Ok(())
    }
}

/// Portal client configuration.
///
/// Required field (`backend`) is a constructor parameter.
///
/// Use [`from_env()`](PortalConfig::from_env) for convention-based setup,
/// or [`new()`](PortalConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub(crate) backend: BackendConfig,
    pub(crate) access: AccessSettings,
    pub(crate) storage_key: String,
}

pub(crate) const DEFAULT_STORAGE_KEY: &str = "casefile.session";

impl PortalConfig {
    #[must_use]
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            access: AccessSettings::default(),
            storage_key: DEFAULT_STORAGE_KEY.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CASEFILE_API_URL`: backend API base URL
    ///
    /// # Optional env vars
    /// - `CASEFILE_LOGIN_URL`, `CASEFILE_LOGOUT_URL`, `CASEFILE_REGISTER_URL`: endpoint overrides
    /// - `CASEFILE_LOGIN_PATH`: client login route (default `/auth/login`)
    /// - `CASEFILE_PUBLIC_PREFIX`: unauthenticated area (default `/auth`)
    /// - `CASEFILE_ADMIN_PREFIX`: administrative area (default `/admin`)
    /// - `CASEFILE_DEFAULT_LANDING`: landing for citizens (default `/dashboard`)
    /// - `CASEFILE_ELEVATED_LANDING`: landing for officers and admins (default `/admin/dashboard`)
    /// - `CASEFILE_STORAGE_KEY`: key of the persisted session (default `casefile.session`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing, URLs are
    /// invalid, or a path is not absolute.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let parse_url = |name: &str, raw: String| -> Result<Url, Error> {
            raw.parse()
                .map_err(|e| Error::Config(format!("{name}: {e}")))
        };

        let api_url = var("CASEFILE_API_URL")
            .ok_or_else(|| Error::Config("CASEFILE_API_URL is required".into()))?;
        let mut backend = BackendConfig::new(parse_url("CASEFILE_API_URL", api_url)?)?;

        if let Some(raw) = var("CASEFILE_LOGIN_URL") {
            backend = backend.with_login_url(parse_url("CASEFILE_LOGIN_URL", raw)?);
        }
        if let Some(raw) = var("CASEFILE_LOGOUT_URL") {
            backend = backend.with_logout_url(parse_url("CASEFILE_LOGOUT_URL", raw)?);
        }
        if let Some(raw) = var("CASEFILE_REGISTER_URL") {
            backend = backend.with_register_url(parse_url("CASEFILE_REGISTER_URL", raw)?);
        }

        let mut access = AccessSettings::default();
        if let Some(path) = var("CASEFILE_LOGIN_PATH") {
            access = access.with_login_path(path);
        }
        if let Some(prefix) = var("CASEFILE_PUBLIC_PREFIX") {
            access = access.with_public_prefix(prefix);
        }
        if let Some(prefix) = var("CASEFILE_ADMIN_PREFIX") {
            access = access.with_admin_prefix(prefix);
        }
        if let Some(path) = var("CASEFILE_DEFAULT_LANDING") {
            access = access.with_default_landing(path);
        }
        if let Some(path) = var("CASEFILE_ELEVATED_LANDING") {
            access = access.with_elevated_landing(path);
        }
        access.validate()?;

        let mut config = Self::new(backend).with_access(access);
        if let Some(key) = var("CASEFILE_STORAGE_KEY") {
            config = config.with_storage_key(key);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_access(mut self, access: AccessSettings) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    #[must_use]
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    #[must_use]
    pub fn access(&self) -> &AccessSettings {
        &self.access
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}
