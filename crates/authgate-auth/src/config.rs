//! Gateway configuration.
//!
//! All sections deserialize with sensible defaults so a bare config file
//! still produces a runnable (if useless) gateway. [`GatewayConfig::validate`]
//! catches the values that have no meaningful default, such as the client
//! secret.
//!
//! # Example
//!
//! ```ignore
//! use authgate_auth::config::GatewayConfig;
//!
//! let config = GatewayConfig::default()
//!     .with_authority("https://idp.example.com/realms/myrealm")
//!     .with_client("gateway", "s3cr3t");
//! config.validate()?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required value is missing or empty.
    #[error("missing configuration value: {0}")]
    Missing(String),

    /// A value is present but unusable.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why it was refused.
        reason: String,
    },
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identity provider connection settings.
    pub keycloak: KeycloakConfig,
    /// User-activity microservice settings.
    pub activity: ActivityConfig,
    /// Outgoing confirmation-mail settings.
    pub smtp: SmtpConfig,
    /// Service-token cache settings.
    pub token_cache: TokenCacheConfig,
}

impl GatewayConfig {
    /// Sets the realm authority URL.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.keycloak.authority = authority.into();
        self
    }

    /// Sets the admin REST base URL for the realm.
    #[must_use]
    pub fn with_admin_base(mut self, admin_base: impl Into<String>) -> Self {
        self.keycloak.admin_base = admin_base.into();
        self
    }

    /// Sets the confidential client used for both grants.
    #[must_use]
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.keycloak.client_id = client_id.into();
        self.keycloak.client_secret = client_secret.into();
        self
    }

    /// Sets the activity microservice base URL.
    #[must_use]
    pub fn with_activity_base(mut self, base_url: impl Into<String>) -> Self {
        self.activity.base_url = base_url.into();
        self
    }

    /// Enables the service-token cache with the given lifetime.
    #[must_use]
    pub fn with_token_cache(mut self, ttl: Duration) -> Self {
        self.token_cache.enabled = true;
        self.token_cache.ttl = ttl;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keycloak.validate()?;
        self.activity.validate()?;
        self.smtp.validate()?;
        Ok(())
    }
}

/// Identity provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeycloakConfig {
    /// Realm authority URL. The OpenID Connect token endpoint lives at
    /// `{authority}/protocol/openid-connect/token`.
    pub authority: String,
    /// Admin REST base URL for the realm, e.g.
    /// `https://idp.example.com/admin/realms/myrealm`.
    pub admin_base: String,
    /// Confidential client id.
    pub client_id: String,
    /// Confidential client secret.
    pub client_secret: String,
    /// Per-request timeout for identity provider calls.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            authority: "http://localhost:8080/realms/master".to_string(),
            admin_base: "http://localhost:8080/admin/realms/master".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl KeycloakConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing("keycloak.client_id".into()));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Missing("keycloak.client_secret".into()));
        }
        for (field, value) in [
            ("keycloak.authority", &self.authority),
            ("keycloak.admin_base", &self.admin_base),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Missing(field.into()));
            }
            Url::parse(value).map_err(|err| ConfigError::Invalid {
                field: field.into(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

/// User-activity microservice settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Base URL of the activity microservice.
    pub base_url: String,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5183/api/Usuarios".to_string(),
        }
    }
}

impl ActivityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing("activity.base_url".into()));
        }
        Url::parse(&self.base_url).map_err(|err| ConfigError::Invalid {
            field: "activity.base_url".into(),
            reason: err.to_string(),
        })?;
        Ok(())
    }
}

/// Outgoing confirmation-mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Whether confirmation mail is sent at all. When disabled the gateway
    /// logs instead of connecting to an SMTP relay.
    pub enabled: bool,
    /// SMTP relay host.
    pub host: String,
    /// SMTP relay port.
    pub port: u16,
    /// Sender address.
    pub from: String,
    /// Optional relay username.
    pub username: Option<String>,
    /// Optional relay password.
    pub password: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            from: String::new(),
            username: None,
            password: None,
        }
    }
}

impl SmtpConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.host.is_empty() {
            return Err(ConfigError::Missing("smtp.host".into()));
        }
        if self.from.is_empty() {
            return Err(ConfigError::Missing("smtp.from".into()));
        }
        Ok(())
    }
}

/// Service-token cache settings.
///
/// Disabled by default; each workflow invocation then acquires a fresh
/// client-credentials token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenCacheConfig {
    /// Whether service tokens are cached between workflow invocations.
    pub enabled: bool,
    /// Maximum cached token lifetime. The token's own `expires_in` hint
    /// shortens this further when present.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(3600),
        }
    }
}
