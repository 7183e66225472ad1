//! OpenID Connect token acquisition.
//!
//! Two grants against the same token endpoint: `client_credentials` for the
//! gateway's own service token (administrative calls) and `password` for
//! end-user logins. The password grant authenticates the client over HTTP
//! Basic; the client-credentials grant carries the client in the form body.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::KeycloakConfig;
use crate::error::ServiceTokenError;

/// Path of the OpenID Connect token endpoint below the realm authority.
const TOKEN_PATH: &str = "protocol/openid-connect/token";

/// A client-credentials access token. `Debug` redacts the value so the
/// token never lands in logs.
#[derive(Clone)]
pub struct ServiceToken {
    value: String,
    expires_in: Option<u64>,
}

impl ServiceToken {
    /// The bearer token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Lifetime hint from the token response, in seconds.
    #[must_use]
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

#[cfg(test)]
impl ServiceToken {
    pub(crate) fn for_tests(value: &str) -> Self {
        Self {
            value: value.to_string(),
            expires_in: None,
        }
    }
}

impl std::fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceToken")
            .field("value", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token endpoint response for the password grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,
    /// Refresh token, when the grant issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Source of tokens from the identity provider.
///
/// The engine depends on this trait so a caching layer can sit in front of
/// the real client.
#[async_trait]
pub trait IdpTokens: Send + Sync {
    /// Acquires a service token via the client-credentials grant.
    async fn service_token(&self) -> Result<ServiceToken, ServiceTokenError>;

    /// Authenticates an end user via the password grant. Returns `Ok(None)`
    /// when the provider refuses the credentials; transport failures
    /// propagate.
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TokenResponse>, reqwest::Error>;
}

/// Direct client for the identity provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    /// Creates a token client from the realm settings.
    pub fn new(http: reqwest::Client, config: &KeycloakConfig) -> Result<Self, url::ParseError> {
        let token_url = Url::parse(&format!(
            "{}/{TOKEN_PATH}",
            config.authority.trim_end_matches('/')
        ))?;
        Ok(Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl IdpTokens for TokenClient {
    async fn service_token(&self) -> Result<ServiceToken, ServiceTokenError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "client-credentials grant refused");
            return Err(ServiceTokenError::Rejected(format!("HTTP {status}: {detail}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| ServiceTokenError::Rejected(format!("malformed token response: {err}")))?;
        if body.access_token.is_empty() {
            return Err(ServiceTokenError::Rejected(
                "no access token in grant response".into(),
            ));
        }
        Ok(ServiceToken {
            value: body.access_token,
            expires_in: body.expires_in,
        })
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TokenResponse>, reqwest::Error> {
        let params = [
            ("grant_type", "password"),
            ("username", email),
            ("password", password),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, "password grant refused");
            return Ok(None);
        }
        match response.json::<TokenResponse>().await {
            Ok(body) if !body.access_token.is_empty() => Ok(Some(body)),
            Ok(_) => {
                tracing::warn!("password grant succeeded but returned no access token");
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(error = %err, "unreadable password grant response");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TokenClient {
        let config = KeycloakConfig {
            authority: server.uri(),
            client_id: "gateway".into(),
            client_secret: "s3cr3t".into(),
            ..KeycloakConfig::default()
        };
        TokenClient::new(reqwest::Client::new(), &config).unwrap()
    }

    #[tokio::test]
    async fn test_service_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=gateway"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "svc-token",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server).service_token().await.unwrap();
        assert_eq!(token.as_str(), "svc-token");
        assert_eq!(token.expires_in(), Some(300));
    }

    #[tokio::test]
    async fn test_service_token_grant_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/protocol/openid-connect/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = client_for(&server).service_token().await.unwrap_err();
        assert!(matches!(err, ServiceTokenError::Rejected(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_service_token_missing_in_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/protocol/openid-connect/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).service_token().await.unwrap_err();
        assert!(matches!(err, ServiceTokenError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_authenticate_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/protocol/openid-connect/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-token",
                "refresh_token": "refresh",
                "expires_in": 60,
                "scope": "openid profile ADMIN"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .authenticate("alice@example.com", "pw")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.access_token, "user-token");
        assert_eq!(response.scope.as_deref(), Some("openid profile ADMIN"));
    }

    #[tokio::test]
    async fn test_authenticate_refused_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/protocol/openid-connect/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .authenticate("alice@example.com", "wrong")
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_service_token_debug_redacts_value() {
        let token = ServiceToken {
            value: "super-secret".into(),
            expires_in: Some(60),
        };
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_token_url_tolerates_trailing_slash() {
        let config = KeycloakConfig {
            authority: "https://idp.example.com/realms/app/".into(),
            ..KeycloakConfig::default()
        };
        let client = TokenClient::new(reqwest::Client::new(), &config).unwrap();
        assert_eq!(
            client.token_url.as_str(),
            "https://idp.example.com/realms/app/protocol/openid-connect/token"
        );
    }
}
