//! Admin REST API client for the identity provider realm.
//!
//! Every call is authenticated with a service token supplied by the caller;
//! the directory never acquires tokens itself, so one token can be threaded
//! through all the steps of a workflow invocation.
//!
//! Refusals the caller can act on (user not created, role missing, password
//! not accepted) come back as `Ok(false)` / `Ok(None)` and are classified by
//! the engine; transport failures propagate as `reqwest::Error`.

use serde::Deserialize;
use serde_json::json;

use crate::config::KeycloakConfig;
use crate::keycloak::ServiceToken;

/// A user to be created in the identity provider. The email doubles as the
/// username.
#[derive(Debug, Clone)]
pub struct UserDraft {
    /// Email address, also used as the username.
    pub email: String,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Initial password, stored as a non-temporary credential.
    pub password: String,
}

/// Why the reset-email trigger failed.
#[derive(Debug, thiserror::Error)]
pub enum ResetEmailError {
    /// The provider could not be reached.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The provider answered but refused to dispatch the email.
    #[error("HTTP {status}: {detail}")]
    Refused {
        /// Response status code.
        status: u16,
        /// Response body, surfaced to the caller.
        detail: String,
    },
}

#[derive(Debug, Deserialize)]
struct UserRepresentation {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleRepresentation {
    id: String,
    name: String,
}

/// User directory operations against the realm's admin REST API.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    http: reqwest::Client,
    base: String,
}

impl UserDirectory {
    /// Creates a directory client from the realm settings.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &KeycloakConfig) -> Self {
        Self {
            http,
            base: config.admin_base.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Looks up a user id by email. Returns `Ok(None)` when the lookup is
    /// refused or matches nothing.
    pub async fn find_user_id_by_email(
        &self,
        email: &str,
        token: &ServiceToken,
    ) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .http
            .get(self.endpoint("/users"))
            .bearer_auth(token.as_str())
            .query(&[("email", email)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "user lookup refused");
            return Ok(None);
        }
        let users: Vec<UserRepresentation> = response.json().await?;
        Ok(users
            .into_iter()
            .map(|user| user.id)
            .find(|id| !id.is_empty()))
    }

    /// Creates an enabled user with a permanent password credential.
    /// Returns the new user's id, extracted from the `Location` header of
    /// the 201 response, or `Ok(None)` when creation was refused.
    pub async fn create_user(
        &self,
        draft: &UserDraft,
        token: &ServiceToken,
    ) -> Result<Option<String>, reqwest::Error> {
        let body = json!({
            "username": draft.email,
            "email": draft.email,
            "firstName": draft.given_name,
            "lastName": draft.family_name,
            "enabled": true,
            "credentials": [{
                "type": "password",
                "value": draft.password,
                "temporary": false
            }]
        });
        let response = self
            .http
            .post(self.endpoint("/users"))
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %detail, email = %draft.email, "user creation refused");
            return Ok(None);
        }
        let user_id = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| location.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);
        if user_id.is_none() {
            tracing::warn!(email = %draft.email, "created user but Location header had no id");
        }
        Ok(user_id)
    }

    /// Assigns a realm role to a user. Returns `Ok(false)` when the role
    /// does not exist or the mapping is refused.
    pub async fn assign_realm_role(
        &self,
        user_id: &str,
        role_name: &str,
        token: &ServiceToken,
    ) -> Result<bool, reqwest::Error> {
        let Some(role) = self.find_realm_role(role_name, token).await? else {
            tracing::warn!(role = role_name, "realm role not found");
            return Ok(false);
        };
        let body = json!([{
            "id": role.id,
            "name": role.name,
            "composite": false
        }]);
        let response = self
            .http
            .post(self.endpoint(&format!("/users/{user_id}/role-mappings/realm")))
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            tracing::warn!(%status, role = role_name, user_id, "role mapping refused");
            return Ok(false);
        }
        Ok(true)
    }

    async fn find_realm_role(
        &self,
        role_name: &str,
        token: &ServiceToken,
    ) -> Result<Option<RoleRepresentation>, reqwest::Error> {
        let response = self
            .http
            .get(self.endpoint(&format!("/roles/{role_name}")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(response.json().await.ok())
    }

    /// Triggers the provider's address-verification email for the user
    /// matching the given email. Returns `Ok(false)` when the user is
    /// unknown or the provider refuses.
    pub async fn send_verification_email(
        &self,
        email: &str,
        token: &ServiceToken,
    ) -> Result<bool, reqwest::Error> {
        let Some(user_id) = self.find_user_id_by_email(email, token).await? else {
            tracing::warn!(email, "cannot send verification email for unknown user");
            return Ok(false);
        };
        let response = self
            .http
            .put(self.endpoint(&format!("/users/{user_id}/send-verify-email")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Triggers the provider's password-reset email for a known user id.
    pub async fn send_reset_email(
        &self,
        user_id: &str,
        token: &ServiceToken,
    ) -> Result<(), ResetEmailError> {
        let response = self
            .http
            .put(self.endpoint(&format!("/users/{user_id}/reset-password-email")))
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ResetEmailError::Refused {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(())
    }

    /// Replaces a user's password with a permanent credential. Returns
    /// `Ok(false)` when the provider refuses the update.
    pub async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
        token: &ServiceToken,
    ) -> Result<bool, reqwest::Error> {
        let body = json!({
            "type": "password",
            "value": new_password,
            "temporary": false
        });
        let response = self
            .http
            .put(self.endpoint(&format!("/users/{user_id}/reset-password")))
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            tracing::warn!(%status, user_id, "password update refused");
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn directory_for(server: &MockServer) -> UserDirectory {
        let config = KeycloakConfig {
            admin_base: format!("{}/admin/realms/app", server.uri()),
            ..KeycloakConfig::default()
        };
        UserDirectory::new(reqwest::Client::new(), &config)
    }

    fn token() -> ServiceToken {
        ServiceToken::for_tests("svc-token")
    }

    #[tokio::test]
    async fn test_find_user_id_by_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/app/users"))
            .and(query_param("email", "alice@example.com"))
            .and(header("authorization", "Bearer svc-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "user-1", "email": "alice@example.com" }
            ])))
            .mount(&server)
            .await;

        let found = directory_for(&server)
            .find_user_id_by_email("alice@example.com", &token())
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_find_user_id_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/app/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let found = directory_for(&server)
            .find_user_id_by_email("nobody@example.com", &token())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_user_extracts_id_from_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/realms/app/users"))
            .and(body_json(serde_json::json!({
                "username": "alice@example.com",
                "email": "alice@example.com",
                "firstName": "Alice",
                "lastName": "Doe",
                "enabled": true,
                "credentials": [{ "type": "password", "value": "pw", "temporary": false }]
            })))
            .respond_with(ResponseTemplate::new(201).insert_header(
                "location",
                format!("{}/admin/realms/app/users/new-user-9", server.uri()).as_str(),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let draft = UserDraft {
            email: "alice@example.com".into(),
            given_name: "Alice".into(),
            family_name: "Doe".into(),
            password: "pw".into(),
        };
        let created = directory_for(&server)
            .create_user(&draft, &token())
            .await
            .unwrap();
        assert_eq!(created.as_deref(), Some("new-user-9"));
    }

    #[tokio::test]
    async fn test_create_user_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/realms/app/users"))
            .respond_with(ResponseTemplate::new(409).set_body_string("User exists"))
            .mount(&server)
            .await;

        let draft = UserDraft {
            email: "alice@example.com".into(),
            given_name: "Alice".into(),
            family_name: "Doe".into(),
            password: "pw".into(),
        };
        let created = directory_for(&server)
            .create_user(&draft, &token())
            .await
            .unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn test_assign_realm_role() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/app/roles/ADMIN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "role-3",
                "name": "ADMIN"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/admin/realms/app/users/user-1/role-mappings/realm"))
            .and(body_json(serde_json::json!([
                { "id": "role-3", "name": "ADMIN", "composite": false }
            ])))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let assigned = directory_for(&server)
            .assign_realm_role("user-1", "ADMIN", &token())
            .await
            .unwrap();
        assert!(assigned);
    }

    #[tokio::test]
    async fn test_assign_unknown_role() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/app/roles/GHOST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let assigned = directory_for(&server)
            .assign_realm_role("user-1", "GHOST", &token())
            .await
            .unwrap();
        assert!(!assigned);
    }

    #[tokio::test]
    async fn test_send_reset_email_refused_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/admin/realms/app/users/user-1/reset-password-email"))
            .respond_with(ResponseTemplate::new(502).set_body_string("smtp backend down"))
            .mount(&server)
            .await;

        let err = directory_for(&server)
            .send_reset_email("user-1", &token())
            .await
            .unwrap_err();
        match err {
            ResetEmailError::Refused { status, detail } => {
                assert_eq!(status, 502);
                assert_eq!(detail, "smtp backend down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_password_requires_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/admin/realms/app/users/user-1/reset-password"))
            .and(body_json(serde_json::json!({
                "type": "password",
                "value": "new-pw",
                "temporary": false
            })))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let updated = directory_for(&server)
            .set_password("user-1", "new-pw", &token())
            .await
            .unwrap();
        assert!(updated);
    }

    #[tokio::test]
    async fn test_set_password_refused() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/admin/realms/app/users/user-1/reset-password"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let updated = directory_for(&server)
            .set_password("user-1", "weak", &token())
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_send_verification_email_for_unknown_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/app/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/admin/realms/app/users/user-1/send-verify-email"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let sent = directory_for(&server)
            .send_verification_email("nobody@example.com", &token())
            .await
            .unwrap();
        assert!(!sent);
    }
}
