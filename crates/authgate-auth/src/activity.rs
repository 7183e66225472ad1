//! User-activity microservice client.
//!
//! The gateway publishes an activity event after a successful login or
//! password change and can look up the service's own user record by email.
//! Publication is load-bearing: workflows that require the activity record
//! fail when the service refuses it.

use serde::{Deserialize, Serialize};

use crate::config::ActivityConfig;

/// Why an activity publication failed.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// The service could not be reached.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The service answered but did not accept the event.
    #[error("HTTP {status}: {detail}")]
    Refused {
        /// Response status code.
        status: u16,
        /// Response body.
        detail: String,
    },
}

#[derive(Debug, Serialize)]
struct ActivityEvent<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    action: &'a str,
}

/// The activity service's view of a user.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryUser {
    /// The user id in the activity service.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// The role id attached to the user.
    #[serde(rename = "roleId", default)]
    pub role_id: Option<String>,
    /// The user's email.
    #[serde(default)]
    pub email: String,
}

/// Client for the user-activity microservice.
#[derive(Debug, Clone)]
pub struct ActivityClient {
    http: reqwest::Client,
    base: String,
}

impl ActivityClient {
    /// Creates a client from the activity settings.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ActivityConfig) -> Self {
        Self {
            http,
            base: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Publishes an activity event for a user.
    pub async fn publish_activity(&self, user_id: &str, action: &str) -> Result<(), ActivityError> {
        let event = ActivityEvent { user_id, action };
        let response = self
            .http
            .post(format!("{}/publishActivity", self.base))
            .json(&event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ActivityError::Refused {
                status: status.as_u16(),
                detail,
            });
        }
        tracing::debug!(user_id, action, "activity published");
        Ok(())
    }

    /// Looks up the activity service's user record by email, on behalf of
    /// an authenticated caller. Returns `Ok(None)` when the service has no
    /// matching record.
    pub async fn user_by_email(
        &self,
        email: &str,
        bearer: &str,
    ) -> Result<Option<DirectoryUser>, reqwest::Error> {
        let response = self
            .http
            .get(format!("{}/getUsuarioByCorreo", self.base))
            .query(&[("email", email)])
            .bearer_auth(bearer)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(email, status = %response.status(), "user lookup refused");
            return Ok(None);
        }
        Ok(response.json().await.ok())
    }
}
