//! Workflow orchestration.
//!
//! Each public method drives one workflow end to end: acquire whatever
//! token the workflow needs, run the identity provider steps in order,
//! notify the activity service where required, and append an audit record
//! last. Steps classify their own failures; the engine decides whether a
//! failure halts the workflow ([`Rejection`] or fault) or only degrades it
//! (verification email, confirmation email, audit append).
//!
//! A single service token is acquired per invocation and threaded through
//! every administrative step, so a workflow never observes a token rotation
//! mid-flight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityClient, ActivityError};
use crate::audit::{events, AuditRecord, AuditSink, Severity};
use crate::error::{Rejection, WorkflowError};
use crate::identity::{IdentityResolver, ResolveError};
use crate::keycloak::{IdpTokens, UserDirectory, UserDraft};
use crate::mailer::ConfirmationMailer;

/// Credentials presented at login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// The user's email.
    pub email: String,
    /// The user's password.
    pub password: String,
}

/// Successful login outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token for downstream calls.
    pub access_token: String,
    /// Refresh token, when issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// The email that authenticated.
    pub email: String,
    /// Resolved user identifier.
    pub user_id: String,
    /// Resolved primary role, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A new account to register.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Email address, also used as the username.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Initial password.
    pub password: String,
    /// Realm role to assign.
    pub role: String,
}

/// Successful registration outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// Identifier of the created user.
    pub user_id: String,
    /// The assigned role.
    pub role: String,
}

/// Body of an authenticated password update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateRequest {
    /// The replacement password.
    pub new_password: String,
}

/// Drives the authentication workflows.
pub struct AuthWorkflowService {
    tokens: Arc<dyn IdpTokens>,
    directory: UserDirectory,
    resolver: IdentityResolver,
    activity: ActivityClient,
    audit: Arc<dyn AuditSink>,
    mailer: Arc<dyn ConfirmationMailer>,
}

impl AuthWorkflowService {
    /// Assembles the engine from its collaborators.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn IdpTokens>,
        directory: UserDirectory,
        resolver: IdentityResolver,
        activity: ActivityClient,
        audit: Arc<dyn AuditSink>,
        mailer: Arc<dyn ConfirmationMailer>,
    ) -> Self {
        Self {
            tokens,
            directory,
            resolver,
            activity,
            audit,
            mailer,
        }
    }

    /// Authenticates a user, resolves their identity and primary role, and
    /// records the login.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, WorkflowError> {
        let Some(grant) = self
            .tokens
            .authenticate(&request.email, &request.password)
            .await?
        else {
            tracing::info!(email = %request.email, "login refused by identity provider");
            return Err(Rejection::InvalidCredentials.into());
        };

        let identity = match self
            .resolver
            .resolve(&grant.access_token, grant.scope.as_deref())
        {
            Ok(identity) => identity,
            Err(ResolveError::UndecodableToken(detail)) => {
                tracing::warn!(%detail, "access token undecodable after successful grant");
                return Err(Rejection::InvalidCredentials.into());
            }
            Err(ResolveError::NoIdentityClaim) => {
                return Err(Rejection::UnresolvedIdentity.into());
            }
        };

        self.activity
            .publish_activity(&identity.user_id, "login")
            .await
            .map_err(|err| activity_fault("login", err))?;

        self.record_audit(
            &identity.user_id,
            events::LOGIN,
            format!("{} logged in", request.email),
        )
        .await;

        Ok(LoginResponse {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in: grant.expires_in,
            email: request.email.clone(),
            user_id: identity.user_id,
            role: identity.primary_role,
        })
    }

    /// Creates a user in the identity provider, assigns the requested realm
    /// role, and triggers address verification.
    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, WorkflowError> {
        let token = self.tokens.service_token().await?;

        let draft = UserDraft {
            email: request.email.clone(),
            given_name: request.first_name.clone(),
            family_name: request.last_name.clone(),
            password: request.password.clone(),
        };
        let Some(user_id) = self.directory.create_user(&draft, &token).await? else {
            return Err(Rejection::UserCreation.into());
        };

        // The user exists in the provider from here on; a failed role
        // assignment leaves it in place rather than deleting it.
        if !self
            .directory
            .assign_realm_role(&user_id, &request.role, &token)
            .await?
        {
            return Err(Rejection::RoleAssignment {
                role: request.role.clone(),
            }
            .into());
        }

        match self
            .directory
            .send_verification_email(&request.email, &token)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(email = %request.email, "verification email not dispatched");
            }
            Err(err) => {
                tracing::warn!(email = %request.email, error = %err, "verification email failed");
            }
        }

        self.record_audit(
            &user_id,
            events::REGISTER,
            format!("{} registered with role {}", request.email, request.role),
        )
        .await;

        Ok(RegistrationResponse {
            user_id,
            role: request.role.clone(),
        })
    }

    /// Triggers the provider's password-reset email for the user matching
    /// the given email.
    pub async fn reset_password(&self, email: &str) -> Result<(), WorkflowError> {
        let token = self.tokens.service_token().await?;

        let Some(user_id) = self.directory.find_user_id_by_email(email, &token).await? else {
            return Err(Rejection::UserNotFound.into());
        };

        self.directory
            .send_reset_email(&user_id, &token)
            .await
            .map_err(|err| match err {
                crate::keycloak::ResetEmailError::Refused { status, detail } => {
                    WorkflowError::Rejected(Rejection::ResetEmail {
                        detail: format!("HTTP {status}: {detail}"),
                    })
                }
                crate::keycloak::ResetEmailError::Transport(source) => {
                    WorkflowError::EmailDispatch(source)
                }
            })?;

        self.record_audit(
            &user_id,
            events::RESET_PASSWORD,
            format!("reset email dispatched to {email}"),
        )
        .await;
        Ok(())
    }

    /// Replaces the authenticated user's password, records the change with
    /// the activity service, and sends a confirmation email.
    pub async fn update_password(
        &self,
        session_email: Option<&str>,
        request: &PasswordUpdateRequest,
    ) -> Result<(), WorkflowError> {
        let Some(email) = session_email.filter(|email| !email.is_empty()) else {
            return Err(Rejection::MissingSessionEmail.into());
        };

        let token = self.tokens.service_token().await?;

        let Some(user_id) = self.directory.find_user_id_by_email(email, &token).await? else {
            return Err(Rejection::UserNotFound.into());
        };

        if !self
            .directory
            .set_password(&user_id, &request.new_password, &token)
            .await?
        {
            return Err(Rejection::PasswordUpdate.into());
        }

        // The password is already changed; the activity record is still
        // required for the workflow to count as complete.
        self.activity
            .publish_activity(&user_id, "password update")
            .await
            .map_err(|err| activity_fault("password update", err))?;

        if let Err(err) = self.mailer.send_password_updated(email).await {
            tracing::warn!(email, error = %err, "confirmation email failed");
        }

        self.record_audit(
            &user_id,
            events::UPDATE_PASSWORD,
            format!("password updated for {email}"),
        )
        .await;
        Ok(())
    }

    async fn record_audit(&self, subject_id: &str, event_type: &str, message: String) {
        let record = AuditRecord::new(subject_id, Severity::Info, event_type, message);
        if let Err(err) = self.audit.append(record).await {
            tracing::warn!(subject_id, event_type, error = %err, "audit append failed");
        }
    }
}

fn activity_fault(action: &str, err: ActivityError) -> WorkflowError {
    tracing::error!(action, error = %err, "activity publication failed");
    WorkflowError::activity_publish(action, err.to_string())
}
