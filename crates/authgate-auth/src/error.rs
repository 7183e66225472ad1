//! Workflow error types.
//!
//! Failures fall into two classes (plus warning-only steps, which never
//! surface here and are only logged):
//!
//! - [`Rejection`] - expected, caller-correctable outcomes with stable
//!   messages (bad credentials, user not found, role assignment refused).
//! - every other [`WorkflowError`] variant - a fault: infrastructure or
//!   downstream failure. Faults are logged with full detail internally;
//!   callers receive a generic message.
//!
//! Each workflow step classifies its own failures; the engine only decides
//! whether to halt or continue.

/// Expected, caller-correctable workflow outcomes.
///
/// The `Display` text of each variant is part of the caller-facing contract
/// and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The identity provider refused the password grant.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Authentication succeeded but no identity claim could be resolved
    /// from the access token.
    #[error("cannot determine user identity")]
    UnresolvedIdentity,

    /// The identity provider did not create the user.
    #[error("could not create user")]
    UserCreation,

    /// The realm role could not be assigned to the newly created user.
    /// The user already exists in the identity provider at this point;
    /// no compensating delete is attempted.
    #[error("could not assign role {role}")]
    RoleAssignment {
        /// The role that could not be assigned.
        role: String,
    },

    /// No user record matches the supplied email.
    #[error("user not found")]
    UserNotFound,

    /// The identity provider refused the password update.
    #[error("could not update password")]
    PasswordUpdate,

    /// The identity provider refused to dispatch the reset email.
    #[error("could not send reset email: {detail}")]
    ResetEmail {
        /// Detail from the identity provider response, surfaced to the caller.
        detail: String,
    },

    /// The authenticated session carries no email claim.
    #[error("no authenticated user email")]
    MissingSessionEmail,
}

impl Rejection {
    /// Returns `true` if this rejection means the caller is not
    /// authenticated (maps to 401 rather than 400).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::MissingSessionEmail)
    }
}

/// Errors from acquiring a client-credentials service token.
///
/// Transport failure and the provider rejecting the grant are distinct
/// conditions and must stay distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum ServiceTokenError {
    /// The token endpoint could not be reached.
    #[error("transport failure while requesting service token: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered but refused the grant or returned no
    /// access token.
    #[error("identity provider rejected the client-credentials grant: {0}")]
    Rejected(String),
}

/// Errors that can occur while driving a workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// An expected, caller-correctable outcome.
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// No service token could be obtained for administrative calls.
    #[error("cannot obtain service token: {0}")]
    ServiceToken(#[from] ServiceTokenError),

    /// A downstream HTTP call failed at the transport level.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The user-activity microservice did not accept the activity event.
    /// Workflows that require the activity record treat this as terminal
    /// even though the preceding steps succeeded.
    #[error("activity publication failed for action '{action}': {detail}")]
    ActivityPublish {
        /// The activity action that was being published.
        action: String,
        /// Status or transport detail.
        detail: String,
    },

    /// The reset-email trigger step failed below HTTP level. Reported to
    /// callers as a narrower "internal error sending email" rather than a
    /// generic server fault.
    #[error("internal error sending email")]
    EmailDispatch(#[source] reqwest::Error),
}

impl WorkflowError {
    /// Creates an `ActivityPublish` fault.
    #[must_use]
    pub fn activity_publish(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ActivityPublish {
            action: action.into(),
            detail: detail.into(),
        }
    }

    /// Returns `true` for expected, caller-correctable outcomes.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns `true` for infrastructure or downstream failures.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        !self.is_rejection()
    }

    /// Returns the rejection, if this is one.
    #[must_use]
    pub fn as_rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}
